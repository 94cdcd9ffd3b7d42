//! `vox talk` -- run conversation turns from prepared audio clips.
//!
//! Each clip file plays the role of one spoken utterance. With
//! `--continuous` the orchestrator re-arms itself after each successful
//! turn, so the clip list drains like an ongoing conversation.
//!
//! # Example
//!
//! ```text
//! vox talk question1.wav question2.wav
//! vox talk --continuous --save-dir replies/ *.wav
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use clap::Args;

use voxloop_client::{
    AudioClip, ClientError, NullPlayback, PlaybackSink, RecorderAdapter, SaveToDirPlayback,
    TurnConfig, TurnEvent, TurnOrchestrator, TurnState, WavFileRecorder,
};

use super::build_engine;

/// Arguments for the `vox talk` subcommand.
#[derive(Args)]
pub struct TalkArgs {
    /// WAV clips to send, one per turn, in order.
    #[arg(required = true)]
    pub clips: Vec<PathBuf>,

    /// Keep the conversation armed after each successful turn.
    #[arg(long)]
    pub continuous: bool,

    /// Directory to save reply audio into (discarded when absent).
    #[arg(long)]
    pub save_dir: Option<PathBuf>,
}

/// Recorder that serves a list of clip files, one per recording cycle.
struct PlaylistRecorder {
    clips: Vec<PathBuf>,
    next: usize,
    current: Option<WavFileRecorder>,
}

impl PlaylistRecorder {
    fn new(clips: Vec<PathBuf>) -> Self {
        Self {
            clips,
            next: 0,
            current: None,
        }
    }
}

#[async_trait]
impl RecorderAdapter for PlaylistRecorder {
    async fn start(&mut self) -> voxloop_client::Result<()> {
        let Some(path) = self.clips.get(self.next) else {
            return Err(ClientError::NoDevice("clip list exhausted".into()));
        };
        let mut recorder = WavFileRecorder::new(path.clone());
        recorder.start().await?;
        self.next += 1;
        self.current = Some(recorder);
        Ok(())
    }

    async fn stop(&mut self) -> voxloop_client::Result<AudioClip> {
        match self.current.as_mut() {
            Some(recorder) => recorder.stop().await,
            None => Err(ClientError::NoDevice("not recording".into())),
        }
    }

    fn is_capturing(&self) -> bool {
        self.current.as_ref().is_some_and(|r| r.is_capturing())
    }
}

/// Run the talk command.
pub async fn run(args: TalkArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let engine = build_engine(config_path)?;
    let turn_count = args.clips.len();

    let playback: Box<dyn PlaybackSink> = match &args.save_dir {
        Some(dir) => Box::new(SaveToDirPlayback::new(dir.clone())),
        None => Box::new(NullPlayback),
    };

    let mut turn_config = TurnConfig::from_config(&engine.config);
    turn_config.auto_continue = args.continuous;

    let (orchestrator, mut events) = TurnOrchestrator::new(
        Arc::clone(&engine.gateway),
        Arc::clone(&engine.sessions),
        Box::new(PlaylistRecorder::new(args.clips)),
        playback,
        turn_config,
    );

    // Health probing runs beside the conversation, never blocking it.
    let probe_handle = tokio::spawn(voxloop_client::run_probes(
        Arc::clone(&engine.gateway),
        engine.config.backend.base_url.clone(),
        std::time::Duration::from_secs(engine.config.health.probe_interval_secs),
    ));

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                TurnEvent::State { state } => println!("[{state}]"),
                TurnEvent::Assistant { text, audio_url } => {
                    println!("assistant: {text}");
                    if let Some(url) = audio_url {
                        println!("  audio: {url}");
                    }
                }
                TurnEvent::Fallback {
                    message,
                    text,
                    error_type,
                } => {
                    if let Some(message) = message {
                        println!("fallback ({}): {message}", error_type.as_deref().unwrap_or("unknown"));
                    }
                    if let Some(text) = text {
                        println!("text reply: {text}");
                    }
                }
                TurnEvent::Failed { reason, message } => {
                    println!("turn failed ({reason}): {message}");
                }
            }
        }
    });

    let session_id = engine.sessions.current_session().await;
    println!("session: {session_id}");

    for _ in 0..turn_count {
        if orchestrator.state().await == TurnState::Idle && !orchestrator.begin().await {
            break;
        }
        let terminal = orchestrator.stop().await;
        if terminal == TurnState::Failed && orchestrator.recovery_context().is_some() {
            println!("(rerun with the same clip or use `vox talk` again to retry)");
        }
    }

    // Drop the orchestrator so the event channel closes and the
    // printer drains what remains.
    drop(orchestrator);
    let _ = printer.await;
    probe_handle.abort();

    let turns = engine.sessions.cached_turns();
    if !turns.is_empty() {
        println!();
        println!("conversation so far:");
        for turn in turns {
            println!("  {:>9}: {}", turn.role.to_string(), turn.content);
        }
    }

    Ok(())
}
