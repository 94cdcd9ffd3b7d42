//! `vox say` -- standalone text-to-speech.
//!
//! Sends text through `POST /tts` and either saves the synthesized
//! audio or prints the backend's text fallback.

use std::path::{Path, PathBuf};

use clap::Args;

use voxloop_client::{Outcome, PlaybackSink, PlaybackSource, RequestSpec, SaveToDirPlayback};
use voxloop_types::{TtsRequest, TtsResponse};

use super::build_engine;

/// Arguments for the `vox say` subcommand.
#[derive(Args)]
pub struct SayArgs {
    /// Text to synthesize.
    pub text: String,

    /// Voice selector (defaults to the configured voice).
    #[arg(long)]
    pub voice: Option<String>,

    /// Directory to save the audio into.
    #[arg(long, default_value = "replies")]
    pub save_dir: PathBuf,
}

/// Run the say command.
pub async fn run(args: SayArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let engine = build_engine(config_path)?;
    let voice = args.voice.unwrap_or_else(|| engine.config.audio.voice.clone());

    let request = TtsRequest {
        text: args.text.clone(),
        voice_id: voice,
    };
    let spec = RequestSpec::post_json(
        format!("{}/tts", engine.config.backend.base_url.trim_end_matches('/')),
        serde_json::to_value(&request)?,
    );

    match engine.gateway.send(&spec).await {
        Outcome::Success(payload) => {
            let response: TtsResponse = serde_json::from_value(payload)?;
            match response.audio_url {
                Some(url) => {
                    println!("audio: {url}");
                    let sink = SaveToDirPlayback::new(args.save_dir);
                    sink.play(PlaybackSource::Url(url)).await?;
                }
                None => {
                    // Some backends omit the success flag on fallback.
                    print_fallback(&response, &args.text);
                }
            }
        }
        Outcome::SoftFallback(payload) => {
            let response: TtsResponse = serde_json::from_value(payload).unwrap_or_default();
            print_fallback(&response, &args.text);
        }
        Outcome::HardFailure { reason, message } => {
            anyhow::bail!("tts request failed ({reason}): {message}");
        }
    }

    Ok(())
}

fn print_fallback(response: &TtsResponse, original: &str) {
    if let Some(message) = &response.fallback_message {
        println!("synthesis unavailable: {message}");
    } else {
        println!("synthesis unavailable");
    }
    let text = response.fallback_text.as_deref().unwrap_or(original);
    println!("text: {text}");
}
