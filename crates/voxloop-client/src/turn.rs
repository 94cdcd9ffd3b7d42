//! Turn orchestration state machine.
//!
//! [`TurnOrchestrator`] drives one conversational turn: capture a clip,
//! submit it to the backend through the gateway, interpret the outcome
//! (full success, soft fallback, or failure), trigger playback, and
//! optionally arm the next turn in conversation mode.
//!
//! States: `Idle -> Requesting -> Recording -> Processing ->
//! {Success | SoftFallback | Failed} -> Idle`. The orchestrator is in
//! exactly one state at any time and refuses to start a new turn while
//! one is in flight, so a session's turns reach the backend strictly in
//! the order they were produced. Transitions are observable through an
//! `mpsc` event channel; the presentation layer is a consumer, never a
//! collaborator.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use voxloop_types::wire::TurnResponse;
use voxloop_types::{TurnRecord, TurnRole, VoxConfig};

use crate::error::{ClientError, ErrorLog, FailureReason};
use crate::gateway::{Outcome, RequestGateway};
use crate::playback::{PlaybackSink, PlaybackSource};
use crate::recorder::{AudioClip, RecorderAdapter};
use crate::session::SessionManager;
use crate::transport::{MultipartForm, RequestSpec, Transport};

/// Orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    /// Nothing in flight; ready to begin a turn.
    Idle,
    /// Waiting for the capture device grant.
    Requesting,
    /// Capturing audio.
    Recording,
    /// Clip submitted; waiting on the backend.
    Processing,
    /// Turn completed fully.
    Success,
    /// Backend answered with partial content.
    SoftFallback,
    /// Turn failed; see the accompanying event for the reason.
    Failed,
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Requesting => write!(f, "requesting"),
            Self::Recording => write!(f, "recording"),
            Self::Processing => write!(f, "processing"),
            Self::Success => write!(f, "success"),
            Self::SoftFallback => write!(f, "soft_fallback"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Events emitted as a turn progresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TurnEvent {
    /// The orchestrator entered a new state.
    State { state: TurnState },
    /// The assistant replied.
    Assistant {
        text: String,
        audio_url: Option<String>,
    },
    /// The backend delivered fallback content instead of a full reply.
    Fallback {
        message: Option<String>,
        text: Option<String>,
        error_type: Option<String>,
    },
    /// The turn failed.
    Failed {
        reason: FailureReason,
        message: String,
    },
}

/// Generation parameters sent with each turn.
#[derive(Debug, Clone)]
pub struct TurnParams {
    pub voice: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl TurnParams {
    fn form_fields(&self) -> HashMap<String, String> {
        HashMap::from([
            ("voice".to_string(), self.voice.clone()),
            ("max_tokens".to_string(), self.max_tokens.to_string()),
            ("temperature".to_string(), self.temperature.to_string()),
        ])
    }
}

/// The in-flight unit of work: one clip plus its parameters.
///
/// Created when recording stops, dropped when the turn resolves or is
/// superseded by a retry.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub clip: AudioClip,
    pub params: TurnParams,
}

/// The last failed request, kept only so `retry_last` can replay it.
#[derive(Debug, Clone)]
pub struct RecoveryContext {
    pub request: TurnRequest,
    pub reason: FailureReason,
}

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct TurnConfig {
    /// Clips shorter than this never reach the backend.
    pub min_clip: Duration,
    /// Generation parameters for every turn.
    pub params: TurnParams,
    /// Start in conversation (continuous) mode.
    pub auto_continue: bool,
}

impl TurnConfig {
    pub fn from_config(config: &VoxConfig) -> Self {
        Self {
            min_clip: Duration::from_millis(config.audio.min_clip_ms),
            params: TurnParams {
                voice: config.audio.voice.clone(),
                max_tokens: config.audio.max_tokens,
                temperature: config.audio.temperature,
            },
            auto_continue: config.conversation.auto_continue,
        }
    }
}

/// Drives record -> upload -> respond -> play cycles for one session.
pub struct TurnOrchestrator<T> {
    gateway: Arc<RequestGateway<T>>,
    sessions: Arc<SessionManager<T>>,
    recorder: tokio::sync::Mutex<Box<dyn RecorderAdapter>>,
    playback: Box<dyn PlaybackSink>,
    config: TurnConfig,
    state: tokio::sync::Mutex<TurnState>,
    events_tx: mpsc::Sender<TurnEvent>,
    recovery: std::sync::Mutex<Option<RecoveryContext>>,
    conversation: AtomicBool,
    paused: AtomicBool,
    capture_disabled: AtomicBool,
    errors: ErrorLog,
}

impl<T: Transport> TurnOrchestrator<T> {
    /// Create an orchestrator and the receiving end of its event stream.
    pub fn new(
        gateway: Arc<RequestGateway<T>>,
        sessions: Arc<SessionManager<T>>,
        recorder: Box<dyn RecorderAdapter>,
        playback: Box<dyn PlaybackSink>,
        config: TurnConfig,
    ) -> (Self, mpsc::Receiver<TurnEvent>) {
        let (events_tx, events_rx) = mpsc::channel(64);
        let conversation = config.auto_continue;
        let orchestrator = Self {
            gateway,
            sessions,
            recorder: tokio::sync::Mutex::new(recorder),
            playback,
            config,
            state: tokio::sync::Mutex::new(TurnState::Idle),
            events_tx,
            recovery: std::sync::Mutex::new(None),
            conversation: AtomicBool::new(conversation),
            paused: AtomicBool::new(false),
            capture_disabled: AtomicBool::new(false),
            errors: ErrorLog::default(),
        };
        (orchestrator, events_rx)
    }

    /// Current state.
    pub async fn state(&self) -> TurnState {
        *self.state.lock().await
    }

    /// Enable or disable conversation (continuous) mode.
    pub fn set_conversation_mode(&self, on: bool) {
        self.conversation.store(on, Ordering::SeqCst);
    }

    pub fn conversation_mode(&self) -> bool {
        self.conversation.load(Ordering::SeqCst)
    }

    /// Suppress auto-continue without interrupting an in-flight turn.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// The recovery context from the last failure, if any.
    pub fn recovery_context(&self) -> Option<RecoveryContext> {
        self.recovery
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Recent failures for diagnostics.
    pub fn error_log(&self) -> &ErrorLog {
        &self.errors
    }

    /// Start a turn: request the capture device and begin recording.
    ///
    /// Returns `true` when recording started. A no-op returning `false`
    /// while another turn is in flight, or after the platform reported
    /// capture as unsupported.
    pub async fn begin(&self) -> bool {
        if self.capture_disabled.load(Ordering::SeqCst) {
            debug!("begin rejected: capture unsupported on this platform");
            return false;
        }

        {
            let mut state = self.state.lock().await;
            if *state != TurnState::Idle {
                debug!(state = %state, "begin rejected: turn in flight");
                return false;
            }
            *state = TurnState::Requesting;
        }
        self.paused.store(false, Ordering::SeqCst);
        self.emit(TurnEvent::State {
            state: TurnState::Requesting,
        });

        let start_result = { self.recorder.lock().await.start().await };
        match start_result {
            Ok(()) => {
                self.set_state(TurnState::Recording).await;
                info!("recording started");
                true
            }
            Err(err) => {
                if matches!(err, ClientError::Unsupported(_)) {
                    self.capture_disabled.store(true, Ordering::SeqCst);
                    warn!("audio capture unsupported; recording disabled");
                }
                self.fail(FailureReason::from(&err), err.to_string()).await;
                false
            }
        }
    }

    /// Stop recording and drive the turn to a terminal state.
    ///
    /// Returns the terminal state reached (the orchestrator itself is
    /// back in `Idle` afterwards). A no-op when not recording.
    pub async fn stop(&self) -> TurnState {
        {
            let mut state = self.state.lock().await;
            if *state != TurnState::Recording {
                debug!(state = %state, "stop rejected: not recording");
                return *state;
            }
            *state = TurnState::Processing;
        }
        self.emit(TurnEvent::State {
            state: TurnState::Processing,
        });

        // The device is released by stop() on every path, clip or error.
        let clip_result = { self.recorder.lock().await.stop().await };
        let clip = match clip_result {
            Ok(clip) => clip,
            Err(err) => {
                return self
                    .fail(FailureReason::from(&err), err.to_string())
                    .await;
            }
        };

        if clip.is_empty() {
            return self
                .fail(FailureReason::EmptyClip, ClientError::EmptyClip.to_string())
                .await;
        }
        if clip.duration < self.config.min_clip {
            let err = ClientError::ClipTooShort {
                actual_ms: clip.duration.as_millis() as u64,
                minimum_ms: self.config.min_clip.as_millis() as u64,
            };
            return self.fail(FailureReason::ClipTooShort, err.to_string()).await;
        }

        let request = TurnRequest {
            clip,
            params: self.config.params.clone(),
        };
        self.process_request(request).await
    }

    /// Discard an in-progress recording and return to idle.
    ///
    /// Only meaningful while recording; an in-flight backend request
    /// cannot be cancelled other than by its timeout.
    pub async fn cancel(&self) {
        {
            let state = self.state.lock().await;
            if *state != TurnState::Recording {
                return;
            }
        }
        if let Err(e) = self.recorder.lock().await.stop().await {
            debug!(error = %e, "recorder stop during cancel");
        }
        info!("recording cancelled, clip discarded");
        self.set_state(TurnState::Idle).await;
    }

    /// Replay the last failed request without re-recording.
    ///
    /// Valid only when a recovery context exists and no turn is in
    /// flight; otherwise a no-op returning the current state.
    pub async fn retry_last(&self) -> TurnState {
        let Some(context) = self.recovery_context() else {
            debug!("retry rejected: nothing to retry");
            return self.state().await;
        };

        {
            let mut state = self.state.lock().await;
            match *state {
                TurnState::Idle | TurnState::Failed | TurnState::SoftFallback => {
                    *state = TurnState::Processing;
                }
                other => {
                    debug!(state = %other, "retry rejected: turn in flight");
                    return other;
                }
            }
        }
        self.emit(TurnEvent::State {
            state: TurnState::Processing,
        });

        info!(reason = %context.reason, "replaying last failed request");
        self.process_request(context.request).await
    }

    /// Submit a request through the gateway and settle the turn.
    /// Expects the state to already be `Processing`.
    async fn process_request(&self, request: TurnRequest) -> TurnState {
        let session_id = self.sessions.current_session().await;
        let spec = self.turn_spec(&session_id, &request);

        match self.gateway.send(&spec).await {
            Outcome::Success(payload) => {
                let response = match serde_json::from_value::<TurnResponse>(payload) {
                    Ok(r) => r,
                    Err(e) => {
                        self.store_recovery(request, FailureReason::NetworkTransport);
                        return self
                            .fail(
                                FailureReason::NetworkTransport,
                                format!("invalid response: {e}"),
                            )
                            .await;
                    }
                };
                self.settle_success(response).await
            }
            Outcome::SoftFallback(payload) => {
                let response: TurnResponse =
                    serde_json::from_value(payload).unwrap_or_else(|_| TurnResponse {
                        success: false,
                        ai_response: None,
                        audio_url: None,
                        fallback_message: None,
                        fallback_text: None,
                        error_type: None,
                        session_id: None,
                        chat_history: None,
                        session_info: None,
                    });
                self.store_recovery(request, FailureReason::SoftFallback);
                self.settle_fallback(response).await
            }
            Outcome::HardFailure { reason, message } => {
                self.store_recovery(request, reason);
                self.fail(reason, message).await
            }
        }
    }

    async fn settle_success(&self, response: TurnResponse) -> TurnState {
        if let Some(history) = &response.chat_history {
            self.sessions
                .replace_turns(history.iter().map(TurnRecord::from_wire).collect());
        } else if let Some(text) = &response.ai_response {
            self.sessions.append_turn(TurnRole::Assistant, text.clone());
        }

        self.clear_recovery();
        self.set_state(TurnState::Success).await;
        self.emit(TurnEvent::Assistant {
            text: response.ai_response.clone().unwrap_or_default(),
            audio_url: response.audio_url.clone(),
        });

        if let Some(url) = &response.audio_url {
            if let Err(e) = self.playback.play(PlaybackSource::Url(url.clone())).await {
                warn!(error = %e, "reply playback failed");
            }
        }

        self.set_state(TurnState::Idle).await;

        if self.conversation.load(Ordering::SeqCst) && !self.paused.load(Ordering::SeqCst) {
            debug!("conversation mode: arming next turn");
            self.begin().await;
        }

        TurnState::Success
    }

    async fn settle_fallback(&self, response: TurnResponse) -> TurnState {
        if let Some(history) = &response.chat_history {
            self.sessions
                .replace_turns(history.iter().map(TurnRecord::from_wire).collect());
        }

        self.errors.record(
            FailureReason::SoftFallback,
            response
                .fallback_message
                .clone()
                .unwrap_or_else(|| "backend fallback".into()),
            self.sessions.active_session_id().await,
        );

        self.set_state(TurnState::SoftFallback).await;
        self.emit(TurnEvent::Fallback {
            message: response.fallback_message.clone(),
            text: response.fallback_text.clone(),
            error_type: response.error_type.clone(),
        });

        // Fallback audio (e.g. a spoken apology) still plays when present.
        if let Some(url) = &response.audio_url {
            if let Err(e) = self.playback.play(PlaybackSource::Url(url.clone())).await {
                warn!(error = %e, "fallback playback failed");
            }
        }

        self.set_state(TurnState::Idle).await;
        TurnState::SoftFallback
    }

    /// Settle a failed turn: log, emit, and return to idle.
    async fn fail(&self, reason: FailureReason, message: String) -> TurnState {
        self.errors
            .record(reason, message.clone(), self.sessions.active_session_id().await);
        warn!(reason = %reason, message = %message, "turn failed");

        self.set_state(TurnState::Failed).await;
        self.emit(TurnEvent::Failed { reason, message });
        self.set_state(TurnState::Idle).await;
        TurnState::Failed
    }

    fn turn_spec(&self, session_id: &str, request: &TurnRequest) -> RequestSpec {
        let form = MultipartForm {
            audio: request.clip.data.clone(),
            mime_type: request.clip.mime_type.clone(),
            file_name: request.clip.upload_file_name().to_string(),
            fields: request.params.form_fields(),
        };
        RequestSpec::post_multipart(
            format!("{}/agent/chat/{}", self.sessions.base_url(), session_id),
            form,
        )
    }

    fn store_recovery(&self, request: TurnRequest, reason: FailureReason) {
        *self.recovery.lock().unwrap_or_else(|e| e.into_inner()) =
            Some(RecoveryContext { request, reason });
    }

    fn clear_recovery(&self) {
        *self.recovery.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    async fn set_state(&self, new_state: TurnState) {
        *self.state.lock().await = new_state;
        self.emit(TurnEvent::State { state: new_state });
    }

    /// Best-effort event delivery; a full or closed receiver only logs.
    fn emit(&self, event: TurnEvent) {
        if let Err(e) = self.events_tx.try_send(event) {
            debug!(error = %e, "turn event dropped (receiver full or closed)");
        }
    }
}
