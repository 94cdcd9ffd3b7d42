//! Session-scoped voice-turn orchestration for the voxloop backend.
//!
//! This crate is the client engine: it drives one record -> upload ->
//! respond -> play cycle at a time against an opaque HTTP voice-agent
//! backend, with retry/backoff and service-health aggregation.
//!
//! # Architecture
//!
//! - [`Transport`] is the single-attempt HTTP seam ([`HttpTransport`]
//!   in production, mocks in tests)
//! - [`RequestGateway`] adds retry, exponential backoff, and tri-state
//!   outcome classification on top of any transport
//! - [`ServiceHealthTracker`] aggregates per-dependency health from
//!   gateway outcomes and periodic `/health` probes
//! - [`SessionManager`] owns the conversation identity and the cached
//!   turn list
//! - [`TurnOrchestrator`] is the state machine tying it together, with
//!   [`RecorderAdapter`] and [`PlaybackSink`] as the device seams
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use voxloop_client::{
//!     HttpTransport, RequestGateway, GatewayConfig, ServiceHealthTracker,
//!     SessionManager, FileSessionStore, TurnOrchestrator, TurnConfig,
//!     WavFileRecorder, SaveToDirPlayback,
//! };
//!
//! let health = Arc::new(ServiceHealthTracker::default());
//! let gateway = Arc::new(RequestGateway::new(
//!     HttpTransport::new(),
//!     GatewayConfig::default(),
//!     Arc::clone(&health),
//! ));
//! let sessions = Arc::new(SessionManager::new(
//!     Arc::clone(&gateway),
//!     Box::new(FileSessionStore::default_location()),
//!     "http://127.0.0.1:8000",
//! ));
//! let (orchestrator, mut events) = TurnOrchestrator::new(
//!     gateway,
//!     sessions,
//!     Box::new(WavFileRecorder::new("clip.wav")),
//!     Box::new(SaveToDirPlayback::new("replies/")),
//!     TurnConfig::from_config(&Default::default()),
//! );
//!
//! orchestrator.begin().await;
//! // ... user speaks ...
//! let terminal = orchestrator.stop().await;
//! ```

pub mod diagnostics;
pub mod error;
pub mod gateway;
pub mod health;
pub mod playback;
pub mod recorder;
pub mod session;
pub mod transport;
pub mod turn;

pub use diagnostics::{DiagnosticCheck, DiagnosticReport, run_diagnostics};
pub use error::{ClientError, ErrorLog, FailureReason, Result};
pub use gateway::{GatewayConfig, Outcome, RequestGateway, compute_delay};
pub use health::{
    DependencyClassifier, DependencyHealth, ServiceHealthTracker, probe_once, run_probes,
};
pub use playback::{NullPlayback, PlaybackSink, PlaybackSource, SaveToDirPlayback};
pub use recorder::{AudioClip, RecorderAdapter, WavFileRecorder};
pub use session::{
    FileSessionStore, MemorySessionStore, SessionManager, SessionStore, fallback_session_id,
    generate_session_id,
};
pub use transport::{HttpReply, HttpTransport, Method, MultipartForm, RequestBody, RequestSpec, Transport};
pub use turn::{
    RecoveryContext, TurnConfig, TurnEvent, TurnOrchestrator, TurnParams, TurnRequest, TurnState,
};
