//! Backend wire contract.
//!
//! Serde types for the four backend endpoints the client depends on:
//!
//! - `POST /agent/chat/{session_id}` -> [`TurnResponse`]
//! - `GET /agent/chat/{session_id}/history` -> [`HistoryResponse`]
//! - `GET /health` -> [`HealthReport`]
//! - `POST /tts` -> [`TtsResponse`]
//!
//! Unknown fields are ignored for forward compatibility, and almost
//! everything is optional: the backend populates different subsets of
//! [`TurnResponse`] depending on which of its services succeeded.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::session::TurnRole;

fn default_true() -> bool {
    true
}

/// One message as the backend serializes it.
///
/// Timestamps stay raw strings on the wire; parsing (including the naive
/// ISO-8601 form some deployments emit) happens in
/// [`TurnRecord::from_wire`](crate::session::TurnRecord::from_wire).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: TurnRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Response to a voice turn upload.
///
/// `success == false` marks a soft fallback: the HTTP exchange worked but
/// one of the backend services could not complete, and the `fallback_*`
/// fields carry what should be surfaced instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResponse {
    /// Absent means success; the flag is only emitted on fallback paths.
    #[serde(default = "default_true")]
    pub success: bool,

    /// Assistant reply text. Older backends used `llm_response`.
    #[serde(default, alias = "llm_response")]
    pub ai_response: Option<String>,

    /// URL of the synthesized reply audio, when synthesis succeeded.
    #[serde(default)]
    pub audio_url: Option<String>,

    /// Human-readable description of what went wrong, on fallback.
    #[serde(default)]
    pub fallback_message: Option<String>,

    /// Reply text to display when no audio could be produced.
    #[serde(default)]
    pub fallback_text: Option<String>,

    /// Machine-readable failure classification, on fallback.
    #[serde(default)]
    pub error_type: Option<String>,

    #[serde(default)]
    pub session_id: Option<String>,

    /// Full conversation history after this turn, when the backend
    /// includes it.
    #[serde(default)]
    pub chat_history: Option<Vec<WireMessage>>,

    #[serde(default)]
    pub session_info: Option<SessionInfo>,
}

/// Session metadata the backend attaches to turn and history responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    #[serde(default)]
    pub message_count: u64,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_activity: Option<String>,
    #[serde(default)]
    pub error_count: u64,
}

/// Response to a history fetch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub messages: Vec<WireMessage>,
    #[serde(default)]
    pub message_count: u64,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_activity: Option<String>,
}

/// Per-service entry in a [`HealthReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceReport {
    pub status: String,
    #[serde(default)]
    pub error_count: u64,
    #[serde(default)]
    pub last_error: Option<String>,
}

/// Response to `GET /health`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthReport {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub active_sessions: u64,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub services: HashMap<String, ServiceReport>,
}

/// Request body for the standalone text-to-speech path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsRequest {
    pub text: String,
    pub voice_id: String,
}

/// Response from `POST /tts`.
///
/// Either `audio_url` is set, or the `fallback_*` fields describe why
/// synthesis failed and what text to show instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TtsResponse {
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub fallback_text: Option<String>,
    #[serde(default)]
    pub fallback_message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
