//! Client error types.
//!
//! [`ClientError`] is the unified error type for the engine. Every failure
//! a turn can hit -- device acquisition, clip validation, network
//! transport, backend status -- maps to one variant, and
//! [`FailureReason`] is its wire-friendly classification carried in
//! events and the recovery context.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by the voxloop engine.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The platform refused microphone access.
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    /// No capture device is available.
    #[error("no capture device: {0}")]
    NoDevice(String),

    /// The platform cannot capture audio at all.
    #[error("audio capture unsupported: {0}")]
    Unsupported(String),

    /// The recorded clip is shorter than the configured minimum.
    #[error("clip too short: {actual_ms}ms < {minimum_ms}ms")]
    ClipTooShort { actual_ms: u64, minimum_ms: u64 },

    /// The recorder produced no audio bytes.
    #[error("empty clip")]
    EmptyClip,

    /// A request attempt exceeded its timeout.
    #[error("request timed out")]
    NetworkTimeout,

    /// A request attempt failed at the transport level.
    #[error("network error: {0}")]
    NetworkTransport(String),

    /// The backend answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// A 2xx response body could not be interpreted.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// An HTTP-level error from reqwest.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (session store, clip files, saved audio).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience type alias for engine operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Wire-friendly failure classification.
///
/// This is the taxonomy surfaced to the presentation layer and kept in
/// the recovery context; the human-readable detail travels separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    PermissionDenied,
    NoDevice,
    Unsupported,
    ClipTooShort,
    EmptyClip,
    NetworkTimeout,
    NetworkTransport,
    HttpError,
    SoftFallback,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PermissionDenied => "permission_denied",
            Self::NoDevice => "no_device",
            Self::Unsupported => "unsupported",
            Self::ClipTooShort => "clip_too_short",
            Self::EmptyClip => "empty_clip",
            Self::NetworkTimeout => "network_timeout",
            Self::NetworkTransport => "network_transport",
            Self::HttpError => "http_error",
            Self::SoftFallback => "soft_fallback",
        };
        write!(f, "{s}")
    }
}

impl From<&ClientError> for FailureReason {
    fn from(err: &ClientError) -> Self {
        match err {
            ClientError::PermissionDenied(_) => Self::PermissionDenied,
            ClientError::NoDevice(_) => Self::NoDevice,
            ClientError::Unsupported(_) => Self::Unsupported,
            ClientError::ClipTooShort { .. } => Self::ClipTooShort,
            ClientError::EmptyClip => Self::EmptyClip,
            ClientError::NetworkTimeout => Self::NetworkTimeout,
            ClientError::HttpStatus { .. } => Self::HttpError,
            ClientError::NetworkTransport(_)
            | ClientError::InvalidResponse(_)
            | ClientError::Http(_)
            | ClientError::Json(_)
            | ClientError::Io(_) => Self::NetworkTransport,
        }
    }
}

/// One recorded failure.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEntry {
    pub timestamp: DateTime<Utc>,
    pub reason: FailureReason,
    pub message: String,
    pub session_id: Option<String>,
}

/// Bounded in-memory log of recent failures.
///
/// Oldest entries are evicted past the capacity. Nothing here is
/// persisted; it exists so diagnostics can show what went wrong during
/// the current run.
#[derive(Debug)]
pub struct ErrorLog {
    entries: Mutex<VecDeque<ErrorEntry>>,
    capacity: usize,
}

impl ErrorLog {
    pub const DEFAULT_CAPACITY: usize = 50;

    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            capacity,
        }
    }

    /// Record a failure, evicting the oldest entry if at capacity.
    pub fn record(&self, reason: FailureReason, message: impl Into<String>, session_id: Option<String>) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(ErrorEntry {
            timestamp: Utc::now(),
            reason,
            message: message.into(),
            session_id,
        });
    }

    /// The most recent `n` entries, newest last.
    pub fn recent(&self, n: usize) -> Vec<ErrorEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let start = entries.len().saturating_sub(n);
        entries.iter().skip(start).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
