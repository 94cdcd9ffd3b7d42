//! Session identity and history.
//!
//! [`SessionManager`] owns the identity of the current conversation: it
//! restores a session id from a persisted [`SessionStore`] reference,
//! mints a fresh one when none exists, and keeps the client-side cache
//! of turns for display. The backend owns the authoritative history;
//! everything here is best-effort convenience on top of it.

use std::path::PathBuf;
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, warn};

use voxloop_types::wire::HistoryResponse;
use voxloop_types::{TurnRecord, TurnRole};

use crate::error::{ClientError, Result};
use crate::gateway::{Outcome, RequestGateway};
use crate::transport::{RequestSpec, Transport};

/// Persistence seam for the active session reference.
///
/// The browser original carried the id in the page's query string so a
/// reload resumed the conversation; here the same role is played by a
/// small state file (or an in-memory cell in tests).
pub trait SessionStore: Send + Sync {
    /// Load the persisted session id, if any.
    fn load(&self) -> std::io::Result<Option<String>>;
    /// Persist `id` as the active session.
    fn store(&self, id: &str) -> std::io::Result<()>;
}

/// File-backed store, one id per file (default `~/.voxloop/session`).
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store at the default location under the state directory.
    pub fn default_location() -> Self {
        Self::new(voxloop_types::VoxConfig::state_dir().join("session"))
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> std::io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => {
                let trimmed = raw.trim();
                Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn store(&self, id: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, id)
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: std::sync::Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            inner: std::sync::Mutex::new(Some(id.into())),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> std::io::Result<Option<String>> {
        Ok(self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn store(&self, id: &str) -> std::io::Result<()> {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = Some(id.to_string());
        Ok(())
    }
}

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Mint a new session id: `chat_<epoch millis>_<9 base36 chars>`.
///
/// Uniqueness is best-effort -- ample for single-user interactive use,
/// not a cryptographic guarantee.
pub fn generate_session_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("chat_{millis}_{suffix}")
}

/// Last-resort id when the session store cannot even be read.
pub fn fallback_session_id() -> String {
    format!("fallback_{}", chrono::Utc::now().timestamp_millis())
}

/// Owns the active session id and the cached turn list.
pub struct SessionManager<T> {
    gateway: Arc<RequestGateway<T>>,
    store: Box<dyn SessionStore>,
    base_url: String,
    current: tokio::sync::Mutex<Option<String>>,
    turns: std::sync::Mutex<Vec<TurnRecord>>,
}

impl<T: Transport> SessionManager<T> {
    pub fn new(
        gateway: Arc<RequestGateway<T>>,
        store: Box<dyn SessionStore>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            store,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            current: tokio::sync::Mutex::new(None),
            turns: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// The active session id, created lazily.
    ///
    /// Restores the persisted reference when one exists; otherwise mints
    /// and persists a new id. If the store is unreadable, falls back to
    /// an unpersisted `fallback_` id so the client keeps working.
    pub async fn current_session(&self) -> String {
        let mut current = self.current.lock().await;
        if let Some(id) = current.as_ref() {
            return id.clone();
        }

        let id = match self.store.load() {
            Ok(Some(persisted)) => {
                debug!(session_id = %persisted, "resumed persisted session");
                persisted
            }
            Ok(None) => {
                let fresh = generate_session_id();
                if let Err(e) = self.store.store(&fresh) {
                    warn!(error = %e, "failed to persist new session id");
                }
                debug!(session_id = %fresh, "minted new session");
                fresh
            }
            Err(e) => {
                warn!(error = %e, "session store unreadable, using fallback id");
                fallback_session_id()
            }
        };

        *current = Some(id.clone());
        id
    }

    /// The active session id without creating one.
    pub async fn active_session_id(&self) -> Option<String> {
        self.current.lock().await.clone()
    }

    /// Mint and activate a fresh session, discarding the cached turns.
    ///
    /// Server-side history of the previous session is left intact.
    pub async fn new_session(&self) -> String {
        let fresh = generate_session_id();
        if let Err(e) = self.store.store(&fresh) {
            warn!(error = %e, "failed to persist new session id");
        }
        *self.current.lock().await = Some(fresh.clone());
        self.turns
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        debug!(session_id = %fresh, "switched to new session");
        fresh
    }

    /// Best-effort history fetch for the active session.
    ///
    /// Any failure -- 404 included, which is the normal case for a
    /// brand-new session -- is swallowed and reported as `None`. On
    /// success the cached turn list is replaced with the fetched
    /// messages.
    pub async fn load_history(&self) -> Option<HistoryResponse> {
        let session_id = self.current_session().await;
        let spec = RequestSpec::get(format!(
            "{}/agent/chat/{}/history",
            self.base_url, session_id
        ));

        match self.gateway.send(&spec).await {
            Outcome::Success(payload) => match serde_json::from_value::<HistoryResponse>(payload)
            {
                Ok(history) => {
                    let records: Vec<TurnRecord> =
                        history.messages.iter().map(TurnRecord::from_wire).collect();
                    self.replace_turns(records);
                    Some(history)
                }
                Err(e) => {
                    warn!(error = %e, "history response unparseable");
                    None
                }
            },
            Outcome::SoftFallback(_) => {
                debug!(session_id = %session_id, "history fetch returned fallback, ignoring");
                None
            }
            Outcome::HardFailure { message, .. } => {
                // Normal for fresh sessions; never surfaced as an error.
                debug!(session_id = %session_id, error = %message, "history unavailable");
                None
            }
        }
    }

    /// Clear the session's server-side history and the local cache.
    ///
    /// The delete endpoint is idempotent; only a hard failure surfaces
    /// as an error.
    pub async fn clear_session(&self) -> Result<()> {
        let session_id = self.current_session().await;
        let spec = RequestSpec::delete(format!("{}/agent/chat/{}", self.base_url, session_id));

        match self.gateway.send(&spec).await {
            Outcome::Success(_) | Outcome::SoftFallback(_) => {
                self.turns
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .clear();
                Ok(())
            }
            Outcome::HardFailure { message, .. } => {
                Err(ClientError::NetworkTransport(message))
            }
        }
    }

    /// Append one turn to the cached display list.
    pub fn append_turn(&self, role: TurnRole, content: impl Into<String>) {
        self.turns
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(TurnRecord::new(role, content));
    }

    /// Replace the cached display list wholesale (e.g. from a turn
    /// response's `chat_history`).
    pub fn replace_turns(&self, records: Vec<TurnRecord>) {
        *self.turns.lock().unwrap_or_else(|e| e.into_inner()) = records;
    }

    /// Snapshot of the cached turn list.
    pub fn cached_turns(&self) -> Vec<TurnRecord> {
        self.turns
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Backend base URL this manager talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
