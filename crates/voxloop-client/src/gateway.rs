//! Request gateway: retry, backoff, and outcome classification.
//!
//! [`RequestGateway`] wraps a [`Transport`] and turns raw attempts into a
//! tri-state [`Outcome`]: success, soft fallback (the backend answered
//! 2xx but flagged an application-level failure), or hard failure after
//! the attempt budget is spent. Transport errors, timeouts, and non-2xx
//! statuses all retry with exponential backoff; soft fallbacks never do,
//! because replaying a deterministic backend rejection only burns quota.
//!
//! Every attempt also feeds the network dependency of the shared
//! [`ServiceHealthTracker`], so connection state stays current without
//! separate bookkeeping.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::FailureReason;
use crate::health::ServiceHealthTracker;
use crate::transport::{RequestSpec, Transport};

/// Retry and timeout defaults applied when a [`RequestSpec`] does not
/// override them.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Per-attempt timeout (default: 60 seconds).
    pub timeout: Duration,
    /// Attempt cap, first try included (default: 3).
    pub max_attempts: u32,
    /// Backoff base delay (default: 1 second).
    pub base_delay: Duration,
    /// Backoff ceiling (default: 10 seconds).
    pub max_delay: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl GatewayConfig {
    /// Build from the backend section of the config file.
    pub fn from_backend(backend: &voxloop_types::config::BackendConfig) -> Self {
        Self {
            timeout: Duration::from_secs(backend.timeout_secs),
            max_attempts: backend.max_attempts,
            ..Self::default()
        }
    }
}

/// Delay before the retry that follows attempt `n` (1-indexed):
/// `min(base * 2^(n-1), max)`.
pub fn compute_delay(config: &GatewayConfig, attempt: u32) -> Duration {
    let exp = 2u64.saturating_pow(attempt.saturating_sub(1));
    let base_ms = config.base_delay.as_millis() as u64;
    let raw_ms = base_ms.saturating_mul(exp);
    Duration::from_millis(raw_ms.min(config.max_delay.as_millis() as u64))
}

/// Result of one gateway call.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// 2xx and the payload's `success` flag is true or absent.
    Success(serde_json::Value),
    /// 2xx but the payload flags an application-level failure. Never
    /// retried; the caller decides what fallback content to surface.
    SoftFallback(serde_json::Value),
    /// Transport error, timeout, or non-2xx after all attempts.
    HardFailure {
        reason: FailureReason,
        message: String,
    },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_soft_fallback(&self) -> bool {
        matches!(self, Self::SoftFallback(_))
    }
}

/// Retrying request issuer over any [`Transport`].
pub struct RequestGateway<T> {
    transport: T,
    config: GatewayConfig,
    health: Arc<ServiceHealthTracker>,
}

impl<T: Transport> RequestGateway<T> {
    pub fn new(transport: T, config: GatewayConfig, health: Arc<ServiceHealthTracker>) -> Self {
        Self {
            transport,
            config,
            health,
        }
    }

    /// The shared health tracker this gateway reports into.
    pub fn health(&self) -> &Arc<ServiceHealthTracker> {
        &self.health
    }

    /// The wrapped transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The gateway's default retry/timeout configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Send a request, retrying transient failures with exponential
    /// backoff, and classify the result.
    pub async fn send(&self, spec: &RequestSpec) -> Outcome {
        let max_attempts = spec.max_attempts.unwrap_or(self.config.max_attempts).max(1);
        let timeout = spec.timeout.unwrap_or(self.config.timeout);

        let mut last_reason = FailureReason::NetworkTransport;
        let mut last_message = String::from("no attempt made");

        for attempt in 1..=max_attempts {
            match self.transport.execute(spec, timeout).await {
                Ok(reply) if reply.is_success() => {
                    self.health
                        .record(voxloop_types::Dependency::Network, true, None);

                    // A 2xx body is inspected exactly once for the
                    // application-level success flag; non-JSON bodies
                    // break the contract and are not retried either.
                    let payload = match reply.json() {
                        Ok(v) => v,
                        Err(e) => {
                            return Outcome::HardFailure {
                                reason: FailureReason::NetworkTransport,
                                message: format!("invalid JSON in 2xx response: {e}"),
                            };
                        }
                    };

                    if payload.get("success").and_then(serde_json::Value::as_bool)
                        == Some(false)
                    {
                        debug!(url = %spec.url, attempt, "soft fallback from backend");
                        return Outcome::SoftFallback(payload);
                    }

                    if attempt > 1 {
                        debug!(url = %spec.url, attempt, "request succeeded after retry");
                    }
                    return Outcome::Success(payload);
                }
                Ok(reply) => {
                    let message = format!("HTTP {}: {}", reply.status, reply.body_text());
                    self.health.record(
                        voxloop_types::Dependency::Network,
                        false,
                        Some(&message),
                    );
                    last_reason = FailureReason::HttpError;
                    last_message = message;
                }
                Err(err) => {
                    let reason = FailureReason::from(&err);
                    let message = err.to_string();
                    self.health.record(
                        voxloop_types::Dependency::Network,
                        false,
                        Some(&message),
                    );
                    last_reason = reason;
                    last_message = message;
                }
            }

            if attempt < max_attempts {
                let delay = compute_delay(&self.config, attempt);
                warn!(
                    url = %spec.url,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %last_message,
                    "retrying after failed attempt"
                );
                tokio::time::sleep(delay).await;
            }
        }

        Outcome::HardFailure {
            reason: last_reason,
            message: format!("failed after {max_attempts} attempts: {last_message}"),
        }
    }
}
