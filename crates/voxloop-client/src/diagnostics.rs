//! Self-service diagnostics.
//!
//! A handful of checks the user can run when things misbehave:
//! connectivity (with measured latency), health-endpoint sanity, and a
//! capture capability report, plus the current per-dependency health
//! snapshot. These go straight through the [`Transport`] with a single
//! attempt -- a diagnostic that silently retried would hide the very
//! problem it is meant to expose.

use std::time::{Duration, Instant};

use serde::Serialize;

use voxloop_types::wire::HealthReport;

use crate::health::{DependencyHealth, ServiceHealthTracker};
use crate::transport::{RequestSpec, Transport};
use voxloop_types::Dependency;

/// Timeout for diagnostic requests; long waits are themselves a finding.
const DIAGNOSTIC_TIMEOUT: Duration = Duration::from_secs(10);

/// One check's result.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticCheck {
    pub ok: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Full diagnostic report.
#[derive(Debug)]
pub struct DiagnosticReport {
    pub connectivity: DiagnosticCheck,
    pub health_endpoint: DiagnosticCheck,
    pub capture: DiagnosticCheck,
    pub dependencies: Vec<(Dependency, DependencyHealth)>,
}

/// Run all checks against `base_url`.
pub async fn run_diagnostics<T: Transport>(
    transport: &T,
    tracker: &ServiceHealthTracker,
    base_url: &str,
    capture_available: bool,
) -> DiagnosticReport {
    let url = format!("{}/health", base_url.trim_end_matches('/'));
    let spec = RequestSpec::get(&url);

    let started = Instant::now();
    let reply = transport.execute(&spec, DIAGNOSTIC_TIMEOUT).await;
    let latency_ms = started.elapsed().as_millis() as u64;

    let (connectivity, health_endpoint) = match reply {
        Ok(reply) if reply.is_success() => {
            let connectivity = DiagnosticCheck {
                ok: true,
                message: format!("connected ({latency_ms} ms)"),
                detail: None,
            };
            let health_endpoint = match reply
                .json()
                .and_then(|v| serde_json::from_value::<HealthReport>(v).map_err(Into::into))
            {
                Ok(report) => DiagnosticCheck {
                    ok: report.status == "healthy",
                    message: format!("system status: {}", report.status),
                    detail: Some(format!(
                        "{} services, {} issue(s)",
                        report.services.len(),
                        report.issues.len()
                    )),
                },
                Err(e) => DiagnosticCheck {
                    ok: false,
                    message: "health endpoint returned unparseable payload".into(),
                    detail: Some(e.to_string()),
                },
            };
            (connectivity, health_endpoint)
        }
        Ok(reply) => (
            DiagnosticCheck {
                ok: false,
                message: format!("HTTP {} from {url}", reply.status),
                detail: Some(reply.body_text()),
            },
            DiagnosticCheck {
                ok: false,
                message: "health endpoint unavailable".into(),
                detail: None,
            },
        ),
        Err(e) => (
            DiagnosticCheck {
                ok: false,
                message: "connectivity failed".into(),
                detail: Some(e.to_string()),
            },
            DiagnosticCheck {
                ok: false,
                message: "health endpoint unreachable".into(),
                detail: None,
            },
        ),
    };

    let capture = if capture_available {
        DiagnosticCheck {
            ok: true,
            message: "audio capture available".into(),
            detail: None,
        }
    } else {
        DiagnosticCheck {
            ok: false,
            message: "audio capture unavailable on this platform".into(),
            detail: Some("recording entry points are disabled".into()),
        }
    };

    DiagnosticReport {
        connectivity,
        health_endpoint,
        capture,
        dependencies: tracker.snapshot(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::error::{ClientError, Result};
    use crate::transport::HttpReply;

    struct CannedTransport {
        reply: std::result::Result<(u16, &'static str), ()>,
    }

    #[async_trait]
    impl Transport for CannedTransport {
        async fn execute(&self, _spec: &RequestSpec, _timeout: Duration) -> Result<HttpReply> {
            match self.reply {
                Ok((status, body)) => Ok(HttpReply {
                    status,
                    body: body.as_bytes().to_vec(),
                }),
                Err(()) => Err(ClientError::NetworkTransport("connection refused".into())),
            }
        }
    }

    #[tokio::test]
    async fn healthy_backend_passes_all_checks() {
        let transport = CannedTransport {
            reply: Ok((
                200,
                r#"{"status": "healthy", "services": {"stt": {"status": "healthy"}}}"#,
            )),
        };
        let tracker = ServiceHealthTracker::default();
        let report = run_diagnostics(&transport, &tracker, "http://test/", true).await;

        assert!(report.connectivity.ok);
        assert!(report.connectivity.message.starts_with("connected ("));
        assert!(report.health_endpoint.ok);
        assert!(report.capture.ok);
        assert_eq!(report.dependencies.len(), 4);
    }

    #[tokio::test]
    async fn degraded_backend_fails_health_check_only() {
        let transport = CannedTransport {
            reply: Ok((200, r#"{"status": "degraded", "issues": ["tts down"]}"#)),
        };
        let tracker = ServiceHealthTracker::default();
        let report = run_diagnostics(&transport, &tracker, "http://test", true).await;

        assert!(report.connectivity.ok);
        assert!(!report.health_endpoint.ok);
        assert_eq!(report.health_endpoint.message, "system status: degraded");
    }

    #[tokio::test]
    async fn unreachable_backend_fails_connectivity() {
        let transport = CannedTransport { reply: Err(()) };
        let tracker = ServiceHealthTracker::default();
        let report = run_diagnostics(&transport, &tracker, "http://test", false).await;

        assert!(!report.connectivity.ok);
        assert!(!report.health_endpoint.ok);
        assert!(!report.capture.ok);
    }

    #[tokio::test]
    async fn http_error_reports_status() {
        let transport = CannedTransport {
            reply: Ok((502, "bad gateway")),
        };
        let tracker = ServiceHealthTracker::default();
        let report = run_diagnostics(&transport, &tracker, "http://test", true).await;

        assert!(!report.connectivity.ok);
        assert!(report.connectivity.message.contains("HTTP 502"));
        assert_eq!(report.connectivity.detail.as_deref(), Some("bad gateway"));
    }
}
