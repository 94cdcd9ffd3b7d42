//! Per-dependency service health tracking.
//!
//! [`ServiceHealthTracker`] keeps one [`DependencyHealth`] entry per
//! backend dependency (transcription, language model, synthesis, and the
//! network path itself), fed from two sources: request outcomes reported
//! by the gateway, and periodic out-of-band `/health` probes. The
//! aggregate tri-state status drives the connection indicator.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use voxloop_types::config::ClassifierRule;
use voxloop_types::wire::HealthReport;
use voxloop_types::{Dependency, DependencyStatus, SystemStatus};

use crate::gateway::{Outcome, RequestGateway};
use crate::transport::{RequestSpec, Transport};

/// Health state of one dependency.
#[derive(Debug, Clone)]
pub struct DependencyHealth {
    pub status: DependencyStatus,
    pub error_count: u32,
    pub last_error: Option<String>,
    pub last_checked: Option<DateTime<Utc>>,
}

impl Default for DependencyHealth {
    fn default() -> Self {
        Self {
            status: DependencyStatus::Unknown,
            error_count: 0,
            last_error: None,
            last_checked: None,
        }
    }
}

/// Maps free-text backend service names onto [`Dependency`] buckets.
///
/// Backend-reported names are not a stable enumerated set, so the
/// mapping is a first-match substring table loaded from configuration
/// rather than hardcoded. Unmatched names count against the network.
#[derive(Debug, Clone)]
pub struct DependencyClassifier {
    rules: Vec<(String, Dependency)>,
}

impl DependencyClassifier {
    pub fn from_rules(rules: &[ClassifierRule]) -> Self {
        Self {
            rules: rules
                .iter()
                .map(|r| (r.contains.to_lowercase(), r.dependency))
                .collect(),
        }
    }

    /// Classify a service name. First matching rule wins.
    pub fn classify(&self, name: &str) -> Dependency {
        let lower = name.to_lowercase();
        self.rules
            .iter()
            .find(|(needle, _)| lower.contains(needle.as_str()))
            .map(|(_, dep)| *dep)
            .unwrap_or(Dependency::Network)
    }
}

impl Default for DependencyClassifier {
    fn default() -> Self {
        Self::from_rules(&voxloop_types::config::HealthConfig::default().classifier)
    }
}

/// Tracks per-dependency health and aggregates it.
///
/// The table is guarded by a plain mutex and never held across an
/// await; all updates funnel through [`record`](Self::record) so the
/// transition rules live in one place.
#[derive(Debug)]
pub struct ServiceHealthTracker {
    table: Mutex<HashMap<Dependency, DependencyHealth>>,
    classifier: DependencyClassifier,
}

impl ServiceHealthTracker {
    pub fn new(classifier: DependencyClassifier) -> Self {
        let table = Dependency::ALL
            .into_iter()
            .map(|dep| (dep, DependencyHealth::default()))
            .collect();
        Self {
            table: Mutex::new(table),
            classifier,
        }
    }

    /// Record one signal for a dependency.
    ///
    /// Success resets the error count and marks the dependency healthy;
    /// failure increments the count, marks it unreachable, and stores
    /// the message.
    pub fn record(&self, dep: Dependency, ok: bool, message: Option<&str>) {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        let entry = table.entry(dep).or_default();
        entry.last_checked = Some(Utc::now());
        if ok {
            entry.status = DependencyStatus::Healthy;
            entry.error_count = 0;
            entry.last_error = None;
        } else {
            entry.status = DependencyStatus::Unreachable;
            entry.error_count += 1;
            entry.last_error = message.map(str::to_owned);
            debug!(
                dependency = %dep,
                error_count = entry.error_count,
                message = message.unwrap_or(""),
                "dependency failure recorded"
            );
        }
    }

    /// Record a signal for a backend-named service, classified through
    /// the substring table.
    pub fn record_service(&self, service_name: &str, ok: bool, message: Option<&str>) {
        let dep = self.classifier.classify(service_name);
        self.record(dep, ok, message);
    }

    /// Aggregate system status.
    ///
    /// Healthy only when every dependency is healthy; unreachable when
    /// more than half are; degraded otherwise (so an `unknown` entry
    /// can never report a healthy system).
    pub fn aggregate(&self) -> SystemStatus {
        let table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        let total = Dependency::ALL.len();
        let healthy = Dependency::ALL
            .iter()
            .filter(|dep| {
                table.get(dep).map(|h| h.status) == Some(DependencyStatus::Healthy)
            })
            .count();
        let unreachable = Dependency::ALL
            .iter()
            .filter(|dep| {
                table.get(dep).map(|h| h.status) == Some(DependencyStatus::Unreachable)
            })
            .count();

        if healthy == total {
            SystemStatus::Healthy
        } else if unreachable * 2 > total {
            SystemStatus::Unreachable
        } else {
            SystemStatus::Degraded
        }
    }

    /// Current state of every dependency, in display order.
    pub fn snapshot(&self) -> Vec<(Dependency, DependencyHealth)> {
        let table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        Dependency::ALL
            .into_iter()
            .map(|dep| (dep, table.get(&dep).cloned().unwrap_or_default()))
            .collect()
    }

    /// Fold a backend `/health` report into local state.
    ///
    /// Each reported service is classified and recorded; a service
    /// counts as ok only when its reported status is `healthy`.
    pub fn fold_report(&self, report: &HealthReport) {
        for (name, service) in &report.services {
            let ok = service.status == "healthy";
            self.record_service(name, ok, service.last_error.as_deref());
        }
        debug!(
            status = %report.status,
            services = report.services.len(),
            issues = report.issues.len(),
            "health report folded"
        );
    }
}

impl Default for ServiceHealthTracker {
    fn default() -> Self {
        Self::new(DependencyClassifier::default())
    }
}

/// One out-of-band `/health` probe through the gateway.
///
/// Probes use a single attempt: they recur on the interval anyway, and
/// retrying would double-count network failures. Probe failures are
/// swallowed after the gateway records them.
pub async fn probe_once<T: Transport>(gateway: &RequestGateway<T>, base_url: &str) {
    let spec = RequestSpec::get(format!("{}/health", base_url.trim_end_matches('/')))
        .with_max_attempts(1);
    match gateway.send(&spec).await {
        Outcome::Success(payload) | Outcome::SoftFallback(payload) => {
            match serde_json::from_value::<HealthReport>(payload) {
                Ok(report) => gateway.health().fold_report(&report),
                Err(e) => warn!(error = %e, "health probe returned unparseable report"),
            }
        }
        Outcome::HardFailure { message, .. } => {
            debug!(error = %message, "health probe failed");
        }
    }
}

/// Probe loop: one probe immediately, then one per interval, forever.
///
/// Spawn this on its own task; it never blocks turn processing. Abort
/// the task to stop probing.
pub async fn run_probes<T: Transport>(
    gateway: std::sync::Arc<RequestGateway<T>>,
    base_url: String,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        probe_once(&gateway, &base_url).await;
    }
}
