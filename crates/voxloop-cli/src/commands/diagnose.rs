//! `vox diagnose` -- connectivity and capability diagnostics.
//!
//! The command-line rendering of the engine's diagnostic checks:
//! connectivity with measured latency, health-endpoint sanity, capture
//! availability, and the current dependency table.

use std::path::Path;

use voxloop_client::{HttpTransport, run_diagnostics};

use super::build_engine;

fn mark(ok: bool) -> &'static str {
    if ok { "ok  " } else { "FAIL" }
}

/// Run the diagnose command.
pub async fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let engine = build_engine(config_path)?;

    println!("vox diagnose");
    println!("============");
    println!();

    let transport = HttpTransport::new();
    let report = run_diagnostics(
        &transport,
        &engine.health,
        &engine.config.backend.base_url,
        // The bundled recorder reads clip files, so capture is
        // available whenever the filesystem is.
        true,
    )
    .await;

    for (name, check) in [
        ("connectivity", &report.connectivity),
        ("health", &report.health_endpoint),
        ("capture", &report.capture),
    ] {
        println!("[{}] {:<13} {}", mark(check.ok), name, check.message);
        if let Some(detail) = &check.detail {
            println!("       {detail}");
        }
    }

    println!();
    println!("Dependencies:");
    for (dependency, health) in report.dependencies {
        println!("  {:<14} {}", dependency.to_string(), health.status);
    }

    Ok(())
}
