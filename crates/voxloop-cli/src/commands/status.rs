//! `vox status` -- probe backend health and show the aggregate.
//!
//! Runs one `/health` probe, folds it into the dependency table, and
//! prints the aggregate plus the per-dependency detail.
//!
//! # Example
//!
//! ```text
//! vox status
//! ```

use std::path::Path;

use voxloop_client::probe_once;
use voxloop_types::SystemStatus;

use super::build_engine;

/// Run the status command.
pub async fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let engine = build_engine(config_path)?;

    println!("vox status");
    println!("==========");
    println!();
    println!("Backend: {}", engine.config.backend.base_url);

    probe_once(&engine.gateway, &engine.config.backend.base_url).await;

    let aggregate = engine.health.aggregate();
    let marker = match aggregate {
        SystemStatus::Healthy => "all services online",
        SystemStatus::Degraded => "some services degraded",
        SystemStatus::Unreachable => "services offline",
    };
    println!("Status:  {aggregate} ({marker})");
    println!();
    println!("Dependencies:");
    for (dependency, health) in engine.health.snapshot() {
        let mut line = format!("  {:<14} {}", dependency.to_string(), health.status);
        if health.error_count > 0 {
            line.push_str(&format!("  errors: {}", health.error_count));
        }
        if let Some(error) = &health.last_error {
            line.push_str(&format!("  last: {error}"));
        }
        println!("{line}");
    }

    Ok(())
}
