//! Subcommand implementations.

pub mod diagnose;
pub mod say;
pub mod sessions;
pub mod status;
pub mod talk;

use std::path::Path;
use std::sync::Arc;

use voxloop_client::{
    DependencyClassifier, FileSessionStore, GatewayConfig, HttpTransport, RequestGateway,
    ServiceHealthTracker, SessionManager,
};
use voxloop_types::VoxConfig;

/// Shared engine wiring used by every subcommand.
pub(crate) struct Engine {
    pub config: VoxConfig,
    pub health: Arc<ServiceHealthTracker>,
    pub gateway: Arc<RequestGateway<HttpTransport>>,
    pub sessions: Arc<SessionManager<HttpTransport>>,
}

/// Build the engine from the resolved configuration.
pub(crate) fn build_engine(config_path: Option<&Path>) -> anyhow::Result<Engine> {
    let config = VoxConfig::load(config_path)?;

    let health = Arc::new(ServiceHealthTracker::new(DependencyClassifier::from_rules(
        &config.health.classifier,
    )));
    let gateway = Arc::new(RequestGateway::new(
        HttpTransport::new(),
        GatewayConfig::from_backend(&config.backend),
        Arc::clone(&health),
    ));
    let sessions = Arc::new(SessionManager::new(
        Arc::clone(&gateway),
        Box::new(FileSessionStore::default_location()),
        config.backend.base_url.clone(),
    ));

    Ok(Engine {
        config,
        health,
        gateway,
        sessions,
    })
}
