//! Shared types for the voxloop voice-chat client.
//!
//! This crate holds everything serializable that the engine and the CLI
//! both depend on:
//!
//! - [`wire`] -- the backend HTTP contract (turn, history, health, TTS)
//! - [`session`] -- conversation turn records cached client-side
//! - [`health`] -- dependency and status enums for health tracking
//! - [`config`] -- the layered TOML configuration schema
//!
//! It is a leaf crate with no dependency on the engine, so alternate
//! front ends can speak the same contract.

pub mod config;
pub mod health;
pub mod session;
pub mod wire;

pub use config::{ConfigError, VoxConfig};
pub use health::{Dependency, DependencyStatus, SystemStatus};
pub use session::{TurnRecord, TurnRole};
pub use wire::{
    HealthReport, HistoryResponse, ServiceReport, SessionInfo, TtsRequest, TtsResponse,
    TurnResponse, WireMessage,
};
