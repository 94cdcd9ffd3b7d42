//! Configuration schema.
//!
//! [`VoxConfig`] is loaded from a TOML file (default
//! `~/.voxloop/config.toml`, overridable via the `VOXLOOP_CONFIG`
//! environment variable). Every field has a default so an absent file or
//! empty section yields a working configuration against a local backend.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::health::Dependency;

/// Errors from loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("config read failed: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for this schema.
    #[error("config parse failed: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoxConfig {
    /// Backend endpoint and request behavior.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Recording and generation parameters.
    #[serde(default)]
    pub audio: AudioConfig,

    /// Health probing and dependency classification.
    #[serde(default)]
    pub health: HealthConfig,

    /// Continuous-conversation behavior.
    #[serde(default)]
    pub conversation: ConversationConfig,
}

impl VoxConfig {
    /// Load configuration from `path`, or from the discovered default
    /// location when `path` is `None`. A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::discover_path(),
        };
        match resolved {
            Some(p) if p.exists() => {
                let raw = std::fs::read_to_string(&p)?;
                Ok(toml::from_str(&raw)?)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Locate the config file: `VOXLOOP_CONFIG` env var, then
    /// `~/.voxloop/config.toml`.
    pub fn discover_path() -> Option<PathBuf> {
        if let Ok(p) = std::env::var("VOXLOOP_CONFIG") {
            return Some(PathBuf::from(p));
        }
        dirs::home_dir().map(|home| home.join(".voxloop").join("config.toml"))
    }

    /// Directory for persisted client state (session reference, saved
    /// audio).
    pub fn state_dir() -> PathBuf {
        dirs::home_dir()
            .map(|home| home.join(".voxloop"))
            .unwrap_or_else(|| PathBuf::from(".voxloop"))
    }
}

/// Backend endpoint and request behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the voice-agent backend.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-attempt request timeout, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum attempts per request (first try included).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".into()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_attempts() -> u32 {
    3
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Recording and generation parameters sent with each turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Voice selector passed to speech synthesis.
    #[serde(default = "default_voice")]
    pub voice: String,

    /// Maximum tokens in the assistant reply.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature for the assistant reply.
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Clips shorter than this are rejected without contacting the
    /// backend, in milliseconds.
    #[serde(default = "default_min_clip_ms")]
    pub min_clip_ms: u64,
}

fn default_voice() -> String {
    "en-US-natalie".into()
}
fn default_max_tokens() -> u32 {
    800
}
fn default_temperature() -> f64 {
    0.7
}
fn default_min_clip_ms() -> u64 {
    500
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            voice: default_voice(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            min_clip_ms: default_min_clip_ms(),
        }
    }
}

/// Health probing and dependency classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Interval between out-of-band `/health` probes, in seconds.
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,

    /// Substring rules mapping backend service names to dependencies.
    /// First match wins; unmatched names count against the network.
    #[serde(default = "default_classifier_rules")]
    pub classifier: Vec<ClassifierRule>,
}

fn default_probe_interval_secs() -> u64 {
    30
}

/// The original heuristic, now data: names containing "stt" or
/// "transcription" are the transcription service, "llm"/"ai" the language
/// model, "tts"/"audio" synthesis.
fn default_classifier_rules() -> Vec<ClassifierRule> {
    [
        ("stt", Dependency::Transcription),
        ("transcription", Dependency::Transcription),
        ("llm", Dependency::Language),
        ("ai", Dependency::Language),
        ("tts", Dependency::Synthesis),
        ("audio", Dependency::Synthesis),
    ]
    .into_iter()
    .map(|(contains, dependency)| ClassifierRule {
        contains: contains.into(),
        dependency,
    })
    .collect()
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_interval_secs: default_probe_interval_secs(),
            classifier: default_classifier_rules(),
        }
    }
}

/// One substring -> dependency classification rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierRule {
    /// Case-insensitive substring to look for in the service name.
    pub contains: String,
    /// Dependency the name maps to.
    pub dependency: Dependency,
}

/// Continuous-conversation behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Re-enter recording automatically after a successful turn's
    /// playback completes.
    #[serde(default)]
    pub auto_continue: bool,
}
