//! Dependency and status enums for service-health tracking.
//!
//! The backend is a composite of three opaque services (speech-to-text,
//! language model, speech synthesis) reached over one network path. The
//! client tracks each of the four as a [`Dependency`] and aggregates
//! their [`DependencyStatus`] into a single [`SystemStatus`].

use serde::{Deserialize, Serialize};

/// A tracked backend dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dependency {
    /// Speech-to-text service.
    Transcription,
    /// Language-model service.
    Language,
    /// Speech-synthesis service.
    Synthesis,
    /// The network path to the backend itself.
    Network,
}

impl Dependency {
    /// All tracked dependencies, in display order.
    pub const ALL: [Dependency; 4] = [
        Dependency::Transcription,
        Dependency::Language,
        Dependency::Synthesis,
        Dependency::Network,
    ];
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transcription => write!(f, "transcription"),
            Self::Language => write!(f, "language"),
            Self::Synthesis => write!(f, "synthesis"),
            Self::Network => write!(f, "network"),
        }
    }
}

/// Health state of a single dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyStatus {
    /// No signal observed yet.
    Unknown,
    /// Last signal was a success.
    Healthy,
    /// Backend reported a degraded state for this service.
    Degraded,
    /// Last signal was a failure.
    Unreachable,
}

impl std::fmt::Display for DependencyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// Aggregate system status derived from all dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemStatus {
    /// Every dependency is healthy.
    Healthy,
    /// At least one dependency is not healthy.
    Degraded,
    /// More than half of the dependencies are unreachable.
    Unreachable,
}

impl std::fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unreachable => write!(f, "unreachable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_display() {
        assert_eq!(Dependency::Transcription.to_string(), "transcription");
        assert_eq!(Dependency::Language.to_string(), "language");
        assert_eq!(Dependency::Synthesis.to_string(), "synthesis");
        assert_eq!(Dependency::Network.to_string(), "network");
    }

    #[test]
    fn dependency_serde_roundtrip() {
        for dep in Dependency::ALL {
            let json = serde_json::to_string(&dep).unwrap();
            let restored: Dependency = serde_json::from_str(&json).unwrap();
            assert_eq!(restored, dep);
        }
    }

    #[test]
    fn dependency_json_values() {
        assert_eq!(
            serde_json::to_string(&Dependency::Transcription).unwrap(),
            "\"transcription\""
        );
        assert_eq!(
            serde_json::to_string(&Dependency::Network).unwrap(),
            "\"network\""
        );
    }

    #[test]
    fn status_display_matches_serde() {
        let statuses = [
            DependencyStatus::Unknown,
            DependencyStatus::Healthy,
            DependencyStatus::Degraded,
            DependencyStatus::Unreachable,
        ];
        for status in statuses {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
    }

    #[test]
    fn system_status_serde_roundtrip() {
        for status in [
            SystemStatus::Healthy,
            SystemStatus::Degraded,
            SystemStatus::Unreachable,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            let restored: SystemStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(restored, status);
        }
    }
}
