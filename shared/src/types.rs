//! Core shared types and identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

static COMPONENT_ID: OnceLock<ComponentId> = OnceLock::new();

/// Identity of the component emitting log output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentId {
    /// The desktop-side supervisor (singleton per application instance)
    Supervisor,
    /// The managed backend service, as seen through its forwarded output
    Backend,
}

impl ComponentId {
    /// Initialize the global component identity for the supervisor process
    pub fn init_supervisor() -> &'static ComponentId {
        COMPONENT_ID.get_or_init(|| ComponentId::Supervisor)
    }

    /// Get the global component identity, defaulting to the supervisor
    pub fn current() -> &'static ComponentId {
        COMPONENT_ID.get_or_init(|| ComponentId::Supervisor)
    }

    /// Crate-level target names used to build the log filter
    pub fn log_targets(&self) -> &'static [&'static str] {
        match self {
            ComponentId::Supervisor => &["supervisor", "geo_ads_desktop", "shared", "event_log"],
            ComponentId::Backend => &["backend"],
        }
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentId::Supervisor => write!(f, "supervisor"),
            ComponentId::Backend => write!(f, "backend"),
        }
    }
}

/// Which output stream of a managed process a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamTag {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamTag::Stdout => write!(f, "stdout"),
            StreamTag::Stderr => write!(f, "stderr"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_display() {
        assert_eq!(ComponentId::Supervisor.to_string(), "supervisor");
        assert_eq!(ComponentId::Backend.to_string(), "backend");
        assert_eq!(StreamTag::Stderr.to_string(), "stderr");
    }

    #[test]
    fn test_current_defaults_to_supervisor() {
        assert_eq!(*ComponentId::current(), ComponentId::Supervisor);
        assert_eq!(*ComponentId::init_supervisor(), ComponentId::Supervisor);
    }

    #[test]
    fn test_stream_tag_serializes_lowercase() {
        let json = serde_json::to_string(&StreamTag::Stdout).unwrap();
        assert_eq!(json, "\"stdout\"");
    }
}
