use serde::{Deserialize, Serialize};

use crate::store::AddOptions;

/// OS and filesystem bookkeeping artifacts that are never uploaded
pub const DEFAULT_DENYLIST: &[&str] = &[
    "Thumbs.db",
    ".DS_Store",
    ".Trashes",
    ".fseventsd",
    ".Spotlight-V100",
    "$Recycle.Bin",
];

/// Default bound on concurrent store requests issued by a single traversal
pub const DEFAULT_MAX_IN_FLIGHT: usize = 16;

/// Tunables shared by the graph components
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// How many list/stat requests a traversal keeps in flight at once
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// File names skipped when importing from the filesystem
    #[serde(default = "default_denylist")]
    pub denylist: Vec<String>,
}

fn default_max_in_flight() -> usize {
    DEFAULT_MAX_IN_FLIGHT
}

fn default_denylist() -> Vec<String> {
    DEFAULT_DENYLIST.iter().map(|name| name.to_string()).collect()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
            denylist: default_denylist(),
        }
    }
}

impl SyncConfig {
    /// Fan-out bound, never zero
    pub fn fan_out(&self) -> usize {
        self.max_in_flight.max(1)
    }

    /// Options for a recursive filesystem import honoring the denylist
    pub fn add_options(&self) -> AddOptions {
        AddOptions {
            recursive: true,
            denylist: self.denylist.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config: SyncConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SyncConfig::default());
        assert!(config.denylist.iter().any(|name| name == ".DS_Store"));
    }

    #[test]
    fn test_fan_out_never_zero() {
        let config = SyncConfig {
            max_in_flight: 0,
            ..Default::default()
        };
        assert_eq!(config.fan_out(), 1);
    }
}
