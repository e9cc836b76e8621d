use bevy::reflect::{Reflect, std_traits::ReflectDefault};
use serde::{Deserialize, Serialize};

use crate::errors::GraphLoaderError;

/// Per-instance runtime switches.
#[derive(Reflect, Clone, Debug, Serialize, Deserialize, PartialEq)]
#[reflect(Default)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Keep a copy of every task's pose for debugging.
    pub record_poses: bool,
    /// Log a warning when a node's data slot has no resource bound.
    pub warn_on_missing_resources: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            record_poses: false,
            warn_on_missing_resources: true,
        }
    }
}

impl RuntimeConfig {
    pub fn from_ron(source: &str) -> Result<Self, GraphLoaderError> {
        Ok(ron::de::from_str(source)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = RuntimeConfig::from_ron("(record_poses: true)").unwrap();
        assert!(config.record_poses);
        assert!(config.warn_on_missing_resources);
    }
}
