//! Runtime configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default limit on nested change propagation.
pub const DEFAULT_MAX_UPDATE_DEPTH: usize = 100;

/// Knobs for the reactive runtime and the controller adapter.
///
/// Every field has a default, so a partial JSON document is accepted:
///
/// ```rust
/// use lattice_controllers::ReactivityConfig;
///
/// let config = ReactivityConfig::from_json(r#"{ "max_update_depth": 16 }"#).unwrap();
/// assert_eq!(config.max_update_depth, 16);
/// assert!(config.reflect_values);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactivityConfig {
    /// Maximum nesting of synchronous propagations before a write cycle is
    /// reported.
    pub max_update_depth: usize,

    /// Whether `set_value` runs the host's original setter after the store
    /// write.
    pub reflect_values: bool,
}

impl ReactivityConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }
}

impl Default for ReactivityConfig {
    fn default() -> Self {
        Self {
            max_update_depth: DEFAULT_MAX_UPDATE_DEPTH,
            reflect_values: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = ReactivityConfig::from_json("{}").unwrap();
        assert_eq!(config, ReactivityConfig::default());
    }

    #[test]
    fn fields_override_defaults() {
        let config =
            ReactivityConfig::from_json(r#"{ "max_update_depth": 3, "reflect_values": false }"#)
                .unwrap();
        assert_eq!(config.max_update_depth, 3);
        assert!(!config.reflect_values);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(ReactivityConfig::from_json("[1, 2").is_err());
    }
}
