//! Engine configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Options for an [`AccessControl`](crate::AccessControl) instance.
///
/// Loaded from JSON; missing fields take their defaults.
///
/// ```rust
/// use oxide_acl::AclConfig;
///
/// let config = AclConfig::from_json(r#"{ "superuser_bypass": true }"#).unwrap();
/// assert!(config.superuser_bypass);
/// assert!(config.audit_log);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AclConfig {
    /// Principals flagged as superuser (directly or through a role) are
    /// allowed everything, DENY included. Off by default.
    pub superuser_bypass: bool,
    /// Send audit events to `tracing` when no other sink is installed.
    pub audit_log: bool,
}

impl Default for AclConfig {
    fn default() -> Self {
        Self {
            superuser_bypass: false,
            audit_log: true,
        }
    }
}

impl AclConfig {
    /// Parses a configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }
}
