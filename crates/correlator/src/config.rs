//! Correlator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ConnectionError;

/// Default time to wait for a completion message after a connect request is
/// accepted.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 15_000;

/// Default prefix of generated owner URIs.
pub const DEFAULT_OWNER_URI_PREFIX: &str = "untitled:createdb";

/// Settings shared by every correlator created from one context.
///
/// All fields are optional when deserialising; missing fields take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorrelatorConfig {
    /// Milliseconds to wait for a completion message before giving up.
    pub connect_timeout_ms: u64,

    /// Prefix of generated owner URIs; a per-context counter is appended.
    pub owner_uri_prefix: String,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            owner_uri_prefix: DEFAULT_OWNER_URI_PREFIX.to_string(),
        }
    }
}

impl CorrelatorConfig {
    /// The connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Checks the configuration for values the correlator cannot work with.
    pub fn validate(&self) -> Result<(), ConnectionError> {
        if self.connect_timeout_ms == 0 {
            return Err(ConnectionError::Configuration {
                message: "connect_timeout_ms must be greater than zero".to_string(),
            });
        }
        if self.owner_uri_prefix.chars().any(char::is_whitespace) {
            return Err(ConnectionError::Configuration {
                message: format!(
                    "owner_uri_prefix must not contain whitespace: {:?}",
                    self.owner_uri_prefix
                ),
            });
        }
        Ok(())
    }
}
