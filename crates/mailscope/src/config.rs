//! Filter configuration.

use serde::Deserialize;

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration blob was not valid JSON for [`FilterConfig`].
    #[error("invalid filter configuration: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Configuration shared by every filter instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    /// Whether to maintain individual counters for each SMTP verb and
    /// reply code, trading memory and CPU for granularity.
    pub detailed_stats: bool,
}

impl TryFrom<&[u8]> for FilterConfig {
    type Error = ConfigError;

    /// Parses filter configuration from the JSON blob the host provides.
    /// An empty blob yields the defaults.
    fn try_from(raw: &[u8]) -> Result<Self, Self::Error> {
        if raw.is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_slice(raw)?)
    }
}
