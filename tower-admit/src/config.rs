//! YAML configuration for quota tiers and view de-duplication.
//!
//! ```yaml
//! limits:
//!   get_document:
//!     - { amount: 3, period: 1 }
//!     - { amount: 60, period: 60 }
//!   post_document:
//!     - { amount: 1, period: 2 }
//! views:
//!   cool_down: 1800
//!   sweep_interval: 600
//! ```
//!
//! All durations are whole seconds.

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use admit_limit::QuotaTier;
use serde::Deserialize;

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Unable to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML or does not match the expected layout.
    #[error("Invalid configuration syntax: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The file parsed but describes something unusable.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

const fn default_cool_down() -> u64 {
    admit_limit::DEFAULT_COOL_DOWN.as_secs()
}

/// One quota tier: `amount` events per `period` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierConfig {
    pub amount: u32,
    pub period: u64,
}

impl From<TierConfig> for QuotaTier {
    fn from(tier: TierConfig) -> Self {
        QuotaTier::new(tier.amount, Duration::from_secs(tier.period))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewsConfig {
    /// Seconds before a repeat view from the same client counts again.
    #[serde(default = "default_cool_down")]
    pub cool_down: u64,
    /// Seconds between sweeps of idle admission state. Absent means never sweep.
    #[serde(default)]
    pub sweep_interval: Option<u64>,
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            cool_down: default_cool_down(),
            sweep_interval: None,
        }
    }
}

impl ViewsConfig {
    pub fn cool_down(&self) -> Duration {
        Duration::from_secs(self.cool_down)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        self.sweep_interval.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdmissionConfig {
    /// Protected operation name to its tiers. An empty list means unlimited.
    #[serde(default)]
    pub limits: BTreeMap<String, Vec<TierConfig>>,
    #[serde(default)]
    pub views: ViewsConfig,
}

impl AdmissionConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.views.sweep_interval == Some(0) {
            return Err(ConfigError::Invalid(
                "views.sweep_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Tiers configured for `operation`, in file order.
    pub fn tiers(&self, operation: &str) -> Result<Vec<QuotaTier>, ConfigError> {
        self.limits
            .get(operation)
            .map(|tiers| tiers.iter().copied().map(QuotaTier::from).collect())
            .ok_or_else(|| {
                ConfigError::Invalid(format!("no limits configured for operation `{operation}`"))
            })
    }
}
