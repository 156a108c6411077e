use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backoff::{Backoff, ConstantBackoff, ExponentialBackoff};
use crate::jitter::{EqualJitter, FullJitter, Jitter, NoJitter};
use crate::retry::{BackoffRetry, RetryPolicy};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read retry configuration at '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse retry configuration")]
    Parse(#[from] toml::de::Error),

    #[error("max delay of {max_delay_ms}ms is below the base delay of {delay_ms}ms")]
    MaxDelayBelowBase { delay_ms: u64, max_delay_ms: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackoffKind {
    Constant,
    #[default]
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JitterKind {
    #[default]
    None,
    Full,
    Equal,
}

/// Retry policy as written in a TOML file.
///
/// ```toml
/// attempts = 5
/// delay-ms = 50
/// max-delay-ms = 2000
/// backoff = "exponential"
/// jitter = "full"
/// return-all-errors = false
/// ```
///
/// Every key is optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct RetryConfig {
    pub attempts: u32,
    pub delay_ms: u64,
    pub max_delay_ms: Option<u64>,
    pub backoff: BackoffKind,
    pub jitter: JitterKind,
    pub return_all_errors: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay_ms: 100,
            max_delay_ms: None,
            backoff: BackoffKind::default(),
            jitter: JitterKind::default(),
            return_all_errors: false,
        }
    }
}

impl RetryConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML, unknown keys or
    /// unknown strategy names, and [`ConfigError::MaxDelayBelowBase`] for an
    /// inconsistent delay range.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, otherwise as
    /// [`from_toml`](Self::from_toml).
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::MaxDelayBelowBase`] when a max delay is set
    /// below the base delay.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.max_delay_ms {
            Some(max_delay_ms) if max_delay_ms < self.delay_ms => {
                Err(ConfigError::MaxDelayBelowBase {
                    delay_ms: self.delay_ms,
                    max_delay_ms,
                })
            }
            _ => Ok(()),
        }
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    #[must_use]
    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay_ms.map(Duration::from_millis)
    }

    /// Build the configured policy.
    ///
    /// # Errors
    ///
    /// Returns the [`validate`](Self::validate) error, if any.
    pub fn into_policy(self) -> Result<Box<dyn RetryPolicy>, ConfigError> {
        self.validate()?;

        let backoff: Box<dyn Backoff> = match self.backoff {
            BackoffKind::Constant => Box::new(ConstantBackoff),
            BackoffKind::Exponential => Box::new(ExponentialBackoff),
        };
        let jitter: Box<dyn Jitter> = match self.jitter {
            JitterKind::None => Box::new(NoJitter),
            JitterKind::Full => Box::new(FullJitter),
            JitterKind::Equal => Box::new(EqualJitter),
        };

        let mut policy = BackoffRetry::new(self.attempts, self.delay(), backoff, jitter);
        if let Some(max_delay) = self.max_delay() {
            policy = policy.with_max_delay(max_delay);
        }
        if self.return_all_errors {
            policy = policy.with_all_errors();
        }
        Ok(Box::new(policy))
    }
}
