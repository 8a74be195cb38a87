use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::ach::RetryPolicy;
use crate::error::ErrorKind;
use crate::model::AccountType;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config yaml {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "CONFIG_READ",
            ConfigError::Parse { .. } => "CONFIG_PARSE",
            ConfigError::Invalid(_) => "CONFIG_INVALID",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct PaygateConfig {
    pub logging: LoggingConfig,
    /// PostgreSQL connection URL; in-memory repositories when absent
    pub postgres_url: Option<String>,
    pub ach: AchConfig,
    pub odfi: OdfiConfig,
    pub micro_deposits: MicroDepositConfig,
    pub transfers: TransferConfig,
    pub merging: MergingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub dir: String,
    pub file: String,
    pub json: bool,
    /// hourly, daily or never
    pub rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: "./logs".to_string(),
            file: "paygate.log".to_string(),
            json: false,
            rotation: "daily".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AchConfig {
    pub endpoint: String,
    pub request_timeout_ms: u64,
    /// Total create attempts, including the first
    pub create_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for AchConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            request_timeout_ms: 30_000,
            create_attempts: 3,
            retry_backoff_ms: 250,
        }
    }
}

impl AchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.create_attempts.max(1),
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

/// The institution's own account, source of micro-deposit credits.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct OdfiConfig {
    pub routing_number: String,
    pub account_number: String,
    pub account_type: AccountType,
    pub bank_name: String,
    pub holder: String,
    /// Company identification in micro-deposit batch headers
    pub identification: String,
    /// Company entry description on micro-deposit batches
    pub micro_deposit_description: String,
}

impl Default for OdfiConfig {
    fn default() -> Self {
        Self {
            routing_number: "121042882".to_string(),
            account_number: "123".to_string(),
            account_type: AccountType::Checking,
            bank_name: "Paygate ODFI".to_string(),
            holder: "Paygate".to_string(),
            identification: "001".to_string(),
            micro_deposit_description: "validation".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MicroDepositConfig {
    pub max_attempts: usize,
}

impl Default for MicroDepositConfig {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

/// Rolling soft limits, as decimal strings in `symbol`.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TransferConfig {
    pub symbol: String,
    pub current_day_limit: Option<String>,
    pub seven_day_limit: Option<String>,
    pub thirty_day_limit: Option<String>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            symbol: "USD".to_string(),
            current_day_limit: None,
            seven_day_limit: Some("10000.00".to_string()),
            thirty_day_limit: Some("25000.00".to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MergingConfig {
    pub batch_size: usize,
    pub poll_interval_ms: u64,
    /// Merged files are written here
    pub output_dir: String,
}

impl Default for MergingConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            poll_interval_ms: 60_000,
            output_dir: "./merged".to_string(),
        }
    }
}

impl MergingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl PaygateConfig {
    /// Load `config/{env}.yaml`.
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        Self::from_file(format!("config/{}.yaml", env))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: PaygateConfig =
            serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
                path: "<inline>".to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.merging.batch_size == 0 {
            return Err(ConfigError::Invalid("merging.batch_size must be > 0".to_string()));
        }
        if self.merging.output_dir.is_empty() {
            return Err(ConfigError::Invalid("merging.output_dir must be set".to_string()));
        }
        if self.micro_deposits.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "micro_deposits.max_attempts must be > 0".to_string(),
            ));
        }
        crate::model::routing::validate_routing_number(&self.odfi.routing_number)
            .map_err(|e| ConfigError::Invalid(format!("odfi.routing_number: {}", e)))?;
        Ok(())
    }
}
