#[cfg(feature = "cli")]
pub mod cli;

use crate::utils::error::{BridgeError, Result};
use crate::utils::validation::{
    validate_broker_url, validate_non_empty_string, validate_path, validate_positive_number,
    Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub broker: BrokerConfig,
    pub routing: RoutingConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    pub url: String,
    pub cert_path: String,
    pub key_path: String,
    pub consumer: String,
    pub password: String,
    pub subject: String,
}

/// Subjects that select the new-request, update-request and update-sample
/// paths. Compared by exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub new_request_filter: String,
    pub update_request_filter: String,
    pub update_sample_filter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("url", &self.url)
            .field("cert_path", &self.cert_path)
            .field("key_path", &self.key_path)
            .field("consumer", &self.consumer)
            .field("password", &"***")
            .field("subject", &self.subject)
            .finish()
    }
}

impl BridgeConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(BridgeError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| BridgeError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${SMILE_PASSWORD})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| BridgeError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }
}

impl Validate for BrokerConfig {
    fn validate(&self) -> Result<()> {
        validate_broker_url("broker.url", &self.url)?;
        validate_path("broker.cert_path", &self.cert_path)?;
        validate_path("broker.key_path", &self.key_path)?;
        validate_non_empty_string("broker.consumer", &self.consumer)?;
        validate_non_empty_string("broker.subject", &self.subject)?;
        Ok(())
    }
}

impl Validate for RoutingConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("routing.new_request_filter", &self.new_request_filter)?;
        validate_non_empty_string("routing.update_request_filter", &self.update_request_filter)?;
        validate_non_empty_string("routing.update_sample_filter", &self.update_sample_filter)?;
        Ok(())
    }
}

impl Validate for DispatchConfig {
    fn validate(&self) -> Result<()> {
        validate_positive_number("dispatch.channel_capacity", self.channel_capacity, 1)
    }
}

impl Validate for BridgeConfig {
    fn validate(&self) -> Result<()> {
        self.broker.validate()?;
        self.routing.validate()?;
        self.dispatch.validate()
    }
}
