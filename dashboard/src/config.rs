use anyhow::{anyhow, Result};
use chaos_common::{
    config::{CHAIN_ID, DASHBOARD_POLL_INTERVAL_SECS, PRICE_POLL_INTERVAL_SECS},
    logger::LogLevel,
    security::validate_address,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::{
    contract::ReceiptWait,
    market_api::MarketApiConfig,
    poller::PollSchedule,
    rpc_client::RpcClientConfig,
    widgets::DEFAULT_CHECKOUT_ID,
};

/// Default values for configuration
pub mod defaults {
    use super::*;

    pub const LOG_LEVEL: LogLevel = LogLevel::Info;
    pub const FILENAME_LOG: &str = "chaos-dashboard.log";
    pub const LOGS_PATH: &str = "logs/";
    pub const STORAGE_PATH: &str = "storage/";
    pub const RPC_ADDRESS: &str = "https://api.avax.network/ext/bc/C/rpc";

    // Client defaults
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;
    pub const CONNECTION_TIMEOUT_SECS: u64 = 10;
    pub const RECEIPT_TIMEOUT_SECS: u64 = 120;

    // Validation limits
    pub const MIN_TIMEOUT_SECS: u64 = 1;
    pub const MAX_TIMEOUT_SECS: u64 = 300;
    pub const MIN_POLL_SECS: u64 = 5;
    pub const MAX_POLL_SECS: u64 = 3600;
}

/// Dashboard configuration, loaded from the command line or a JSON file
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidatedConfig {
    /// Log level configuration
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,

    /// File logging settings
    #[serde(default)]
    pub disable_file_logging: bool,

    #[serde(default)]
    pub disable_log_color: bool,

    #[serde(default = "default_filename_log")]
    pub filename_log: String,

    #[serde(default = "default_logs_path")]
    pub logs_path: String,

    /// Directory holding the persisted post feed
    #[serde(default = "default_storage_path")]
    pub storage_path: String,

    /// Avalanche C-Chain JSON-RPC endpoint
    #[serde(default = "default_rpc_address")]
    pub rpc_address: String,

    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    /// Token contract and treasury (sole administrator)
    #[serde(default)]
    pub token_address: Option<String>,

    #[serde(default)]
    pub treasury_address: Option<String>,

    /// Connected account, if any
    #[serde(default)]
    pub account: Option<String>,

    /// Widgets
    #[serde(default)]
    pub thirdweb_client_id: Option<String>,

    #[serde(default = "default_checkout_id")]
    pub checkout_id: String,

    #[serde(default)]
    pub rss2json_api_key: Option<String>,

    /// Timeouts and poll intervals
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,

    #[serde(default = "default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,

    #[serde(default = "default_price_poll_secs")]
    pub price_poll_secs: u64,

    #[serde(default = "default_dashboard_poll_secs")]
    pub dashboard_poll_secs: u64,

    /// Auto-fix configuration issues
    #[serde(default)]
    pub auto_fix_config: bool,

    /// Validation settings
    #[serde(default)]
    pub strict_validation: bool,
}

// Default functions for serde
fn default_log_level() -> LogLevel {
    defaults::LOG_LEVEL
}
fn default_filename_log() -> String {
    defaults::FILENAME_LOG.to_string()
}
fn default_logs_path() -> String {
    defaults::LOGS_PATH.to_string()
}
fn default_storage_path() -> String {
    defaults::STORAGE_PATH.to_string()
}
fn default_rpc_address() -> String {
    defaults::RPC_ADDRESS.to_string()
}
fn default_chain_id() -> u64 {
    CHAIN_ID
}
fn default_checkout_id() -> String {
    DEFAULT_CHECKOUT_ID.to_string()
}
fn default_request_timeout_secs() -> u64 {
    defaults::REQUEST_TIMEOUT_SECS
}
fn default_connection_timeout_secs() -> u64 {
    defaults::CONNECTION_TIMEOUT_SECS
}
fn default_receipt_timeout_secs() -> u64 {
    defaults::RECEIPT_TIMEOUT_SECS
}
fn default_price_poll_secs() -> u64 {
    PRICE_POLL_INTERVAL_SECS
}
fn default_dashboard_poll_secs() -> u64 {
    DASHBOARD_POLL_INTERVAL_SECS
}

impl Default for ValidatedConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            disable_file_logging: false,
            disable_log_color: false,
            filename_log: default_filename_log(),
            logs_path: default_logs_path(),
            storage_path: default_storage_path(),
            rpc_address: default_rpc_address(),
            chain_id: default_chain_id(),
            token_address: None,
            treasury_address: None,
            account: None,
            thirdweb_client_id: None,
            checkout_id: default_checkout_id(),
            rss2json_api_key: None,
            request_timeout_secs: default_request_timeout_secs(),
            connection_timeout_secs: default_connection_timeout_secs(),
            receipt_timeout_secs: default_receipt_timeout_secs(),
            price_poll_secs: default_price_poll_secs(),
            dashboard_poll_secs: default_dashboard_poll_secs(),
            auto_fix_config: true,
            strict_validation: false,
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigValidationError {
    #[error("Invalid RPC address: '{0}' - must be a valid HTTP/HTTPS URL")]
    InvalidRpcAddress(String),
    #[error("Invalid {field}: '{value}' - must be a 0x prefixed 40 hex digits address")]
    InvalidAddress { field: String, value: String },
    #[error("Missing {0} - set it in the config file, on the command line or in the environment")]
    MissingAddress(String),
    #[error("Invalid chain id: {0}")]
    InvalidChainId(u64),
    #[error("Invalid {field}: {value} seconds - must be between {min} and {max} seconds")]
    InvalidDuration {
        field: String,
        value: u64,
        min: u64,
        max: u64,
    },
}

/// Configuration validation result
pub type ValidationResult<T> = std::result::Result<T, ConfigValidationError>;

/// Configuration validator
pub struct ConfigValidator {
    strict_mode: bool,
    auto_fix: bool,
}

impl ConfigValidator {
    pub fn new(strict_mode: bool, auto_fix: bool) -> Self {
        Self {
            strict_mode,
            auto_fix,
        }
    }

    fn can_fix(&self) -> bool {
        self.auto_fix && !self.strict_mode
    }

    /// Validate the entire configuration.
    ///
    /// Returns the list of applied fixes and warnings. Addresses are never
    /// auto-fixed: there is no sensible default for them.
    pub fn validate(&self, config: &mut ValidatedConfig) -> Result<Vec<String>> {
        let mut warnings = Vec::new();
        let mut fixed_issues = Vec::new();

        info!("Validating configuration...");

        if let Err(e) = self.validate_rpc_address(&config.rpc_address) {
            if self.can_fix() {
                if log::log_enabled!(log::Level::Warn) {
                    warn!("Auto-fixing RPC address: {}", e);
                }
                config.rpc_address = defaults::RPC_ADDRESS.to_string();
                fixed_issues.push(format!("Fixed RPC address to default: {}", config.rpc_address));
            } else {
                return Err(anyhow!("Configuration validation failed: {}", e));
            }
        }

        if config.chain_id == 0 {
            let e = ConfigValidationError::InvalidChainId(config.chain_id);
            if self.can_fix() {
                config.chain_id = CHAIN_ID;
                fixed_issues.push(format!("Fixed chain id to {}", CHAIN_ID));
            } else {
                return Err(anyhow!("Configuration validation failed: {}", e));
            }
        }

        for (field, value) in [
            ("token_address", &config.token_address),
            ("treasury_address", &config.treasury_address),
            ("account", &config.account),
        ] {
            match value {
                Some(value) => self
                    .validate_address(field, value)
                    .map_err(|e| anyhow!("Configuration validation failed: {}", e))?,
                None if field != "account" => {
                    let e = ConfigValidationError::MissingAddress(field.to_string());
                    if self.strict_mode {
                        return Err(anyhow!("Configuration validation failed: {}", e));
                    }
                    warnings.push(format!("Warning: {}", e));
                }
                None => {}
            }
        }

        let timeouts = [
            (
                "request_timeout",
                &mut config.request_timeout_secs,
                defaults::REQUEST_TIMEOUT_SECS,
                defaults::MIN_TIMEOUT_SECS,
                defaults::MAX_TIMEOUT_SECS,
            ),
            (
                "connection_timeout",
                &mut config.connection_timeout_secs,
                defaults::CONNECTION_TIMEOUT_SECS,
                defaults::MIN_TIMEOUT_SECS,
                defaults::MAX_TIMEOUT_SECS,
            ),
            (
                "receipt_timeout",
                &mut config.receipt_timeout_secs,
                defaults::RECEIPT_TIMEOUT_SECS,
                defaults::MIN_TIMEOUT_SECS,
                defaults::MAX_TIMEOUT_SECS,
            ),
            (
                "price_poll_interval",
                &mut config.price_poll_secs,
                PRICE_POLL_INTERVAL_SECS,
                defaults::MIN_POLL_SECS,
                defaults::MAX_POLL_SECS,
            ),
            (
                "dashboard_poll_interval",
                &mut config.dashboard_poll_secs,
                DASHBOARD_POLL_INTERVAL_SECS,
                defaults::MIN_POLL_SECS,
                defaults::MAX_POLL_SECS,
            ),
        ];
        for (field, value, default, min, max) in timeouts {
            if let Err(e) = self.validate_duration(field, *value, min, max) {
                if self.can_fix() {
                    if log::log_enabled!(log::Level::Warn) {
                        warn!("Auto-fixing {}: {}", field, e);
                    }
                    *value = default;
                    fixed_issues.push(format!("Fixed {} to {} seconds", field, default));
                } else {
                    return Err(anyhow!("Configuration validation failed: {}", e));
                }
            }
        }

        if config.thirdweb_client_id.is_none() {
            warnings.push("Warning: no thirdweb client id, the checkout widget is disabled".to_string());
        }

        self.ensure_directory_exists(&config.logs_path, "logs", &mut fixed_issues)?;
        self.ensure_directory_exists(&config.storage_path, "storage", &mut fixed_issues)?;

        let mut all_messages = fixed_issues;
        all_messages.extend(warnings);

        info!("Configuration validation completed successfully");
        Ok(all_messages)
    }

    /// Log the messages returned by `validate`.
    ///
    /// Validation runs before the logger is installed, so callers report
    /// the messages once logging is up.
    pub fn report(messages: &[String]) {
        for message in messages {
            if message.starts_with("Warning:") {
                warn!("{}", message);
            } else if log::log_enabled!(log::Level::Info) {
                info!("{}", message);
            }
        }
    }

    fn validate_rpc_address(&self, address: &str) -> ValidationResult<()> {
        let url_str = if address.starts_with("http://") || address.starts_with("https://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        };

        Url::parse(&url_str)
            .map_err(|_| ConfigValidationError::InvalidRpcAddress(address.to_string()))?;

        Ok(())
    }

    fn validate_address(&self, field: &str, value: &str) -> ValidationResult<()> {
        if !validate_address(value) {
            return Err(ConfigValidationError::InvalidAddress {
                field: field.to_string(),
                value: value.to_string(),
            });
        }
        Ok(())
    }

    fn validate_duration(&self, field: &str, value: u64, min: u64, max: u64) -> ValidationResult<()> {
        if value < min || value > max {
            return Err(ConfigValidationError::InvalidDuration {
                field: field.to_string(),
                value,
                min,
                max,
            });
        }
        Ok(())
    }

    fn ensure_directory_exists(
        &self,
        path: &str,
        dir_type: &str,
        fixed_issues: &mut Vec<String>,
    ) -> Result<()> {
        let path_buf = PathBuf::from(path);

        if !path_buf.exists() {
            if log::log_enabled!(log::Level::Info) {
                info!("Creating {} directory: {}", dir_type, path);
            }
            std::fs::create_dir_all(&path_buf).map_err(|e| {
                anyhow!("Failed to create {} directory '{}': {}", dir_type, path, e)
            })?;
            fixed_issues.push(format!("Created {} directory: {}", dir_type, path));
        } else if !path_buf.is_dir() {
            return Err(anyhow!("Path '{}' exists but is not a directory", path));
        }

        // Check write permissions
        let test_file = path_buf.join(".write_test");
        match std::fs::write(&test_file, "test") {
            Ok(_) => {
                let _ = std::fs::remove_file(test_file);
            }
            Err(e) => {
                return Err(anyhow!(
                    "Insufficient write permissions for {} directory '{}': {}",
                    dir_type,
                    path,
                    e
                ));
            }
        }

        Ok(())
    }
}

impl ValidatedConfig {
    pub fn to_rpc_client_config(&self) -> RpcClientConfig {
        RpcClientConfig {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connection_timeout: Duration::from_secs(self.connection_timeout_secs),
        }
    }

    pub fn to_market_api_config(&self) -> MarketApiConfig {
        MarketApiConfig {
            rss2json_api_key: self.rss2json_api_key.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connection_timeout: Duration::from_secs(self.connection_timeout_secs),
            ..Default::default()
        }
    }

    pub fn to_receipt_wait(&self) -> ReceiptWait {
        ReceiptWait {
            timeout: Duration::from_secs(self.receipt_timeout_secs),
            ..Default::default()
        }
    }

    pub fn price_schedule(&self) -> PollSchedule {
        PollSchedule::Every(Duration::from_secs(self.price_poll_secs))
    }

    pub fn dashboard_schedule(&self) -> PollSchedule {
        PollSchedule::Every(Duration::from_secs(self.dashboard_poll_secs))
    }

    pub fn token_address(&self) -> Result<&str, ConfigValidationError> {
        self.token_address
            .as_deref()
            .ok_or_else(|| ConfigValidationError::MissingAddress("token_address".to_string()))
    }

    pub fn treasury_address(&self) -> Result<&str, ConfigValidationError> {
        self.treasury_address
            .as_deref()
            .ok_or_else(|| ConfigValidationError::MissingAddress("treasury_address".to_string()))
    }

    /// Validate and load configuration from file, along with the fixes and
    /// warnings produced by the validation
    pub fn from_file<P: AsRef<Path>>(
        path: P,
        strict_mode: bool,
        auto_fix: bool,
    ) -> Result<(Self, Vec<String>)> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            anyhow!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            )
        })?;

        let mut config: ValidatedConfig = serde_json::from_str(&content).map_err(|e| {
            anyhow!(
                "Failed to parse config file '{}': {}",
                path.as_ref().display(),
                e
            )
        })?;

        let validator = ConfigValidator::new(strict_mode, auto_fix);
        let messages = validator.validate(&mut config)?;
        Ok((config, messages))
    }

    /// Save validated configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

        std::fs::write(&path, content).map_err(|e| {
            anyhow!(
                "Failed to write config file '{}': {}",
                path.as_ref().display(),
                e
            )
        })?;

        if log::log_enabled!(log::Level::Info) {
            info!("Configuration saved to: {}", path.as_ref().display());
        }
        Ok(())
    }

    /// Write a configuration file filled with the default values
    pub fn generate_template<P: AsRef<Path>>(path: P) -> Result<()> {
        let mut template = serde_json::to_value(ValidatedConfig::default())?;
        if let Some(object) = template.as_object_mut() {
            object.insert(
                "_info".to_string(),
                serde_json::json!({
                    "description": "Chaos Coin dashboard configuration",
                    "version": "1.0",
                    "sections": {
                        "logging": "Controls log output and file generation",
                        "storage": "Directory of the persisted post feed",
                        "chain": "RPC endpoint, chain id, token and treasury addresses",
                        "widgets": "thirdweb checkout and rss2json keys",
                        "timing": "Request timeouts and poll intervals",
                        "validation": "Configuration validation behavior"
                    }
                }),
            );
        }

        let content = serde_json::to_string_pretty(&template)?;
        std::fs::write(&path, content).map_err(|e| {
            anyhow!(
                "Failed to write template to '{}': {}",
                path.as_ref().display(),
                e
            )
        })?;

        if log::log_enabled!(log::Level::Info) {
            info!(
                "Configuration template generated at: {}",
                path.as_ref().display()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TOKEN: &str = "0x52908400098527886E0F7030069857D2E4169EE7";

    fn config_in(dir: &TempDir) -> ValidatedConfig {
        ValidatedConfig {
            logs_path: dir.path().join("logs").to_string_lossy().into_owned(),
            storage_path: dir.path().join("storage").to_string_lossy().into_owned(),
            token_address: Some(TOKEN.to_string()),
            treasury_address: Some(TOKEN.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config_validates() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        let messages = ConfigValidator::new(true, false).validate(&mut config);
        // strict mode still accepts a missing client id as a warning
        assert!(messages.is_ok());
        assert!(dir.path().join("storage").is_dir());
    }

    #[test]
    fn test_auto_fix_durations() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.price_poll_secs = 0;
        config.request_timeout_secs = 10_000;

        let messages = ConfigValidator::new(false, true).validate(&mut config).unwrap();
        assert_eq!(config.price_poll_secs, PRICE_POLL_INTERVAL_SECS);
        assert_eq!(config.request_timeout_secs, defaults::REQUEST_TIMEOUT_SECS);
        assert!(messages.iter().any(|m| m.contains("price_poll_interval")));

        let mut config = config_in(&dir);
        config.price_poll_secs = 0;
        assert!(ConfigValidator::new(true, true).validate(&mut config).is_err());
    }

    #[test]
    fn test_addresses_never_fixed() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.treasury_address = Some("0x1234".to_string());
        assert!(ConfigValidator::new(false, true).validate(&mut config).is_err());
        assert_eq!(config.treasury_address.as_deref(), Some("0x1234"));

        let mut config = config_in(&dir);
        config.token_address = None;
        let messages = ConfigValidator::new(false, true).validate(&mut config).unwrap();
        assert!(messages
            .iter()
            .any(|m| m.starts_with("Warning: Missing token_address")));
        assert!(ConfigValidator::new(true, false).validate(&mut config).is_err());
        assert!(config.token_address().is_err());
    }

    #[test]
    fn test_template_and_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        ValidatedConfig::generate_template(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: ValidatedConfig = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.rpc_address, defaults::RPC_ADDRESS);
        assert_eq!(parsed.checkout_id, DEFAULT_CHECKOUT_ID);

        let config = config_in(&dir);
        config.save_to_file(&path).unwrap();
        let (loaded, _) = ValidatedConfig::from_file(&path, false, true).unwrap();
        assert_eq!(loaded.token_address.as_deref(), Some(TOKEN));
        assert_eq!(loaded.chain_id, CHAIN_ID);

        let mut config = config_in(&dir);
        config.treasury_address = None;
        config.save_to_file(&path).unwrap();
        let (_, messages) = ValidatedConfig::from_file(&path, false, true).unwrap();
        assert!(messages
            .iter()
            .any(|m| m.starts_with("Warning: Missing treasury_address")));
    }
}
