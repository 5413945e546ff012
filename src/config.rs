use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config yaml {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    /// PostgreSQL connection URL; in-memory store when absent
    #[serde(default)]
    pub postgres_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

/// Ledger endpoints
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LedgerConfig {
    /// Starknet JSON-RPC node; simulated ledger when absent
    pub rpc_url: Option<String>,
    /// Signing relayer that submits calls on behalf of custodial accounts
    pub relayer_url: Option<String>,
    pub explorer_base_url: String,
    /// Fee token contract used for NATIVE transfers
    pub native_token_address: String,
    pub request_timeout_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: None,
            relayer_url: None,
            explorer_base_url: "https://sepolia.voyager.online".to_string(),
            native_token_address:
                "0x049d36570d4e46f48e99674bd3fcc84644ddd6b96f7c741b1562b82f9e004dc7".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

impl LedgerConfig {
    pub fn explorer_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_base_url.trim_end_matches('/'), tx_hash)
    }
}

/// Reconciliation tuning
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TrackerConfig {
    pub poll_interval_secs: u64,
    /// Ticks a hash may stay non-terminal before being forced REJECTED
    pub max_retries: u32,
    /// Consecutive not-found reads before being forced REJECTED
    pub lookup_failure_threshold: u32,
    /// Delay of the one-shot check after submission (0 disables it)
    pub initial_check_delay_ms: u64,
    pub worker_concurrency: usize,
    pub recovery_interval_secs: u64,
    pub recovery_window_days: i64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            max_retries: 50,
            lookup_failure_threshold: 10,
            initial_check_delay_ms: 1000,
            worker_concurrency: 8,
            recovery_interval_secs: 3600,
            recovery_window_days: 7,
        }
    }
}

impl TrackerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "tracker.poll_interval_secs must be > 0".into(),
            ));
        }
        if self.recovery_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "tracker.recovery_interval_secs must be > 0".into(),
            ));
        }
        if self.worker_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "tracker.worker_concurrency must be > 0".into(),
            ));
        }
        if self.recovery_window_days <= 0 {
            return Err(ConfigError::Invalid(
                "tracker.recovery_window_days must be > 0".into(),
            ));
        }
        Ok(())
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: config_path,
                source,
            },
            other => other,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig =
            serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
                path: "<inline>".to_string(),
                source,
            })?;
        config.tracker.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
log_level: info
log_dir: ./logs
log_file: transfer_tracker.log
use_json: false
rotation: daily
gateway:
  host: 0.0.0.0
  port: 8080
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = AppConfig::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.gateway.port, 8080);
        assert!(config.postgres_url.is_none());
        assert!(config.ledger.rpc_url.is_none());
        assert_eq!(config.tracker.poll_interval_secs, 30);
        assert_eq!(config.tracker.max_retries, 50);
        assert_eq!(config.tracker.lookup_failure_threshold, 10);
        assert_eq!(config.tracker.recovery_window_days, 7);
    }

    #[test]
    fn test_partial_tracker_section() {
        let yaml = format!("{}tracker:\n  max_retries: 5\n", MINIMAL);
        let config = AppConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config.tracker.max_retries, 5);
        assert_eq!(config.tracker.worker_concurrency, 8);
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let yaml = format!("{}tracker:\n  poll_interval_secs: 0\n", MINIMAL);
        assert!(matches!(
            AppConfig::from_yaml(&yaml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_explorer_url() {
        let ledger = LedgerConfig {
            explorer_base_url: "https://voyager.online/".into(),
            ..LedgerConfig::default()
        };
        assert_eq!(ledger.explorer_url("0xabc"), "https://voyager.online/tx/0xabc");
    }

    #[test]
    fn test_dev_config_parses() {
        let content = fs::read_to_string("config/dev.yaml").unwrap();
        assert!(AppConfig::from_yaml(&content).is_ok());
    }

    #[test]
    fn test_prod_config_parses() {
        let content = fs::read_to_string("config/prod.yaml").unwrap();
        let config = AppConfig::from_yaml(&content).unwrap();
        assert!(config.postgres_url.is_some());
        assert!(config.ledger.rpc_url.is_some());
        assert!(config.use_json);
    }
}
