use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::types::{Chain, ChainKind, Explorer, Wallet};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("no chains configured")]
    NoChains,
    #[error("chain {chain}: {reason}")]
    InvalidChain { chain: String, reason: String },
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Seconds between two polling runs.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Timeout for a single HTTP attempt against one endpoint.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub pagerduty: PagerDutyConfig,
    /// Message template overrides keyed by entry kind, e.g. `not_voted`.
    #[serde(default)]
    pub templates: HashMap<String, String>,
    #[serde(default)]
    pub chains: Vec<ChainConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub name: String,
    /// Human readable name, falls back to `name`.
    #[serde(default)]
    pub pretty_name: String,
    #[serde(default)]
    pub lcd_endpoints: Vec<String>,
    /// Governance API flavour: "cosmos" (gov module REST) or "dao" (contract query).
    #[serde(default, rename = "type")]
    pub kind: ChainKind,
    /// Governance contract address, required for "dao" chains.
    #[serde(default)]
    pub dao_address: String,
    #[serde(default)]
    pub wallets: Vec<WalletConfig>,
    #[serde(default)]
    pub explorer: ExplorerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    pub address: String,
    #[serde(default)]
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExplorerConfig {
    /// e.g. "https://www.mintscan.io/cosmos/proposals/{id}"
    #[serde(default)]
    pub proposal_link_pattern: String,
    /// e.g. "https://www.mintscan.io/cosmos/account/{address}"
    #[serde(default)]
    pub wallet_link_pattern: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    File,
    Valkey,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackend,
    /// JSON snapshot of the last observed state, keyed by chain name.
    #[serde(default = "default_state_path")]
    pub state_path: String,
    #[serde(default = "default_mutes_path")]
    pub mutes_path: String,
    #[serde(default = "default_valkey_url")]
    pub valkey_url: String,
    #[serde(default = "default_valkey_prefix")]
    pub valkey_prefix: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookConfig {
    /// Target URL - loaded from env GOVWATCH_WEBHOOK_URL if set
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PagerDutyConfig {
    /// Integration key - loaded from env GOVWATCH_PAGERDUTY_ROUTING_KEY if set
    #[serde(default)]
    pub routing_key: String,
    #[serde(default = "default_pagerduty_url")]
    pub api_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_interval_secs() -> u64 {
    3600
}
fn default_request_timeout_secs() -> u64 {
    120
}
fn default_storage_backend() -> StorageBackend {
    StorageBackend::File
}
fn default_state_path() -> String {
    "govwatch-state.json".to_string()
}
fn default_mutes_path() -> String {
    "govwatch-mutes.json".to_string()
}
fn default_valkey_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}
fn default_valkey_prefix() -> String {
    "govwatch".to_string()
}
fn default_pagerduty_url() -> String {
    "https://events.pagerduty.com/v2/enqueue".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            state_path: default_state_path(),
            mutes_path: default_mutes_path(),
            valkey_url: default_valkey_url(),
            valkey_prefix: default_valkey_prefix(),
        }
    }
}

impl Default for PagerDutyConfig {
    fn default() -> Self {
        Self {
            routing_key: String::new(),
            api_url: default_pagerduty_url(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Load config from a TOML file, then overlay environment variables for secrets.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;

        // Secrets never need to live in the config file
        if let Ok(url) = std::env::var("GOVWATCH_WEBHOOK_URL") {
            config.webhook.url = url;
        }
        if let Ok(key) = std::env::var("GOVWATCH_PAGERDUTY_ROUTING_KEY") {
            config.pagerduty.routing_key = key;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chains.is_empty() {
            return Err(ConfigError::NoChains);
        }
        if self.interval_secs == 0 {
            return Err(ConfigError::Invalid("interval_secs must be positive".to_string()));
        }

        for kind in self.templates.keys() {
            if !crate::render::KINDS.contains(&kind.as_str()) {
                return Err(ConfigError::Invalid(format!("unknown template kind {:?}", kind)));
            }
        }

        let mut seen = HashSet::new();
        for chain in &self.chains {
            let invalid = |reason: &str| ConfigError::InvalidChain {
                chain: chain.name.clone(),
                reason: reason.to_string(),
            };

            if chain.name.is_empty() {
                return Err(ConfigError::Invalid("chain with empty name".to_string()));
            }
            if !seen.insert(chain.name.as_str()) {
                return Err(invalid("duplicate chain name"));
            }
            if chain.lcd_endpoints.is_empty() {
                return Err(invalid("no LCD endpoints"));
            }
            if chain.wallets.is_empty() {
                return Err(invalid("no wallets"));
            }
            if chain.wallets.iter().any(|w| w.address.is_empty()) {
                return Err(invalid("wallet with empty address"));
            }
            if chain.kind == ChainKind::Dao && chain.dao_address.is_empty() {
                return Err(invalid("dao chains require dao_address"));
            }
        }

        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Build the immutable chain registry shared by every component.
    pub fn chains(&self) -> Vec<Arc<Chain>> {
        self.chains.iter().map(|c| Arc::new(c.to_chain())).collect()
    }
}

impl ChainConfig {
    pub fn to_chain(&self) -> Chain {
        Chain {
            name: self.name.clone(),
            pretty_name: if self.pretty_name.is_empty() {
                self.name.clone()
            } else {
                self.pretty_name.clone()
            },
            lcd_endpoints: self
                .lcd_endpoints
                .iter()
                .map(|e| e.trim_end_matches('/').to_string())
                .collect(),
            kind: self.kind,
            dao_address: self.dao_address.clone(),
            wallets: self
                .wallets
                .iter()
                .map(|w| Wallet {
                    address: w.address.clone(),
                    alias: w.alias.clone().filter(|a| !a.is_empty()),
                })
                .collect(),
            explorer: Explorer {
                proposal_link_pattern: self.explorer.proposal_link_pattern.clone(),
                wallet_link_pattern: self.explorer.wallet_link_pattern.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
interval_secs = 600

[logging]
level = "debug"

[[chains]]
name = "cosmos"
pretty_name = "Cosmos Hub"
lcd_endpoints = ["https://lcd-1.example/", "https://lcd-2.example"]
wallets = [{ address = "cosmos1abc", alias = "validator" }, { address = "cosmos1def" }]

[chains.explorer]
proposal_link_pattern = "https://explorer.example/cosmos/proposals/{id}"

[[chains]]
name = "neutron"
type = "dao"
dao_address = "neutron1contract"
lcd_endpoints = ["https://neutron-lcd.example"]
wallets = [{ address = "neutron1abc" }]
"#;

    #[test]
    fn test_parse_sample() {
        let config = Config::parse(SAMPLE).unwrap();
        config.validate().unwrap();

        assert_eq!(config.interval(), Duration::from_secs(600));
        assert_eq!(config.request_timeout(), Duration::from_secs(120));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.storage.backend, StorageBackend::File);

        let chains = config.chains();
        assert_eq!(chains.len(), 2);
        assert_eq!(chains[0].kind, ChainKind::Cosmos);
        assert_eq!(chains[0].lcd_endpoints[0], "https://lcd-1.example");
        assert_eq!(chains[0].wallets[0].alias.as_deref(), Some("validator"));
        assert_eq!(chains[1].kind, ChainKind::Dao);
        assert_eq!(chains[1].pretty_name, "neutron");
    }

    #[test]
    fn test_unknown_template_kind() {
        let config = Config::parse(&format!("{}\n[templates]\nnot_voted = \"{{wallet}}\"\n", SAMPLE)).unwrap();
        config.validate().unwrap();
        assert_eq!(config.templates["not_voted"], "{wallet}");

        let config = Config::parse(&format!("{}\n[templates]\nmissed = \"x\"\n", SAMPLE)).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_no_chains_is_fatal() {
        let config = Config::parse("interval_secs = 10").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::NoChains)));
    }

    #[test]
    fn test_invalid_chains() {
        let dao_without_address = r#"
[[chains]]
name = "neutron"
type = "dao"
lcd_endpoints = ["https://lcd.example"]
wallets = [{ address = "neutron1abc" }]
"#;
        let config = Config::parse(dao_without_address).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidChain { .. })
        ));

        let duplicate = r#"
[[chains]]
name = "a"
lcd_endpoints = ["https://lcd.example"]
wallets = [{ address = "a1" }]

[[chains]]
name = "a"
lcd_endpoints = ["https://lcd.example"]
wallets = [{ address = "a2" }]
"#;
        let config = Config::parse(duplicate).unwrap();
        assert!(config.validate().is_err());

        let no_endpoints = r#"
[[chains]]
name = "a"
wallets = [{ address = "a1" }]
"#;
        let config = Config::parse(no_endpoints).unwrap();
        assert!(config.validate().is_err());
    }
}
