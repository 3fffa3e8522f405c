use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HiveConfig {
    pub store: StoreConfig,
    #[serde(default)]
    pub gateway: GatewaySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum StoreConfig {
    Kubo(hive_store_kubo::KuboStoreConfig),
    /// Volatile in-process store; everything is lost on exit.
    Memory,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Kubo(Default::default())
    }
}

/// Settings of the façade in front of the lifecycle core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewaySettings {
    /// End-to-end timeout applied to every command.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Largest local input `add` accepts, in bytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,
    #[serde(default)]
    pub include_hidden: bool,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_upload_size() -> u64 {
    100 * 1024 * 1024
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            max_upload_size: default_max_upload_size(),
            include_hidden: false,
        }
    }
}

impl GatewaySettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config: HiveConfig = toml::from_str(
            r#"
            [store]
            type = "kubo"
            api_addr = "/dns4/ipfs.internal/tcp/5001"

            [gateway]
            request_timeout_secs = 5
            max_upload_size = 1024
            include_hidden = true
            "#,
        )
        .unwrap();

        let StoreConfig::Kubo(kubo) = &config.store else {
            panic!("expected a kubo store, got {:?}", config.store);
        };
        assert_eq!(kubo.api_addr, "/dns4/ipfs.internal/tcp/5001");
        assert_eq!(config.gateway.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.gateway.max_upload_size, 1024);
        assert!(config.gateway.include_hidden);
    }

    #[test]
    fn test_gateway_section_defaults() {
        let config: HiveConfig = toml::from_str(
            r#"
            [store]
            type = "memory"
            "#,
        )
        .unwrap();
        assert_eq!(config.store, StoreConfig::Memory);
        assert_eq!(config.gateway, GatewaySettings::default());
        assert_eq!(config.gateway.request_timeout_secs, 30);
        assert_eq!(config.gateway.max_upload_size, 104_857_600);
    }

    #[test]
    fn test_default_config_round_trips() {
        let config = HiveConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(toml::from_str::<HiveConfig>(&text).unwrap(), config);
    }
}
