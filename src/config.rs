//! Slipstream configuration

use crate::congestion::{CongestionControl, UNTHROTTLED_ID};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default local TCP port the client accepts tunnelled connections on
pub const DEFAULT_LISTEN_PORT: u16 = 5201;

/// Default keep-alive interval in milliseconds
pub const DEFAULT_KEEP_ALIVE_MS: u64 = 400;

/// Default DNS port the server answers on
pub const DEFAULT_DNS_LISTEN_PORT: u16 = 53;

/// Default address the server forwards tunnelled streams to
pub const DEFAULT_TARGET_ADDRESS: &str = "127.0.0.1:5201";

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ClientConfig {
    /// Local TCP listen port
    pub listen_port: u16,

    /// Resolver endpoints, in preference order
    #[serde(rename = "resolver")]
    pub resolvers: Vec<String>,

    /// Congestion control algorithm name
    pub congestion_control: String,

    /// Generic segmentation offload
    pub gso: bool,

    /// Tunnel domain used as the carrier suffix
    pub domain: String,

    /// Keep-alive interval in milliseconds, 0 disables
    pub keep_alive_interval: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            listen_port: DEFAULT_LISTEN_PORT,
            resolvers: Vec::new(),
            congestion_control: CongestionControl::default().name().to_string(),
            gso: false,
            domain: String::new(),
            keep_alive_interval: DEFAULT_KEEP_ALIVE_MS,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ServerConfig {
    /// UDP port the DNS listener binds
    pub dns_listen_port: u16,

    /// Where tunnelled streams are forwarded
    pub target_address: String,

    /// Tunnel domain the server is authoritative for
    pub domain: String,

    /// Congestion control algorithm name
    pub congestion_control: String,

    /// Generic segmentation offload
    pub gso: bool,

    /// Keep-alive interval in milliseconds, 0 disables
    pub keep_alive_interval: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            dns_listen_port: DEFAULT_DNS_LISTEN_PORT,
            target_address: DEFAULT_TARGET_ADDRESS.to_string(),
            domain: String::new(),
            congestion_control: UNTHROTTLED_ID.to_string(),
            gso: false,
            keep_alive_interval: DEFAULT_KEEP_ALIVE_MS,
        }
    }
}

/// Keep-alive setting as a duration, `None` when disabled
pub fn keep_alive(interval_ms: u64) -> Option<Duration> {
    (interval_ms > 0).then(|| Duration::from_millis(interval_ms))
}

fn check_domain(domain: &str) -> Result<(), String> {
    if domain.is_empty() {
        return Err("Missing required --domain option".to_string());
    }
    Ok(())
}

fn check_congestion_control(name: &str) -> Result<CongestionControl, String> {
    name.parse::<CongestionControl>().map_err(|e| e.to_string())
}

impl ClientConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        check_domain(&self.domain)?;

        if self.resolvers.is_empty() {
            return Err("Missing required --resolver option (at least one required)".to_string());
        }

        if self.listen_port == 0 {
            return Err("Listen port must be between 1 and 65535".to_string());
        }

        check_congestion_control(&self.congestion_control)?;
        Ok(())
    }

    pub fn keep_alive(&self) -> Option<Duration> {
        keep_alive(self.keep_alive_interval)
    }
}

impl ServerConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        check_domain(&self.domain)?;

        if self.dns_listen_port == 0 {
            return Err("DNS listen port must be between 1 and 65535".to_string());
        }

        if self.target_address.is_empty() {
            return Err("Target address must be set".to_string());
        }

        check_congestion_control(&self.congestion_control)?;
        Ok(())
    }

    pub fn keep_alive(&self) -> Option<Duration> {
        keep_alive(self.keep_alive_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_client_config() {
        let config = ClientConfig::default();
        assert_eq!(config.listen_port, 5201);
        assert_eq!(config.congestion_control, "dcubic");
        assert!(!config.gso);
        assert_eq!(config.keep_alive(), Some(Duration::from_millis(400)));
    }

    #[test]
    fn test_default_server_uses_unthrottled() {
        let config = ServerConfig::default();
        assert_eq!(config.dns_listen_port, 53);
        assert_eq!(config.congestion_control, "slipstream_server");
        assert_eq!(config.target_address, "127.0.0.1:5201");
    }

    #[test]
    fn test_client_validation() {
        let mut config = ClientConfig::default();

        // Should fail without domain
        let err = config.validate().unwrap_err();
        assert!(err.contains("--domain"));

        // Should fail without resolvers
        config.domain = "tunnel.example.com".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.contains("--resolver"));

        config.resolvers.push("1.1.1.1".to_string());
        assert!(config.validate().is_ok());

        config.congestion_control = "vegas".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_server_validation() {
        let mut config = ServerConfig::default();
        assert!(config.validate().is_err());

        config.domain = "tunnel.example.com".to_string();
        assert!(config.validate().is_ok());

        config.dns_listen_port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_keep_alive_zero_disables() {
        let config = ClientConfig {
            keep_alive_interval: 0,
            ..ClientConfig::default()
        };
        assert_eq!(config.keep_alive(), None);
    }

    #[test]
    fn test_client_config_from_toml() {
        let config: ClientConfig = toml::from_str(
            r#"
            domain = "tunnel.example.com"
            resolver = ["1.1.1.1", "8.8.8.8:53"]
            gso = true
            keep-alive-interval = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.resolvers, vec!["1.1.1.1", "8.8.8.8:53"]);
        assert!(config.gso);
        assert_eq!(config.listen_port, DEFAULT_LISTEN_PORT);
        assert_eq!(config.keep_alive(), None);
        assert!(config.validate().is_ok());
    }
}
