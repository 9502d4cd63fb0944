use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_server_config")]
    pub server: ServerConfig,
    pub zalo: ZaloConfig,
    #[serde(default = "default_backend_config")]
    pub backend: BackendConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ZaloConfig {
    pub bot_token: String,
    /// Base URL of the Zalo Bot API. The token is appended without a
    /// separator: `{api_base}{bot_token}/sendMessage`.
    #[serde(default = "default_zalo_api_base")]
    pub api_base: String,
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
    /// When true, a send that fails with a certificate-verification error is
    /// retried once on a client that skips TLS verification. Off by default;
    /// prefer fixing the trust store.
    #[serde(default)]
    pub insecure_tls_fallback: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    #[serde(default = "default_backend_base_url")]
    pub base_url: String,
    #[serde(default = "default_persona")]
    pub persona: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_backend_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_customer_id")]
    pub default_customer_id: i64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8011
}

fn default_zalo_api_base() -> String {
    "https://bot-api.zapps.me/bot".to_string()
}

fn default_send_timeout_secs() -> u64 {
    12
}

fn default_backend_base_url() -> String {
    "http://127.0.0.1:8010".to_string()
}

fn default_persona() -> String {
    "Angry Mom".to_string()
}

fn default_timezone() -> String {
    "Asia/Ho_Chi_Minh".to_string()
}

fn default_backend_timeout_secs() -> u64 {
    30
}

fn default_customer_id() -> i64 {
    1
}

fn default_server_config() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
    }
}

fn default_backend_config() -> BackendConfig {
    BackendConfig {
        base_url: default_backend_base_url(),
        persona: default_persona(),
        timezone: default_timezone(),
        timeout_secs: default_backend_timeout_secs(),
        default_customer_id: default_customer_id(),
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config: Config = toml::from_str(
            r#"
            [zalo]
            bot_token = "abc123"
            "#,
        )
        .unwrap();

        assert_eq!(config.zalo.bot_token, "abc123");
        assert_eq!(config.zalo.api_base, "https://bot-api.zapps.me/bot");
        assert_eq!(config.zalo.send_timeout_secs, 12);
        assert!(!config.zalo.insecure_tls_fallback);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8011);
        assert_eq!(config.backend.base_url, "http://127.0.0.1:8010");
        assert_eq!(config.backend.persona, "Angry Mom");
        assert_eq!(config.backend.timezone, "Asia/Ho_Chi_Minh");
        assert_eq!(config.backend.timeout_secs, 30);
        assert_eq!(config.backend.default_customer_id, 1);
    }

    #[test]
    fn test_overrides_are_honored() {
        let config: Config = toml::from_str(
            r#"
            [server]
            host = "0.0.0.0"
            port = 9000

            [zalo]
            bot_token = "t"
            insecure_tls_fallback = true

            [backend]
            base_url = "http://backend:8010"
            persona = "Gentle Coach"
            default_customer_id = 42
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert!(config.zalo.insecure_tls_fallback);
        assert_eq!(config.backend.persona, "Gentle Coach");
        assert_eq!(config.backend.default_customer_id, 42);
    }
}
