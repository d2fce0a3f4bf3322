use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub gateway: GatewayConfig,
    pub business_rules: BusinessRules,
    pub run_mode: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub server_key: String,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Tolerate unsigned callbacks. Only honored outside production.
    #[serde(default)]
    pub allow_unsigned_callbacks: bool,
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    pub cancellation_cutoff_days: i64,
    pub payment_expiry_minutes: i64,
    pub notification_dedupe_ttl_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file (optional)
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add in a local configuration file, not checked in to git
            .add_source(config::File::with_name("config/local").required(false))
            // Add in settings from the environment, e.g. TRAJEKT__SERVER__PORT=9090
            .add_source(config::Environment::with_prefix("TRAJEKT").separator("__"))
            .set_override("run_mode", run_mode)?
            .build()?;

        s.try_deserialize()
    }

    /// Whether the callback verifier may accept payloads without a signature.
    /// The config flag is ignored in production.
    pub fn unsigned_callbacks_allowed(&self) -> bool {
        self.gateway.allow_unsigned_callbacks && self.run_mode != "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(run_mode: &str, allow_unsigned: bool) -> Config {
        Config {
            server: ServerConfig { port: 8080 },
            database: DatabaseConfig {
                url: "postgres://localhost/trajekt_test".to_string(),
                max_connections: default_max_connections(),
            },
            gateway: GatewayConfig {
                base_url: "https://api.sandbox.midtrans.com".to_string(),
                server_key: "SB-Mid-server-test".to_string(),
                request_timeout_secs: default_timeout_secs(),
                max_attempts: default_max_attempts(),
                base_delay_ms: default_base_delay_ms(),
                allow_unsigned_callbacks: allow_unsigned,
            },
            business_rules: BusinessRules {
                cancellation_cutoff_days: 1,
                payment_expiry_minutes: 5,
                notification_dedupe_ttl_secs: 300,
            },
            run_mode: run_mode.to_string(),
        }
    }

    #[test]
    fn test_gateway_defaults() {
        let config = sample("development", false);
        assert_eq!(config.gateway.request_timeout_secs, 20);
        assert_eq!(config.gateway.max_attempts, 3);
        assert_eq!(config.gateway.base_delay_ms, 1000);
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_unsigned_callbacks_never_allowed_in_production() {
        assert!(sample("development", true).unsigned_callbacks_allowed());
        assert!(!sample("development", false).unsigned_callbacks_allowed());
        assert!(!sample("production", true).unsigned_callbacks_allowed());
    }
}
