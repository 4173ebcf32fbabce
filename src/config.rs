//! Configuration loading and validation (spec.md §9).

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration, one section per collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub bus: BusConfig,
    pub pubsub: PubSubConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub hub: HubConfig,
}

/// HTTP/WebSocket listen configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Node identity used as `instanceId` in the PubSub envelope (spec.md §6.4)
    /// and as the Bus consumer group discriminator.
    #[serde(default = "default_instance_id")]
    pub instance_id: String,
    /// Emit structured JSON logs instead of the human-readable format.
    #[serde(default)]
    pub log_json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            instance_id: default_instance_id(),
            log_json: false,
        }
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_instance_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// SQLite store configuration (spec.md §4.1).
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// `sqlite://path/to/file.db` or `sqlite::memory:`.
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

/// Kafka Bus configuration (spec.md §4.2).
#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    pub brokers: String,
    #[serde(default = "default_bus_topic")]
    pub topic: String,
    #[serde(default = "default_consumer_group_prefix")]
    pub consumer_group_prefix: String,
}

fn default_bus_topic() -> String {
    "chat_events".to_string()
}

fn default_consumer_group_prefix() -> String {
    "chatcore".to_string()
}

/// Redis PubSub configuration (spec.md §4.3).
#[derive(Debug, Clone, Deserialize)]
pub struct PubSubConfig {
    pub url: String,
}

/// Auth boundary configuration (spec.md §3, auth non-goal concession).
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret. Refused at startup below minimum strength unless
    /// `CHATCORE_ALLOW_INSECURE_JWT_SECRET` is set.
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl_seconds")]
    pub token_ttl_seconds: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_seconds: default_token_ttl_seconds(),
        }
    }
}

fn default_token_ttl_seconds() -> i64 {
    3600 * 24
}

/// Hub (WebSocket fan-out) configuration (spec.md §4.4).
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    /// Bound on each session's outbound queue (spec.md §4.4 slow-consumer
    /// handling): once full the session is dropped rather than blocking.
    #[serde(default = "default_session_queue_capacity")]
    pub session_queue_capacity: usize,
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            session_queue_capacity: default_session_queue_capacity(),
            ping_interval_secs: default_ping_interval_secs(),
        }
    }
}

fn default_session_queue_capacity() -> usize {
    256
}

fn default_ping_interval_secs() -> u64 {
    30
}

const MIN_JWT_SECRET_LEN: usize = 32;

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Eager validation at startup, mirroring the weak-secret refusal pattern:
    /// fail fast and loudly rather than accepting an insecure signing key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            let allow_insecure = std::env::var("CHATCORE_ALLOW_INSECURE_JWT_SECRET")
                .map(|v| v == "1")
                .unwrap_or(false);
            if allow_insecure {
                tracing::warn!(
                    "running with a jwt_secret shorter than {MIN_JWT_SECRET_LEN} bytes (allowed via CHATCORE_ALLOW_INSECURE_JWT_SECRET)"
                );
            } else {
                return Err(ConfigError::Invalid(format!(
                    "auth.jwt_secret must be at least {MIN_JWT_SECRET_LEN} bytes; refusing to start with a weak signing secret"
                )));
            }
        }
        if self.store.url.is_empty() {
            return Err(ConfigError::Invalid("store.url must not be empty".into()));
        }
        if self.bus.brokers.is_empty() {
            return Err(ConfigError::Invalid("bus.brokers must not be empty".into()));
        }
        if self.pubsub.url.is_empty() {
            return Err(ConfigError::Invalid("pubsub.url must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(jwt_secret: &str) -> Config {
        Config {
            server: ServerConfig::default(),
            store: StoreConfig {
                url: "sqlite::memory:".into(),
                max_connections: 5,
            },
            bus: BusConfig {
                brokers: "localhost:9092".into(),
                topic: default_bus_topic(),
                consumer_group_prefix: default_consumer_group_prefix(),
            },
            pubsub: PubSubConfig {
                url: "redis://localhost".into(),
            },
            auth: AuthConfig {
                jwt_secret: jwt_secret.into(),
                token_ttl_seconds: default_token_ttl_seconds(),
            },
            hub: HubConfig::default(),
        }
    }

    #[test]
    fn rejects_weak_jwt_secret() {
        let config = sample("short");
        assert!(config.validate().is_err());
    }

    #[test]
    fn accepts_strong_jwt_secret() {
        let config = sample(&"a".repeat(MIN_JWT_SECRET_LEN));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_empty_store_url() {
        let mut config = sample(&"a".repeat(MIN_JWT_SECRET_LEN));
        config.store.url.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_toml() {
        let toml_src = r#"
            [server]
            listen_addr = "127.0.0.1:9090"

            [store]
            url = "sqlite::memory:"

            [bus]
            brokers = "localhost:9092"

            [pubsub]
            url = "redis://localhost"

            [auth]
            jwt_secret = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
        "#;
        let config: Config = toml::from_str(toml_src).unwrap();
        assert_eq!(config.server.listen_addr, "127.0.0.1:9090");
        assert!(config.validate().is_ok());
    }
}
