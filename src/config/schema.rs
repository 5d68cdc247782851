//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::security::HashingParams;

const REDACTED: &str = "********";

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct NexusConfig {
    /// Listener configuration (bind address, TLS, timeouts).
    pub listener: ListenerConfig,

    pub rate_limit: RateLimitConfig,

    /// Relational store connection.
    pub database: DatabaseConfig,

    pub logging: LoggingConfig,

    pub security: SecurityConfig,

    pub observability: ObservabilityConfig,
}

impl NexusConfig {
    /// Copy with secrets masked, for logging.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        config.database.user = REDACTED.to_string();
        config.database.password = REDACTED.to_string();
        config
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:4890").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Total time allowed for one request, store calls included.
    pub request_timeout_secs: u64,

    /// How long shutdown waits for in-flight requests.
    pub shutdown_grace_secs: u64,

    pub max_body_bytes: usize,
}

impl ListenerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4890".to_string(),
            tls: None,
            request_timeout_secs: 10,
            shutdown_grace_secs: 5,
            max_body_bytes: 64 * 1024,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate chain file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Token-bucket parameters. Rates are tokens per second, bursts are capacities.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub global_rate: f64,
    pub global_burst: u32,
    pub client_rate: f64,
    pub client_burst: u32,

    /// Evict a client's bucket after this long without requests. 0 keeps buckets forever.
    pub client_idle_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            global_rate: 25.0,
            global_burst: 50,
            client_rate: 5.0,
            client_burst: 25,
            client_idle_secs: 600,
        }
    }
}

/// Relational store connection.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub address: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,

    /// libpq-style ssl mode (disable, prefer, require, ...).
    pub ssl_mode: String,

    pub max_connections: u32,
    pub connect_timeout_secs: u64,

    /// Deadline for every individual store call.
    pub query_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            address: "localhost".to_string(),
            port: 5432,
            user: "nexus".to_string(),
            password: String::new(),
            name: "nexus".to_string(),
            ssl_mode: "prefer".to_string(),
            max_connections: 10,
            connect_timeout_secs: 5,
            query_timeout_secs: 3,
        }
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("user", &REDACTED)
            .field("password", &REDACTED)
            .field("name", &self.name)
            .field("ssl_mode", &self.ssl_mode)
            .field("max_connections", &self.max_connections)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("query_timeout_secs", &self.query_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SecurityConfig {
    /// Parameters for newly hashed passwords.
    pub password_hashing: HashingParams,
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
