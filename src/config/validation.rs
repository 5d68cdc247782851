//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (rates > 0, timeouts > 0, argon2 cost limits)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: NexusConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::NexusConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// One rejected setting.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

pub fn validate_config(config: &NexusConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let listener = &config.listener;
    if listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", listener.bind_address),
        ));
    }
    if let Some(tls) = &listener.tls {
        if tls.cert_path.is_empty() {
            errors.push(ValidationError::new("listener.tls.cert_path", "must not be empty"));
        }
        if tls.key_path.is_empty() {
            errors.push(ValidationError::new("listener.tls.key_path", "must not be empty"));
        }
    }
    if listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be > 0"));
    }
    if listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be > 0"));
    }

    let limits = &config.rate_limit;
    if limits.global_rate.is_nan() || limits.global_rate <= 0.0 {
        errors.push(ValidationError::new("rate_limit.global_rate", "must be > 0"));
    }
    if limits.global_burst == 0 {
        errors.push(ValidationError::new("rate_limit.global_burst", "must be >= 1"));
    }
    if limits.client_rate.is_nan() || limits.client_rate <= 0.0 {
        errors.push(ValidationError::new("rate_limit.client_rate", "must be > 0"));
    }
    if limits.client_burst == 0 {
        errors.push(ValidationError::new("rate_limit.client_burst", "must be >= 1"));
    }

    let database = &config.database;
    if database.query_timeout_secs == 0 {
        errors.push(ValidationError::new("database.query_timeout_secs", "must be > 0"));
    }
    if database.max_connections == 0 {
        errors.push(ValidationError::new("database.max_connections", "must be >= 1"));
    }

    if !LOG_LEVELS.contains(&config.logging.level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "logging.level",
            format!("unknown level '{}'", config.logging.level),
        ));
    }

    let hashing = &config.security.password_hashing;
    if let Err(e) = argon2::Params::new(
        hashing.memory_cost,
        hashing.iterations,
        u32::from(hashing.parallelism),
        Some(hashing.key_length as usize),
    ) {
        errors.push(ValidationError::new("security.password_hashing", e.to_string()));
    }
    if (hashing.salt_length as usize) < argon2::RECOMMENDED_SALT_LEN {
        errors.push(ValidationError::new(
            "security.password_hashing.salt_length",
            format!("must be >= {}", argon2::RECOMMENDED_SALT_LEN),
        ));
    }

    let observability = &config.observability;
    let metrics_address = observability.metrics_address.parse::<SocketAddr>();
    if observability.metrics_enabled && metrics_address.is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
