//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges and cross-field constraints
//!
//! Returns every violation, not just the first, so an operator fixes a
//! config in one pass.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServerConfig;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a valid socket address")]
    InvalidBindAddress(String),

    #[error("observability.metrics_address {0:?} is not a valid socket address")]
    InvalidMetricsAddress(String),

    #[error("{field} must be greater than zero")]
    MustBePositive { field: &'static str },

    #[error("connection.low_watermark_bytes must be below high_watermark_bytes")]
    WatermarksOutOfOrder,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    let positives: [(&'static str, usize); 5] = [
        ("listener.max_connections", config.listener.max_connections),
        ("limits.max_body_bytes", config.limits.max_body_bytes),
        ("limits.max_header_bytes", config.limits.max_header_bytes),
        ("handler_pool.workers", config.handler_pool.workers),
        ("connection.max_pipelined", config.connection.max_pipelined),
    ];
    for (field, value) in positives {
        if value == 0 {
            errors.push(ValidationError::MustBePositive { field });
        }
    }

    if config.connection.low_watermark_bytes >= config.connection.high_watermark_bytes {
        errors.push(ValidationError::WatermarksOutOfOrder);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn all_violations_are_collected() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "nonsense".to_string();
        config.handler_pool.workers = 0;
        config.connection.low_watermark_bytes = config.connection.high_watermark_bytes;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::WatermarksOutOfOrder));
    }
}
