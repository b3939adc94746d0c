//! Configuration validation.
//!
//! Serde handles syntactic checks; this module does the semantic ones and
//! returns every violation it finds, not just the first.

use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic violation found in a config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Config key path, e.g. "upstream.base_url".
    pub field: String,
    /// Human-readable description.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration. Returns all violations found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError {
            field: "listener.bind_address".into(),
            message: format!("not a socket address: {}", config.listener.bind_address),
        });
    }

    match Url::parse(&config.upstream.base_url) {
        Ok(url) => {
            if url.scheme() != "http" && url.scheme() != "https" {
                errors.push(ValidationError {
                    field: "upstream.base_url".into(),
                    message: format!("unsupported scheme: {}", url.scheme()),
                });
            }
        }
        Err(e) => errors.push(ValidationError {
            field: "upstream.base_url".into(),
            message: format!("not a URL: {e}"),
        }),
    }
    if config.upstream.base_url.ends_with('/') {
        errors.push(ValidationError {
            field: "upstream.base_url".into(),
            message: "must not end with a slash".into(),
        });
    }

    if config.connection.ping_interval_secs == 0 {
        errors.push(ValidationError {
            field: "connection.ping_interval_secs".into(),
            message: "must be positive".into(),
        });
    }
    if config.connection.pong_timeout_secs <= config.connection.ping_interval_secs {
        errors.push(ValidationError {
            field: "connection.pong_timeout_secs".into(),
            message: "must exceed ping_interval_secs".into(),
        });
    }
    if config.connection.outbound_queue == 0 {
        errors.push(ValidationError {
            field: "connection.outbound_queue".into(),
            message: "must be positive".into(),
        });
    }

    if config.routing.default_policy != "delegate" && config.routing.default_policy != "server" {
        errors.push(ValidationError {
            field: "routing.default_policy".into(),
            message: format!(
                "must be \"delegate\" or \"server\", got {:?}",
                config.routing.default_policy
            ),
        });
    }
    for (user_id, policy) in &config.routing.user_policies {
        if policy != "delegate" && policy != "server" {
            errors.push(ValidationError {
                field: format!("routing.user_policies.{user_id}"),
                message: format!("must be \"delegate\" or \"server\", got {policy:?}"),
            });
        }
    }
    if config.routing.default_call_timeout_secs == 0 {
        errors.push(ValidationError {
            field: "routing.default_call_timeout_secs".into(),
            message: "must be positive".into(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
