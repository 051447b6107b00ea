//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, bucket rates positive)
//! - Check that CORS origins are real origins
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use url::Url;

use crate::config::schema::{BucketPolicy, GatewayConfig};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("bucket policy '{class}' has zero capacity")]
    ZeroCapacity { class: String },

    #[error("bucket policy '{class}' must refill at a positive, finite rate")]
    InvalidRefillRate { class: String },

    #[error(
        "admission.idle_eviction_secs ({idle_secs}) is shorter than the {refill_secs:.1}s \
         policy '{class}' needs to refill, evicting would hand out free tokens"
    )]
    EvictionTooEager {
        class: String,
        idle_secs: u64,
        refill_secs: f64,
    },

    #[error("admission.{0} must be greater than zero")]
    ZeroAdmissionSetting(&'static str),

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("security.max_body_size must be greater than zero")]
    ZeroBodyLimit,

    #[error("cors origin '{0}' is not a valid origin")]
    InvalidOrigin(String),
}

/// Validate a parsed configuration, collecting every problem.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    let admission = &config.admission;
    let policies = std::iter::once(("default", &admission.default_policy))
        .chain(admission.classes.iter().map(|(k, v)| (k.as_str(), v)));
    for (class, policy) in policies {
        validate_policy(class, policy, admission.idle_eviction_secs, &mut errors);
    }

    if admission.sweep_interval_secs == 0 {
        errors.push(ValidationError::ZeroAdmissionSetting("sweep_interval_secs"));
    }
    if admission.store_timeout_ms == 0 {
        errors.push(ValidationError::ZeroAdmissionSetting("store_timeout_ms"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    for origin in &config.cors.allowed_origins {
        if !is_origin(origin) {
            errors.push(ValidationError::InvalidOrigin(origin.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_policy(
    class: &str,
    policy: &BucketPolicy,
    idle_secs: u64,
    errors: &mut Vec<ValidationError>,
) {
    if policy.capacity == 0 {
        errors.push(ValidationError::ZeroCapacity {
            class: class.to_string(),
        });
    }
    if !(policy.refill_per_second.is_finite() && policy.refill_per_second > 0.0) {
        errors.push(ValidationError::InvalidRefillRate {
            class: class.to_string(),
        });
        return;
    }

    let refill_secs = f64::from(policy.capacity) / policy.refill_per_second;
    if (idle_secs as f64) < refill_secs {
        errors.push(ValidationError::EvictionTooEager {
            class: class.to_string(),
            idle_secs,
            refill_secs,
        });
    }
}

/// `scheme://host[:port]` with nothing after it.
fn is_origin(value: &str) -> bool {
    match Url::parse(value) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some()
                && url.path() == "/"
                && !value.ends_with('/')
                && url.query().is_none()
                && url.fragment().is_none()
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.admission.default_policy = BucketPolicy {
            capacity: 0,
            refill_per_second: f64::NAN,
        };
        config.timeouts.request_secs = 0;
        config.cors.allowed_origins = vec!["http://localhost:5173/app".into()];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&ValidationError::ZeroRequestTimeout));
        assert!(errors.contains(&ValidationError::InvalidOrigin(
            "http://localhost:5173/app".into()
        )));
    }

    #[test]
    fn test_eviction_window_must_cover_refill() {
        let mut config = GatewayConfig::default();
        config.admission.idle_eviction_secs = 5;
        config.admission.classes.insert(
            "api_key".into(),
            BucketPolicy {
                capacity: 100,
                refill_per_second: 1.0,
            },
        );

        let errors = validate_config(&config).unwrap_err();
        // default policy needs 10s, api_key needs 100s
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|e| matches!(e, ValidationError::EvictionTooEager { .. })));
    }

    #[test]
    fn test_origin_shapes() {
        assert!(is_origin("https://shop.example.com"));
        assert!(is_origin("http://localhost:5173"));
        assert!(!is_origin("localhost:5173"));
        assert!(!is_origin("https://shop.example.com/"));
        assert!(!is_origin("ftp://files.example.com"));
    }
}
