//! Secret references in configuration values.
//!
//! A value of the form `env::VAR_NAME` is read from the environment; any
//! other value is used as written.

use crate::config::ConfigError;

pub fn resolve(value: &str) -> Result<String, ConfigError> {
    match value.strip_prefix("env::") {
        Some(var) => std::env::var(var).map_err(|_| ConfigError::Secret {
            reference: value.to_string(),
            message: format!("environment variable `{}` is not set", var),
        }),
        None => Ok(value.to_string()),
    }
}
