pub mod tracing;

use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable '{0}' is required but not set")]
    MissingEnvVar(String),

    #[error("Failed to parse environment variable '{key}': {details}")]
    ParseError { key: String, details: String },
}

/// Application environment, selects log format and verbosity
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn from_env() -> Self {
        let app_env = env_or_default("APP_ENV", "development");

        if app_env.eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Development
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

/// Trait for configuration that can be loaded from environment variables
pub trait FromEnv: Sized {
    fn from_env() -> Result<Self, ConfigError>;
}

/// Read an environment variable, falling back to `default` when unset
pub fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read an environment variable or fail with `MissingEnvVar`
pub fn env_required(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Parse an environment variable into `T`, using `default` when unset.
///
/// A set but unparseable value is an error rather than a silent fallback.
pub fn env_parse<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
            key: key.to_string(),
            details: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Read a comma separated list, trimming entries and dropping empty ones.
///
/// Returns `None` when the variable is unset so callers can keep their defaults.
pub fn env_list(key: &str) -> Option<Vec<String>> {
    env::var(key).ok().map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_defaults_to_development() {
        temp_env::with_var_unset("APP_ENV", || {
            let env = Environment::from_env();
            assert_eq!(env, Environment::Development);
            assert!(env.is_development());
            assert!(!env.is_production());
        });
    }

    #[test]
    fn test_environment_production_case_insensitive() {
        temp_env::with_var("APP_ENV", Some("PRODUCTION"), || {
            assert_eq!(Environment::from_env(), Environment::Production);
        });
    }

    #[test]
    fn test_env_or_default() {
        temp_env::with_var("COURIER_TEST_VAR", Some("value"), || {
            assert_eq!(env_or_default("COURIER_TEST_VAR", "fallback"), "value");
        });
        temp_env::with_var_unset("COURIER_TEST_VAR", || {
            assert_eq!(env_or_default("COURIER_TEST_VAR", "fallback"), "fallback");
        });
    }

    #[test]
    fn test_env_required_missing() {
        temp_env::with_var_unset("COURIER_REQUIRED", || {
            let err = env_required("COURIER_REQUIRED").unwrap_err();
            assert!(err.to_string().contains("COURIER_REQUIRED"));
        });
    }

    #[test]
    fn test_env_parse_uses_default_when_unset() {
        temp_env::with_var_unset("COURIER_NUMBER", || {
            let value: u32 = env_parse("COURIER_NUMBER", 7).unwrap();
            assert_eq!(value, 7);
        });
    }

    #[test]
    fn test_env_parse_rejects_garbage() {
        temp_env::with_var("COURIER_NUMBER", Some("seven"), || {
            let err = env_parse::<u32>("COURIER_NUMBER", 7).unwrap_err();
            assert!(matches!(err, ConfigError::ParseError { ref key, .. } if key == "COURIER_NUMBER"));
        });
    }

    #[test]
    fn test_env_list_splits_and_trims() {
        temp_env::with_var("COURIER_LIST", Some(" save, delete ,,clean "), || {
            assert_eq!(
                env_list("COURIER_LIST"),
                Some(vec!["save".to_string(), "delete".to_string(), "clean".to_string()])
            );
        });
        temp_env::with_var_unset("COURIER_LIST", || {
            assert_eq!(env_list("COURIER_LIST"), None);
        });
    }
}
