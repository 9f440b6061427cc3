//! Environment configuration.

use crate::error::AppError;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Settings read from the process environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Upper bound of the connection pool.
    pub max_connections: u32,
}

impl AppConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` naming the missing or invalid variable.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` naming the missing or invalid variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                AppError::Config("DATABASE_URL environment variable must be set".to_owned())
            })?;

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            None => DEFAULT_MAX_CONNECTIONS,
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    AppError::Config(format!(
                        "DATABASE_MAX_CONNECTIONS must be a positive integer, got '{raw}'"
                    ))
                })?,
        };

        Ok(Self {
            database_url,
            max_connections,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_max_connections() {
        let config = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/campaign")]))
            .unwrap();

        assert_eq!(config.database_url, "postgres://localhost/campaign");
        assert_eq!(config.max_connections, 10);
    }

    #[test]
    fn test_reads_max_connections() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/campaign"),
            ("DATABASE_MAX_CONNECTIONS", " 4 "),
        ]))
        .unwrap();

        assert_eq!(config.max_connections, 4);
    }

    #[test]
    fn test_missing_database_url_is_a_config_error() {
        let result = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "  ")]));

        match result.unwrap_err() {
            AppError::Config(message) => assert!(message.contains("DATABASE_URL")),
            other => panic!("expected Config, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_max_connections_is_a_config_error() {
        for raw in ["zero", "0", "-3"] {
            let result = AppConfig::from_lookup(lookup(&[
                ("DATABASE_URL", "postgres://localhost/campaign"),
                ("DATABASE_MAX_CONNECTIONS", raw),
            ]));

            assert!(
                matches!(&result, Err(AppError::Config(m)) if m.contains("DATABASE_MAX_CONNECTIONS")),
                "{raw} should be rejected"
            );
        }
    }
}
