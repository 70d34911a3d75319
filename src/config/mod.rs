//! Configuration management
//!
//! This module handles loading and parsing configuration for the yabe blog engine.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Fixture seeding configuration
    #[serde(default)]
    pub fixtures: FixturesConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/yabe.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Fixture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixturesConfig {
    /// Path to the YAML dataset
    #[serde(default = "default_fixtures_path")]
    pub path: PathBuf,
    /// Seed the dataset into an empty database on startup
    #[serde(default)]
    pub load_on_start: bool,
}

impl Default for FixturesConfig {
    fn default() -> Self {
        Self {
            path: default_fixtures_path(),
            load_on_start: false,
        }
    }
}

fn default_fixtures_path() -> PathBuf {
    PathBuf::from("fixtures/data.yml")
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        // Handle empty file - return defaults
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - YABE_DATABASE_DRIVER
    /// - YABE_DATABASE_URL
    /// - YABE_FIXTURES_PATH
    /// - YABE_FIXTURES_LOAD_ON_START
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(driver) = std::env::var("YABE_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("YABE_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(path) = std::env::var("YABE_FIXTURES_PATH") {
            self.fixtures.path = PathBuf::from(path);
        }
        if let Ok(flag) = std::env::var("YABE_FIXTURES_LOAD_ON_START") {
            if let Ok(flag) = flag.parse::<bool>() {
                self.fixtures.load_on_start = flag;
            }
        }
    }
}

/// Format YAML parsing error with location and context
pub(crate) fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared by every test that touches YABE_* variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());


/// Property-based tests for configuration parsing
#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn valid_database_driver_strategy() -> impl Strategy<Value = DatabaseDriver> {
        prop_oneof![Just(DatabaseDriver::Sqlite), Just(DatabaseDriver::Mysql)]
    }

    fn valid_database_url_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z][a-z0-9_/]{0,20}\\.db".prop_map(|s| s),
            Just("data/yabe.db".to_string()),
            Just(":memory:".to_string()),
            Just("mysql://root@127.0.0.1:3306/yabe".to_string()),
        ]
    }

    fn valid_fixtures_path_strategy() -> impl Strategy<Value = PathBuf> {
        prop_oneof![
            Just(PathBuf::from("fixtures/data.yml")),
            "[a-z][a-z0-9_/]{0,20}\\.yml".prop_map(PathBuf::from),
        ]
    }

    fn valid_config_strategy() -> impl Strategy<Value = Config> {
        (
            valid_database_driver_strategy(),
            valid_database_url_strategy(),
            valid_fixtures_path_strategy(),
            any::<bool>(),
        )
            .prop_map(|(driver, url, path, load_on_start)| Config {
                database: DatabaseConfig { driver, url },
                fixtures: FixturesConfig {
                    path,
                    load_on_start,
                },
            })
    }

    fn malformed_yaml_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("database:\n  driver: postgres".to_string()),
            Just("database:\n  driver: 123".to_string()),
            Just("database: \"just_a_string\"".to_string()),
            Just("database: [invalid, list]".to_string()),
            Just("fixtures:\n  load_on_start: maybe".to_string()),
            Just("fixtures: 42".to_string()),
            Just("database:\n  url: [unclosed".to_string()),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// Serializing a config to YAML and loading it back yields the same values.
        #[test]
        fn config_roundtrip(config in valid_config_strategy()) {
            let yaml = serde_yaml::to_string(&config).expect("Failed to serialize config");

            let mut file = NamedTempFile::new().expect("Failed to create temp file");
            write!(file, "{}", yaml).expect("Failed to write config");

            let parsed = Config::load(file.path()).expect("Failed to parse config");

            prop_assert_eq!(config.database.driver, parsed.database.driver);
            prop_assert_eq!(config.database.url, parsed.database.url);
            prop_assert_eq!(config.fixtures.path, parsed.fixtures.path);
            prop_assert_eq!(config.fixtures.load_on_start, parsed.fixtures.load_on_start);
        }

        /// Wrongly typed or malformed documents are rejected with a parse error.
        #[test]
        fn malformed_config_is_rejected(yaml in malformed_yaml_strategy()) {
            let mut file = NamedTempFile::new().expect("Failed to create temp file");
            write!(file, "{}", yaml).expect("Failed to write config");

            let result = Config::load(file.path());
            prop_assert!(result.is_err());
            let message = result.unwrap_err().to_string();
            prop_assert!(message.contains("Failed to parse config file"));
        }
    }
}
