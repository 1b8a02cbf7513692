//! services/wizard/src/config.rs
//!
//! Defines the wizard's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use skilllens_core::validation::{UploadPolicy, DEFAULT_MAX_FILE_SIZE};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where uploaded files are kept by the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Local {
        base_path: PathBuf,
    },
    Azure {
        connection_string: String,
        container_name: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Language {
    Es,
    Ca,
    En,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: String,
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub max_file_size: u64,
    pub allowed_extensions: Vec<String>,
    pub storage: StorageBackend,
    pub default_language: Language,
    pub default_theme: Theme,
    pub poll_interval: Duration,
    pub processing_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // --- Pipeline API ---
        let api_base_url = var_or("API_BASE_URL", "http://localhost:3001/api")
            .trim_end_matches('/')
            .to_string();
        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "API_BASE_URL".to_string(),
                format!("'{}' is not an http(s) URL", api_base_url),
            ));
        }

        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:3001");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Upload Rules ---
        let max_file_size = parse_number(
            "MAX_FILE_SIZE",
            &var_or("MAX_FILE_SIZE", &DEFAULT_MAX_FILE_SIZE.to_string()),
        )?;
        if max_file_size == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_FILE_SIZE".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let allowed_extensions: Vec<String> = var_or("ALLOWED_FILE_TYPES", "pdf")
            .split(',')
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        if allowed_extensions.is_empty() {
            return Err(ConfigError::InvalidValue(
                "ALLOWED_FILE_TYPES".to_string(),
                "at least one extension is required".to_string(),
            ));
        }

        // --- Storage ---
        let storage = match var_or("STORAGE_TYPE", "local").to_lowercase().as_str() {
            "local" => StorageBackend::Local {
                base_path: PathBuf::from(var_or("STORAGE_PATH", "./uploads")),
            },
            "azure" => StorageBackend::Azure {
                connection_string: lookup("AZURE_STORAGE_CONNECTION_STRING").ok_or_else(|| {
                    ConfigError::MissingVar("AZURE_STORAGE_CONNECTION_STRING".to_string())
                })?,
                container_name: lookup("AZURE_STORAGE_CONTAINER").ok_or_else(|| {
                    ConfigError::MissingVar("AZURE_STORAGE_CONTAINER".to_string())
                })?,
            },
            other => {
                return Err(ConfigError::InvalidValue(
                    "STORAGE_TYPE".to_string(),
                    format!("'{}' is not one of local, azure", other),
                ))
            }
        };

        // --- UI Defaults ---
        let default_language = match var_or("DEFAULT_LANGUAGE", "es").to_lowercase().as_str() {
            "es" => Language::Es,
            "ca" => Language::Ca,
            "en" => Language::En,
            other => {
                return Err(ConfigError::InvalidValue(
                    "DEFAULT_LANGUAGE".to_string(),
                    format!("'{}' is not one of es, ca, en", other),
                ))
            }
        };
        let default_theme = match var_or("DEFAULT_THEME", "light").to_lowercase().as_str() {
            "light" => Theme::Light,
            "dark" => Theme::Dark,
            other => {
                return Err(ConfigError::InvalidValue(
                    "DEFAULT_THEME".to_string(),
                    format!("'{}' is not one of light, dark", other),
                ))
            }
        };

        // --- Processing ---
        let poll_interval = Duration::from_millis(parse_number(
            "POLL_INTERVAL_MS",
            &var_or("POLL_INTERVAL_MS", "1000"),
        )?);
        let processing_timeout = Duration::from_secs(parse_number(
            "PROCESSING_TIMEOUT_SECS",
            &var_or("PROCESSING_TIMEOUT_SECS", "300"),
        )?);

        Ok(Self {
            api_base_url,
            bind_address,
            log_level,
            max_file_size,
            allowed_extensions,
            storage,
            default_language,
            default_theme,
            poll_interval,
            processing_timeout,
        })
    }

    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy::new(self.max_file_size, self.allowed_extensions.clone())
    }
}

fn parse_number(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse::<u64>().map_err(|e| {
        ConfigError::InvalidValue(key.to_string(), format!("'{}': {}", raw, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_source(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.api_base_url, "http://localhost:3001/api");
        assert_eq!(config.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.allowed_extensions, vec!["pdf"]);
        assert_eq!(
            config.storage,
            StorageBackend::Local {
                base_path: PathBuf::from("./uploads")
            }
        );
        assert_eq!(config.default_language, Language::Es);
        assert_eq!(config.default_theme, Theme::Light);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.processing_timeout, Duration::from_secs(300));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            ("API_BASE_URL", "https://skilllens.example/api/"),
            ("MAX_FILE_SIZE", "2048"),
            ("ALLOWED_FILE_TYPES", "PDF, .docx"),
            ("DEFAULT_LANGUAGE", "en"),
            ("DEFAULT_THEME", "dark"),
            ("POLL_INTERVAL_MS", "250"),
        ])
        .unwrap();
        assert_eq!(config.api_base_url, "https://skilllens.example/api");
        assert_eq!(config.upload_policy().max_file_size, 2048);
        assert_eq!(config.allowed_extensions, vec!["pdf", "docx"]);
        assert_eq!(config.default_language, Language::En);
        assert_eq!(config.default_theme, Theme::Dark);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn azure_storage_requires_connection_details() {
        let err = config_from(&[("STORAGE_TYPE", "azure")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref v) if v == "AZURE_STORAGE_CONNECTION_STRING"));

        let config = config_from(&[
            ("STORAGE_TYPE", "azure"),
            ("AZURE_STORAGE_CONNECTION_STRING", "UseDevelopmentStorage=true"),
            ("AZURE_STORAGE_CONTAINER", "cvs"),
        ])
        .unwrap();
        assert!(matches!(config.storage, StorageBackend::Azure { .. }));
    }

    #[test]
    fn invalid_values_are_reported_by_name() {
        let err = config_from(&[("MAX_FILE_SIZE", "ten")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref v, _) if v == "MAX_FILE_SIZE"));
        let err = config_from(&[("API_BASE_URL", "localhost:3001")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref v, _) if v == "API_BASE_URL"));
    }
}
