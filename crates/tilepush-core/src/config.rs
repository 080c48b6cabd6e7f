//! Configuration module
//!
//! Settings come from the environment (after loading `.env`); the CLI layers
//! its flags on top and calls `validate` before any work starts.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

// Common constants
const DEFAULT_API_URL: &str = "https://api.cesium.com";
const DEFAULT_CONCURRENCY: usize = 5;
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_FILE_EXTENSION: &str = "gml";
const DEFAULT_OUTPUT_DIR: &str = "converted";
const HTTP_TIMEOUT_SECS: u64 = 30;
const PROCESSING_POLL_INTERVAL_SECS: u64 = 10;
const PROCESSING_TIMEOUT_SECS: u64 = 900;
const ARCHIVE_POLL_INTERVAL_SECS: u64 = 5;
const ARCHIVE_TIMEOUT_SECS: u64 = 300;

/// Uploader configuration
#[derive(Clone, Debug)]
pub struct UploaderConfig {
    pub api_url: String,
    pub access_token: String,
    pub concurrency: usize,
    pub data_dir: PathBuf,
    pub file_extension: String,
    pub output_dir: PathBuf,
    pub http_timeout_secs: u64,
    // Workflow toggles
    pub wait_for_completion: bool,
    pub create_archive: bool,
    pub download_archive: bool,
    // Polling
    pub processing_poll_interval_secs: u64,
    pub processing_timeout_secs: u64,
    pub archive_poll_interval_secs: u64,
    pub archive_timeout_secs: u64,
}

fn parse_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        _ => Ok(default),
    }
}

fn parse_flag(key: &'static str) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(value) => match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "" | "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value }),
        },
        Err(_) => Ok(false),
    }
}

impl UploaderConfig {
    /// Load configuration from the process environment. The access token is
    /// required. Callers load any `.env` file beforehand.
    pub fn from_env() -> Result<Self, ConfigError> {
        let access_token = env::var("CESIUM_ION_TOKEN")
            .or_else(|_| env::var("ION_ACCESS_TOKEN"))
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("CESIUM_ION_TOKEN"))?;

        let config = UploaderConfig {
            api_url: env::var("CESIUM_ION_API_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            access_token,
            concurrency: parse_or("UPLOAD_CONCURRENCY", DEFAULT_CONCURRENCY)?,
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR)),
            file_extension: env::var("FILE_EXTENSION")
                .unwrap_or_else(|_| DEFAULT_FILE_EXTENSION.to_string())
                .trim_start_matches('.')
                .to_lowercase(),
            output_dir: env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            http_timeout_secs: parse_or("HTTP_TIMEOUT_SECS", HTTP_TIMEOUT_SECS)?,
            wait_for_completion: parse_flag("WAIT_FOR_COMPLETION")?,
            create_archive: parse_flag("CREATE_ARCHIVE")?,
            download_archive: parse_flag("DOWNLOAD_ARCHIVE")?,
            processing_poll_interval_secs: parse_or(
                "PROCESSING_POLL_INTERVAL_SECS",
                PROCESSING_POLL_INTERVAL_SECS,
            )?,
            processing_timeout_secs: parse_or("PROCESSING_TIMEOUT_SECS", PROCESSING_TIMEOUT_SECS)?,
            archive_poll_interval_secs: parse_or(
                "ARCHIVE_POLL_INTERVAL_SECS",
                ARCHIVE_POLL_INTERVAL_SECS,
            )?,
            archive_timeout_secs: parse_or("ARCHIVE_TIMEOUT_SECS", ARCHIVE_TIMEOUT_SECS)?,
        };

        Ok(config)
    }

    /// Defaults with the given token; used by tests and as a base for overrides.
    pub fn with_token(access_token: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            access_token: access_token.into(),
            concurrency: DEFAULT_CONCURRENCY,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            file_extension: DEFAULT_FILE_EXTENSION.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            http_timeout_secs: HTTP_TIMEOUT_SECS,
            wait_for_completion: false,
            create_archive: false,
            download_archive: false,
            processing_poll_interval_secs: PROCESSING_POLL_INTERVAL_SECS,
            processing_timeout_secs: PROCESSING_TIMEOUT_SECS,
            archive_poll_interval_secs: ARCHIVE_POLL_INTERVAL_SECS,
            archive_timeout_secs: ARCHIVE_TIMEOUT_SECS,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_token.trim().is_empty() {
            return Err(ConfigError::Missing("CESIUM_ION_TOKEN"));
        }

        if self.concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "UPLOAD_CONCURRENCY",
                value: "0".to_string(),
            });
        }

        for (key, value) in [
            ("HTTP_TIMEOUT_SECS", self.http_timeout_secs),
            (
                "PROCESSING_POLL_INTERVAL_SECS",
                self.processing_poll_interval_secs,
            ),
            ("PROCESSING_TIMEOUT_SECS", self.processing_timeout_secs),
            ("ARCHIVE_POLL_INTERVAL_SECS", self.archive_poll_interval_secs),
            ("ARCHIVE_TIMEOUT_SECS", self.archive_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    key,
                    value: value.to_string(),
                });
            }
        }

        if self.create_archive && !self.wait_for_completion {
            return Err(ConfigError::Conflict(
                "creating an archive requires waiting for processing to complete".to_string(),
            ));
        }

        if self.download_archive && !self.create_archive {
            return Err(ConfigError::Conflict(
                "downloading an archive requires creating one".to_string(),
            ));
        }

        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn processing_poll_interval(&self) -> Duration {
        Duration::from_secs(self.processing_poll_interval_secs)
    }

    pub fn processing_timeout(&self) -> Duration {
        Duration::from_secs(self.processing_timeout_secs)
    }

    pub fn archive_poll_interval(&self) -> Duration {
        Duration::from_secs(self.archive_poll_interval_secs)
    }

    pub fn archive_timeout(&self) -> Duration {
        Duration::from_secs(self.archive_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = UploaderConfig::with_token("token");
        assert!(config.validate().is_ok());
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.processing_timeout(), Duration::from_secs(900));
        assert_eq!(config.archive_poll_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_archive_without_wait_is_rejected() {
        let mut config = UploaderConfig::with_token("token");
        config.create_archive = true;
        assert!(matches!(config.validate(), Err(ConfigError::Conflict(_))));

        config.wait_for_completion = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_download_without_archive_is_rejected() {
        let mut config = UploaderConfig::with_token("token");
        config.wait_for_completion = true;
        config.download_archive = true;
        assert!(matches!(config.validate(), Err(ConfigError::Conflict(_))));
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let mut config = UploaderConfig::with_token("token");
        config.concurrency = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                key: "UPLOAD_CONCURRENCY",
                ..
            })
        ));
    }

    #[test]
    fn test_blank_token_is_missing() {
        let config = UploaderConfig::with_token("  ");
        assert!(matches!(config.validate(), Err(ConfigError::Missing(_))));
    }

    // The only test in this crate that touches the process environment.
    #[test]
    fn test_from_env_reads_process_environment() {
        env::remove_var("CESIUM_ION_TOKEN");
        env::set_var("ION_ACCESS_TOKEN", "fallback-token");
        env::set_var("UPLOAD_CONCURRENCY", "7");
        env::set_var("WAIT_FOR_COMPLETION", "yes");

        let config = UploaderConfig::from_env().unwrap();
        assert_eq!(config.access_token, "fallback-token");
        assert_eq!(config.concurrency, 7);
        assert!(config.wait_for_completion);

        env::set_var("UPLOAD_CONCURRENCY", "many");
        assert!(matches!(
            UploaderConfig::from_env(),
            Err(ConfigError::Invalid {
                key: "UPLOAD_CONCURRENCY",
                ..
            })
        ));

        env::remove_var("ION_ACCESS_TOKEN");
        env::remove_var("UPLOAD_CONCURRENCY");
        env::remove_var("WAIT_FOR_COMPLETION");
        assert!(matches!(
            UploaderConfig::from_env(),
            Err(ConfigError::Missing("CESIUM_ION_TOKEN"))
        ));
    }
}
