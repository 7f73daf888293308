//! Configuration loading using Figment
//!
//! Configuration is loaded from:
//! 1. `config/vibrationview.toml` (or an explicit path)
//! 2. Environment variables prefixed with `VIBRATIONVIEW_`, sections separated
//!    by a double underscore (`VIBRATIONVIEW_CONNECTION__RETRY_ATTEMPTS=3`)
//!
//! Every field has a default, so a missing file yields the default configuration.
//!
//! # Example
//! ```no_run
//! use vibrationview::config::Config;
//!
//! let config = Config::load()?;
//! println!("ProgID: {}", config.connection.prog_id);
//! # Ok::<(), vibrationview::error::VvError>(())
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, VvError};
use crate::logging::{parse_log_level, OutputFormat};
use crate::session::{ConnectionSettings, RetryPolicy, DEFAULT_PROG_ID};
use crate::wait::WaitSettings;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/vibrationview.toml";

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "VIBRATIONVIEW_";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Automation server connection
    pub connection: ConnectionConfig,
    /// Status polling
    pub wait: WaitConfig,
    /// Test profile, input configuration and result locations
    pub paths: PathsConfig,
    /// Log output
    pub logging: LogConfig,
}

/// Connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// ProgID of the automation server
    #[serde(default = "default_prog_id")]
    pub prog_id: String,
    /// Readiness checks before giving up
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// First backoff delay in milliseconds, doubled after each failed check
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
}

/// Polling settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitConfig {
    /// Overall timeout in milliseconds
    #[serde(default = "default_wait_timeout")]
    pub timeout_ms: u64,
    /// Sleep between samples in milliseconds
    #[serde(default = "default_wait_interval")]
    pub interval_ms: u64,
}

/// Filesystem locations used by the harness
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding test profiles (.vsp/.vrp/.vkp/.vtp)
    #[serde(default = "default_profiles_dir")]
    pub profiles_dir: PathBuf,
    /// Directory result logs and saved data are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Directory holding input configuration files (.vic)
    #[serde(default = "default_input_config_dir")]
    pub input_config_dir: PathBuf,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_prog_id() -> String {
    DEFAULT_PROG_ID.to_string()
}

fn default_retry_attempts() -> u32 {
    5
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_wait_timeout() -> u64 {
    5000
}

fn default_wait_interval() -> u64 {
    100
}

fn default_profiles_dir() -> PathBuf {
    PathBuf::from(r"C:\VibrationVIEW\Profiles")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_input_config_dir() -> PathBuf {
    PathBuf::from(r"C:\VibrationVIEW\InputConfig")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            prog_id: default_prog_id(),
            retry_attempts: default_retry_attempts(),
            initial_backoff_ms: default_initial_backoff(),
        }
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_wait_timeout(),
            interval_ms: default_wait_interval(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            profiles_dir: default_profiles_dir(),
            output_dir: default_output_dir(),
            input_config_dir: default_input_config_dir(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from the default file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Config = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<()> {
        parse_log_level(&self.logging.level).map_err(VvError::Configuration)?;
        self.logging
            .format
            .parse::<OutputFormat>()
            .map_err(VvError::Configuration)?;

        if self.connection.prog_id.trim().is_empty() {
            return Err(VvError::Configuration("prog_id must not be empty".to_string()));
        }

        if self.connection.retry_attempts == 0 {
            return Err(VvError::Configuration(
                "retry_attempts must be at least 1".to_string(),
            ));
        }

        if self.wait.interval_ms == 0 {
            return Err(VvError::Configuration(
                "wait interval_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Session settings derived from `[connection]`.
    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            prog_id: self.connection.prog_id.clone(),
            retry: RetryPolicy {
                attempts: self.connection.retry_attempts,
                initial_backoff: Duration::from_millis(self.connection.initial_backoff_ms),
            },
        }
    }

    /// Polling settings derived from `[wait]`.
    pub fn wait_settings(&self) -> WaitSettings {
        WaitSettings {
            timeout: Duration::from_millis(self.wait.timeout_ms),
            interval: Duration::from_millis(self.wait.interval_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    #[serial]
    fn test_missing_file_yields_defaults() {
        let config = Config::load_from("does/not/exist.toml").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.connection.prog_id, "VibrationVIEW.TestControl");
        assert_eq!(config.connection_settings().retry, RetryPolicy::default());
        assert_eq!(config.wait_settings(), WaitSettings::default());
    }

    #[test]
    #[serial]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[connection]
retry_attempts = 3
initial_backoff_ms = 10

[paths]
profiles_dir = "fixtures"
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.connection.retry_attempts, 3);
        assert_eq!(config.connection.prog_id, DEFAULT_PROG_ID);
        assert_eq!(
            config.connection_settings().retry.initial_backoff,
            Duration::from_millis(10)
        );
        assert_eq!(config.paths.profiles_dir, PathBuf::from("fixtures"));
        assert_eq!(config.wait.timeout_ms, 5000);
    }

    #[test]
    #[serial]
    fn test_environment_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("vv.toml", "[wait]\ntimeout_ms = 2000\n")?;
            jail.set_env("VIBRATIONVIEW_WAIT__TIMEOUT_MS", "750");
            jail.set_env("VIBRATIONVIEW_LOGGING__LEVEL", "debug");

            let config = Config::load_from("vv.toml").map_err(|e| e.to_string())?;
            assert_eq!(config.wait.timeout_ms, 750);
            assert_eq!(config.logging.level, "debug");
            Ok(())
        });
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(matches!(config.validate(), Err(VvError::Configuration(_))));
    }

    #[test]
    fn test_invalid_format_and_attempts() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.connection.retry_attempts = 0;
        assert!(config.validate().is_err());
    }
}
