//! Configuration for the forecast pipeline.
//!
//! The working directory, feed endpoint and external producer commands are
//! resolved once at startup and passed explicitly into the registry,
//! controller and index builder, so tests can point everything at temporary
//! directories.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// External commands implementing the six stage producers.
///
/// Each command is invoked with the run identifier appended, plus
/// `--overwrite` when regeneration is forced.
#[derive(Debug, Clone)]
pub struct ProducerCommands {
    pub download: String,
    pub track_analysis: String,
    pub wind_fields: String,
    pub impacts: String,
    pub impact_analysis: String,
    pub report: String,
}

impl Default for ProducerCommands {
    fn default() -> Self {
        Self {
            download: "forecast-download".to_string(),
            track_analysis: "forecast-analyse-tracks".to_string(),
            wind_fields: "forecast-windfields".to_string(),
            impacts: "forecast-impacts".to_string(),
            impact_analysis: "forecast-analyse-impacts".to_string(),
            report: "forecast-report".to_string(),
        }
    }
}

impl ProducerCommands {
    /// Commands in pipeline order, paired with a label for diagnostics.
    fn entries(&self) -> [(&'static str, &str); 6] {
        [
            ("download", &self.download),
            ("track_analysis", &self.track_analysis),
            ("wind_fields", &self.wind_fields),
            ("impacts", &self.impacts),
            ("impact_analysis", &self.impact_analysis),
            ("report", &self.report),
        ]
    }
}

/// Configuration for the pipeline controller and its collaborators.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the per-run directory tree.
    pub working_dir: PathBuf,
    /// Listing endpoint of the remote forecast feed.
    pub feed_url: String,
    /// Timeout for feed requests.
    pub feed_timeout: Duration,
    /// Document converter binary used for the index page.
    pub pandoc_bin: String,
    /// External stage producer commands.
    pub producers: ProducerCommands,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("./forecasts"),
            feed_url: "https://essential.ecmwf.int/tc/bufr/".to_string(),
            feed_timeout: Duration::from_secs(30),
            pandoc_bin: "pandoc".to_string(),
            producers: ProducerCommands::default(),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `STORMPIPE_WORKING_DIR`: root of the run directory tree (default: ./forecasts)
    /// - `STORMPIPE_FEED_URL`: remote feed listing endpoint
    /// - `STORMPIPE_FEED_TIMEOUT_SECS`: feed request timeout (default: 30)
    /// - `STORMPIPE_PANDOC_BIN`: document converter binary (default: pandoc)
    /// - `STORMPIPE_DOWNLOAD_CMD`, `STORMPIPE_TRACK_ANALYSIS_CMD`,
    ///   `STORMPIPE_WIND_FIELDS_CMD`, `STORMPIPE_IMPACTS_CMD`,
    ///   `STORMPIPE_IMPACT_ANALYSIS_CMD`, `STORMPIPE_REPORT_CMD`:
    ///   stage producer commands
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a value cannot be parsed or validation fails.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("STORMPIPE_WORKING_DIR") {
            config.working_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("STORMPIPE_FEED_URL") {
            config.feed_url = val;
        }

        if let Ok(val) = std::env::var("STORMPIPE_FEED_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "STORMPIPE_FEED_TIMEOUT_SECS")?;
            config.feed_timeout = Duration::from_secs(secs);
        }

        if let Ok(val) = std::env::var("STORMPIPE_PANDOC_BIN") {
            config.pandoc_bin = val;
        }

        if let Ok(val) = std::env::var("STORMPIPE_DOWNLOAD_CMD") {
            config.producers.download = val;
        }

        if let Ok(val) = std::env::var("STORMPIPE_TRACK_ANALYSIS_CMD") {
            config.producers.track_analysis = val;
        }

        if let Ok(val) = std::env::var("STORMPIPE_WIND_FIELDS_CMD") {
            config.producers.wind_fields = val;
        }

        if let Ok(val) = std::env::var("STORMPIPE_IMPACTS_CMD") {
            config.producers.impacts = val;
        }

        if let Ok(val) = std::env::var("STORMPIPE_IMPACT_ANALYSIS_CMD") {
            config.producers.impact_analysis = val;
        }

        if let Ok(val) = std::env::var("STORMPIPE_REPORT_CMD") {
            config.producers.report = val;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.working_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "working_dir cannot be empty".to_string(),
            ));
        }

        if self.feed_url.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "feed_url cannot be empty".to_string(),
            ));
        }

        if self.feed_timeout.as_secs() == 0 {
            return Err(ConfigError::ValidationFailed(
                "feed_timeout must be greater than 0".to_string(),
            ));
        }

        if self.pandoc_bin.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "pandoc_bin cannot be empty".to_string(),
            ));
        }

        for (stage, command) in self.producers.entries() {
            if command.trim().is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "producer command for {stage} cannot be empty"
                )));
            }
        }

        Ok(())
    }

    /// Builder method to set the working directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Builder method to set the feed URL.
    pub fn with_feed_url(mut self, url: impl Into<String>) -> Self {
        self.feed_url = url.into();
        self
    }

    /// Builder method to set the feed timeout.
    pub fn with_feed_timeout(mut self, timeout: Duration) -> Self {
        self.feed_timeout = timeout;
        self
    }

    /// Builder method to set the document converter binary.
    pub fn with_pandoc_bin(mut self, bin: impl Into<String>) -> Self {
        self.pandoc_bin = bin.into();
        self
    }

    /// Builder method to set the producer commands.
    pub fn with_producers(mut self, producers: ProducerCommands) -> Self {
        self.producers = producers;
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}
