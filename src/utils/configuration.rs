use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::ml::MAX_KMER_SIZE;

/// Environment variable prefix, e.g. `NBCLASS__MODEL__KMER_SIZE=4`
pub const ENV_PREFIX: &str = "NBCLASS";

/// Configuration for class model storage and logging
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ClassifierConfig {
    /// Class model settings
    pub model: ModelConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// K-mer size the class savefiles were trained with
    pub kmer_size: usize,
    /// Directory holding one savefile per class
    pub model_dir: PathBuf,
    /// Savefile extension (without the dot)
    pub savefile_extension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log output format (pretty, compact)
    pub format: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kmer_size: 4, // Tetranucleotide frequencies
            model_dir: PathBuf::from("models"),
            savefile_extension: "nb".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Validation error: {field} is invalid: {reason}")]
    ValidationError { field: String, reason: String },
}

impl From<ConfigError> for ConfigurationError {
    fn from(err: ConfigError) -> Self {
        ConfigurationError::ConfigurationError {
            message: err.to_string(),
        }
    }
}

/// Configuration manager layering defaults, an optional file and the environment
pub struct ConfigurationManager {
    config: ClassifierConfig,
    config_path: Option<PathBuf>,
}

impl ConfigurationManager {
    /// Built-in defaults only
    pub fn new_with_defaults() -> Self {
        Self {
            config: ClassifierConfig::default(),
            config_path: None,
        }
    }

    /// Load defaults, then `config_path` (if given), then `NBCLASS__*` variables
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let defaults = Config::try_from(&ClassifierConfig::default())?;
        let mut builder = Config::builder().add_source(defaults);

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: ClassifierConfig = builder.build()?.try_deserialize()?;
        let manager = Self {
            config,
            config_path: config_path.map(Path::to_path_buf),
        };
        manager.validate_configuration()?;

        debug!("Configuration loaded: {:?}", manager.config);
        Ok(manager)
    }

    /// Load configuration from a specific TOML file
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigurationError> {
        Self::load(Some(config_path.as_ref()))
    }

    /// Validate configuration parameters
    fn validate_configuration(&self) -> Result<(), ConfigurationError> {
        if self.config.model.kmer_size > MAX_KMER_SIZE {
            return Err(ConfigurationError::ValidationError {
                field: "model.kmer_size".to_string(),
                reason: format!("must be at most {}", MAX_KMER_SIZE),
            });
        }

        if self.config.model.savefile_extension.is_empty() {
            return Err(ConfigurationError::ValidationError {
                field: "model.savefile_extension".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        if !matches!(self.config.logging.format.as_str(), "pretty" | "compact") {
            return Err(ConfigurationError::ValidationError {
                field: "logging.format".to_string(),
                reason: format!("unknown format '{}'", self.config.logging.format),
            });
        }

        Ok(())
    }

    /// Get configuration reference
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Savefile location for a class: `<model_dir>/<class_id>.<extension>`
    pub fn savefile_for(&self, class_id: &str) -> PathBuf {
        self.config
            .model
            .model_dir
            .join(format!("{}.{}", class_id, self.config.model.savefile_extension))
    }

    /// Setup logging based on configuration; `verbose` forces debug level
    pub fn setup_logging(&self, verbose: bool) {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Check if global subscriber is already set
        if tracing::dispatcher::has_been_set() {
            debug!("Logging already initialized, skipping setup");
            return;
        }

        let level = if verbose {
            "debug"
        } else {
            self.config.logging.level.as_str()
        };
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        let subscriber = tracing_subscriber::registry().with(env_filter);

        match self.config.logging.format.as_str() {
            "compact" => {
                let _ = tracing::subscriber::set_global_default(
                    subscriber.with(fmt::layer().compact()),
                );
            }
            _ => {
                let layer = fmt::layer().without_time().with_target(false);
                let _ = tracing::subscriber::set_global_default(subscriber.with(layer));
            }
        }

        info!("Logging initialized at level {}", level);
    }
}
