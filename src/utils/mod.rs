pub mod configuration;

pub use configuration::{ClassifierConfig, ConfigurationError, ConfigurationManager};
