use std::path::Path;
use thiserror::Error;

/// Errors raised by the class model and its collaborators
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassModelError {
    #[error("Format error: {message}")]
    FormatError { message: String },

    #[error("Lifecycle error: {operation} called while unloaded")]
    LifecycleError { operation: &'static str },

    #[error("Input/Output error on {path}: {message}")]
    IOError { path: String, message: String },

    #[error("Invalid k-mer size {kmer_size}: smoothing baseline 4^k must fit in 64 bits (k <= 31)")]
    InvalidKmerSize { kmer_size: usize },
}

impl ClassModelError {
    pub fn format(message: impl Into<String>) -> Self {
        ClassModelError::FormatError {
            message: message.into(),
        }
    }

    pub fn lifecycle(operation: &'static str) -> Self {
        ClassModelError::LifecycleError { operation }
    }

    pub fn io(path: &Path, err: &std::io::Error) -> Self {
        ClassModelError::IOError {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

/// Result type used by the class model core
pub type Result<T> = std::result::Result<T, ClassModelError>;
