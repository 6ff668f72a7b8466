//! # nb-kmer-class - Naive Bayes class parameters over k-mer frequencies
//!
//! Maintains the trained statistics of one class in a multi-class Naive Bayes
//! classifier. Counts are accumulated linearly during training and folded into
//! log space on demand; the consolidated values are persisted in a bit-exact
//! text format.

pub mod core;
pub mod ml;
pub mod utils;

// Re-export commonly used types at crate level
pub use crate::core::{log_add, ClassModelError};
pub use crate::ml::{Assignment, ClassModel, ClassParameters, Genome, KmerCountGenome};

/// Result type used by the outer layers (CLI, configuration)
pub type Result<T> = anyhow::Result<T>;
