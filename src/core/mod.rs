pub mod errors;
pub mod log_space;

// Re-export key types for the class model
pub use errors::{ClassModelError, Result};
pub use log_space::{log_add, log_add_pair, DualCounter};
