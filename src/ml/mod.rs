pub mod class_model;
pub mod genome;
pub mod savefile;

// Re-export for convenience
pub use class_model::{Assignment, ClassModel, MAX_KMER_SIZE};
pub use genome::{ClassParameters, Genome, KmerCountGenome};
