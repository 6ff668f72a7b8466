//! Genome collaborators of the class model
//!
//! A genome is one training or query example reduced to its k-mer counts. The
//! class model only reads the counts during training; scoring runs the other
//! way round, with the genome pulling parameters out of a class through
//! `ClassParameters`.

use ahash::AHashMap;
use std::hash::Hash;
use std::path::Path;
use std::str::FromStr;

use crate::core::errors::{ClassModelError, Result};
use crate::core::log_space::log_add_pair;

/// Read-only view of one class's trained Naive Bayes parameters
pub trait ClassParameters<K> {
    fn class_id(&self) -> &str;

    /// Log of the number of genomes in the class.
    fn genome_count_log(&self) -> Result<f64>;

    /// Log of the smoothed total of all feature counts.
    fn feature_total_log(&self) -> Result<f64>;

    /// Log of the count for `feature`; `-inf` when never observed.
    fn feature_count_log(&self, feature: &K) -> Result<f64>;

    fn feature_exists(&self, feature: &K) -> Result<bool>;
}

/// One example consumed by training and scored against classes
pub trait Genome<K> {
    /// Observed count for each feature.
    fn kmer_counts(&self) -> &AHashMap<K, u64>;

    /// Total number of observed features.
    fn total_count(&self) -> u64;

    /// Compute (and remember) this genome's classification numerator for `class`.
    fn compute_classification_numerator(
        &mut self,
        class: &dyn ClassParameters<K>,
    ) -> Result<f64>;

    /// Release the per-feature data once training has consumed it.
    fn unload(&mut self);
}

/// Genome backed by a precomputed feature -> count table
#[derive(Debug, Clone)]
pub struct KmerCountGenome<K> {
    id: String,
    counts: AHashMap<K, u64>,
    total: u64,
    loaded: bool,
    numerators: AHashMap<String, f64>,
}

impl<K: Eq + Hash> KmerCountGenome<K> {
    /// Build from `(feature, count)` pairs; repeated features are summed.
    ///
    /// Sums clamp at `u64::MAX`.
    pub fn from_counts<I>(id: impl Into<String>, counts: I) -> Self
    where
        I: IntoIterator<Item = (K, u64)>,
    {
        let mut table = AHashMap::new();
        let mut total = 0u64;
        for (feature, count) in counts {
            let entry = table.entry(feature).or_insert(0u64);
            *entry = entry.saturating_add(count);
            total = total.saturating_add(count);
        }

        Self {
            id: id.into(),
            counts: table,
            total,
            loaded: true,
            numerators: AHashMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Numerator previously computed against `class_id`.
    pub fn numerator(&self, class_id: &str) -> Option<f64> {
        self.numerators.get(class_id).copied()
    }

    pub fn numerators(&self) -> &AHashMap<String, f64> {
        &self.numerators
    }
}

impl<K: Eq + Hash + FromStr> KmerCountGenome<K> {
    /// Parse a count table: one `<feature> <count>` pair per line, `#` comments.
    pub fn from_counts_text(id: impl Into<String>, text: &str) -> Result<Self> {
        let mut pairs = Vec::new();

        for (line_no, line) in text.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let mut fields = line.split_whitespace();
            let (Some(feature), Some(count), None) = (fields.next(), fields.next(), fields.next())
            else {
                return Err(ClassModelError::format(format!(
                    "line {}: expected '<feature> <count>', found '{}'",
                    line_no + 1,
                    line
                )));
            };

            let feature = feature.parse::<K>().map_err(|_| {
                ClassModelError::format(format!(
                    "line {}: invalid feature key '{}'",
                    line_no + 1,
                    feature
                ))
            })?;
            let count = count.parse::<u64>().map_err(|_| {
                ClassModelError::format(format!("line {}: invalid count '{}'", line_no + 1, count))
            })?;

            pairs.push((feature, count));
        }

        Ok(Self::from_counts(id, pairs))
    }

    pub fn from_counts_file<P: AsRef<Path>>(id: impl Into<String>, path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ClassModelError::io(path, &e))?;
        let genome = Self::from_counts_text(id, &text)?;

        tracing::debug!(
            "Read {} distinct k-mers ({} total) for genome '{}' from {}",
            genome.counts.len(),
            genome.total,
            genome.id,
            path.display()
        );

        Ok(genome)
    }
}

impl<K: Eq + Hash> Genome<K> for KmerCountGenome<K> {
    fn kmer_counts(&self) -> &AHashMap<K, u64> {
        &self.counts
    }

    fn total_count(&self) -> u64 {
        self.total
    }

    fn compute_classification_numerator(
        &mut self,
        class: &dyn ClassParameters<K>,
    ) -> Result<f64> {
        if !self.loaded {
            return Err(ClassModelError::lifecycle("compute_classification_numerator"));
        }

        let feature_total_lg = class.feature_total_log()?;
        let mut numerator = class.genome_count_log()?;

        for (feature, &count) in &self.counts {
            // Laplace smoothing: every feature carries one pseudocount
            let smoothed_lg = log_add_pair(class.feature_count_log(feature)?, 0.0);
            numerator += count as f64 * (smoothed_lg - feature_total_lg);
        }

        self.numerators.insert(class.class_id().to_string(), numerator);
        Ok(numerator)
    }

    fn unload(&mut self) {
        self.counts = AHashMap::new();
        self.loaded = false;
    }
}
