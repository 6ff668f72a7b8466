//! Trained Naive Bayes parameters for a single class
//!
//! A `ClassModel` accumulates k-mer counts from the genomes labelled with its
//! class. Hard-assigned genomes only bump linear counters; the logarithms the
//! classifier needs are computed lazily the first time they are read after an
//! update. All counters live in a loaded state that exists between `load()` and
//! `unload()`, and is persisted with the bit-exact format in `savefile`.

use ahash::AHashMap;
use std::collections::VecDeque;
use std::fmt::Display;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::core::errors::{ClassModelError, Result};
use crate::core::log_space::DualCounter;
use crate::ml::genome::{ClassParameters, Genome};
use crate::ml::savefile::{self, SavedState};

/// Largest k-mer size whose smoothing baseline 4^k fits in a `u64`
pub const MAX_KMER_SIZE: usize = 31;

/// How a genome contributes to the class counters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Assignment {
    /// Count the genome exactly once.
    Hard,
    /// Fractional membership given as a log-probability, e.g. from an EM step.
    Weighted { confidence_lg: f64 },
}

/// Counters that exist only while the model is loaded
#[derive(Debug, Clone)]
struct LoadedState<K> {
    genome_count: DualCounter,
    feature_total: DualCounter,
    features: AHashMap<K, DualCounter>,
}

impl<K: Eq + Hash + Clone> LoadedState<K> {
    fn baseline(sumfreq_baseline: u64) -> Self {
        Self {
            genome_count: DualCounter::new(),
            feature_total: DualCounter::with_raw(sumfreq_baseline),
            features: AHashMap::new(),
        }
    }

    fn from_saved(saved: SavedState<K>) -> Self {
        Self {
            genome_count: DualCounter::restored(saved.genome_count_log),
            feature_total: DualCounter::restored(saved.feature_total_log),
            features: saved
                .features
                .into_iter()
                .map(|(key, log_value)| (key, DualCounter::restored(log_value)))
                .collect(),
        }
    }

    fn train<G: Genome<K>>(&mut self, genome: &G, assignment: Assignment) {
        let mut sum = 0u64;

        match assignment {
            Assignment::Hard => {
                self.genome_count.add_raw(1);
                for (feature, &count) in genome.kmer_counts() {
                    sum = sum.saturating_add(count);
                    self.features
                        .entry(feature.clone())
                        .or_default()
                        .add_raw(count);
                }
                self.feature_total.add_raw(sum);
            }
            Assignment::Weighted { confidence_lg } => {
                self.genome_count.fold_log(confidence_lg + 1.0_f64.ln());
                for (feature, &count) in genome.kmer_counts() {
                    sum = sum.saturating_add(count);
                    self.features
                        .entry(feature.clone())
                        .or_default()
                        .fold_log(confidence_lg + (count as f64).ln());
                }
                self.feature_total.fold_log(confidence_lg + (sum as f64).ln());
            }
        }
    }
}

/// Per-class Naive Bayes model over k-mer feature keys `K`, trained on genomes `G`
pub struct ClassModel<K, G> {
    id: String,
    kmer_size: usize,
    savefile: PathBuf,
    state: Option<LoadedState<K>>,
    trained_genomes: Vec<G>,
    pending_queue: VecDeque<G>,
}

impl<K, G> ClassModel<K, G>
where
    K: Eq + Hash + Clone + Display + FromStr,
    G: Genome<K>,
{
    /// Create an unloaded model. `kmer_size` only fixes the smoothing baseline.
    pub fn new(
        id: impl Into<String>,
        kmer_size: usize,
        savefile: impl Into<PathBuf>,
    ) -> Result<Self> {
        if kmer_size > MAX_KMER_SIZE {
            return Err(ClassModelError::InvalidKmerSize { kmer_size });
        }

        Ok(Self {
            id: id.into(),
            kmer_size,
            savefile: savefile.into(),
            state: None,
            trained_genomes: Vec::new(),
            pending_queue: VecDeque::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kmer_size(&self) -> usize {
        self.kmer_size
    }

    pub fn savefile_path(&self) -> &Path {
        &self.savefile
    }

    pub fn is_loaded(&self) -> bool {
        self.state.is_some()
    }

    /// One pseudocount for every possible k-mer: 4^k.
    pub fn smoothing_baseline(&self) -> u64 {
        1u64 << (2 * self.kmer_size)
    }

    pub fn trained_genomes(&self) -> &[G] {
        &self.trained_genomes
    }

    pub fn queued_genomes(&self) -> usize {
        self.pending_queue.len()
    }

    fn loaded_state(&self, operation: &'static str) -> Result<&LoadedState<K>> {
        self.state
            .as_ref()
            .ok_or(ClassModelError::LifecycleError { operation })
    }

    fn loaded_state_mut(&mut self, operation: &'static str) -> Result<&mut LoadedState<K>> {
        self.state
            .as_mut()
            .ok_or(ClassModelError::LifecycleError { operation })
    }

    // Training

    /// Train on `genome` and take ownership of it.
    pub fn add_genome(&mut self, genome: G, assignment: Assignment) -> Result<()> {
        self.loaded_state_mut("add_genome")?.train(&genome, assignment);
        self.trained_genomes.push(genome);
        Ok(())
    }

    /// Queue a genome for hard training by `add_genomes_in_queue`.
    pub fn queue_genome(&mut self, genome: G) {
        self.pending_queue.push_back(genome);
    }

    /// Hard-train every queued genome in FIFO order, unloading each one after use.
    pub fn add_genomes_in_queue(&mut self) -> Result<usize> {
        let state = self
            .state
            .as_mut()
            .ok_or(ClassModelError::lifecycle("add_genomes_in_queue"))?;

        let mut drained = 0;
        while let Some(mut genome) = self.pending_queue.pop_front() {
            state.train(&genome, Assignment::Hard);
            genome.unload();
            self.trained_genomes.push(genome);
            drained += 1;
        }

        debug!(
            "Class '{}' trained on {} queued genomes ({} features)",
            self.id,
            drained,
            state.features.len()
        );
        Ok(drained)
    }

    // Read accessors

    /// Log of the number of genomes in this class.
    pub fn genome_count_log(&self) -> Result<f64> {
        Ok(self.loaded_state("genome_count_log")?.genome_count.log_value())
    }

    /// Log of the smoothed total feature count.
    pub fn feature_total_log(&self) -> Result<f64> {
        Ok(self
            .loaded_state("feature_total_log")?
            .feature_total
            .log_value())
    }

    /// Log of the count for `feature`, or `-inf` if it was never observed.
    pub fn feature_count_log(&self, feature: &K) -> Result<f64> {
        Ok(self
            .loaded_state("feature_count_log")?
            .features
            .get(feature)
            .map_or(f64::NEG_INFINITY, DualCounter::log_value))
    }

    pub fn feature_exists(&self, feature: &K) -> Result<bool> {
        Ok(self
            .loaded_state("feature_exists")?
            .features
            .contains_key(feature))
    }

    /// Number of distinct features in the table.
    pub fn feature_count(&self) -> Result<usize> {
        Ok(self.loaded_state("feature_count")?.features.len())
    }

    /// Let each genome compute its numerator against this class.
    pub fn compute_batch_numerators<S: Genome<K>>(&self, genomes: &mut [S]) -> Result<()> {
        self.loaded_state("compute_batch_numerators")?;
        for genome in genomes.iter_mut() {
            genome.compute_classification_numerator(self)?;
        }
        Ok(())
    }

    // Persistence

    /// Consolidate every counter and render the savefile line.
    pub fn to_text(&self) -> Result<String> {
        let state = self.loaded_state("to_text")?;
        let genome_count_log = state.genome_count.log_value();
        let feature_total_log = state.feature_total.log_value();

        Ok(savefile::encode(
            genome_count_log,
            feature_total_log,
            state
                .features
                .iter()
                .map(|(key, counter)| (key, counter.log_value())),
        ))
    }

    /// Replace the counters with parsed savefile contents, leaving the model loaded.
    ///
    /// On error the model is left exactly as it was.
    pub fn from_text(&mut self, text: &str) -> Result<()> {
        let saved = savefile::decode::<K>(text)?;
        self.state = Some(LoadedState::from_saved(saved));
        Ok(())
    }

    /// Load from the model's own savefile.
    pub fn load(&mut self) -> Result<()> {
        let savefile = self.savefile.clone();
        self.load_from(&savefile)
    }

    /// Allocate the counters and restore them from `source` if it exists.
    ///
    /// No-op when already loaded. A missing file leaves only the baseline.
    pub fn load_from<P: AsRef<Path>>(&mut self, source: P) -> Result<()> {
        if self.is_loaded() {
            return Ok(());
        }
        let source = source.as_ref();

        match std::fs::read(source) {
            Ok(bytes) => {
                let text = String::from_utf8(bytes).map_err(|e| {
                    ClassModelError::format(format!("{}: {}", source.display(), e))
                })?;
                self.from_text(&text).map_err(|e| match e {
                    ClassModelError::FormatError { message } => ClassModelError::FormatError {
                        message: format!("{}: {}", source.display(), message),
                    },
                    other => other,
                })?;
                info!(
                    "Loaded class '{}' from {} ({} features)",
                    self.id,
                    source.display(),
                    self.state.as_ref().map_or(0, |s| s.features.len())
                );
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "No savefile for class '{}' at {}, starting from baseline",
                    self.id,
                    source.display()
                );
                self.state = Some(LoadedState::baseline(self.smoothing_baseline()));
            }
            Err(e) => return Err(ClassModelError::io(source, &e)),
        }

        Ok(())
    }

    /// Drop the counters. Safe to call repeatedly.
    pub fn unload(&mut self) {
        if self.state.take().is_some() {
            debug!("Unloaded class '{}'", self.id);
        }
    }

    /// Save to the model's own savefile.
    pub fn save(&self) -> Result<()> {
        self.save_to(&self.savefile)
    }

    /// Write the savefile through a sibling temporary file renamed into place.
    pub fn save_to<P: AsRef<Path>>(&self, destination: P) -> Result<()> {
        let destination = destination.as_ref();
        let text = self.to_text()?;

        let mut tmp_name = destination.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        std::fs::write(&tmp_path, text).map_err(|e| ClassModelError::io(&tmp_path, &e))?;
        if let Err(e) = std::fs::rename(&tmp_path, destination) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(ClassModelError::io(destination, &e));
        }

        info!("Saved class '{}' to {}", self.id, destination.display());
        Ok(())
    }
}

impl<K, G> ClassParameters<K> for ClassModel<K, G>
where
    K: Eq + Hash + Clone + Display + FromStr,
    G: Genome<K>,
{
    fn class_id(&self) -> &str {
        &self.id
    }

    fn genome_count_log(&self) -> Result<f64> {
        ClassModel::genome_count_log(self)
    }

    fn feature_total_log(&self) -> Result<f64> {
        ClassModel::feature_total_log(self)
    }

    fn feature_count_log(&self, feature: &K) -> Result<f64> {
        ClassModel::feature_count_log(self, feature)
    }

    fn feature_exists(&self, feature: &K) -> Result<bool> {
        ClassModel::feature_exists(self, feature)
    }
}
