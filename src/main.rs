use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nb_kmer_class::utils::ConfigurationManager;
use nb_kmer_class::{ClassModel, KmerCountGenome};
use std::path::{Path, PathBuf};
use tracing::info;

type Model = ClassModel<u64, KmerCountGenome<u64>>;

/// Naive Bayes class parameters over k-mer counts
#[derive(Parser)]
#[command(name = "nbclass")]
#[command(about = "Train, inspect and score per-class k-mer Naive Bayes models")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a class on precomputed k-mer count tables and save it
    Train {
        /// Class identifier
        #[arg(long = "class")]
        class_id: String,

        /// Count tables, one `<kmer> <count>` pair per line
        #[arg(required = true)]
        counts: Vec<PathBuf>,
    },

    /// Print the parameters stored for a class
    Inspect {
        /// Class identifier
        #[arg(long = "class")]
        class_id: String,
    },

    /// Compute per-class numerators for one count table
    Score {
        /// Classes to score against
        #[arg(long = "class", required = true)]
        class_ids: Vec<String>,

        /// Count table of the query genome
        counts: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let manager = ConfigurationManager::load(cli.config.as_deref())
        .context("Failed to load configuration")?;
    manager.setup_logging(cli.verbose);

    match cli.command {
        Commands::Train { class_id, counts } => train(&manager, &class_id, &counts),
        Commands::Inspect { class_id } => inspect(&manager, &class_id),
        Commands::Score { class_ids, counts } => score(&manager, &class_ids, &counts),
    }
}

fn open_class(manager: &ConfigurationManager, class_id: &str) -> Result<Model> {
    let savefile = manager.savefile_for(class_id);
    let mut model = Model::new(class_id, manager.config().model.kmer_size, savefile)?;
    model
        .load()
        .with_context(|| format!("Failed to load class '{}'", class_id))?;
    Ok(model)
}

fn genome_id(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("genome")
        .to_string()
}

fn train(manager: &ConfigurationManager, class_id: &str, counts: &[PathBuf]) -> Result<()> {
    let mut model = open_class(manager, class_id)?;

    for path in counts {
        let genome = KmerCountGenome::from_counts_file(genome_id(path), path)
            .with_context(|| format!("Failed to read count table {}", path.display()))?;
        model.queue_genome(genome);
    }

    let trained = model.add_genomes_in_queue()?;
    if let Some(dir) = model.savefile_path().parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create model directory {}", dir.display()))?;
    }
    model.save()?;

    info!("Trained class '{}' on {} genomes", class_id, trained);
    println!("{} {} genomes -> {}", class_id, trained, model.savefile_path().display());
    Ok(())
}

fn inspect(manager: &ConfigurationManager, class_id: &str) -> Result<()> {
    let model = open_class(manager, class_id)?;

    let genome_count_log = model.genome_count_log()?;
    let feature_total_log = model.feature_total_log()?;

    println!("class:          {}", model.id());
    println!("savefile:       {}", model.savefile_path().display());
    println!("kmer size:      {}", model.kmer_size());
    println!(
        "genomes:        {:.3} (log {:.6})",
        genome_count_log.exp(),
        genome_count_log
    );
    println!(
        "feature total:  {:.3} (log {:.6})",
        feature_total_log.exp(),
        feature_total_log
    );
    println!("features:       {}", model.feature_count()?);
    Ok(())
}

fn score(manager: &ConfigurationManager, class_ids: &[String], counts: &Path) -> Result<()> {
    let mut queries = vec![KmerCountGenome::from_counts_file(genome_id(counts), counts)
        .with_context(|| format!("Failed to read count table {}", counts.display()))?];

    for class_id in class_ids {
        let mut model = open_class(manager, class_id)?;
        model.compute_batch_numerators(&mut queries)?;
        model.unload();
    }

    let numerators = queries[0].numerators();
    for class_id in class_ids {
        if let Some(numerator) = numerators.get(class_id.as_str()) {
            println!("{} {:.6}", class_id, numerator);
        }
    }
    Ok(())
}
