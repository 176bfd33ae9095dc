//! hiermol - hierarchical molecular graph autoencoder from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Sizes of each graph, validated against vocabularies
//! hiermol inspect graphs.json --vocabs vocabs.json
//!
//! # Reconstruction and KL losses of a set of graphs
//! hiermol reconstruct graphs.json --vocabs vocabs.json --motifs motifs.json \
//!     --config config.json --weights model.safetensors
//!
//! # Decode latents drawn from the prior
//! hiermol sample --vocabs vocabs.json --motifs motifs.json -n 8 -o samples.json
//!
//! # Latent vectors (posterior means)
//! hiermol encode graphs.json --vocabs vocabs.json --motifs motifs.json
//! ```
//!
//! All files are JSON except the weights, which are safetensors.

use anyhow::{Context, Result};
use candle_core::Device;
use clap::{Args, Parser, Subcommand};
use hiermol_core::{read_graphs, write_graphs, HierGraph, Vocabs};
use hiermol_nn::{Autoencoder, AutoencoderConfig, Ratio, DEFAULT_MAX_MOTIFS};
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "hiermol")]
#[command(about = "Hierarchical molecular graph autoencoder", long_about = None)]
struct Cli {
    /// Log filter (e.g. "info", "hiermol_nn=debug")
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// Files needed to build a model.
#[derive(Args)]
struct ModelArgs {
    /// Vocabularies (JSON object keyed by node type)
    #[arg(long)]
    vocabs: PathBuf,

    /// Motif template graphs, one per motif label (JSON array)
    #[arg(long)]
    motifs: PathBuf,

    /// Model configuration (JSON); defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Weights written by a previous run (safetensors)
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Seed for latent sampling, overriding the configuration
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show per-graph statistics
    Inspect {
        /// Graphs (JSON array)
        input: PathBuf,

        /// Also validate against these vocabularies
        #[arg(long)]
        vocabs: Option<PathBuf>,
    },

    /// Report reconstruction loss, KL loss and per-head accuracy
    Reconstruct {
        /// Graphs to encode and reconstruct (JSON array)
        input: PathBuf,

        #[command(flatten)]
        model: ModelArgs,

        /// Decode a posterior sample instead of the mean
        #[arg(long)]
        stochastic: bool,
    },

    /// Generate graphs from latents drawn from the prior
    Sample {
        #[command(flatten)]
        model: ModelArgs,

        /// Number of graphs
        #[arg(short, default_value = "1")]
        n: usize,

        /// Upper bound on motifs per generated graph (0 for none)
        #[arg(long, default_value = "32")]
        max_motifs: usize,

        /// Output file (JSON array); stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print latent vectors, one JSON array per graph
    Encode {
        /// Graphs (JSON array)
        input: PathBuf,

        #[command(flatten)]
        model: ModelArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match cli.command {
        Commands::Inspect { input, vocabs } => cmd_inspect(&input, vocabs.as_deref()),
        Commands::Reconstruct {
            input,
            model,
            stochastic,
        } => cmd_reconstruct(&input, &model, stochastic),
        Commands::Sample {
            model,
            n,
            max_motifs,
            output,
        } => cmd_sample(&model, n, max_motifs, output.as_deref()),
        Commands::Encode { input, model } => cmd_encode(&input, &model),
    }
}

fn load_graphs(path: &Path) -> Result<Vec<HierGraph>> {
    let graphs = read_graphs(path).with_context(|| format!("Failed to read graphs from {}", path.display()))?;
    debug!(path = %path.display(), count = graphs.len(), "loaded graphs");
    Ok(graphs)
}

fn load_vocabs(path: &Path) -> Result<Vocabs> {
    Vocabs::from_json_file(path).with_context(|| format!("Failed to read vocabularies from {}", path.display()))
}

fn load_model(args: &ModelArgs) -> Result<Autoencoder> {
    let start = Instant::now();
    let pb = ProgressBar::new_spinner();
    pb.set_message("Building model...");

    let vocabs = load_vocabs(&args.vocabs)?;
    let templates = load_graphs(&args.motifs)?;
    let mut config = match &args.config {
        Some(path) => AutoencoderConfig::from_json_file(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?,
        None => AutoencoderConfig::default(),
    };
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }

    let mut model = Autoencoder::new(&vocabs, templates, config, &Device::Cpu).context("Failed to build model")?;
    if let Some(weights) = &args.weights {
        model
            .load(weights)
            .with_context(|| format!("Failed to load weights from {}", weights.display()))?;
        info!(path = %weights.display(), "loaded weights");
    }

    pb.finish_and_clear();
    info!(elapsed = ?start.elapsed(), "model ready");
    Ok(model)
}

fn cmd_inspect(input: &Path, vocabs: Option<&Path>) -> Result<()> {
    let graphs = load_graphs(input)?;
    let vocabs = vocabs.map(load_vocabs).transpose()?;
    if let Some(vocabs) = &vocabs {
        vocabs.validate().context("Invalid vocabularies")?;
    }

    println!("Graphs: {}", graphs.len());
    for (i, graph) in graphs.iter().enumerate() {
        let stats = graph.stats();
        println!(
            "[{}] motifs={} atoms={} bonds={} motif_edges={}",
            i, stats.num_motifs, stats.num_atoms, stats.num_bonds, stats.num_motif_edges
        );
        if let Some(vocabs) = &vocabs {
            graph.validate(vocabs).with_context(|| format!("Graph {} is invalid", i))?;
        }
    }
    if vocabs.is_some() {
        println!("All graphs valid");
    }
    Ok(())
}

fn format_ratio(ratio: Ratio) -> String {
    match ratio.value() {
        Some(value) => format!("{:.3} ({}/{})", value, ratio.correct, ratio.total),
        None => "-".to_string(),
    }
}

fn cmd_reconstruct(input: &Path, args: &ModelArgs, stochastic: bool) -> Result<()> {
    let graphs = load_graphs(input)?;
    let model = load_model(args)?;

    let start = Instant::now();
    let out = model
        .reconstruct(&graphs, &graphs, !stochastic)
        .context("Reconstruction failed")?;
    let reconstruction_loss = out.reconstruction_loss.to_scalar::<f32>()?;
    let kl_loss = out.kl_loss.to_scalar::<f32>()?;

    println!("Graphs:              {}", graphs.len());
    println!("Reconstruction loss: {:.4}", reconstruction_loss);
    println!("KL loss:             {:.4}", kl_loss);
    println!("Accuracy");
    println!("  motif:      {}", format_ratio(out.accuracy.motif));
    println!("  attachment: {}", format_ratio(out.accuracy.attachment));
    println!("  expand:     {}", format_ratio(out.accuracy.expand));
    println!("  parent:     {}", format_ratio(out.accuracy.parent));
    println!("  atom pair:  {}", format_ratio(out.accuracy.atom_pair));
    println!("  bond:       {}", format_ratio(out.accuracy.bond));
    info!(elapsed = ?start.elapsed(), "reconstructed");
    Ok(())
}

fn cmd_sample(args: &ModelArgs, n: usize, max_motifs: usize, output: Option<&Path>) -> Result<()> {
    let model = load_model(args)?;
    let max_motifs = if max_motifs == 0 { DEFAULT_MAX_MOTIFS } else { max_motifs };

    let pb = ProgressBar::new_spinner();
    pb.set_message(format!("Sampling {} graphs...", n));
    let graphs = model.sample_prior(n, max_motifs).context("Sampling failed")?;
    pb.finish_and_clear();

    match output {
        Some(path) => {
            write_graphs(path, &graphs).with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {} graphs to {}", graphs.len(), path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&graphs)?),
    }
    Ok(())
}

fn cmd_encode(input: &Path, args: &ModelArgs) -> Result<()> {
    let graphs = load_graphs(input)?;
    let model = load_model(args)?;
    let latents = model.encode(&graphs).context("Encoding failed")?.to_vec2::<f32>()?;
    for row in latents {
        println!("{}", serde_json::to_string(&row)?);
    }
    Ok(())
}
