//! Butterfly Species Fine-Tuning CLI
//!
//! Entry point for the butterfly species classification pipeline: dataset
//! acquisition guidance, dataset statistics, and the fine-tuning run with
//! its evaluation report.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use butterfly_finetune::backend::{backend_name, TrainingBackend};
use butterfly_finetune::dataset::loader::{Split, SplitDataset};
use butterfly_finetune::training::supervised::{run_training, RunOptions};
use butterfly_finetune::training::TrainingConfig;
use butterfly_finetune::utils::logging::{init_logging, LogConfig};

/// Butterfly Species Classification
///
/// Fine-tunes a small trainable head on top of a frozen pretrained ViT
/// backbone using the Burn framework.
#[derive(Parser, Debug)]
#[command(name = "butterfly_finetune")]
#[command(version)]
#[command(about = "Butterfly species classification with a frozen ViT backbone", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show how to fetch the butterfly dataset and validate its layout
    Download {
        /// Target directory for the dataset
        #[arg(short, long, default_value = "data/butterflies")]
        output_dir: String,
    },

    /// Show dataset statistics
    Stats {
        /// Path to the dataset directory
        #[arg(short, long, default_value = "data/butterflies")]
        data_dir: String,
    },

    /// Fine-tune the classification head and report test metrics
    Train {
        /// Path to the dataset directory
        #[arg(short, long, default_value = "data/butterflies")]
        data_dir: String,

        /// Output directory for charts and the metrics report
        #[arg(short, long, default_value = "output")]
        output_dir: String,

        /// Number of training epochs
        #[arg(short, long, default_value = "30")]
        epochs: usize,

        /// Batch size for training and evaluation
        #[arg(short, long, default_value = "32")]
        batch_size: usize,

        /// Initial learning rate (cosine-annealed to 0)
        #[arg(short, long, default_value = "0.001")]
        learning_rate: f64,

        /// Decoupled weight decay
        #[arg(long, default_value = "0.000001")]
        weight_decay: f64,

        /// Label smoothing factor
        #[arg(long, default_value = "0.1")]
        label_smoothing: f32,

        /// Random seed for reproducibility
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Path to a local backbone checkpoint (skips the hub download)
        #[arg(long)]
        weights: Option<PathBuf>,

        /// Keep the randomly initialized backbone (offline runs)
        #[arg(long, default_value = "false")]
        no_pretrained: bool,

        /// Images to visualize after training; defaults to the first image
        /// of each of the first three test classes
        #[arg(long)]
        sample: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    let _ = init_logging(&log_config);

    print_banner();

    match cli.command {
        Commands::Download { output_dir } => cmd_download(&output_dir)?,

        Commands::Stats { data_dir } => cmd_stats(&data_dir)?,

        Commands::Train {
            data_dir,
            output_dir,
            epochs,
            batch_size,
            learning_rate,
            weight_decay,
            label_smoothing,
            seed,
            weights,
            no_pretrained,
            sample,
        } => {
            let config = TrainingConfig {
                epochs,
                batch_size,
                learning_rate,
                weight_decay,
                label_smoothing,
                seed,
            };

            let mut options = RunOptions::new(&data_dir, &output_dir);
            options.weights = weights;
            options.no_pretrained = no_pretrained;
            options.sample_images = sample;

            info!("Training on backend: {}", backend_name());
            run_training::<TrainingBackend>(&options, &config)?;
        }
    }

    Ok(())
}

fn print_banner() {
    println!(
        "{}",
        "\n Butterfly Species Classification\n Frozen ViT backbone + trainable head, built with Burn\n"
            .green()
            .bold()
    );
}

fn cmd_download(output_dir: &str) -> Result<()> {
    info!("Dataset target directory: {}", output_dir);

    println!(
        "{} Dataset acquisition goes through the Kaggle hub and needs an authenticated client.",
        "Note:".yellow()
    );
    println!();
    println!("{}", "Fetch the dataset:".cyan());
    println!("  Hub key: gpiosenka/butterfly-images40-species");
    println!("  https://www.kaggle.com/datasets/gpiosenka/butterfly-images40-species");
    println!("  Extract the train/, valid/ and test/ folders to: {}", output_dir);
    println!();
    println!("{}", "Expected structure:".yellow());
    println!("  {}/", output_dir);
    println!("  ├── train/");
    println!("  │   ├── ADONIS/");
    println!("  │   └── ...");
    println!("  ├── valid/");
    println!("  └── test/");
    println!();

    if Path::new(output_dir).exists() {
        println!("{}", "Validating existing dataset layout...".cyan());
        for split in [Split::Train, Split::Valid, Split::Test] {
            match SplitDataset::load(output_dir, split) {
                Ok(dataset) => println!(
                    "  {} {}: {} samples, {} classes",
                    "✓".green(),
                    split,
                    dataset.len(),
                    dataset.num_classes()
                ),
                Err(e) => println!("  {} {}: {}", "✗".red(), split, e),
            }
        }
    } else {
        println!("{}", "After extraction, run:".green());
        println!("  butterfly_finetune train --data-dir {}", output_dir);
    }

    Ok(())
}

fn cmd_stats(data_dir: &str) -> Result<()> {
    info!("Computing dataset statistics for: {}", data_dir);

    if !Path::new(data_dir).exists() {
        println!("{} Dataset directory not found: {}", "Error:".red(), data_dir);
        println!();
        println!("Fetch the dataset first:");
        println!("  butterfly_finetune download --output-dir {}", data_dir);
        return Ok(());
    }

    for split in [Split::Train, Split::Valid, Split::Test] {
        match SplitDataset::load(data_dir, split) {
            Ok(dataset) => dataset.stats().print(),
            Err(e) => println!("{} failed to load {} split: {}", "Error:".red(), split, e),
        }
    }

    Ok(())
}
