//! docvec CLI - replace text fields in JSON record files with embeddings
//!
//! # Commands
//!
//! ```bash
//! # Enrich one file
//! docvec file docs.json docs.vec.json
//!
//! # Enrich every .json file in a directory into output/<model>/
//! docvec dir ./collection --output-dir output
//!
//! # List fields: each passage in `passages` gets its own vector
//! docvec --field contents --field 'passages[]' dir ./collection
//!
//! # Embed text and show vector stats
//! docvec embed "Who won the 2023 Ashes?"
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use docvec_lib::{
    batch::{run_batch, BatchConfig},
    embed::{Embedder, ModelKind, OnnxEmbedder},
    enrich::{EnrichmentSpec, FieldSpec},
    pipeline::{CancelToken, Pipeline},
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docvec")]
#[command(about = "Replace text fields in JSON record collections with embeddings")]
#[command(version)]
struct Cli {
    /// Embedding model: all-minilm-l6-v2, bge-small-en-v1.5 or bge-large-en-v1.5
    #[arg(long, global = true, env = "DOCVEC_MODEL", default_value = "all-minilm-l6-v2")]
    model: ModelKind,

    /// Field to enrich: `name` for a string field, `name[]` for a list of strings
    #[arg(
        short,
        long = "field",
        global = true,
        env = "DOCVEC_FIELDS",
        value_delimiter = ',',
        default_value = "contents"
    )]
    fields: Vec<FieldSpec>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enrich a single file
    File {
        /// JSON array of records to read
        input: PathBuf,

        /// Where to write the enriched array
        output: PathBuf,
    },

    /// Enrich every matching file in a directory
    Dir {
        /// Directory containing the input files
        input_dir: PathBuf,

        /// Root of the output tree; files land in <output-dir>/<model>/
        #[arg(short, long, env = "DOCVEC_OUTPUT_DIR", default_value = "output")]
        output_dir: PathBuf,

        /// Only process files with this extension
        #[arg(long, default_value = "json")]
        extension: String,

        /// Reprocess files whose output already exists
        #[arg(long)]
        overwrite: bool,
    },

    /// Embed text and show vector info
    Embed {
        /// Text to embed
        text: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let model = cli.model;
    let spec = EnrichmentSpec::new(cli.fields)?;

    let cancel = CancelToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));
    let pipeline = Pipeline::new(spec).with_cancel(cancel);

    match cli.command {
        Commands::File { input, output } => {
            println!("Loading {model} (first run downloads the model)...");
            println!("Enriching fields [{}] of '{}'", pipeline.spec(), input.display());

            let target = output.clone();
            let count = tokio::task::spawn_blocking(move || -> Result<usize> {
                let mut embedder = OnnxEmbedder::new(model)?;
                Ok(pipeline.process_file(&input, &output, &mut embedder)?)
            })
            .await
            .context("pipeline thread panicked")??;

            println!("Wrote {count} records to '{}'", target.display());
        }

        Commands::Dir {
            input_dir,
            output_dir,
            extension,
            overwrite,
        } => {
            let config = BatchConfig::new(input_dir, output_dir)
                .with_extension(extension)
                .with_overwrite(overwrite);
            println!("Loading {model} (first run downloads the model)...");
            println!(
                "Enriching fields [{}] of *.{} in '{}'",
                pipeline.spec(),
                config.extension,
                config.input_dir.display()
            );

            let report = tokio::task::spawn_blocking(move || -> Result<_> {
                let mut embedder = OnnxEmbedder::new(model)?;
                Ok(run_batch(&pipeline, &config, &mut embedder)?)
            })
            .await
            .context("batch thread panicked")??;

            println!("\n=== Batch summary ===\n");
            for (path, count) in &report.processed {
                println!("  ok       {} ({count} records)", path.display());
            }
            for path in &report.skipped {
                println!("  skipped  {} (output exists)", path.display());
            }
            for err in &report.failed {
                println!("  FAILED   {err}: {}", err.source);
            }
            println!(
                "\n{} processed, {} skipped, {} failed, {} records written",
                report.processed.len(),
                report.skipped.len(),
                report.failed.len(),
                report.records()
            );

            if report.cancelled {
                bail!("batch cancelled");
            }
            if !report.failed.is_empty() {
                bail!("{} file(s) failed", report.failed.len());
            }
        }

        Commands::Embed { text } => {
            println!("Loading {model} (first run downloads the model)...");
            let mut embedder = OnnxEmbedder::new(model)?;
            let embedding = embedder.embed(&text)?;

            println!("\nEmbedding stats ({}):", embedder.model_name());
            println!("  Dimensions: {}", embedding.len());
            println!("  First 5 values: {:?}", &embedding[..embedding.len().min(5)]);
            println!("  Min: {:.4}", embedding.iter().cloned().fold(f32::INFINITY, f32::min));
            println!("  Max: {:.4}", embedding.iter().cloned().fold(f32::NEG_INFINITY, f32::max));
        }
    }

    Ok(())
}

/// Stops processing after the current record on Ctrl-C.
async fn cancel_on_ctrl_c(cancel: CancelToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupt received, stopping after the current record");
        cancel.cancel();
    }
}
