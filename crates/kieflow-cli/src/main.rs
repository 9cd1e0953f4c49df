//! # kieflow
//!
//! Upload documents, run OCR over them, define extraction pipelines and pull
//! key information out with a language model.
//!
//! ```bash
//! kieflow files upload scans/passport.png
//! kieflow ocr --all
//! kieflow pipelines create passport --field "name=Holder name" --field "dob=Date of birth"
//! kieflow kie --file kyc-files/passport.png --pipeline passport
//! kieflow attribution --pipeline passport --file kyc-files/passport.png
//! ```

mod commands;
mod group;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kieflow::FileSelection;

#[derive(Parser)]
#[command(name = "kieflow", version, about = "Document OCR and key information extraction")]
struct Cli {
    /// Path to the JSON config file. Defaults to `~/.kieflow/config.json`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless `RUST_LOG` is set.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print batch progress events as JSON lines on stdout.
    #[arg(long, global = true)]
    events: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage uploaded files.
    Files {
        #[command(subcommand)]
        action: commands::files::FilesAction,
    },

    /// Manage extraction pipelines.
    Pipelines {
        #[command(subcommand)]
        action: commands::pipelines::PipelinesAction,
    },

    /// Run OCR over files.
    Ocr {
        /// Process every file that has no OCR output yet.
        #[arg(long, conflicts_with = "paths")]
        all: bool,

        /// Storage paths (`bucket/filename`) to process.
        paths: Vec<String>,
    },

    /// Extract key information from files with pipelines.
    ///
    /// `--file` (or `--all-files` / `--all-unprocessed`) and `--pipeline`
    /// form one selection; every `--group` adds another. Pairs that already
    /// have a result are skipped.
    Kie {
        #[arg(long = "file", conflicts_with_all = ["all_files", "all_unprocessed"])]
        files: Vec<String>,

        /// Select every file with OCR output.
        #[arg(long, conflicts_with = "all_unprocessed", requires = "pipelines")]
        all_files: bool,

        /// Select every file with OCR output and no result yet.
        #[arg(long, requires = "pipelines")]
        all_unprocessed: bool,

        #[arg(long = "pipeline")]
        pipelines: Vec<String>,

        /// Extra selection, `files=a,b;pipelines=x,y`.
        #[arg(long = "group")]
        groups: Vec<String>,

        /// Print the planned work without running it.
        #[arg(long)]
        dry_run: bool,
    },

    /// Show file, OCR, KIE and pipeline counts.
    Metrics,

    /// Show which OCR boxes support each extracted field.
    Attribution {
        #[arg(long)]
        pipeline: String,

        #[arg(long)]
        file: String,

        /// Print the full view as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Record reviewed field values for a result.
    Validate {
        #[arg(long)]
        pipeline: String,

        #[arg(long)]
        file: String,

        /// Corrected value, `name=value`. Repeat for each field.
        #[arg(long = "field", required = true)]
        fields: Vec<String>,

        #[arg(long)]
        score: Option<f64>,
    },

    /// Export all results as JSON.
    Export {
        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    let config = kieflow::config::load_config_or_default(cli.config.as_deref())?;
    let (workspace, printer) = commands::open_workspace(&config, cli.events)?;

    let outcome = match cli.command {
        Command::Files { action } => commands::files::run(&workspace, action),
        Command::Pipelines { action } => commands::pipelines::run(&workspace, action),
        Command::Ocr { all, paths } => commands::batch::ocr(&workspace, all, paths).await,
        Command::Kie {
            files,
            all_files,
            all_unprocessed,
            pipelines,
            groups,
            dry_run,
        } => {
            let selection = if all_files {
                FileSelection::All
            } else if all_unprocessed {
                FileSelection::AllUnprocessed
            } else {
                FileSelection::Paths(files)
            };
            commands::batch::kie(&workspace, selection, pipelines, &groups, dry_run).await
        }
        Command::Metrics => commands::results::metrics(&workspace),
        Command::Attribution {
            pipeline,
            file,
            json,
        } => commands::results::attribution(&workspace, &pipeline, &file, json),
        Command::Validate {
            pipeline,
            file,
            fields,
            score,
        } => commands::results::validate(&workspace, &pipeline, &file, &fields, score),
        Command::Export { output } => commands::results::export(&workspace, output.as_deref()),
    };

    drop(workspace);
    if let Some(printer) = printer {
        printer.await?;
    }
    outcome
}
