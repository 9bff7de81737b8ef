mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use metagen::OutputLanguage;

const DEFAULT_CONFIG_FILE: &str = "metagen.json";

#[derive(Debug, Parser)]
#[command(
    name = "metagen",
    version,
    about = "Generate SEO meta titles and descriptions for product spreadsheets"
)]
struct Cli {
    /// Path to a JSON config file (default: ./metagen.json if present)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load a CSV, XLSX or XLS file and generate meta content for every product
    Generate {
        file: PathBuf,

        /// Output language (english, arabic, bilingual)
        #[arg(short, long)]
        language: Option<OutputLanguage>,

        /// Products per generation call
        #[arg(long)]
        chunk_size: Option<usize>,
    },
    /// Continue a stopped or quota-limited run
    Resume,
    /// Show the saved session
    Status,
    /// Write the processed products as CSV
    Export {
        /// Destination (defaults to seo_<input name>.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Change one cell of a processed product
    Edit {
        sku: String,
        /// Column name, e.g. "Meta Title"
        field: String,
        value: String,
    },
    /// Regenerate the meta content of one product
    Regenerate { sku: String },
    /// Discard the saved session
    Dismiss,
    /// Show, replace or reset the generation instructions
    Instructions {
        /// Read new instructions from a file
        #[arg(long, value_name = "FILE", conflicts_with = "reset")]
        set: Option<PathBuf>,

        /// Go back to the built-in instructions
        #[arg(long)]
        reset: bool,
    },
}

/// `metagen.json` in the working directory, when present.
fn default_config_path() -> Option<PathBuf> {
    let path = PathBuf::from(DEFAULT_CONFIG_FILE);
    path.is_file().then_some(path)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.json_logs)?;

    let mut config = match cli.config.or_else(default_config_path) {
        Some(path) => metagen::load_config(&path)?,
        None => metagen::Config::default(),
    };

    match cli.command {
        Command::Generate {
            file,
            language,
            chunk_size,
        } => {
            if let Some(language) = language {
                config.language = language;
            }
            if let Some(chunk_size) = chunk_size {
                config.batch.chunk_size = chunk_size;
            }
            commands::generate(&config, &file).await
        }
        Command::Resume => commands::resume(&config).await,
        Command::Status => commands::status(&config),
        Command::Export { output } => commands::export(&config, output),
        Command::Edit { sku, field, value } => commands::edit(&config, &sku, &field, &value),
        Command::Regenerate { sku } => commands::regenerate(&config, &sku).await,
        Command::Dismiss => commands::dismiss(&config),
        Command::Instructions { set, reset } => commands::instructions(&config, set, reset),
    }
}
