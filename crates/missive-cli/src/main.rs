mod commands;
mod output;
mod store;

use clap::{Parser, Subcommand};
use missive_core::migration::DEFAULT_BATCH_SIZE;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "missive",
    version,
    about = "Extract transcripts and sponsor photos from correspondence PDFs"
)]
struct Cli {
    /// Log every page, box and image decision
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the reading-order transcript of a PDF
    Text {
        /// Path to a PDF (or base64 `.pdf.b64`) file
        input_file: PathBuf,

        /// JSON file with extraction options
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Write the non-background images of a PDF's first page
    Images {
        /// Path to a PDF (or base64 `.pdf.b64`) file
        input_file: PathBuf,

        /// Background catalog produced by `missive catalog`
        #[arg(short, long, value_name = "FILE")]
        catalog: PathBuf,

        /// Directory to write the images to
        #[arg(short = 'O', long = "out", value_name = "DIR")]
        out: PathBuf,

        /// Image encoding: jpeg (default) or native
        #[arg(short, long, default_value = "jpeg")]
        encoding: String,

        /// JSON file with extraction options
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Build a background catalog from template images
    Catalog {
        /// Directory of templates: one sub-directory per template, one image per page
        templates_dir: PathBuf,

        /// Where to write the catalog JSON
        #[arg(short = 'O', long = "out", value_name = "FILE")]
        out: PathBuf,
    },
    /// Migrate every record of a directory store in batches
    Migrate {
        /// Directory holding `<id>.pdf` or `<id>.pdf.b64` records
        records_dir: PathBuf,

        /// Background catalog produced by `missive catalog`
        #[arg(short, long, value_name = "FILE")]
        catalog: PathBuf,

        /// Records per batch
        #[arg(short, long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Image encoding: jpeg (default) or native
        #[arg(short, long, default_value = "jpeg")]
        encoding: String,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,

        /// JSON file with extraction options
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let result = match cli.command {
        Commands::Text { input_file, config } => commands::text::run(input_file, config),
        Commands::Images {
            input_file,
            catalog,
            out,
            encoding,
            config,
        } => commands::images::run(input_file, catalog, out, &encoding, config),
        Commands::Catalog { templates_dir, out } => commands::catalog::run(templates_dir, out),
        Commands::Migrate {
            records_dir,
            catalog,
            batch_size,
            encoding,
            output,
            config,
        } => commands::migrate::run(records_dir, catalog, batch_size, &encoding, &output, config),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
