//! mediadrop: upload files as one batch from the command line.
//!
//! Storage and size sets come from the environment (see `Config::from_env`).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mediadrop_cli::{init_tracing, size_selection, BatchReport};
use mediadrop_core::{AllowedTypes, Config};
use mediadrop_processing::{IncomingFile, Uploader};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "mediadrop", about = "Validate, store and resize uploaded files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload files as one batch and print a JSON report
    Upload {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Directory under the storage root
        #[arg(long, default_value = "")]
        dir: String,
        /// Allowed file types, e.g. "image|pdf"
        #[arg(long, default_value = "image")]
        types: String,
        /// Size-set category for image derivatives
        #[arg(long)]
        category: Option<String>,
        /// Variant names to generate (comma separated or repeated)
        #[arg(long)]
        sizes: Vec<String>,
        /// Fit images inside the box on a white background instead of cropping
        #[arg(long)]
        fit: bool,
    },
    /// Print where a stored file (or one of its variants) lives
    Locate {
        /// Generated storage name
        name: String,
        /// Size variant
        #[arg(long)]
        variant: Option<String>,
        /// Directory under the storage root
        #[arg(long, default_value = "")]
        dir: String,
    },
}

#[derive(Serialize)]
struct Location {
    key: String,
    url: String,
    uri: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("Invalid configuration")?;
    let uploader = Uploader::from_config(config)
        .await
        .context("Failed to initialize storage")?;

    match cli.command {
        Commands::Upload {
            files,
            dir,
            types,
            category,
            sizes,
            fit,
        } => {
            let allowed: AllowedTypes = types.parse()?;
            let selection = size_selection(category, &sizes, fit);
            let uploader = uploader.with_upload_directory(&dir);
            let variants: Vec<String> = uploader
                .image_specs(selection.as_ref())
                .into_iter()
                .map(|spec| spec.variant)
                .collect();

            let batch = files.into_iter().map(IncomingFile::from_path).collect();
            let outcome = uploader
                .upload(batch, &allowed, selection.as_ref())
                .await?;

            let report = BatchReport::new(&uploader, &outcome, &variants);
            println!("{}", serde_json::to_string_pretty(&report)?);

            if report.has_failures() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Locate { name, variant, dir } => {
            let uploader = uploader.with_upload_directory(&dir);
            let variant = variant.as_deref();
            let location = Location {
                key: uploader.path_of_file(&name, variant),
                url: uploader.url_of_file(&name, variant),
                uri: uploader.attachment_uri(&name, variant),
            };
            println!("{}", serde_json::to_string_pretty(&location)?);
        }
    }

    Ok(ExitCode::SUCCESS)
}
