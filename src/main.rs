use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use gkls_lib::{ingest_archive, logging, IngestOptions};
use tracing::error;

#[derive(Parser)]
#[command(author, version, about = "Decode full-files extraction metadata into SQLite", long_about = None)]
struct Cli {
    /// Full-files zip archive
    archive: PathBuf,

    /// Output SQLite database
    database: PathBuf,

    /// Classify entry content (MIME and file type); reads every entry
    #[arg(short = 't', long = "type")]
    classify: bool,

    /// Replace the output database if it exists
    #[arg(long)]
    force: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.verbose {
        logging::init_verbose();
    } else {
        logging::init();
    }

    let options = IngestOptions::default()
        .with_classification(cli.classify)
        .with_overwrite(cli.force);

    match ingest_archive(&cli.archive, &cli.database, options) {
        Ok(summary) => {
            if cli.json {
                match serde_json::to_string_pretty(&summary) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        error!(error = %e, "Failed to serialize summary");
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                println!(
                    "{} entries, {} attributes, {} undecoded -> {}",
                    summary.entries,
                    summary.attributes,
                    summary.failed_entries,
                    cli.database.display()
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Ingestion failed");
            eprintln!("gkls: {e}");
            ExitCode::FAILURE
        }
    }
}
