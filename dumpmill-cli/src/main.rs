//! Dumpmill CLI - fetch monthly XML dump archives and convert them to CSV.
//!
//! Thin command layer over the `dumpmill` library: each subcommand
//! resolves the configuration (defaults < config file < CLI flags),
//! wires Ctrl+C to the cancellation token, and bridges the library's
//! progress callbacks onto a progress bar.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use console::style;
use tracing::info;

use dumpmill::config::DumpConfig;

use commands::{convert, delete, extract, fetch, init, process, status};
use error::CliError;

#[derive(Parser)]
#[command(name = "dumpmill", version = dumpmill::VERSION)]
#[command(about = "Fetch monthly XML dump archives and convert them to CSV")]
struct Cli {
    /// Data directory, overriding the config file
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the configuration file
    Init {
        /// Data directory to record in the config file
        #[arg(long, value_name = "DIR")]
        data_dir: Option<PathBuf>,
        /// Concurrent download segments per archive
        #[arg(long)]
        segments: Option<usize>,
        /// HTTP timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Records per chunk file during conversion
        #[arg(long)]
        records_per_chunk: Option<usize>,
    },

    /// List datasets and their lifecycle flags
    Status {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Download a dump archive
    Fetch {
        /// Archive URL (filename must look like `<prefix>_<YYYYMMDD>_<kind>.xml.gz`)
        url: String,
        /// Concurrent download segments
        #[arg(long)]
        segments: Option<usize>,
        /// HTTP timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Expected SHA-256 of the archive
        #[arg(long, value_name = "HEX")]
        sha256: Option<String>,
    },

    /// Decompress a downloaded archive
    Extract {
        /// Dataset id, e.g. `discogs_20240101_releases`
        id: String,
    },

    /// Convert an extracted dump into CSV
    Convert {
        /// Dataset id, e.g. `discogs_20240101_releases`
        id: String,
        /// Records per chunk file
        #[arg(long)]
        records_per_chunk: Option<usize>,
    },

    /// Download, extract, and convert in one run
    Process {
        /// Archive URL
        url: String,
        /// Concurrent download segments
        #[arg(long)]
        segments: Option<usize>,
        /// HTTP timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Records per chunk file
        #[arg(long)]
        records_per_chunk: Option<usize>,
    },

    /// Delete every artifact of a dataset
    Delete {
        /// Dataset id, e.g. `discogs_20240101_releases`
        id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(e) => return report_failure(&e),
    };

    let _log_guard = dumpmill::logging::init_with_file("dumpmill=info", &config.log_dir());
    info!(version = dumpmill::VERSION, "dumpmill starting");

    let result = match cli.command {
        Command::Init {
            data_dir,
            segments,
            timeout,
            records_per_chunk,
        } => init::run(init::InitArgs {
            data_dir: data_dir.or(cli.data_dir),
            segments,
            timeout,
            records_per_chunk,
        }),
        Command::Status { json } => status::run(&config, json),
        Command::Fetch { url, sha256, .. } => fetch::run(&config, fetch::FetchArgs { url, sha256 }),
        Command::Extract { id } => extract::run(&config, &id),
        Command::Convert { id, .. } => convert::run(&config, &id),
        Command::Process { url, .. } => process::run(&config, &url),
        Command::Delete { id, yes } => delete::run(&config, &id, yes),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report_failure(&e),
    }
}

/// Defaults, overridden by the config file, overridden by CLI flags.
fn resolve_config(cli: &Cli) -> Result<DumpConfig, CliError> {
    let mut config = DumpConfig::load()?;

    if let Some(ref data_dir) = cli.data_dir {
        config = config.with_data_dir(data_dir);
    }

    match &cli.command {
        Command::Fetch {
            segments, timeout, ..
        } => {
            if let Some(segments) = segments {
                config = config.with_segments(*segments);
            }
            if let Some(timeout) = timeout {
                config = config.with_timeout_secs(*timeout);
            }
        }
        Command::Process {
            segments,
            timeout,
            records_per_chunk,
            ..
        } => {
            if let Some(segments) = segments {
                config = config.with_segments(*segments);
            }
            if let Some(timeout) = timeout {
                config = config.with_timeout_secs(*timeout);
            }
            if let Some(records) = records_per_chunk {
                config = config.with_records_per_chunk(*records);
            }
        }
        Command::Convert {
            records_per_chunk, ..
        } => {
            if let Some(records) = records_per_chunk {
                config = config.with_records_per_chunk(*records);
            }
        }
        _ => {}
    }

    Ok(config)
}

fn report_failure(e: &CliError) -> ExitCode {
    eprintln!("{} {}", style("error:").red().bold(), e);
    ExitCode::FAILURE
}
