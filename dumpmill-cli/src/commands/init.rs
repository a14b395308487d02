//! Init command - write the configuration file.

use std::path::PathBuf;

use dumpmill::config::DumpConfig;

use crate::error::CliError;

/// Arguments for the init command.
pub struct InitArgs {
    pub data_dir: Option<PathBuf>,
    pub segments: Option<usize>,
    pub timeout: Option<u64>,
    pub records_per_chunk: Option<usize>,
}

/// Run the init command.
///
/// Loads the existing file when there is one, applies the flags given
/// on the command line, and writes the result back.
pub fn run(args: InitArgs) -> Result<(), CliError> {
    let mut config = DumpConfig::load().unwrap_or_default();

    if let Some(data_dir) = args.data_dir {
        config = config.with_data_dir(data_dir);
    }
    if let Some(segments) = args.segments {
        config = config.with_segments(segments);
    }
    if let Some(timeout) = args.timeout {
        config = config.with_timeout_secs(timeout);
    }
    if let Some(records) = args.records_per_chunk {
        config = config.with_records_per_chunk(records);
    }

    let path = config.save()?;

    println!("Configuration file: {}", path.display());
    println!();
    println!("Data directory:    {}", config.data_dir.display());
    println!("Segments:          {}", config.segments);
    println!("HTTP timeout:      {}s", config.timeout_secs);
    println!("Records per chunk: {}", config.records_per_chunk);
    println!();
    println!("Edit this file to customize dumpmill settings.");
    println!("CLI arguments override config file values when specified.");
    Ok(())
}
