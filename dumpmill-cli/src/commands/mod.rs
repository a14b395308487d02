//! CLI subcommands, one module per command.

pub mod convert;
pub mod delete;
pub mod extract;
pub mod fetch;
pub mod init;
pub mod process;
pub mod status;

use indicatif::{ProgressBar, ProgressStyle};

use dumpmill::cancel::CancelToken;
use dumpmill::catalog::{CatalogRepository, DatasetEntry, DatasetId};
use dumpmill::config::DumpConfig;
use dumpmill::pipeline::{PipelineProgressCallback, StageOutcome};

use crate::error::CliError;

/// Build a scanned catalog over the configured data directory.
pub(crate) fn load_catalog(config: &DumpConfig) -> Result<CatalogRepository, CliError> {
    let mut catalog = CatalogRepository::new(&config.data_dir);
    catalog.scan()?;
    Ok(catalog)
}

/// Look up one dataset by its id string.
pub(crate) fn find_entry(
    catalog: &CatalogRepository,
    id: &str,
) -> Result<DatasetEntry, CliError> {
    let id = DatasetId::from(id);
    catalog
        .get(&id)
        .cloned()
        .ok_or_else(|| CliError::NotFound(id.to_string()))
}

/// Cancellation token wired to Ctrl+C.
///
/// The first Ctrl+C requests a cooperative stop; the running stage
/// observes it at its next block or record boundary and cleans up.
pub(crate) fn cancel_on_ctrlc() -> Result<CancelToken, CliError> {
    let token = CancelToken::new();
    let handler_token = token.clone();

    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("Cancellation requested, stopping at the next safe point...");
        handler_token.cancel();
    })
    .map_err(|e| CliError::Operation(format!("failed to set signal handler: {}", e)))?;

    Ok(token)
}

/// Progress bar fed by pipeline callbacks, 0-100 within each stage.
pub(crate) fn stage_bar() -> (ProgressBar, PipelineProgressCallback) {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {percent:>3}% {msg}")
            .expect("static progress template is valid")
            .progress_chars("=> "),
    );

    let callback_bar = bar.clone();
    let callback: PipelineProgressCallback = Box::new(move |stage, progress, message| {
        callback_bar.set_position((progress.clamp(0.0, 1.0) * 100.0) as u64);
        callback_bar.set_message(format!("{}: {}", stage.name(), message));
    });

    (bar, callback)
}

/// Map a stage outcome onto the command result.
pub(crate) fn finish_stage(outcome: StageOutcome) -> Result<(), CliError> {
    match outcome {
        StageOutcome::Success => Ok(()),
        StageOutcome::Canceled => Err(CliError::Canceled),
        StageOutcome::Failed(reason) => Err(CliError::Operation(reason)),
    }
}
