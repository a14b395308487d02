//! Extract command - decompress a downloaded archive.

use dumpmill::config::DumpConfig;
use dumpmill::pipeline::Pipeline;

use super::{cancel_on_ctrlc, find_entry, finish_stage, load_catalog, stage_bar};
use crate::error::CliError;

/// Run the extract command.
pub fn run(config: &DumpConfig, id: &str) -> Result<(), CliError> {
    let catalog = load_catalog(config)?;
    let entry = find_entry(&catalog, id)?;

    let cancel = cancel_on_ctrlc()?;
    let pipeline = Pipeline::new(config);
    let (bar, callback) = stage_bar();

    let outcome = pipeline.extract(&entry, &cancel, Some(callback));
    bar.finish_and_clear();

    finish_stage(outcome)?;
    println!("Extracted {}", entry.xml_path().display());
    Ok(())
}
