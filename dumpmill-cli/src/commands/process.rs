//! Process command - run the full pipeline for one URL.

use dumpmill::config::DumpConfig;
use dumpmill::pipeline::Pipeline;

use super::{cancel_on_ctrlc, finish_stage, load_catalog, stage_bar};
use crate::error::CliError;

/// Run the process command.
pub fn run(config: &DumpConfig, url: &str) -> Result<(), CliError> {
    let mut catalog = load_catalog(config)?;
    let id = catalog.register_url(url)?;
    let entry = catalog
        .get(&id)
        .cloned()
        .expect("a freshly registered dataset is in the catalog");

    println!("dumpmill v{}", dumpmill::VERSION);
    println!();
    println!("Dataset: {}", id);
    println!("Layout:  {}", entry.dir().display());
    println!();

    let cancel = cancel_on_ctrlc()?;
    let pipeline = Pipeline::new(config);
    let (bar, callback) = stage_bar();

    let report = pipeline.process(&entry, &cancel, Some(callback));
    bar.finish_and_clear();

    finish_stage(report.final_outcome().clone())?;
    println!("Pipeline complete: {}", entry.csv_path().display());
    Ok(())
}
