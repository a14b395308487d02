//! Fetch command - download one dump archive.

use dumpmill::config::DumpConfig;
use dumpmill::pipeline::Pipeline;

use super::{cancel_on_ctrlc, finish_stage, load_catalog, stage_bar};
use crate::error::CliError;

/// Arguments for the fetch command.
pub struct FetchArgs {
    pub url: String,
    pub sha256: Option<String>,
}

/// Run the fetch command.
pub fn run(config: &DumpConfig, args: FetchArgs) -> Result<(), CliError> {
    let mut catalog = load_catalog(config)?;
    let id = catalog.register_url(&args.url)?;
    let entry = catalog
        .get(&id)
        .cloned()
        .expect("a freshly registered dataset is in the catalog");

    println!("Dataset:     {}", id);
    println!("Destination: {}", entry.archive_path().display());
    println!("Segments:    {}", config.segments);
    println!();

    let cancel = cancel_on_ctrlc()?;
    let pipeline = Pipeline::new(config);
    let (bar, callback) = stage_bar();

    let outcome = pipeline.download(&entry, args.sha256.as_deref(), &cancel, Some(callback));
    bar.finish_and_clear();

    finish_stage(outcome)?;
    println!("Downloaded {}", entry.archive_path().display());
    Ok(())
}
