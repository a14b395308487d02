//! Delete command - cascade-remove every artifact of a dataset.

use dialoguer::Confirm;

use dumpmill::config::DumpConfig;

use super::{find_entry, load_catalog};
use crate::error::CliError;

/// Run the delete command.
///
/// Removing any artifact invalidates everything derived from it, so
/// delete always cascades over the whole dataset: archive, extracted
/// XML, CSV outputs, leftover parts, and chunk files.
pub fn run(config: &DumpConfig, id: &str, yes: bool) -> Result<(), CliError> {
    let mut catalog = load_catalog(config)?;
    let entry = find_entry(&catalog, id)?;

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete all artifacts of {} under {}?",
                entry.id(),
                entry.dir().display()
            ))
            .default(false)
            .interact()
            .map_err(|e| CliError::Operation(format!("confirmation failed: {}", e)))?;

        if !confirmed {
            return Err(CliError::Canceled);
        }
    }

    let removed = catalog.delete(entry.id())?;

    if removed.is_empty() {
        println!("Nothing to delete for {}", entry.id());
    } else {
        println!("Removed {} artifact(s):", removed.len());
        for path in &removed {
            println!("  {}", path.display());
        }
    }
    Ok(())
}
