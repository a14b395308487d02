//! Status command - list datasets and their lifecycle flags.

use console::style;
use serde_json::json;

use dumpmill::catalog::DatasetEntry;
use dumpmill::config::{format_size, DumpConfig};

use super::load_catalog;
use crate::error::CliError;

/// Run the status command.
pub fn run(config: &DumpConfig, json: bool) -> Result<(), CliError> {
    let catalog = load_catalog(config)?;
    let entries = catalog.entries();

    if json {
        print_json(&entries);
        return Ok(());
    }

    println!("Data directory: {}", config.data_dir.display());
    println!();

    if entries.is_empty() {
        println!("No datasets found. Fetch one with `dumpmill fetch <url>`.");
        return Ok(());
    }

    println!(
        "{:<40} {:<9} {:<8} {:>10}  {}",
        style("DATASET").bold(),
        style("KIND").bold(),
        style("PERIOD").bold(),
        style("SIZE").bold(),
        style("D E P").bold(),
    );

    for entry in &entries {
        let status = entry.status();
        println!(
            "{:<40} {:<9} {:<8} {:>10}  {} {} {}",
            entry.id(),
            entry.kind().plural(),
            entry.date().format("%Y-%m"),
            archive_size(entry),
            flag(status.downloaded),
            flag(status.extracted),
            flag(status.processed),
        );
    }

    println!();
    println!("D = downloaded, E = extracted, P = processed");
    Ok(())
}

fn flag(set: bool) -> console::StyledObject<&'static str> {
    if set {
        style("x").green()
    } else {
        style("-").dim()
    }
}

fn archive_size(entry: &DatasetEntry) -> String {
    entry
        .archive_path()
        .metadata()
        .map(|m| format_size(m.len()))
        .unwrap_or_else(|_| "-".to_string())
}

fn print_json(entries: &[&DatasetEntry]) {
    let datasets: Vec<_> = entries
        .iter()
        .map(|entry| {
            json!({
                "id": entry.id(),
                "kind": entry.kind(),
                "period": entry.date().format("%Y-%m").to_string(),
                "url": entry.url(),
                "status": entry.status(),
            })
        })
        .collect();

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "datasets": datasets }))
            .expect("status JSON is serializable")
    );
}
