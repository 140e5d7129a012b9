//! Snapshot, CSV and clear commands.

use super::{emit, open, CommandResult, StoreOptions};
use innkeep_core::Snapshot;
use std::path::Path;
use tracing::info;

/// Runs the export command.
pub async fn export(options: &StoreOptions, output: Option<&Path>) -> CommandResult {
    let engine = open(options).await?;
    let snapshot = engine.export_all().await?;
    emit(&snapshot.to_json_pretty()?, output)?;
    if let Some(path) = output {
        info!(
            path = %path.display(),
            records = snapshot.record_count(),
            "snapshot written"
        );
    }
    Ok(())
}

/// Runs the import command.
pub async fn import(options: &StoreOptions, file: &Path) -> CommandResult {
    let text = std::fs::read_to_string(file)?;
    let snapshot = Snapshot::parse(&text)?;
    let engine = open(options).await?;
    let inserted = engine.import_all(&snapshot).await?;
    println!("Imported {inserted} records from {}", file.display());
    Ok(())
}

/// Runs the clear command.
pub async fn clear(options: &StoreOptions) -> CommandResult {
    let engine = open(options).await?;
    let deleted = engine.clear_all().await?;
    println!("Deleted {deleted} records");
    Ok(())
}

/// Runs the csv command.
pub async fn csv(options: &StoreOptions, collection: &str, output: Option<&Path>) -> CommandResult {
    let engine = open(options).await?;
    let text = engine.export_csv(collection).await?;
    emit(&text, output)
}
