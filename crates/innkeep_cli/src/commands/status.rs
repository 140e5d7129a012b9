//! Status and stats commands.

use super::{open, CommandResult, StoreOptions};
use innkeep_core::{CollectionStats, EngineStatus};
use serde::Serialize;

/// Status report printed by `innkeep status`.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    /// Data directory.
    pub data_dir: String,
    /// Selection phase.
    pub phase: String,
    /// Descriptor snapshot.
    #[serde(flatten)]
    pub status: EngineStatus,
}

/// Runs the status command.
pub async fn status(options: &StoreOptions, format: &str) -> CommandResult {
    let engine = open(options).await?;
    let report = StatusReport {
        data_dir: options.data_dir.display().to_string(),
        phase: engine.phase().to_string(),
        status: engine.status(),
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => {
            let backend = report
                .status
                .backend
                .map_or_else(|| "none".to_string(), |b| b.to_string());
            println!("Data directory: {}", report.data_dir);
            println!("Phase:          {}", report.phase);
            println!("Backend:        {backend}");
            println!("Online:         {}", yes_no(report.status.online));
            println!("Connected:      {}", yes_no(report.status.connected));
            println!("Ready:          {}", yes_no(report.status.ready));
        }
    }
    Ok(())
}

/// Runs the stats command.
pub async fn stats(options: &StoreOptions, format: &str) -> CommandResult {
    let engine = open(options).await?;
    let stats = engine.collection_stats().await?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&stats)?),
        _ => print!("{}", render_stats(&stats)),
    }
    Ok(())
}

fn render_stats(stats: &CollectionStats) -> String {
    let width = stats.counts.keys().map(String::len).max().unwrap_or(0).max(5);
    let mut out = String::new();
    for (name, count) in &stats.counts {
        out.push_str(&format!("{name:<width$}  {count}\n"));
    }
    out.push_str(&format!("{:<width$}  {}\n", "total", stats.total));
    out
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_table_is_aligned() {
        let mut stats = CollectionStats::default();
        stats.counts.insert("rooms".into(), 4);
        stats.counts.insert("bookings".into(), 12);
        stats.total = 16;

        assert_eq!(
            render_stats(&stats),
            "bookings  12\nrooms     4\ntotal     16\n"
        );
    }
}
