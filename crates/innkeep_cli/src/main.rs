//! innkeep CLI
//!
//! Command-line access to an innkeep store.
//!
//! # Commands
//!
//! - `status` - Show which backend was selected
//! - `stats` - Count records per collection
//! - `export` / `import` - Write or restore a JSON snapshot
//! - `clear` - Delete every record outside `settings`
//! - `select`, `insert`, `update`, `delete` - Record-level access
//! - `csv` - Export one collection as CSV
//! - `serve` - Run an in-memory relational endpoint over HTTP

mod commands;

use clap::{Parser, Subcommand};
use commands::StoreOptions;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// innkeep storage tools.
#[derive(Parser)]
#[command(name = "innkeep")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the local stores
    #[arg(global = true, short, long, default_value = "innkeep-data")]
    data_dir: PathBuf,

    /// Base URL of the relational endpoint (e.g. http://127.0.0.1:8080)
    #[arg(global = true, short, long)]
    server: Option<String>,

    /// Start offline: skip the relational probe
    #[arg(global = true, long)]
    offline: bool,

    /// Upper bound on the relational probe, in milliseconds
    #[arg(global = true, long, default_value = "3000")]
    probe_timeout_ms: u64,

    /// Do not insert the starter rooms into an empty store
    #[arg(global = true, long)]
    no_seed: bool,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the active backend and connectivity
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Count records per data collection
    Stats {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Export every collection as a JSON snapshot
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace collections with the contents of a snapshot
    Import {
        /// Snapshot file
        file: PathBuf,
    },

    /// Delete every record in every data collection
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Print matching records as JSON
    Select {
        /// Collection name
        collection: String,

        /// Exact-match predicate, `field=value` (repeatable)
        #[arg(short = 'w', long = "where")]
        filters: Vec<String>,

        /// Sort order, e.g. "bookingDate DESC"
        #[arg(short, long)]
        order_by: Option<String>,

        /// Maximum number of records
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Insert a record given as a JSON object
    Insert {
        /// Collection name
        collection: String,
        /// Record as JSON
        json: String,
    },

    /// Merge a JSON object into an existing record
    Update {
        /// Collection name
        collection: String,
        /// Record identifier
        id: String,
        /// Fields to merge, as JSON
        json: String,
    },

    /// Delete a record
    Delete {
        /// Collection name
        collection: String,
        /// Record identifier
        id: String,
    },

    /// Export one collection as CSV
    Csv {
        /// Collection name
        collection: String,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Serve an in-memory relational endpoint over HTTP
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:8080")]
        listen: String,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let options = StoreOptions {
        data_dir: cli.data_dir,
        server: cli.server,
        offline: cli.offline,
        probe_timeout_ms: cli.probe_timeout_ms,
        seed: !cli.no_seed,
    };

    match cli.command {
        Commands::Status { format } => commands::status::status(&options, &format).await?,
        Commands::Stats { format } => commands::status::stats(&options, &format).await?,
        Commands::Export { output } => {
            commands::transfer::export(&options, output.as_deref()).await?;
        }
        Commands::Import { file } => commands::transfer::import(&options, &file).await?,
        Commands::Clear { yes } => {
            if !yes {
                return Err("refusing to clear without --yes".into());
            }
            commands::transfer::clear(&options).await?;
        }
        Commands::Select {
            collection,
            filters,
            order_by,
            limit,
        } => {
            commands::records::select(&options, &collection, &filters, order_by.as_deref(), limit)
                .await?;
        }
        Commands::Insert { collection, json } => {
            commands::records::insert(&options, &collection, &json).await?;
        }
        Commands::Update {
            collection,
            id,
            json,
        } => commands::records::update(&options, &collection, &id, &json).await?,
        Commands::Delete { collection, id } => {
            commands::records::delete(&options, &collection, &id).await?;
        }
        Commands::Csv { collection, output } => {
            commands::transfer::csv(&options, &collection, output.as_deref()).await?;
        }
        Commands::Serve { listen } => commands::serve::run(&listen).await?,
        Commands::Version => {
            println!("innkeep CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
