//! unitwork CLI — apply JSON work plans as a single transaction.
//!
//! # Commands
//! ```text
//! unitwork apply --plan <plan.json> [--db <path.db>] [--json]
//! unitwork get   --db <path.db> --collection <name> --id <id>
//! unitwork info
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use unitwork_storage::sqlite::SqliteResource;
use unitwork_storage::MemoryStore;

mod logging;
mod plan;

use logging::{init_tracing, LogConfig};
use plan::{ApplySummary, WorkPlan};

#[derive(Parser)]
#[command(
    name = "unitwork",
    about = "Batch document mutations and commit them as one transaction",
    version
)]
struct Cli {
    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply every operation of a plan file in one unit of work
    Apply {
        /// Path to the plan JSON file
        #[arg(short, long)]
        plan: PathBuf,
        /// SQLite database file; omit to dry-run against an in-memory store
        #[arg(long)]
        db: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a stored document
    Get {
        /// SQLite database file
        #[arg(long)]
        db: String,
        #[arg(long)]
        collection: String,
        #[arg(long)]
        id: String,
    },

    /// Show engine defaults and available backends
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&LogConfig {
        level: cli.log_level.clone(),
        json: cli.log_json,
    });

    match cli.command {
        Commands::Apply { plan, db, json } => cmd_apply(&plan, db.as_deref(), json).await,
        Commands::Get { db, collection, id } => cmd_get(&db, &collection, &id).await,
        Commands::Info => {
            cmd_info();
            Ok(())
        }
    }
}

async fn cmd_apply(path: &std::path::Path, db: Option<&str>, json: bool) -> Result<()> {
    let plan = WorkPlan::load(path)?;
    tracing::info!(
        label = %plan.config.label,
        operations = plan.operations.len(),
        "Plan loaded"
    );

    let summary = match db {
        Some(db) => {
            let resource = SqliteResource::open(db)
                .await
                .with_context(|| format!("cannot open {db}"))?;
            plan.apply(resource, "sqlite").await?
        }
        None => {
            let store = MemoryStore::new();
            let summary = plan.apply(store.clone(), "memory").await?;
            if !json {
                println!("dry run, {} document(s) would remain", store.len());
            }
            summary
        }
    };

    print_summary(&summary, json)
}

fn print_summary(summary: &ApplySummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }
    println!("✓ '{}' committed on {}", summary.label, summary.backend);
    println!("  creates: {}", summary.counts.creates);
    println!("  updates: {}", summary.counts.updates);
    println!("  deletes: {}", summary.counts.deletes);
    Ok(())
}

async fn cmd_get(db: &str, collection: &str, id: &str) -> Result<()> {
    let resource = SqliteResource::open(db)
        .await
        .with_context(|| format!("cannot open {db}"))?;

    match resource.get(collection, id).await? {
        Some(doc) => println!("{}", serde_json::to_string_pretty(&doc)?),
        None => anyhow::bail!("{collection}/{id} not found"),
    }
    Ok(())
}

fn cmd_info() {
    let defaults = unitwork_core::UnitOfWorkConfig::default();
    println!("UnitWork v{}", env!("CARGO_PKG_VERSION"));
    println!("  Default label: {}", defaults.label);
    println!("  Phase order: create → update → delete");
    println!("  Phase concurrency: unbounded (set \"phase_concurrency\" in the plan config)");
    println!("  Storage backends: memory (dry run), SQLite (--db)");
}
