use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};

use inventory_ledger::{
    config::{self, AppConfig},
    db,
    models::{DocumentType, StatusChange},
    services::{stock_queries::BalanceDrift, LedgerServices},
};

#[derive(Parser)]
#[command(name = "ledger-admin", about = "Inventory ledger administration", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the embedded schema migrations
    Migrate,
    /// Recompute every stock summary row from the movement log
    Verify,
    /// Print the stock summary of one warehouse
    Stock {
        #[arg(long, help = "Warehouse code")]
        warehouse: String,
    },
    /// Cancel a whole document, or only the given lines of it
    Cancel {
        #[arg(long, help = "Document type, e.g. PurchaseReceipt")]
        doc_type: DocumentType,
        #[arg(long)]
        doc_no: String,
        #[arg(long = "line", help = "Line number to cancel; repeat for several")]
        lines: Vec<i32>,
        #[arg(long, help = "Recorded actor; defaults to the configured default_actor")]
        actor: Option<String>,
    },
    /// Re-derive line flags and header status of a chain document
    Refresh {
        #[arg(long)]
        doc_type: DocumentType,
        #[arg(long)]
        doc_no: String,
    },
}

#[derive(Serialize)]
struct StockRow {
    warehouse: String,
    item: String,
    batch: String,
    source: String,
    received: String,
    transferred_in: String,
    consumed: String,
    available: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config().context("failed to load configuration")?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    match cli.command {
        Commands::Migrate => handle_migrate(&cfg).await,
        Commands::Verify => handle_verify(&cfg, cli.json).await,
        Commands::Stock { warehouse } => handle_stock(&cfg, &warehouse, cli.json).await,
        Commands::Cancel {
            doc_type,
            doc_no,
            lines,
            actor,
        } => {
            let actor = actor.unwrap_or_else(|| cfg.default_actor.clone());
            handle_cancel(&cfg, doc_type, &doc_no, &lines, &actor, cli.json).await
        }
        Commands::Refresh { doc_type, doc_no } => {
            handle_refresh(&cfg, doc_type, doc_no, cli.json).await
        }
    }
}

async fn connect(cfg: &AppConfig) -> Result<LedgerServices> {
    let pool = db::establish_connection_from_app_config(cfg)
        .await
        .context("failed to connect to the database")?;
    Ok(LedgerServices::new(Arc::new(pool), cfg.ledger_policy()))
}

async fn handle_migrate(cfg: &AppConfig) -> Result<()> {
    let services = connect(cfg).await?;
    db::run_migrations(services.db())
        .await
        .context("failed running migrations")?;
    println!("Migrations applied");
    Ok(())
}

async fn handle_verify(cfg: &AppConfig, json: bool) -> Result<()> {
    let services = connect(cfg).await?;
    let drifts = services
        .stock
        .verify_balances()
        .await
        .context("failed to verify balances")?;

    if json {
        print_json(&drifts)?;
    } else if drifts.is_empty() {
        println!("Stock summary balances with the movement log");
    } else {
        print_drifts(&drifts);
    }

    if drifts.is_empty() {
        info!("Balance verification passed");
        Ok(())
    } else {
        error!(drifts = drifts.len(), "Balance verification failed");
        std::process::exit(2);
    }
}

async fn handle_stock(cfg: &AppConfig, warehouse: &str, json: bool) -> Result<()> {
    let services = connect(cfg).await?;
    let rows: Vec<StockRow> = services
        .stock
        .warehouse_stock(warehouse)
        .await
        .with_context(|| format!("failed to load stock for {warehouse}"))?
        .into_iter()
        .map(|row| StockRow {
            available: row.available().normalize().to_string(),
            received: row.received.normalize().to_string(),
            transferred_in: row.transferred_in.normalize().to_string(),
            consumed: row.consumed.normalize().to_string(),
            warehouse: row.warehouse,
            item: row.item,
            batch: row.batch,
            source: row.source,
        })
        .collect();

    if json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("No stock recorded for {warehouse}");
        return Ok(());
    }
    println!(
        "{:<20} {:<16} {:<16} {:>12} {:>12} {:>12} {:>12}",
        "ITEM", "BATCH", "SOURCE", "RECEIVED", "TRANSFER IN", "CONSUMED", "AVAILABLE"
    );
    for row in rows {
        println!(
            "{:<20} {:<16} {:<16} {:>12} {:>12} {:>12} {:>12}",
            row.item,
            row.batch,
            row.source,
            row.received,
            row.transferred_in,
            row.consumed,
            row.available
        );
    }
    Ok(())
}

async fn handle_cancel(
    cfg: &AppConfig,
    doc_type: DocumentType,
    doc_no: &str,
    lines: &[i32],
    actor: &str,
    json: bool,
) -> Result<()> {
    let services = connect(cfg).await?;
    let outcome = if lines.is_empty() {
        services
            .cancellations
            .cancel_document(doc_type, doc_no, actor)
            .await
    } else {
        services
            .cancellations
            .cancel_lines(doc_type, doc_no, lines, actor)
            .await
    }
    .with_context(|| format!("failed to cancel {doc_type} {doc_no}"))?;

    if json {
        return print_json(&outcome);
    }
    if outcome.lines_cancelled.is_empty() {
        println!("{doc_type} {doc_no}: nothing left to cancel");
        return Ok(());
    }
    println!(
        "{doc_type} {doc_no}: cancelled line(s) {:?} as {actor}, {} movement(s) reversed",
        outcome.lines_cancelled, outcome.reversal.movements_cancelled
    );
    print_status_changes(&outcome.status_changes);
    Ok(())
}

async fn handle_refresh(
    cfg: &AppConfig,
    doc_type: DocumentType,
    doc_no: String,
    json: bool,
) -> Result<()> {
    let services = connect(cfg).await?;
    let changes = services
        .propagator
        .refresh(doc_type, &[doc_no.clone()])
        .await
        .with_context(|| format!("failed to refresh {doc_type} {doc_no}"))?;

    if json {
        return print_json(&changes);
    }
    if changes.is_empty() {
        println!("{doc_type} {doc_no}: status already current");
    }
    print_status_changes(&changes);
    Ok(())
}

fn print_status_changes(changes: &[StatusChange]) {
    for change in changes {
        let from = change
            .from
            .map(|status| status.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {} {}: {} -> {}",
            change.doc_type, change.doc_no, from, change.to
        );
    }
}

fn print_drifts(drifts: &[BalanceDrift]) {
    println!("{} stock key(s) out of balance:", drifts.len());
    for drift in drifts {
        println!(
            "  {}: summary {}/{}/{} vs movements {}/{}/{}",
            drift.key,
            drift.summary.received,
            drift.summary.transferred_in,
            drift.summary.consumed,
            drift.movements.received,
            drift.movements.transferred_in,
            drift.movements.consumed
        );
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
