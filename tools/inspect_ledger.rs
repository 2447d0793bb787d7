//! Ledger inspection tool
//!
//! Opens a RocksDB ledger read-only and prints tickets or draw results as JSON.

use clap::{Parser, Subcommand};
use lottery_ledger::common::traits::AuthoritativeStore;
use lottery_ledger::storage::RocksDbStore;
use lottery_ledger::{IssueId, LotteryProduct, UserId};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "inspect_ledger")]
#[command(about = "Inspect tickets and draw results of a lottery ledger")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Ledger data directory
    #[arg(short, long, default_value = "./ledger_data")]
    data_dir: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Tickets placed on one issue
    Issue {
        #[arg(short, long)]
        product: LotteryProduct,
        #[arg(short, long)]
        issue: String,
    },

    /// Tickets of one user, newest first
    User {
        #[arg(short, long)]
        user: String,
    },

    /// Draw result of one issue
    Result {
        #[arg(short, long)]
        product: LotteryProduct,
        #[arg(short, long)]
        issue: String,
    },

    /// All draw results of a product, newest first
    Results {
        #[arg(short, long)]
        product: LotteryProduct,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "lottery_ledger=debug" } else { "lottery_ledger=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let store = RocksDbStore::open_read_only(&cli.data_dir)?;
    info!(path = %cli.data_dir.display(), "Opened ledger read-only");

    match cli.command {
        Commands::Issue { product, issue } => {
            let tickets = store.tickets_by_issue(product, &IssueId::parse(issue)?).await?;
            info!(count = tickets.len(), "Tickets found");
            print_json(&tickets)?;
        }
        Commands::User { user } => {
            let tickets = store.tickets_by_user(&UserId::parse(user)?).await?;
            info!(count = tickets.len(), "Tickets found");
            print_json(&tickets)?;
        }
        Commands::Result { product, issue } => {
            let issue = IssueId::parse(issue)?;
            match store.get_draw_result(product, &issue).await? {
                Some(result) => print_json(&result)?,
                None => {
                    eprintln!("No draw result for {} issue {}", product, issue);
                    std::process::exit(1);
                }
            }
        }
        Commands::Results { product } => {
            let results = store.draw_results_by_product(product).await?;
            print_json(&results)?;
        }
    }

    Ok(())
}
