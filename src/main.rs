use clap::{Parser, ValueEnum};
use miette::{IntoDiagnostic, Result};
use mktledger::application::engine::MarketplaceEngine;
use mktledger::config::EngineConfig;
use mktledger::domain::ports::LedgerStoreRef;
use mktledger::error::LedgerError;
use mktledger::infrastructure::in_memory::InMemoryLedgerStore;
#[cfg(feature = "storage-rocksdb")]
use mktledger::infrastructure::rocksdb::RocksDBStore;
use mktledger::interfaces::csv::account_writer::AccountWriter;
use mktledger::interfaces::csv::command_reader::CommandReader;
use mktledger::interfaces::csv::replay;
use mktledger::telemetry::{get_subscriber, init_subscriber};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input commands CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Currency assigned to accounts opened during this run
    #[arg(long, env = "LEDGER_CURRENCY", default_value = "TZS")]
    currency: String,

    /// Attempts per operation when a concurrent update wins the race
    #[arg(long, default_value_t = 3)]
    max_conflict_retries: u32,

    /// Format of the account summaries written to stdout
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn open_store(db_path: Option<PathBuf>) -> Result<LedgerStoreRef> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => Ok(Arc::new(RocksDBStore::open(path)?)),
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            tracing::warn!(
                "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Arc::new(InMemoryLedgerStore::new()))
        }
        None => Ok(Arc::new(InMemoryLedgerStore::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_subscriber(get_subscriber(&cli.log_level)).into_diagnostic()?;

    let config = EngineConfig::default()
        .with_currency(cli.currency)
        .with_max_conflict_retries(cli.max_conflict_retries);
    let engine = MarketplaceEngine::new(open_store(cli.db_path)?, config);

    let mut events = engine.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::debug!(?event, "ledger event"),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event listener lagged")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Process commands
    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for (index, instruction) in reader.instructions().enumerate() {
        let outcome = match instruction {
            Ok(instruction) => replay::execute(&engine, instruction).await,
            Err(e) => Err(e),
        };
        if let Err(e) = outcome {
            if e.is_infrastructure() && !matches!(e, LedgerError::Csv(_)) {
                return Err(e.into());
            }
            tracing::warn!(instruction = index + 1, error = %e, "command rejected");
        }
    }

    // Drift is logged per account.
    engine.reconcile_all().await?;

    let summaries = engine.summaries().await?;
    let stdout = io::stdout();
    let mut writer = AccountWriter::new(stdout.lock());
    match cli.format {
        OutputFormat::Csv => writer.write_csv(&summaries)?,
        OutputFormat::Json => writer.write_json(&summaries)?,
    }

    Ok(())
}
