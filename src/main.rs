use clap::Parser;
use coinledger::application::ledger::LedgerService;
use coinledger::config::LedgerConfig;
use coinledger::domain::ports::LedgerStoreBox;
use coinledger::infrastructure::in_memory::InMemoryLedgerStore;
use coinledger::interfaces::csv::command_reader::CommandReader;
use coinledger::interfaces::csv::wallet_writer::WalletWriter;
use coinledger::logging::init_logging;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input ledger commands CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Retries after a concurrent wallet update before giving up
    #[arg(long, env = "COINLEDGER_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Base delay between retries, in milliseconds (at most one minute)
    #[arg(
        long,
        env = "COINLEDGER_RETRY_BACKOFF_MS",
        default_value_t = 5,
        value_parser = clap::value_parser!(u64).range(..=60_000)
    )]
    retry_backoff_ms: u64,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn open_store(db_path: Option<PathBuf>) -> Result<LedgerStoreBox> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = coinledger::infrastructure::rocksdb::RocksDBStore::open(path)?;
            Ok(Box::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            warn!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Box::new(InMemoryLedgerStore::new()))
        }
        None => Ok(Box::new(InMemoryLedgerStore::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config = LedgerConfig::default()
        .with_max_retries(cli.max_retries)
        .with_retry_backoff(Duration::from_millis(cli.retry_backoff_ms));
    let service = LedgerService::with_config(open_store(cli.db_path)?, config);

    let file = File::open(cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    // Row 1 is the header.
    for (row, command) in reader.commands().enumerate().map(|(i, c)| (i + 2, c)) {
        match command {
            Ok(command) => {
                if let Err(e) = command.apply(&service).await {
                    warn!(row, error = %e, "Error applying command");
                }
            }
            Err(e) => {
                warn!(row, error = %e, "Error reading command");
            }
        }
    }

    let wallets = service.wallets().await?;
    let stdout = io::stdout();
    WalletWriter::new(stdout.lock()).write_wallets(wallets)?;

    Ok(())
}
