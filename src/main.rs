//! zether-node: Zether transaction prebuilder and mempool execution core.

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use zether_core::config::Config;
use zether_core::mempool::{self, NewWork};
use zether_core::store::StoreHandle;

#[derive(Parser)]
#[command(name = "zether-node")]
#[command(about = "Zether transaction prebuilder and mempool execution core")]
struct Cli {
    /// Path to the JSON config file; defaults built in when omitted.
    #[arg(short, long)]
    config: Option<String>,

    /// Path to the store directory; in-memory when omitted.
    #[arg(short, long)]
    store: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Run the mempool worker against an empty tip, report after a fixed wait.
    MempoolRun {
        /// Chain height to announce as the current tip.
        #[arg(long, default_value = "1")]
        height: u64,
    },

    /// Show the resolved configuration.
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("zether_core=info".parse().unwrap()))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Command::Info => show_info(&config),
        Command::MempoolRun { height } => run_mempool(&cli, height).await?,
    }

    Ok(())
}

fn show_info(config: &Config) {
    println!("block_max_size: {}", config.block_max_size);
    println!("transactions_max_data_length: {}", config.transactions_max_data_length);
    println!("consensus_type: {}", config.consensus_type_full);
}

async fn run_mempool(cli: &Cli, height: u64) -> anyhow::Result<()> {
    let store = match &cli.store {
        Some(path) => StoreHandle::open(path)?,
        None => StoreHandle::open_in_memory()?,
    };

    let cancel = CancellationToken::new();
    let (handles, result_handle) = mempool::spawn(store, cancel.clone());

    handles
        .new_work
        .send(NewWork {
            chain_hash: vec![0u8; 32],
            chain_height: height,
        })
        .await?;

    tracing::info!(height, "mempool worker started, waiting for scan to settle");
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let snapshot = result_handle.read();
    println!("included txs: {}", snapshot.txs.len());
    println!("total size: {}", snapshot.total_size);

    cancel.cancel();
    Ok(())
}
