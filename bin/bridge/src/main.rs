use alloy::network::EthereumWallet;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::reqwest::Url;
use alloy_primitives::Address;
use bridge_sync::views::{BalanceEntry, BalanceView, Balances, HistorySnapshot, HistoryView};
use bridge_sync::{
    activate, AlloyChainClient, ChainReader, HistoryConfig, HistoryScanner, RefreshCoordinator,
    RefreshableView, SessionProvider, StaticSession, SubmissionConfig, SubmissionState,
    SubmissionTracker, TransferRecord,
};
use clap::{Parser, Subcommand};
use common::Chain;
use eyre::{eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;

use config::BridgeConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration directory
    #[arg(long, default_value = "./configs/dev")]
    config_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Print snapshots as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Native balance on both chains
    Balances {
        #[arg(long)]
        address: Address,
    },
    /// Recent deposits sent by an address
    History {
        #[arg(long)]
        address: Address,

        /// Override the number of blocks scanned back from the head
        #[arg(long)]
        lookback: Option<u64>,
    },
    /// Bridge ETH from the source chain, signing with PRIVATE_KEY
    Deposit {
        /// Amount in ETH, e.g. 0.1
        #[arg(long)]
        amount: String,

        /// Credit another address on the destination chain
        #[arg(long)]
        recipient: Option<String>,

        #[arg(long)]
        min_gas_limit: Option<u32>,
    },
    /// Keep balances and history refreshed until Ctrl-C
    Watch {
        #[arg(long)]
        address: Address,
    },
}

struct Clients {
    source: Arc<AlloyChainClient<DynProvider>>,
    destination: Arc<AlloyChainClient<DynProvider>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = PathBuf::from(&cli.config_path).join("bridge.json");
    let config = if config_path.exists() {
        BridgeConfig::load_from_file(&config_path).await?
    } else {
        tracing::warn!("bridge.json not found, using defaults");
        BridgeConfig::default()
    }
    .with_env_overrides();

    let contract: Address = config.bridge_contract.parse()?;
    tracing::info!(
        source = %config.source,
        destination = %config.destination,
        %contract,
        "Config loaded"
    );

    match cli.command {
        Command::Balances { address } => {
            let clients = read_clients(&config)?;
            let session = Arc::new(StaticSession::connected(address, config.source.chain_id));
            let view = balance_view(session, &clients);
            let balances = view.refresh().await?;
            print_balances(&config, &balances, cli.json)?;
        }
        Command::History { address, lookback } => {
            let clients = read_clients(&config)?;
            let mut history_config = history_config(&config, contract);
            if let Some(blocks) = lookback {
                history_config = history_config.with_lookback_blocks(blocks);
            }
            let scanner = HistoryScanner::new(clients.source.clone(), history_config);
            let (records, report) = scanner.scan(address).await?;
            if !report.is_complete() {
                tracing::warn!("{}", report);
            }
            print_records(&config.source, &records, cli.json)?;
        }
        Command::Deposit {
            amount,
            recipient,
            min_gas_limit,
        } => {
            deposit(
                &config,
                contract,
                &amount,
                recipient.as_deref(),
                min_gas_limit,
                cli.json,
            )
            .await?;
        }
        Command::Watch { address } => {
            let clients = read_clients(&config)?;
            let session = Arc::new(StaticSession::connected(address, config.source.chain_id));
            watch(&config, contract, session, &clients, cli.json).await?;
        }
    }

    Ok(())
}

fn rpc_url(chain: &Chain) -> Result<Url> {
    chain
        .rpc_url
        .parse()
        .map_err(|e| eyre!("Invalid RPC URL for {}: {}", chain, e))
}

fn read_clients(config: &BridgeConfig) -> Result<Clients> {
    let source = ProviderBuilder::new()
        .connect_http(rpc_url(&config.source)?)
        .erased();
    let destination = ProviderBuilder::new()
        .connect_http(rpc_url(&config.destination)?)
        .erased();
    Ok(Clients {
        source: Arc::new(AlloyChainClient::new(source, config.source.chain_id)),
        destination: Arc::new(AlloyChainClient::new(
            destination,
            config.destination.chain_id,
        )),
    })
}

fn history_config(config: &BridgeConfig, contract: Address) -> HistoryConfig {
    HistoryConfig::new(contract)
        .with_lookback_blocks(config.history.lookback_blocks)
        .with_partition_size(config.history.partition_size)
        .with_max_records(config.history.max_records)
}

fn balance_view(session: Arc<dyn SessionProvider>, clients: &Clients) -> Arc<BalanceView> {
    let readers: Vec<Arc<dyn ChainReader>> =
        vec![clients.source.clone() as Arc<dyn ChainReader>, clients.destination.clone()];
    Arc::new(BalanceView::new(session, readers))
}

async fn deposit(
    config: &BridgeConfig,
    contract: Address,
    amount: &str,
    recipient: Option<&str>,
    min_gas_limit: Option<u32>,
    json: bool,
) -> Result<()> {
    let private_key =
        std::env::var("PRIVATE_KEY").map_err(|_| eyre!("PRIVATE_KEY must be set to deposit"))?;
    let signer: PrivateKeySigner = private_key.parse()?;
    let sender = signer.address();

    let provider = ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer))
        .connect_http(rpc_url(&config.source)?)
        .erased();
    let signing_client = Arc::new(
        AlloyChainClient::new(provider, config.source.chain_id)
            .with_receipt_poll_interval(config.refresh.receipt_poll_interval()),
    );

    // The wallet is "on" whatever chain its endpoint reports
    let remote_chain_id = signing_client.remote_chain_id().await?;
    let session = Arc::new(StaticSession::connected(sender, remote_chain_id));
    tracing::info!(%sender, chain_id = remote_chain_id, "Wallet connected");

    let clients = read_clients(config)?;
    let coordinator = Arc::new(RefreshCoordinator::new());
    let balances = balance_view(session.clone(), &clients);
    let history = Arc::new(HistoryView::new(
        session.clone(),
        HistoryScanner::new(clients.source.clone(), history_config(config, contract)),
    ));
    let poll_interval = config.refresh.poll_interval();
    let active_balances = activate(balances.clone(), coordinator.clone(), poll_interval);
    let active_history = activate(history.clone(), coordinator.clone(), poll_interval);

    let submission_config = SubmissionConfig {
        default_min_gas_limit: config.min_gas_limit,
        balances_delay: config.refresh.balances_delay(),
        history_delay: config.refresh.history_delay(),
        ..SubmissionConfig::new(config.source.chain_id, contract)
    };
    let tracker = SubmissionTracker::new(
        submission_config,
        session,
        signing_client,
        coordinator,
    );

    let mut states = tracker.submit(amount, recipient, min_gas_limit)?;
    let mut last = SubmissionState::Idle;
    while let Some(state) = states.recv().await {
        println!("{}", state);
        if let (SubmissionState::Pending(_), Some(hash)) = (&state, state.tx_hash()) {
            println!("  {}", config.source.tx_url(&format!("{:?}", hash)));
        }
        last = state;
    }

    if let SubmissionState::Confirmed(_) = last {
        // Let the delayed refreshes land before printing
        let settle = config.refresh.history_delay() + std::time::Duration::from_secs(1);
        tokio::time::sleep(settle).await;
        print_balances(config, &balances.snapshot(), json)?;
        print_history(&config.source, &history.snapshot(), json)?;
    }

    tracker.shutdown();
    active_balances.deactivate().await;
    active_history.deactivate().await;

    match last {
        SubmissionState::Failed(e) => Err(eyre!("Deposit failed: {}", e)),
        _ => Ok(()),
    }
}

async fn watch(
    config: &BridgeConfig,
    contract: Address,
    session: Arc<StaticSession>,
    clients: &Clients,
    json: bool,
) -> Result<()> {
    let coordinator = Arc::new(RefreshCoordinator::new());
    let balances = balance_view(session.clone(), clients);
    let history = Arc::new(HistoryView::new(
        session,
        HistoryScanner::new(clients.source.clone(), history_config(config, contract)),
    ));
    let poll_interval = config.refresh.poll_interval();
    let active_balances = activate(balances.clone(), coordinator.clone(), poll_interval);
    let active_history = activate(history.clone(), coordinator, poll_interval);

    let cancel_token = CancellationToken::new();
    let ctrl_c_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested");
        }
        ctrl_c_token.cancel();
    });

    let mut interval = tokio::time::interval(poll_interval);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                print_balances(config, &balances.snapshot(), json)?;
                print_history(&config.source, &history.snapshot(), json)?;
            }
            _ = cancel_token.cancelled() => break,
        }
    }

    active_balances.deactivate().await;
    active_history.deactivate().await;
    Ok(())
}

fn print_balances(config: &BridgeConfig, balances: &Balances, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(balances)?);
        return Ok(());
    }
    for chain in [&config.source, &config.destination] {
        match balances.get(chain.chain_id) {
            Some(BalanceEntry::Loaded(snapshot)) => println!(
                "{:<24} {} {}",
                chain.display_name,
                snapshot.amount_ether(),
                chain.native_symbol
            ),
            Some(BalanceEntry::Failed { error, .. }) => {
                println!("{:<24} error: {}", chain.display_name, error)
            }
            None => println!("{:<24} -", chain.display_name),
        }
    }
    Ok(())
}

fn print_history(chain: &Chain, snapshot: &HistorySnapshot, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(snapshot)?);
        return Ok(());
    }
    if let Some(error) = &snapshot.error {
        println!("{}", error);
    }
    print_records(chain, &snapshot.records, false)
}

fn print_records(chain: &Chain, records: &[TransferRecord], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("No transactions found");
    }
    for record in records {
        println!("{}  {}", record, record.explorer_url(chain));
    }
    Ok(())
}
