//! Command-line front end: `run` starts a node behind the JSON-RPC server,
//! `create` is a one-shot smoke-test client that deploys a token on a
//! running node (spec §6).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use jsonrpsee::ws_client::WsClientBuilder;

use memoriae_node::dispatch::Node;
use memoriae_node::rpc::MemoriaeApiClient;
use memoriae_runtime::Amount;

#[derive(Parser)]
#[command(name = "memoriae", about = "Off-chain settlement engine for a decentralized storage marketplace")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the node and serve its JSON-RPC API.
    Run {
        /// Path to a TOML config file (see `memoriae_node::config::Config`).
        #[arg(long)]
        config: PathBuf,
    },
    /// Deploy a new ErcToken on a running node and print its address.
    Create {
        /// WebSocket URL of a running node, e.g. ws://127.0.0.1:8645.
        #[arg(long)]
        url: String,
        /// Path to a file holding the admin's 32-byte secret key as hex.
        #[arg(long)]
        admin_secret: PathBuf,
        /// The admin's current nonce (0 for a fresh admin identity).
        #[arg(long, default_value_t = 0)]
        nonce: u64,
        /// Deployment seed, mixed into the deterministic contract address.
        #[arg(long)]
        seed: String,
        /// Initial supply to mint to the admin, as a decimal string.
        #[arg(long)]
        initial_supply: String,
    },
}

pub fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let cli = Cli::parse();
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(dispatch(cli))
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Run { config } => run(config).await,
        Command::Create { url, admin_secret, nonce, seed, initial_supply } => {
            create(url, admin_secret, nonce, seed, initial_supply).await
        }
    }
}

async fn run(config_path: PathBuf) -> anyhow::Result<()> {
    let config = memoriae_node::Config::load(config_path.to_str().ok_or_else(|| anyhow::anyhow!("config path is not valid UTF-8"))?)?;

    let admin = config.admin_address()?;
    let foundation = config.foundation_address()?;
    let pledge_keeper = config.pledge_keeper_amount()?;
    let pledge_provider = config.pledge_provider_amount()?;

    let node = Arc::new(Node::bootstrap(admin, foundation, pledge_keeper, pledge_provider));
    let addr: SocketAddr = config.listen_addr.parse()?;

    let handle = memoriae_node::server::serve(node, addr).await?;
    log::info!("memoriae node serving on {}", addr);
    handle.stopped().await;
    Ok(())
}

async fn create(url: String, admin_secret: PathBuf, nonce: u64, seed: String, initial_supply: String) -> anyhow::Result<()> {
    let secret_hex = std::fs::read_to_string(&admin_secret)?;
    let secret_bytes = hex::decode(secret_hex.trim())?;
    let secret_key = libsecp256k1::SecretKey::parse_slice(&secret_bytes)?;
    let pubkey = libsecp256k1::PublicKey::from_secret_key(&secret_key);
    let admin = memoriae_crypto::address_from_pubkey(&pubkey.serialize());

    let digest = memoriae_crypto::nonce_message(nonce);
    let sig = memoriae_crypto::sign(&secret_key, &digest);

    let supply = Amount::from_str(&initial_supply).map_err(|_| anyhow::anyhow!("invalid initial supply: {}", initial_supply))?;

    let client = WsClientBuilder::default().build(&url).await?;
    let address = client.create_erc_token(admin, nonce, sig.to_vec(), seed, supply).await?;
    println!("{}", address);
    Ok(())
}
