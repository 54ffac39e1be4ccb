//! # Quill-Chain Node
//!
//! `quill-node run` starts the peer-to-peer node. The other subcommands
//! manage the local data directory directly and should be used while the
//! node is stopped; a running node picks their changes up on restart.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (file, then `QC_*` environment overrides)
//! 2. Install logging
//! 3. Open file storage and load every chain
//! 4. Listen for peers, dial bootstrap and stored peers
//! 5. Serve until Ctrl+C

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::Url;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use node_runtime::{FileStorage, NodeConfig, NodeRuntime};
use qc_01_ledger::{ChainHandle, LedgerRegistry};
use qc_02_gossip::{Peer, PeerDirectory};
use shared_crypto::{to_base58, KeyPair};

/// Quill-Chain peer-to-peer ledger node
#[derive(Parser, Debug)]
#[command(name = "quill-node", version)]
#[command(about = "Peer-to-peer node for signed single-writer block chains")]
struct Args {
    /// Configuration file
    #[arg(short, long, global = true, default_value = "quill.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Run the node
    Run,
    /// Generate a key pair and print its address and WIF
    Keygen,
    /// Create an owned chain with the given genesis payload
    CreateChain { payload: String },
    /// Import an owned chain from its WIF key
    ImportChain { wif: String },
    /// Append a block to an owned chain
    CreateBlock { chain: String, payload: String },
    /// Follow a chain by id (read-only)
    Track { chain: String },
    /// Forget a chain and its blocks
    DeleteChain { chain: String },
    /// List local chains
    Chains,
    /// Print blocks of a chain as JSON lines
    Blocks {
        chain: String,
        #[arg(long, default_value_t = 0)]
        from: u64,
        #[arg(long)]
        to: Option<u64>,
    },
    /// List known peers
    Peers,
    /// Add a peer URL (ws:// or wss://)
    AddPeer { url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Command::Init { force } = args.command {
        return init(&args.config, force);
    }

    let mut config = NodeConfig::load(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    config.apply_env().context("invalid environment override")?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log.level))
        .context("invalid log.level")?;
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Init { .. } => Ok(()),
        Command::Run => {
            info!("===========================================");
            info!("  Quill-Chain Node v{}", env!("CARGO_PKG_VERSION"));
            info!("===========================================");
            NodeRuntime::open(config)?.run().await
        }
        Command::Keygen => {
            let key = KeyPair::generate();
            println!("address: {}", key.address());
            println!("public:  {}", to_base58(&key.public_key()));
            println!("wif:     {}", key.to_wif());
            Ok(())
        }
        command => manage(&config, command),
    }
}

fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    NodeConfig::default()
        .save(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("created config file at {}", path.display());
    Ok(())
}

/// Offline commands over the data directory.
fn manage(config: &NodeConfig, command: Command) -> Result<()> {
    let storage = Arc::new(
        FileStorage::open(&config.data.dir)
            .with_context(|| format!("failed to open storage at {}", config.data.dir.display()))?,
    );
    let ledger = LedgerRegistry::new(storage.clone());
    ledger.load_all()?;

    match command {
        Command::CreateChain { payload } => {
            let handle = ledger.create_chain(payload.into_bytes())?;
            let chain = handle.lock();
            println!("chain: {}", chain.id());
            if let Some(wif) = chain.wif() {
                println!("wif:   {wif}");
            }
        }
        Command::ImportChain { wif } => {
            let handle = ledger.import_chain(&wif)?;
            let chain = handle.lock();
            println!("chain: {} ({} blocks)", chain.id(), chain.count());
        }
        Command::CreateBlock { chain, payload } => {
            let handle = lookup(&ledger, &chain)?;
            let mut chain = handle.lock();
            let block = chain.create_block(payload.into_bytes())?;
            if !chain.save_block(block.clone())? {
                bail!("block {} was not accepted", block.height);
            }
            println!("height: {}", block.height);
            println!("hash:   {}", block.hash);
        }
        Command::Track { chain } => {
            let handle = ledger.track_chain(&chain)?;
            println!("tracking {} ({} blocks)", chain, handle.lock().count());
        }
        Command::DeleteChain { chain } => {
            if !ledger.delete_chain(&chain)? {
                bail!("unknown chain {chain}");
            }
            println!("deleted {chain}");
        }
        Command::Chains => {
            for id in ledger.ids()? {
                let handle = lookup(&ledger, &id)?;
                let chain = handle.lock();
                let role = if chain.is_owner() { "owner" } else { "tracked" };
                println!("{}  {:>8}  {}", chain.id(), chain.count(), role);
            }
        }
        Command::Blocks { chain, from, to } => {
            let handle = lookup(&ledger, &chain)?;
            let chain = handle.lock();
            let to = match to {
                Some(to) => to,
                None if chain.count() == 0 => return Ok(()),
                None => chain.count() - 1,
            };
            for block in chain.get_blocks(from, to)? {
                println!("{}", block.to_json()?);
            }
        }
        Command::Peers => {
            for peer in storage.get_peers(0)? {
                println!("{}  rank={}  last_seen={}", peer.address, peer.rank, peer.last_seen);
            }
        }
        Command::AddPeer { url } => {
            let parsed = Url::parse(&url).with_context(|| format!("invalid URL {url}"))?;
            if !matches!(parsed.scheme(), "ws" | "wss") {
                bail!("peer URL must use ws:// or wss://");
            }
            storage.save_peer(&Peer::discovered(url.as_str()))?;
            println!("added {url}");
        }
        Command::Init { .. } | Command::Run | Command::Keygen => {}
    }
    Ok(())
}

fn lookup(ledger: &LedgerRegistry, id: &str) -> Result<ChainHandle> {
    ledger
        .chain(id)?
        .ok_or_else(|| anyhow!("unknown chain {id}"))
}
