//! Command line front-end for trading community tokens and collecting
//! content.
//!
//! Run with: `cargo run -p trade-cli -- --help`

mod commands;
mod config;
mod reader;
mod wallet;

use crate::config::FileConfig;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use trade_engine::{Address, U256};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "content-trader", author, version, about, long_about = None)]
struct Cli {
    /// JSON-RPC endpoint of the chain
    #[arg(long, env = "RPC_URL", global = true)]
    rpc_url: Option<String>,

    /// Private key of the trading account
    #[arg(long, env = "PRIVATE_KEY", global = true, hide_env_values = true)]
    private_key: Option<String>,

    /// API key for the quoting service
    #[arg(long, env = "QUOTE_API_KEY", global = true, hide_env_values = true)]
    quote_api_key: Option<String>,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct TradeArgs {
    /// Community token address
    #[arg(long)]
    pub token: Address,

    /// Amount to sell, in whole units
    #[arg(long)]
    pub amount: String,

    /// Sell the community token instead of buying it
    #[arg(long)]
    pub sell: bool,

    /// USD price of the native asset, used when quotes carry no USD value
    #[arg(long, default_value_t = 0.0)]
    pub native_usd: f64,

    /// USD price of the reference token the on-chain unit price is quoted in
    #[arg(long, default_value_t = 0.0)]
    pub reference_usd: f64,

    /// Community whose state provides the on-chain unit price
    #[arg(long)]
    pub content: Option<Address>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the current quote, slippage and price impact
    Price(TradeArgs),
    /// Buy or sell a community token
    Trade(TradeArgs),
    /// Collect a content token from its auction
    Collect {
        #[arg(long)]
        content: Address,
        #[arg(long)]
        token_id: U256,
        /// Slippage buffer in percent (defaults to the configured buffer)
        #[arg(long)]
        slippage: Option<u32>,
    },
    /// Buy out a community auction
    AuctionBuy {
        #[arg(long)]
        content: Address,
        #[arg(long)]
        slippage: Option<u32>,
    },
    /// Claim accrued rewards of a community
    Claim {
        #[arg(long)]
        content: Address,
    },
    /// Mint new content from already-uploaded metadata
    Create {
        /// Content contract of the community
        #[arg(long)]
        content: Address,
        /// ipfs:// or http(s):// URI of the metadata document
        #[arg(long)]
        uri: String,
        /// Receiver of the new token (defaults to the signing account)
        #[arg(long)]
        creator: Option<Address>,
    },
    /// Pending rewards across communities
    Rewards {
        #[arg(long, value_delimiter = ',', required = true)]
        communities: Vec<Address>,
    },
    /// Auctions ranked by estimated profit
    Auctions {
        #[arg(long, value_delimiter = ',', required = true)]
        communities: Vec<Address>,
    },
    /// Fetch content metadata by URI
    Metadata {
        uri: String,
    },
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "content_trader=debug,trade_engine=debug"
    } else {
        "content_trader=info,trade_engine=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    let file = FileConfig::load(cli.config.as_deref())?;
    let mut engine = file.engine;
    if cli.quote_api_key.is_some() {
        engine.quote_api_key = cli.quote_api_key.clone();
    }
    let session = commands::Session {
        config: engine,
        rpc_url: cli.rpc_url.or(file.rpc_url),
        private_key: cli.private_key,
    };

    match cli.command {
        Command::Price(args) => commands::price(&session, &args).await,
        Command::Trade(args) => commands::trade(&session, &args).await,
        Command::Collect {
            content,
            token_id,
            slippage,
        } => commands::collect(&session, content, token_id, slippage).await,
        Command::AuctionBuy { content, slippage } => {
            commands::auction_buy(&session, content, slippage).await
        }
        Command::Claim { content } => commands::claim(&session, content).await,
        Command::Create {
            content,
            uri,
            creator,
        } => commands::create(&session, content, uri, creator).await,
        Command::Rewards { communities } => commands::rewards(&session, &communities).await,
        Command::Auctions { communities } => commands::auctions(&session, &communities).await,
        Command::Metadata { uri } => commands::metadata(&session, &uri).await,
    }
}
