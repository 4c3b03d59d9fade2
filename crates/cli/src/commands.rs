//! Command handlers.

use crate::reader::ProviderReader;
use crate::wallet::{Disconnected, ProviderWallet};
use crate::TradeArgs;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use eyre::{bail, eyre, Context};
use std::sync::Arc;
use tokio::task::JoinHandle;
use trade_engine::units::{format_amount, format_usdc};
use trade_engine::{
    rank_auctions, Address, Amount, AuctionBuyRequest, ClaimAction, CollectAction,
    CollectRequest, CreateContentAction, CreateContentRequest, EngineConfig, FallbackPrices, HttpQuoteClient, LifecycleController,
    MetadataStore, Mode, PriceState, QuoteInputs, Receipt, RewardsSummary, StateReader,
    TradeAction, TradeDirection, TradeView, TxState, WalletClient, U256,
};
use tracing::info;

/// Settings shared by every command.
pub struct Session {
    pub config: EngineConfig,
    pub rpc_url: Option<String>,
    pub private_key: Option<String>,
}

impl Session {
    fn rpc_url(&self) -> eyre::Result<&str> {
        self.rpc_url
            .as_deref()
            .ok_or_else(|| eyre!("an RPC URL is required (--rpc-url or RPC_URL)"))
    }

    /// Wallet for mutating commands.
    fn signer(&self) -> eyre::Result<Arc<ProviderWallet>> {
        let key = self
            .private_key
            .as_deref()
            .ok_or_else(|| eyre!("a private key is required (--private-key or PRIVATE_KEY)"))?;
        Ok(Arc::new(ProviderWallet::connect(self.rpc_url()?, key)?))
    }

    /// Signer if a key is configured, otherwise a read-only connection.
    fn connect(&self) -> eyre::Result<(Arc<dyn WalletClient>, Option<DynProvider>)> {
        if self.private_key.is_some() {
            let wallet = self.signer()?;
            let provider = wallet.provider().clone();
            return Ok((wallet, Some(provider)));
        }
        let provider = match self.rpc_url.as_deref() {
            Some(url) => Some(
                ProviderBuilder::new()
                    .connect_http(url.parse().context("failed to parse RPC URL")?)
                    .erased(),
            ),
            None => None,
        };
        Ok((Arc::new(Disconnected), provider))
    }

    fn reader(&self, provider: DynProvider) -> ProviderReader {
        ProviderReader::new(provider, self.config.contracts.multicall)
    }

    fn quotes(&self) -> eyre::Result<Arc<HttpQuoteClient>> {
        Ok(Arc::new(
            HttpQuoteClient::new(&self.config).wrap_err("failed to build quote client")?,
        ))
    }
}

/// Print every lifecycle transition until aborted.
fn watch_lifecycle(lifecycle: &LifecycleController) -> JoinHandle<()> {
    let mut updates = lifecycle.subscribe();
    let name = lifecycle.name();
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            match snapshot.hash {
                Some(hash) => println!("[{name}] {} {hash}", snapshot.state),
                None => println!("[{name}] {}", snapshot.state),
            }
        }
    })
}

fn report(lifecycle: &LifecycleController, receipt: Receipt) {
    let block = receipt
        .block_number
        .map(|n| n.to_string())
        .unwrap_or_else(|| "?".to_string());
    println!("[{}] {} in block {block}: {}", lifecycle.name(), TxState::Success, receipt.hash);
}

async fn trade_inputs(
    session: &Session,
    args: &TradeArgs,
    account: Option<Address>,
    provider: Option<&DynProvider>,
) -> eyre::Result<(QuoteInputs, FallbackPrices, Option<Amount>)> {
    let direction = if args.sell {
        TradeDirection::Sell
    } else {
        TradeDirection::Buy
    };
    let inputs = QuoteInputs {
        mode: Mode::Trade,
        token: Some(args.token),
        direction,
        amount: args.amount.clone(),
        sell_decimals: 18,
        taker: account,
    };

    let mut prices = FallbackPrices {
        native_usd: args.native_usd,
        token_market_usd: None,
        token_onchain_usd: 0.0,
    };
    let mut balance = None;

    if let Some(provider) = provider {
        let holder = account.unwrap_or(Address::ZERO);
        if let Some(content) = args.content {
            let unit = session
                .reader(provider.clone())
                .unit_state(content, holder)
                .await
                .wrap_err("failed to read community state")?;
            prices = FallbackPrices::from_onchain(args.native_usd, None, unit.price, args.reference_usd);
            if args.sell && account.is_some() {
                balance = Some(unit.account_unit_balance);
            }
        }
        if !args.sell && account.is_some() {
            balance = Some(
                provider
                    .get_balance(holder)
                    .await
                    .wrap_err("failed to read native balance")?,
            );
        }
    }

    Ok((inputs, prices, balance))
}

fn print_view(view: &TradeView, args: &TradeArgs) {
    let (sell, buy) = if args.sell { ("unit", "native") } else { ("native", "unit") };
    match &view.price {
        PriceState::Ready(quote) => println!(
            "{} {sell} -> {} {buy}",
            args.amount,
            format_amount(quote.buy_amount, 18)
        ),
        PriceState::Failed(err) => println!("no quote: {err}"),
        PriceState::Disabled => println!("no quote"),
    }
    let impact = view
        .price_impact
        .map(|v| format!("{v:.2}%"))
        .unwrap_or_else(|| "-".to_string());
    println!("price impact: {impact} ({:?})", view.impact_level);
    println!("slippage: {}%", view.slippage_percent);
    if let Some(min) = view.min_received {
        println!("min received: {} {buy}", format_amount(min, 18));
    }
    println!("status: {}", view.readiness.label());
}

pub async fn price(session: &Session, args: &TradeArgs) -> eyre::Result<()> {
    let (wallet, provider) = session.connect()?;
    let action = TradeAction::new(session.quotes()?, wallet.clone(), &session.config);

    let (inputs, prices, balance) =
        trade_inputs(session, args, wallet.account(), provider.as_ref()).await?;
    let view = action.refresh(&inputs, prices, balance).await;
    print_view(&view, args);
    Ok(())
}

pub async fn trade(session: &Session, args: &TradeArgs) -> eyre::Result<()> {
    let wallet = session.signer()?;
    let action = TradeAction::new(session.quotes()?, wallet.clone(), &session.config);

    let (inputs, prices, balance) = trade_inputs(
        session,
        args,
        Some(wallet.address()),
        Some(wallet.provider()),
    )
    .await?;
    let view = action.refresh(&inputs, prices, balance).await;
    print_view(&view, args);
    if !view.readiness.can_submit() {
        bail!("cannot trade: {}", view.readiness.label());
    }

    let watcher = watch_lifecycle(action.lifecycle());
    let result = action.trade(&inputs).await;
    watcher.abort();

    report(action.lifecycle(), result.wrap_err("trade failed")?);
    Ok(())
}

pub async fn collect(
    session: &Session,
    content: Address,
    token_id: U256,
    slippage: Option<u32>,
) -> eyre::Result<()> {
    let wallet = session.signer()?;
    let state = session
        .reader(wallet.provider().clone())
        .content_state(content, token_id)
        .await
        .wrap_err("failed to read content state")?;

    let action = CollectAction::new(wallet, &session.config);
    let request = CollectRequest {
        content,
        token_id,
        epoch_id: state.epoch_id,
        price: state.price,
        slippage_percent: slippage,
    };
    let max_price = action
        .max_price(request.price, slippage)
        .wrap_err("cannot buffer the auction price")?;
    info!(
        price = %format_usdc(request.price),
        max_price = %format_usdc(max_price),
        "collecting"
    );

    let watcher = watch_lifecycle(action.lifecycle());
    let result = action.collect(&request).await;
    watcher.abort();

    report(action.lifecycle(), result.wrap_err("collect failed")?);
    Ok(())
}

pub async fn auction_buy(session: &Session, content: Address, slippage: Option<u32>) -> eyre::Result<()> {
    let wallet = session.signer()?;
    let state = session
        .reader(wallet.provider().clone())
        .auction_state(content, wallet.address())
        .await
        .wrap_err("failed to read auction state")?;

    let action = CollectAction::new(wallet, &session.config);
    let request = AuctionBuyRequest {
        content,
        epoch_id: state.epoch_id,
        payment_token: state.payment_token,
        price: state.price,
        slippage_percent: slippage,
    };

    let watcher = watch_lifecycle(action.lifecycle());
    let result = action.auction_buy(&request).await;
    watcher.abort();

    report(action.lifecycle(), result.wrap_err("auction buy failed")?);
    Ok(())
}

pub async fn claim(session: &Session, content: Address) -> eyre::Result<()> {
    let action = ClaimAction::new(session.signer()?, &session.config);

    let watcher = watch_lifecycle(action.lifecycle());
    let result = action.claim(content).await;
    watcher.abort();

    report(action.lifecycle(), result.wrap_err("claim failed")?);
    Ok(())
}

pub async fn create(
    session: &Session,
    content: Address,
    uri: String,
    creator: Option<Address>,
) -> eyre::Result<()> {
    let action = CreateContentAction::new(session.signer()?, &session.config);
    let request = CreateContentRequest { content, creator, uri };

    let watcher = watch_lifecycle(action.lifecycle());
    let result = action.create(&request).await;
    watcher.abort();

    report(action.lifecycle(), result.wrap_err("create failed")?);
    Ok(())
}

pub async fn rewards(session: &Session, communities: &[Address]) -> eyre::Result<()> {
    let wallet = session.signer()?;
    let reader = session.reader(wallet.provider().clone());

    let summary = RewardsSummary::load(&reader, communities, wallet.address()).await;
    for (content, rewards) in &summary.per_community {
        println!(
            "{content}: earned {} staked {}",
            format_amount(rewards.earned, 18),
            format_amount(rewards.staked, 18)
        );
    }
    println!(
        "total earned {} across {} communities with rewards",
        format_amount(summary.total_earned, 18),
        summary.with_rewards().len()
    );
    Ok(())
}

pub async fn auctions(session: &Session, communities: &[Address]) -> eyre::Result<()> {
    let (wallet, provider) = session.connect()?;
    let provider = provider.ok_or_else(|| eyre!("an RPC URL is required (--rpc-url or RPC_URL)"))?;
    let reader = session.reader(provider);

    let ranked = rank_auctions(&reader, communities, wallet.account().unwrap_or(Address::ZERO)).await;
    for auction in &ranked {
        println!(
            "{}: epoch {} price {} accumulated {} p/l {}{}",
            auction.content,
            auction.state.epoch_id,
            format_amount(auction.state.price, 18),
            format_usdc(auction.state.quote_accumulated),
            auction.profit_loss,
            if auction.is_profitable() { " (profitable)" } else { "" }
        );
    }
    Ok(())
}

pub async fn metadata(session: &Session, uri: &str) -> eyre::Result<()> {
    let store = MetadataStore::new(&session.config)?;
    let metadata = store.get(uri).await.wrap_err("failed to fetch metadata")?;

    println!("type: {:?}", metadata.content_type);
    for (label, value) in [
        ("name", &metadata.name),
        ("description", &metadata.description),
        ("image", &metadata.image),
        ("text", &metadata.text),
        ("link", &metadata.link),
    ] {
        if let Some(value) = value {
            println!("{label}: {value}");
        }
    }
    Ok(())
}
