//! Trading the community token against the native asset.
//!
//! [`TradeAction::refresh`] is called whenever the form inputs change: it
//! fetches an indicative price, derives slippage and price impact, and
//! prefetches a firm quote at that tolerance. [`TradeAction::trade`] only
//! submits a firm quote that still matches the inputs and is younger than
//! the configured validity window.

use super::ActionError;
use crate::batcher::CallBatcher;
use crate::call::{Call, CallError};
use crate::config::EngineConfig;
use crate::lifecycle::{LifecycleController, LifecycleError, TxError, TxSnapshot, TxState};
use crate::quote::{FirmRequest, PriceState, Quote, QuoteError, QuoteInputs, QuoteSource};
use crate::slippage::{self, FallbackPrices, ImpactLevel, SlippageInput, SlippagePolicy};
use crate::types::{is_native, Amount, TradeDirection, TOKEN_DECIMALS};
use crate::wallet::{Receipt, WalletClient};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// What the submit control should show, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitReadiness {
    /// A result is on display until the lifecycle resets.
    Settled(TxState),
    ConnectWallet,
    EnterAmount,
    InsufficientBalance,
    NoLiquidity,
    InFlight(TxState),
    Loading,
    Ready(TradeDirection),
}

impl SubmitReadiness {
    /// Only [`SubmitReadiness::Ready`] may submit.
    pub fn can_submit(&self) -> bool {
        matches!(self, SubmitReadiness::Ready(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            SubmitReadiness::Settled(TxState::Success) => "Trade successful!",
            SubmitReadiness::Settled(_) => "Trade failed",
            SubmitReadiness::ConnectWallet => "Connect Wallet",
            SubmitReadiness::EnterAmount => "Enter amount",
            SubmitReadiness::InsufficientBalance => "Insufficient balance",
            SubmitReadiness::NoLiquidity => "No liquidity",
            SubmitReadiness::InFlight(TxState::Confirming) => "Confirming…",
            SubmitReadiness::InFlight(_) => "Swapping…",
            SubmitReadiness::Loading => "Loading…",
            SubmitReadiness::Ready(TradeDirection::Buy) => "Buy",
            SubmitReadiness::Ready(TradeDirection::Sell) => "Sell",
        }
    }

    fn evaluate(
        inputs: &QuoteInputs,
        balance: Option<Amount>,
        has_no_liquidity: bool,
        state: TxState,
        firm_ready: bool,
    ) -> Self {
        if state.is_terminal() {
            return SubmitReadiness::Settled(state);
        }
        if inputs.taker.is_none() {
            return SubmitReadiness::ConnectWallet;
        }
        let Some(amount) = inputs.sell_amount() else {
            return SubmitReadiness::EnterAmount;
        };
        if balance.is_some_and(|balance| amount > balance) {
            return SubmitReadiness::InsufficientBalance;
        }
        if has_no_liquidity {
            return SubmitReadiness::NoLiquidity;
        }
        if state.is_in_flight() {
            return SubmitReadiness::InFlight(state);
        }
        if !firm_ready {
            return SubmitReadiness::Loading;
        }
        SubmitReadiness::Ready(inputs.direction)
    }
}

/// Everything the trade form renders after a refresh.
#[derive(Debug, Clone)]
pub struct TradeView {
    pub price: PriceState,
    pub firm: Option<Quote>,
    /// Tolerance in whole percent.
    pub slippage_percent: u32,
    pub price_impact: Option<f64>,
    pub impact_level: ImpactLevel,
    pub min_received: Option<Amount>,
    pub has_no_liquidity: bool,
    pub readiness: SubmitReadiness,
}

#[derive(Debug, Clone)]
struct FirmQuote {
    request: FirmRequest,
    quote: Quote,
    fetched_at: Instant,
}

#[derive(Debug, Default)]
struct TradeCache {
    has_no_liquidity: bool,
    firm: Option<FirmQuote>,
}

pub struct TradeAction<Q: ?Sized, W: ?Sized> {
    quotes: Arc<Q>,
    batcher: CallBatcher<W>,
    lifecycle: LifecycleController,
    policy: SlippagePolicy,
    firm_ttl: Duration,
    quote_timeout: Duration,
    cache: Mutex<TradeCache>,
}

impl<Q, W> TradeAction<Q, W>
where
    Q: QuoteSource + ?Sized,
    W: WalletClient + ?Sized,
{
    pub fn new(quotes: Arc<Q>, wallet: Arc<W>, config: &EngineConfig) -> Self {
        Self {
            quotes,
            batcher: CallBatcher::new(wallet, config.chain_id),
            lifecycle: LifecycleController::new("trade", config.trade_display_window),
            policy: SlippagePolicy::new(config.slippage),
            firm_ttl: config.firm_quote_ttl,
            quote_timeout: config.quote_timeout,
            cache: Mutex::new(TradeCache::default()),
        }
    }

    /// Re-quote for the current inputs and prefetch a firm quote.
    pub async fn refresh(
        &self,
        inputs: &QuoteInputs,
        prices: FallbackPrices,
        balance: Option<Amount>,
    ) -> TradeView {
        let price = match inputs.price_request() {
            Ok(request) => PriceState::from(self.bounded(self.quotes.get_price(&request)).await),
            Err(err) => {
                debug!(%err, "price fetch disabled");
                PriceState::Disabled
            }
        };
        if let PriceState::Failed(err) = &price {
            debug!(%err, "no indicative price");
        }

        let input = SlippageInput {
            quote: price.quote(),
            amount: &inputs.amount,
            direction: inputs.direction,
            buy_decimals: TOKEN_DECIMALS,
            prices,
        };
        let slippage_percent = self.policy.tolerance(&input);
        let slippage_bps = self.policy.tolerance_bps(&input);
        let price_impact = slippage::price_impact(&input);
        let min_received = price
            .quote()
            .filter(|quote| quote.has_route())
            .map(|quote| slippage::min_received(quote.buy_amount, slippage_percent));
        let mut has_no_liquidity = price.has_no_liquidity(&inputs.amount);

        let firm = if price.quote().is_some_and(Quote::has_route) {
            self.fetch_firm(inputs, slippage_bps, &mut has_no_liquidity).await
        } else {
            None
        };

        let readiness = SubmitReadiness::evaluate(
            inputs,
            balance,
            has_no_liquidity,
            self.lifecycle.state(),
            firm.is_some(),
        );
        let firm_quote = firm.as_ref().map(|firm| firm.quote.clone());
        {
            let mut cache = self.cache.lock();
            cache.has_no_liquidity = has_no_liquidity;
            cache.firm = firm;
        }

        TradeView {
            price,
            firm: firm_quote,
            slippage_percent,
            price_impact,
            impact_level: ImpactLevel::of(price_impact),
            min_received,
            has_no_liquidity,
            readiness,
        }
    }

    async fn fetch_firm(
        &self,
        inputs: &QuoteInputs,
        slippage_bps: u32,
        has_no_liquidity: &mut bool,
    ) -> Option<FirmQuote> {
        let request = match inputs.firm_request(slippage_bps) {
            Ok(request) => request,
            Err(err) => {
                debug!(%err, "firm quote disabled");
                return None;
            }
        };

        match self.bounded(self.quotes.get_quote(&request)).await {
            Ok(quote) => Some(FirmQuote {
                request,
                quote,
                fetched_at: Instant::now(),
            }),
            Err(QuoteError::Disabled(_)) => None,
            Err(err) => {
                warn!(%err, slippage_bps, "no firm route");
                *has_no_liquidity = true;
                None
            }
        }
    }

    /// A quote source that stalls past `quote_timeout` counts as no route.
    async fn bounded<T>(&self, fetch: impl Future<Output = Result<T, QuoteError>>) -> Result<T, QuoteError> {
        tokio::time::timeout(self.quote_timeout, fetch)
            .await
            .unwrap_or(Err(QuoteError::Timeout))
    }

    /// Submit readiness for the current inputs against the last refresh.
    pub fn readiness(&self, inputs: &QuoteInputs, balance: Option<Amount>) -> SubmitReadiness {
        let cache = self.cache.lock();
        SubmitReadiness::evaluate(
            inputs,
            balance,
            cache.has_no_liquidity,
            self.lifecycle.state(),
            cache.firm.is_some(),
        )
    }

    /// Execute the prefetched firm quote for `inputs`.
    ///
    /// Selling approves the router for the exact sell amount, then swaps.
    /// Buying with the native asset is a single swap carrying value.
    pub async fn trade(&self, inputs: &QuoteInputs) -> Result<Receipt, ActionError> {
        let state = self.lifecycle.state();
        if state != TxState::Idle {
            return Err(LifecycleError::Busy(state).into());
        }
        let taker = self
            .batcher
            .wallet()
            .account()
            .ok_or(ActionError::NotConnected)?;
        let expected = inputs.price_request()?;

        let firm = self.cache.lock().firm.clone().ok_or(ActionError::StaleQuote)?;
        if firm.request.price != expected || firm.request.taker != taker {
            debug!("inputs changed since the firm quote was fetched");
            return Err(ActionError::StaleQuote);
        }
        if firm.fetched_at.elapsed() > self.firm_ttl {
            debug!(age = ?firm.fetched_at.elapsed(), "firm quote expired");
            return Err(ActionError::StaleQuote);
        }

        let submission = self.lifecycle.begin()?;
        // A firm quote is submitted at most once.
        self.cache.lock().firm = None;

        let calls = match trade_calls(&firm) {
            Ok(calls) => calls,
            Err(err) => {
                if let Err(recorded) = self.lifecycle.fail(&submission, TxError::from(err.clone())) {
                    debug!(action = self.lifecycle.name(), err = %recorded, "outcome not recorded");
                }
                return Err(err.into());
            }
        };

        info!(
            direction = %inputs.direction,
            sell_amount = %firm.request.price.sell_amount,
            buy_amount = %firm.quote.buy_amount,
            slippage_bps = firm.request.slippage_bps,
            "submitting trade"
        );
        Ok(self.batcher.execute(&self.lifecycle, &submission, &calls).await?)
    }

    pub fn state(&self) -> TxState {
        self.lifecycle.state()
    }

    pub fn error(&self) -> Option<TxError> {
        self.lifecycle.error()
    }

    pub fn snapshot(&self) -> TxSnapshot {
        self.lifecycle.snapshot()
    }

    pub fn reset(&self) {
        self.lifecycle.reset();
    }

    pub fn lifecycle(&self) -> &LifecycleController {
        &self.lifecycle
    }
}

fn trade_calls(firm: &FirmQuote) -> Result<Vec<Call>, CallError> {
    let swap = firm.quote.swap_call()?;
    let sell_token = firm.request.price.sell_token;
    if is_native(sell_token) {
        return Ok(vec![swap]);
    }

    let approve = Call::approve(sell_token, swap.to(), firm.request.price.sell_amount)?;
    Ok(vec![approve, swap])
}
