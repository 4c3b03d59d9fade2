//! Collecting content from its decaying auction, and buying out a
//! community auction. Both approve the payment token to the multicall
//! for the buffered worst-case price, then call the multicall.

use super::{unix_now, ActionError};
use crate::batcher::CallBatcher;
use crate::call::Call;
use crate::config::{ContractAddresses, EngineConfig};
use crate::lifecycle::{LifecycleController, TxError, TxSnapshot, TxState};
use crate::types::{Address, Amount, U256};
use crate::units;
use crate::wallet::{Receipt, WalletClient};
use std::sync::Arc;
use tracing::{debug, info};

/// One collect of a content token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectRequest {
    pub content: Address,
    pub token_id: U256,
    pub epoch_id: U256,
    /// Current auction price in USDC base units.
    pub price: Amount,
    /// Overrides the configured buffer.
    pub slippage_percent: Option<u32>,
}

/// One buy of a community auction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuctionBuyRequest {
    pub content: Address,
    pub epoch_id: U256,
    /// Token the auction is paid in.
    pub payment_token: Address,
    /// Current auction price in payment token units.
    pub price: Amount,
    pub slippage_percent: Option<u32>,
}

pub struct CollectAction<W: ?Sized> {
    batcher: CallBatcher<W>,
    lifecycle: LifecycleController,
    contracts: ContractAddresses,
    slippage_percent: u32,
    deadline_buffer_secs: u64,
}

impl<W: WalletClient + ?Sized> CollectAction<W> {
    pub fn new(wallet: Arc<W>, config: &EngineConfig) -> Self {
        Self {
            batcher: CallBatcher::new(wallet, config.chain_id),
            lifecycle: LifecycleController::new("collect", config.collect_display_window),
            contracts: config.contracts.clone(),
            slippage_percent: config.collect_slippage_percent,
            deadline_buffer_secs: config.deadline_buffer_secs,
        }
    }

    /// Worst-case price for `price` at `slippage_percent` (or the default).
    pub fn max_price(&self, price: Amount, slippage_percent: Option<u32>) -> Result<Amount, ActionError> {
        Ok(units::apply_buffer(
            price,
            slippage_percent.unwrap_or(self.slippage_percent),
        )?)
    }

    fn deadline(&self, now_secs: u64) -> u64 {
        now_secs.saturating_add(self.deadline_buffer_secs)
    }

    /// Calls for a collect built at unix time `now_secs`:
    /// `[approve(usdc -> multicall, maxPrice), collect(..)]`. The approval
    /// is omitted when the auction is free.
    pub fn collect_calls(&self, request: &CollectRequest, now_secs: u64) -> Result<Vec<Call>, ActionError> {
        let max_price = self.max_price(request.price, request.slippage_percent)?;
        let deadline = self.deadline(now_secs);

        let mut calls = Vec::with_capacity(2);
        if !max_price.is_zero() {
            calls.push(Call::approve(self.contracts.usdc, self.contracts.multicall, max_price)?);
        }
        calls.push(Call::collect(
            self.contracts.multicall,
            request.content,
            request.token_id,
            request.epoch_id,
            deadline,
            max_price,
        )?);
        Ok(calls)
    }

    /// Calls for an auction buy built at unix time `now_secs`.
    pub fn auction_buy_calls(
        &self,
        request: &AuctionBuyRequest,
        now_secs: u64,
    ) -> Result<Vec<Call>, ActionError> {
        let max_payment = self.max_price(request.price, request.slippage_percent)?;
        let deadline = self.deadline(now_secs);

        let mut calls = Vec::with_capacity(2);
        if !max_payment.is_zero() {
            calls.push(Call::approve(
                request.payment_token,
                self.contracts.multicall,
                max_payment,
            )?);
        }
        calls.push(Call::auction_buy(
            self.contracts.multicall,
            request.content,
            request.epoch_id,
            deadline,
            max_payment,
        )?);
        Ok(calls)
    }

    pub async fn collect(&self, request: &CollectRequest) -> Result<Receipt, ActionError> {
        info!(content = %request.content, token_id = %request.token_id, price = %request.price, "collect");
        self.submit(|now| self.collect_calls(request, now)).await
    }

    pub async fn auction_buy(&self, request: &AuctionBuyRequest) -> Result<Receipt, ActionError> {
        info!(content = %request.content, epoch_id = %request.epoch_id, price = %request.price, "auction buy");
        self.submit(|now| self.auction_buy_calls(request, now)).await
    }

    async fn submit(
        &self,
        build: impl FnOnce(u64) -> Result<Vec<Call>, ActionError>,
    ) -> Result<Receipt, ActionError> {
        if self.batcher.wallet().account().is_none() {
            return Err(ActionError::NotConnected);
        }
        let submission = self.lifecycle.begin()?;

        // The deadline is taken after the lifecycle accepted the submission.
        let calls = match build(unix_now()) {
            Ok(calls) => calls,
            Err(err) => {
                if let Err(recorded) = self.lifecycle.fail(&submission, TxError::Build(err.to_string())) {
                    debug!(action = self.lifecycle.name(), err = %recorded, "outcome not recorded");
                }
                return Err(err);
            }
        };

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
