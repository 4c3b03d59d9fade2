//! Wallet and quote doubles shared by unit tests.

use crate::call::CallRequest;
use crate::lifecycle::LifecycleController;
use crate::quote::{FirmRequest, PriceRequest, Quote, QuoteError, QuoteSource, TxPayload};
use crate::types::{Address, Bytes, TxHash, U256};
use crate::wallet::{Receipt, WalletClient, WalletError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub fn taker() -> Address {
    Address::repeat_byte(0xAA)
}

pub fn router() -> Address {
    Address::repeat_byte(0x09)
}

/// Wallet that records every request. The n-th broadcast (0-based) gets
/// hash `0x00..0{n+1}`.
#[derive(Default)]
pub struct MockWallet {
    pub account: Option<Address>,
    pub atomic: bool,
    pub fail_send_at: Option<(usize, WalletError)>,
    pub revert_at: Option<usize>,
    /// When set, each send waits for a permit.
    pub gate: Option<Arc<Semaphore>>,
    /// Reset this controller while the first receipt is awaited.
    pub reset_on_receipt: Mutex<Option<LifecycleController>>,
    pub(crate) sent: Mutex<Vec<CallRequest>>,
    pub(crate) batches: Mutex<Vec<Vec<CallRequest>>>,
}

impl MockWallet {
    pub fn connected() -> Self {
        Self {
            account: Some(taker()),
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<CallRequest> {
        self.sent.lock().clone()
    }

    pub fn batches(&self) -> Vec<Vec<CallRequest>> {
        self.batches.lock().clone()
    }

    pub fn hash(index: usize) -> TxHash {
        TxHash::with_last_byte(index as u8 + 1)
    }

    async fn wait_gate(&self) {
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
    }

    fn next_index(&self) -> usize {
        self.sent.lock().len() + self.batches.lock().len()
    }
}

#[async_trait]
impl WalletClient for MockWallet {
    fn account(&self) -> Option<Address> {
        self.account
    }

    fn supports_atomic_batch(&self) -> bool {
        self.atomic
    }

    async fn send_transaction(&self, call: &CallRequest, _chain_id: u64) -> Result<TxHash, WalletError> {
        self.wait_gate().await;
        let index = self.next_index();
        if let Some((at, err)) = &self.fail_send_at {
            if *at == index {
                return Err(err.clone());
            }
        }
        self.sent.lock().push(call.clone());
        Ok(Self::hash(index))
    }

    async fn send_calls(&self, calls: &[CallRequest], _chain_id: u64) -> Result<TxHash, WalletError> {
        if !self.atomic {
            return Err(WalletError::Unsupported);
        }
        self.wait_gate().await;
        let index = self.next_index();
        self.batches.lock().push(calls.to_vec());
        Ok(Self::hash(index))
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> Result<Receipt, WalletError> {
        let reset = self.reset_on_receipt.lock().take();
        if let Some(lifecycle) = reset {
            lifecycle.reset();
        }
        let index = hash[31] as usize - 1;
        Ok(Receipt {
            hash,
            success: self.revert_at != Some(index),
            block_number: Some(100 + index as u64),
        })
    }
}

/// Quote source answering every request with fixed amounts.
pub struct StaticQuotes {
    pub buy_amount: U256,
    pub sell_usd: Option<f64>,
    pub buy_usd: Option<f64>,
    pub firm_requests: Mutex<Vec<FirmRequest>>,
}

impl StaticQuotes {
    pub fn new(buy_amount: U256) -> Self {
        Self {
            buy_amount,
            sell_usd: Some(100.0),
            buy_usd: Some(99.0),
            firm_requests: Mutex::new(Vec::new()),
        }
    }

    fn quote(&self, request: &PriceRequest) -> Result<Quote, QuoteError> {
        if self.buy_amount.is_zero() {
            return Err(QuoteError::NoRoute);
        }
        Ok(Quote {
            sell_token: request.sell_token,
            buy_token: request.buy_token,
            sell_amount: request.sell_amount,
            buy_amount: self.buy_amount,
            sell_amount_usd: self.sell_usd,
            buy_amount_usd: self.buy_usd,
            transaction: None,
        })
    }
}

#[async_trait]
impl QuoteSource for StaticQuotes {
    async fn get_price(&self, request: &PriceRequest) -> Result<Quote, QuoteError> {
        self.quote(request)
    }

    async fn get_quote(&self, request: &FirmRequest) -> Result<Quote, QuoteError> {
        self.firm_requests.lock().push(request.clone());
        let mut quote = self.quote(&request.price)?;
        let value = if crate::types::is_native(request.price.sell_token) {
            request.price.sell_amount
        } else {
            U256::ZERO
        };
        quote.transaction = Some(TxPayload {
            to: router(),
            data: Bytes::from(vec![0x12, 0x34, 0x56, 0x78, 0x00]),
            value,
        });
        Ok(quote)
    }
}
