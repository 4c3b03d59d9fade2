//! Claiming accrued content rewards: a single non-value call, no approval.

use super::ActionError;
use crate::batcher::CallBatcher;
use crate::call::Call;
use crate::config::EngineConfig;
use crate::lifecycle::{LifecycleController, TxError, TxSnapshot, TxState};
use crate::types::Address;
use crate::wallet::{Receipt, WalletClient};
use std::sync::Arc;
use tracing::info;

pub struct ClaimAction<W: ?Sized> {
    batcher: CallBatcher<W>,
    lifecycle: LifecycleController,
    multicall: Address,
}

impl<W: WalletClient + ?Sized> ClaimAction<W> {
    pub fn new(wallet: Arc<W>, config: &EngineConfig) -> Self {
        Self {
            batcher: CallBatcher::new(wallet, config.chain_id),
            lifecycle: LifecycleController::new("claim", config.claim_display_window),
            multicall: config.contracts.multicall,
        }
    }

    /// Claim rewards of `content` for the connected account.
    pub async fn claim(&self, content: Address) -> Result<Receipt, ActionError> {
        if self.batcher.wallet().account().is_none() {
            return Err(ActionError::NotConnected);
        }
        let call = Call::claim_rewards(self.multicall, content)?;
        let submission = self.lifecycle.begin()?;

        info!(%content, "claiming rewards");
        Ok(self.batcher.execute(&self.lifecycle, &submission, &[call]).await?)
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
