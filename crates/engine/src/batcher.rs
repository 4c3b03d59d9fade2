//! Submission of an ordered list of calls as one logical transaction.
//!
//! Wallets that support atomic batches receive all calls in one request.
//! Otherwise calls are sent one by one, each waiting for its receipt, and
//! the batch stops at the first failure. Calls that landed before the
//! failure (typically an approval) stay on-chain and are reported through
//! [`TxError::PartialBatch`].

use crate::call::{Call, CallRequest};
use crate::lifecycle::{LifecycleController, Submission, TxError};
use crate::types::TxHash;
use crate::wallet::{Receipt, WalletClient, WalletError};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Sends calls through a [`WalletClient`] and records the outcome in a
/// [`LifecycleController`].
pub struct CallBatcher<W: ?Sized> {
    wallet: Arc<W>,
    chain_id: u64,
}

impl<W: ?Sized> Clone for CallBatcher<W> {
    fn clone(&self) -> Self {
        Self {
            wallet: self.wallet.clone(),
            chain_id: self.chain_id,
        }
    }
}

impl<W: WalletClient + ?Sized> CallBatcher<W> {
    pub fn new(wallet: Arc<W>, chain_id: u64) -> Self {
        Self { wallet, chain_id }
    }

    pub fn wallet(&self) -> &Arc<W> {
        &self.wallet
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Execute `calls` in order for `submission` and settle the lifecycle
    /// with the result. Returns the receipt of the last call.
    pub async fn execute(
        &self,
        lifecycle: &LifecycleController,
        submission: &Submission,
        calls: &[Call],
    ) -> Result<Receipt, TxError> {
        let outcome = self.run(lifecycle, submission, calls).await;

        let recorded = match &outcome {
            Ok(_) => lifecycle.succeed(submission),
            Err(err) => lifecycle.fail(submission, err.clone()),
        };
        if let Err(err) = recorded {
            debug!(action = lifecycle.name(), %err, "outcome not recorded");
        }
        outcome
    }

    async fn run(
        &self,
        lifecycle: &LifecycleController,
        submission: &Submission,
        calls: &[Call],
    ) -> Result<Receipt, TxError> {
        if calls.is_empty() {
            return Err(TxError::Build("no calls to send".to_string()));
        }

        let names: Vec<&'static str> = calls.iter().map(Call::name).collect();
        let requests: Vec<CallRequest> = calls.iter().map(Call::to_request).collect();
        info!(
            action = lifecycle.name(),
            calls = ?names,
            chain_id = self.chain_id,
            "executing batch"
        );

        if requests.len() > 1 && self.wallet.supports_atomic_batch() {
            match self.wallet.send_calls(&requests, self.chain_id).await {
                Ok(hash) => return self.confirm(lifecycle, submission, hash).await,
                Err(WalletError::Unsupported) => {
                    warn!(action = lifecycle.name(), "atomic batch refused, sending sequentially");
                }
                Err(err) => return Err(err.into()),
            }
        }

        self.run_sequential(lifecycle, submission, calls, &requests).await
    }

    async fn run_sequential(
        &self,
        lifecycle: &LifecycleController,
        submission: &Submission,
        calls: &[Call],
        requests: &[CallRequest],
    ) -> Result<Receipt, TxError> {
        let total = requests.len();
        let mut last = None;

        for (index, (call, request)) in calls.iter().zip(requests).enumerate() {
            if index > 0 && !lifecycle.is_current(submission) {
                warn!(action = lifecycle.name(), landed = index, total, "batch abandoned after reset");
                return Err(TxError::Abandoned(index + 1));
            }

            debug!(
                action = lifecycle.name(),
                call = call.name(),
                to = %request.to,
                value = %request.value,
                "sending call {} of {}",
                index + 1,
                total
            );
            let result = match self.wallet.send_transaction(request, self.chain_id).await {
                Ok(hash) => self.confirm(lifecycle, submission, hash).await,
                Err(err) => Err(err.into()),
            };

            match result {
                Ok(receipt) => last = Some(receipt),
                Err(reason) if index == 0 => return Err(reason),
                Err(reason) => {
                    warn!(
                        action = lifecycle.name(),
                        call = call.name(),
                        landed = index,
                        total,
                        %reason,
                        "batch aborted; earlier calls remain on-chain"
                    );
                    return Err(TxError::PartialBatch {
                        failed_at: index + 1,
                        total,
                        landed: index,
                        reason: Box::new(reason),
                    });
                }
            }
        }

        last.ok_or_else(|| TxError::Build("no calls to send".to_string()))
    }

    /// Track `hash` and wait until it is included.
    async fn confirm(
        &self,
        lifecycle: &LifecycleController,
        submission: &Submission,
        hash: TxHash,
    ) -> Result<Receipt, TxError> {
        if let Err(err) = lifecycle.broadcast(submission, hash) {
            // Reset locally; the transaction is already out and may still land.
            warn!(action = lifecycle.name(), %hash, %err, "untracked transaction broadcast");
        }

        let receipt = self.wallet.wait_for_receipt(hash).await?;
        if !receipt.success {
            return Err(TxError::Reverted(hash));
        }
        debug!(action = lifecycle.name(), %hash, block = ?receipt.block_number, "call confirmed");
        Ok(receipt)
    }
}
