//! Wallet and contract client interface consumed by the engine.
//!
//! The engine never signs or broadcasts by itself: callers plug in a
//! [`WalletClient`] (a browser wallet bridge, a local signer, a test double).

use crate::call::CallRequest;
use crate::types::{Address, TxHash};
use async_trait::async_trait;

/// Errors reported by a wallet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    #[error("user rejected the request")]
    Rejected,

    #[error("no account connected")]
    NotConnected,

    #[error("wallet does not support atomic batches")]
    Unsupported,

    #[error("gas estimation failed: {0}")]
    Estimation(String),

    #[error("wallet transport error: {0}")]
    Transport(String),
}

/// Result of waiting for a transaction to be included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub hash: TxHash,
    /// False when the transaction was included but reverted.
    pub success: bool,
    pub block_number: Option<u64>,
}

#[async_trait]
pub trait WalletClient: Send + Sync {
    /// Connected account, if any.
    fn account(&self) -> Option<Address>;

    /// Whether [`WalletClient::send_calls`] applies calls atomically.
    fn supports_atomic_batch(&self) -> bool {
        false
    }

    /// Sign and broadcast one call. Resolves once the hash is known.
    async fn send_transaction(&self, call: &CallRequest, chain_id: u64)
        -> Result<TxHash, WalletError>;

    /// Sign and broadcast all calls as one atomic batch.
    async fn send_calls(&self, _calls: &[CallRequest], _chain_id: u64) -> Result<TxHash, WalletError> {
        Err(WalletError::Unsupported)
    }

    /// Wait until `hash` is included. There is no timeout: this resolves
    /// when the provider returns a receipt or fails.
    async fn wait_for_receipt(&self, hash: TxHash) -> Result<Receipt, WalletError>;
}
