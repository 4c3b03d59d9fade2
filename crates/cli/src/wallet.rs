//! Local-key wallet over a JSON-RPC provider.

use alloy::{
    network::{EthereumWallet, ReceiptResponse, TransactionBuilder},
    providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
};
use async_trait::async_trait;
use eyre::Context;
use std::fmt::Display;
use trade_engine::{Address, CallRequest, Receipt, TxHash, WalletClient, WalletError};
use tracing::debug;

/// Signs with a private key and broadcasts through `eth_sendRawTransaction`.
/// Batches are sent call by call.
pub struct ProviderWallet {
    provider: DynProvider,
    account: Address,
}

impl ProviderWallet {
    pub fn connect(rpc_url: &str, private_key: &str) -> eyre::Result<Self> {
        let signer = PrivateKeySigner::from_slice(
            &hex::decode(private_key.trim().trim_start_matches("0x"))
                .context("failed to decode private key")?,
        )
        .context("failed to parse private key")?;

        let account = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(rpc_url.parse().context("failed to parse RPC URL")?);

        Ok(Self {
            provider: provider.erased(),
            account,
        })
    }

    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }

    pub fn address(&self) -> Address {
        self.account
    }
}

/// Map a node error onto the wallet taxonomy.
fn classify(err: impl Display) -> WalletError {
    let message = err.to_string();
    let lower = message.to_lowercase();
    if lower.contains("user rejected") || lower.contains("user denied") {
        WalletError::Rejected
    } else if lower.contains("gas") || lower.contains("insufficient funds") || lower.contains("execution reverted") {
        WalletError::Estimation(message)
    } else {
        WalletError::Transport(message)
    }
}

#[async_trait]
impl WalletClient for ProviderWallet {
    fn account(&self) -> Option<Address> {
        Some(self.account)
    }

    async fn send_transaction(&self, call: &CallRequest, chain_id: u64) -> Result<TxHash, WalletError> {
        let tx = TransactionRequest::default()
            .with_from(self.account)
            .with_to(call.to)
            .with_input(call.data.clone())
            .with_value(call.value)
            .with_chain_id(chain_id);

        let pending = self.provider.send_transaction(tx).await.map_err(classify)?;
        let hash = *pending.tx_hash();
        debug!(%hash, to = %call.to, "transaction broadcast");
        Ok(hash)
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> Result<Receipt, WalletError> {
        let receipt = PendingTransactionBuilder::new(self.provider.root().clone(), hash)
            .get_receipt()
            .await
            .map_err(|e| WalletError::Transport(e.to_string()))?;

        Ok(Receipt {
            hash,
            success: receipt.status(),
            block_number: receipt.block_number,
        })
    }
}

/// Stand-in used when no private key is configured: quotes and reads work,
/// submissions are refused.
pub struct Disconnected;

#[async_trait]
impl WalletClient for Disconnected {
    fn account(&self) -> Option<Address> {
        None
    }

    async fn send_transaction(&self, _call: &CallRequest, _chain_id: u64) -> Result<TxHash, WalletError> {
        Err(WalletError::NotConnected)
    }

    async fn wait_for_receipt(&self, _hash: TxHash) -> Result<Receipt, WalletError> {
        Err(WalletError::NotConnected)
    }
}
