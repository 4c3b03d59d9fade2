//! Minting a new piece of content into a community's content contract.
//!
//! The token URI must already point at uploaded metadata; this action only
//! sends `Content.create(creator, uri)`.

use super::ActionError;
use crate::batcher::CallBatcher;
use crate::call::Call;
use crate::config::EngineConfig;
use crate::lifecycle::{LifecycleController, TxError, TxSnapshot, TxState};
use crate::types::Address;
use crate::wallet::{Receipt, WalletClient};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateContentRequest {
    /// The community's content contract.
    pub content: Address,
    /// Receiver of the new token. Defaults to the connected account.
    pub creator: Option<Address>,
    /// `ipfs://` or `http(s)://` URI of the metadata document.
    pub uri: String,
}

pub struct CreateContentAction<W: ?Sized> {
    batcher: CallBatcher<W>,
    lifecycle: LifecycleController,
}

impl<W: WalletClient + ?Sized> CreateContentAction<W> {
    pub fn new(wallet: Arc<W>, config: &EngineConfig) -> Self {
        Self {
            batcher: CallBatcher::new(wallet, config.chain_id),
            lifecycle: LifecycleController::new("create", config.create_display_window),
        }
    }

    pub async fn create(&self, request: &CreateContentRequest) -> Result<Receipt, ActionError> {
        let account = self
            .batcher
            .wallet()
            .account()
            .ok_or(ActionError::NotConnected)?;
        let creator = request.creator.unwrap_or(account);
        let call = Call::create_content(request.content, creator, &request.uri)?;
        let submission = self.lifecycle.begin()?;

        info!(content = %request.content, %creator, uri = %request.uri.trim(), "creating content");
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::CallError;
    use crate::contracts::{selectors, IContent};
    use crate::lifecycle::LifecycleError;
    use crate::test_utils::{taker, MockWallet};
    use crate::types::U256;
    use alloy::sol_types::SolCall;

    fn content() -> Address {
        Address::repeat_byte(0x03)
    }

    fn request(creator: Option<Address>, uri: &str) -> CreateContentRequest {
        CreateContentRequest {
            content: content(),
            creator,
            uri: uri.to_string(),
        }
    }

    fn action(wallet: MockWallet) -> (Arc<MockWallet>, CreateContentAction<MockWallet>) {
        let wallet = Arc::new(wallet);
        let action = CreateContentAction::new(wallet.clone(), &EngineConfig::default());
        (wallet, action)
    }

    #[tokio::test]
    async fn test_create_mints_to_connected_account() {
        let (wallet, action) = action(MockWallet::connected());

        let receipt = action.create(&request(None, "ipfs://bafymeta")).await.unwrap();

        let sent = wallet.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, content());
        assert_eq!(sent[0].value, U256::ZERO);
        assert_eq!(&sent[0].data[0..4], selectors::CREATE_CONTENT.as_slice());
        let decoded = IContent::createCall::abi_decode(&sent[0].data).unwrap();
        assert_eq!(decoded.to, taker());
        assert_eq!(decoded.tokenUri, "ipfs://bafymeta");
        assert_eq!(action.snapshot().hash, Some(receipt.hash));
        assert_eq!(action.state(), TxState::Success);
    }

    #[tokio::test]
    async fn test_explicit_creator_wins() {
        let (wallet, action) = action(MockWallet::connected());
        let creator = Address::repeat_byte(0x77);

        action
            .create(&request(Some(creator), "https://example.com/meta.json"))
            .await
            .unwrap();

        let decoded = IContent::createCall::abi_decode(&wallet.sent()[0].data).unwrap();
        assert_eq!(decoded.to, creator);
    }

    #[tokio::test]
    async fn test_create_refused_before_sending() {
        let (_, disconnected) = action(MockWallet::default());
        let err = disconnected.create(&request(None, "ipfs://bafymeta")).await.unwrap_err();
        assert_eq!(err, ActionError::NotConnected);

        let (wallet, connected) = action(MockWallet::connected());
        let err = connected.create(&request(None, "ar://nope")).await.unwrap_err();
        assert_eq!(err, ActionError::Call(CallError::InvalidUri("ar://nope".to_string())));

        assert!(wallet.sent().is_empty());
        assert_eq!(disconnected.state(), TxState::Idle);
        assert_eq!(connected.state(), TxState::Idle);
    }

    #[tokio::test]
    async fn test_second_create_waits_for_reset() {
        let (wallet, action) = action(MockWallet::connected());

        action.create(&request(None, "ipfs://one")).await.unwrap();
        let err = action.create(&request(None, "ipfs://two")).await.unwrap_err();
        assert_eq!(err, ActionError::Lifecycle(LifecycleError::Busy(TxState::Success)));

        action.reset();
        action.create(&request(None, "ipfs://two")).await.unwrap();
        assert_eq!(wallet.sent().len(), 2);
    }
}
