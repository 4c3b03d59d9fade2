//! Multicall reads over a JSON-RPC provider.

use alloy::providers::DynProvider;
use async_trait::async_trait;
use trade_engine::contracts::IMulticall;
use trade_engine::{
    Address, AuctionSnapshot, ContentSnapshot, ReadError, StateReader, UnitSnapshot, U256,
};

pub struct ProviderReader {
    multicall: IMulticall::IMulticallInstance<DynProvider>,
}

impl ProviderReader {
    pub fn new(provider: DynProvider, multicall: Address) -> Self {
        Self {
            multicall: IMulticall::new(multicall, provider),
        }
    }
}

fn call_error(err: alloy::contract::Error) -> ReadError {
    match err {
        alloy::contract::Error::AbiError(e) => ReadError::Decode(e.to_string()),
        other => ReadError::Call(other.to_string()),
    }
}

#[async_trait]
impl StateReader for ProviderReader {
    async fn unit_state(&self, content: Address, account: Address) -> Result<UnitSnapshot, ReadError> {
        let state = self
            .multicall
            .getUnitState(content, account)
            .call()
            .await
            .map_err(call_error)?;
        Ok(state.into())
    }

    async fn auction_state(
        &self,
        content: Address,
        account: Address,
    ) -> Result<AuctionSnapshot, ReadError> {
        let state = self
            .multicall
            .getAuctionState(content, account)
            .call()
            .await
            .map_err(call_error)?;
        Ok(state.into())
    }

    async fn content_state(&self, content: Address, token_id: U256) -> Result<ContentSnapshot, ReadError> {
        let state = self
            .multicall
            .getContentState(content, token_id)
            .call()
            .await
            .map_err(call_error)?;
        Ok(state.into())
    }
}
