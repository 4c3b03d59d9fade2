//! Atomic on-chain calls.
//!
//! A [`Call`] is one instruction of a logical transaction. Each variant is
//! discriminated by its target and selector and validated when it is
//! constructed, so a batch never contains a call that cannot be encoded.

use crate::contracts::{selectors, IContent, IMulticall, IERC20};
use crate::types::{is_native, Address, Amount, Bytes, U256};
use alloy::sol_types::SolCall;

/// Errors raised while building or decoding calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    #[error("{0} must not be the zero address")]
    ZeroAddress(&'static str),

    #[error("cannot approve the native asset")]
    NativeApproval,

    #[error("{0} must be greater than zero")]
    ZeroAmount(&'static str),

    #[error("invalid calldata: {0}")]
    InvalidCalldata(String),

    #[error("token uri {0:?} is not an ipfs:// or http(s):// uri")]
    InvalidUri(String),
}

/// Raw `{to, data, value}` triple handed to the wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

/// A validated on-chain call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// ERC-20 `approve(spender, amount)` on `token`.
    Approve {
        token: Address,
        spender: Address,
        amount: Amount,
    },
    /// Opaque router calldata taken from a firm quote.
    Swap {
        router: Address,
        data: Bytes,
        value: U256,
    },
    /// `Multicall.collect(content, tokenId, epochId, deadline, maxPrice)`.
    Collect {
        multicall: Address,
        content: Address,
        token_id: U256,
        epoch_id: U256,
        deadline: U256,
        max_price: Amount,
    },
    /// `Multicall.buy(content, epochId, deadline, maxPaymentTokenAmount)`.
    AuctionBuy {
        multicall: Address,
        content: Address,
        epoch_id: U256,
        deadline: U256,
        max_payment: Amount,
    },
    /// `Multicall.claimRewards(content)`.
    ClaimRewards { multicall: Address, content: Address },
    /// `Content.create(to, tokenUri)`, minting a new piece to `creator`.
    CreateContent {
        content: Address,
        creator: Address,
        uri: String,
    },
}

fn non_zero(address: Address, field: &'static str) -> Result<Address, CallError> {
    if address.is_zero() {
        return Err(CallError::ZeroAddress(field));
    }
    Ok(address)
}

fn positive(amount: Amount, field: &'static str) -> Result<Amount, CallError> {
    if amount.is_zero() {
        return Err(CallError::ZeroAmount(field));
    }
    Ok(amount)
}

fn token_uri(uri: &str) -> Result<String, CallError> {
    let uri = uri.trim();
    let valid = match uri.strip_prefix("ipfs://") {
        Some(cid) => !cid.is_empty(),
        None => ["https://", "http://"]
            .iter()
            .any(|scheme| uri.len() > scheme.len() && uri.starts_with(scheme)),
    };
    if !valid {
        return Err(CallError::InvalidUri(uri.to_string()));
    }
    Ok(uri.to_string())
}

impl Call {
    pub fn approve(token: Address, spender: Address, amount: Amount) -> Result<Self, CallError> {
        if is_native(token) {
            return Err(CallError::NativeApproval);
        }
        Ok(Call::Approve {
            token: non_zero(token, "token")?,
            spender: non_zero(spender, "spender")?,
            amount: positive(amount, "approval amount")?,
        })
    }

    pub fn swap(router: Address, data: Bytes, value: U256) -> Result<Self, CallError> {
        if data.len() < 4 {
            return Err(CallError::InvalidCalldata(
                "swap calldata too short for function selector".to_string(),
            ));
        }
        Ok(Call::Swap {
            router: non_zero(router, "router")?,
            data,
            value,
        })
    }

    pub fn collect(
        multicall: Address,
        content: Address,
        token_id: U256,
        epoch_id: U256,
        deadline: u64,
        max_price: Amount,
    ) -> Result<Self, CallError> {
        Ok(Call::Collect {
            multicall: non_zero(multicall, "multicall")?,
            content: non_zero(content, "content")?,
            token_id,
            epoch_id,
            deadline: U256::from(deadline),
            max_price,
        })
    }

    pub fn auction_buy(
        multicall: Address,
        content: Address,
        epoch_id: U256,
        deadline: u64,
        max_payment: Amount,
    ) -> Result<Self, CallError> {
        Ok(Call::AuctionBuy {
            multicall: non_zero(multicall, "multicall")?,
            content: non_zero(content, "content")?,
            epoch_id,
            deadline: U256::from(deadline),
            max_payment,
        })
    }

    pub fn claim_rewards(multicall: Address, content: Address) -> Result<Self, CallError> {
        Ok(Call::ClaimRewards {
            multicall: non_zero(multicall, "multicall")?,
            content: non_zero(content, "content")?,
        })
    }

    pub fn create_content(content: Address, creator: Address, uri: &str) -> Result<Self, CallError> {
        Ok(Call::CreateContent {
            content: non_zero(content, "content")?,
            creator: non_zero(creator, "creator")?,
            uri: token_uri(uri)?,
        })
    }

    /// The contract this call is sent to.
    pub fn to(&self) -> Address {
        match self {
            Call::Approve { token, .. } => *token,
            Call::Swap { router, .. } => *router,
            Call::Collect { multicall, .. }
            | Call::AuctionBuy { multicall, .. }
            | Call::ClaimRewards { multicall, .. } => *multicall,
            Call::CreateContent { content, .. } => *content,
        }
    }

    /// Native value attached to the call. Only swaps carry value.
    pub fn value(&self) -> U256 {
        match self {
            Call::Swap { value, .. } => *value,
            _ => U256::ZERO,
        }
    }

    /// ABI-encode the call.
    pub fn calldata(&self) -> Bytes {
        match self {
            Call::Approve {
                spender, amount, ..
            } => IERC20::approveCall {
                spender: *spender,
                amount: *amount,
            }
            .abi_encode()
            .into(),
            Call::Swap { data, .. } => data.clone(),
            Call::Collect {
                content,
                token_id,
                epoch_id,
                deadline,
                max_price,
                ..
            } => IMulticall::collectCall {
                content: *content,
                tokenId: *token_id,
                epochId: *epoch_id,
                deadline: *deadline,
                maxPrice: *max_price,
            }
            .abi_encode()
            .into(),
            Call::AuctionBuy {
                content,
                epoch_id,
                deadline,
                max_payment,
                ..
            } => IMulticall::buyCall {
                content: *content,
                epochId: *epoch_id,
                deadline: *deadline,
                maxPaymentTokenAmount: *max_payment,
            }
            .abi_encode()
            .into(),
            Call::ClaimRewards { content, .. } => IMulticall::claimRewardsCall { content: *content }
                .abi_encode()
                .into(),
            Call::CreateContent { creator, uri, .. } => IContent::createCall {
                to: *creator,
                tokenUri: uri.clone(),
            }
            .abi_encode()
            .into(),
        }
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Call::Approve { .. } => "approve",
            Call::Swap { .. } => "swap",
            Call::Collect { .. } => "collect",
            Call::AuctionBuy { .. } => "auction_buy",
            Call::ClaimRewards { .. } => "claim_rewards",
            Call::CreateContent { .. } => "create_content",
        }
    }

    pub fn to_request(&self) -> CallRequest {
        CallRequest {
            to: self.to(),
            data: self.calldata(),
            value: self.value(),
        }
    }
}

impl CallRequest {
    /// Decode a raw request back into a [`Call`].
    ///
    /// Requests whose selector is not one of the known entry points are
    /// treated as opaque swaps.
    pub fn decode(&self) -> Result<Call, CallError> {
        if self.data.len() < 4 {
            return Err(CallError::InvalidCalldata(
                "calldata too short for function selector".to_string(),
            ));
        }

        let selector = &self.data[0..4];

        match selector {
            s if s == selectors::APPROVE.as_slice() => {
                let call = IERC20::approveCall::abi_decode(&self.data).map_err(|e| {
                    CallError::InvalidCalldata(format!("failed to decode approve: {}", e))
                })?;
                Call::approve(self.to, call.spender, call.amount)
            }
            s if s == selectors::COLLECT.as_slice() => {
                let call = IMulticall::collectCall::abi_decode(&self.data).map_err(|e| {
                    CallError::InvalidCalldata(format!("failed to decode collect: {}", e))
                })?;
                Ok(Call::Collect {
                    multicall: non_zero(self.to, "multicall")?,
                    content: call.content,
                    token_id: call.tokenId,
                    epoch_id: call.epochId,
                    deadline: call.deadline,
                    max_price: call.maxPrice,
                })
            }
            s if s == selectors::AUCTION_BUY.as_slice() => {
                let call = IMulticall::buyCall::abi_decode(&self.data).map_err(|e| {
                    CallError::InvalidCalldata(format!("failed to decode buy: {}", e))
                })?;
                Ok(Call::AuctionBuy {
                    multicall: non_zero(self.to, "multicall")?,
                    content: call.content,
                    epoch_id: call.epochId,
                    deadline: call.deadline,
                    max_payment: call.maxPaymentTokenAmount,
                })
            }
            s if s == selectors::CLAIM_REWARDS.as_slice() => {
                let call = IMulticall::claimRewardsCall::abi_decode(&self.data).map_err(|e| {
                    CallError::InvalidCalldata(format!("failed to decode claimRewards: {}", e))
                })?;
                Call::claim_rewards(self.to, call.content)
            }
            s if s == selectors::CREATE_CONTENT.as_slice() => {
                let call = IContent::createCall::abi_decode(&self.data).map_err(|e| {
                    CallError::InvalidCalldata(format!("failed to decode create: {}", e))
                })?;
                Call::create_content(self.to, call.to, &call.tokenUri)
            }
            _ => {
                tracing::trace!(selector = %hex::encode(selector), "treating unknown selector as swap");
                Call::swap(self.to, self.data.clone(), self.value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NATIVE_TOKEN;

    fn usdc() -> Address {
        Address::repeat_byte(0x01)
    }

    fn multicall() -> Address {
        Address::repeat_byte(0x02)
    }

    fn content() -> Address {
        Address::repeat_byte(0x03)
    }

    #[test]
    fn test_approve_encoding() {
        let call = Call::approve(usdc(), multicall(), U256::from(1_050_000u64)).unwrap();
        let request = call.to_request();

        assert_eq!(request.to, usdc());
        assert_eq!(request.value, U256::ZERO);
        assert_eq!(&request.data[0..4], selectors::APPROVE.as_slice());
        // selector + two 32-byte words
        assert_eq!(request.data.len(), 4 + 64);
        assert_eq!(request.decode().unwrap(), call);
    }

    #[test]
    fn test_approve_validation() {
        assert_eq!(
            Call::approve(NATIVE_TOKEN, multicall(), U256::from(1)),
            Err(CallError::NativeApproval)
        );
        assert_eq!(
            Call::approve(usdc(), Address::ZERO, U256::from(1)),
            Err(CallError::ZeroAddress("spender"))
        );
        assert_eq!(
            Call::approve(usdc(), multicall(), U256::ZERO),
            Err(CallError::ZeroAmount("approval amount"))
        );
    }

    #[test]
    fn test_collect_roundtrip_through_selector_dispatch() {
        let call = Call::collect(
            multicall(),
            content(),
            U256::from(7),
            U256::from(3),
            1_700_000_300,
            U256::from(1_050_000u64),
        )
        .unwrap();

        match call.to_request().decode().unwrap() {
            Call::Collect {
                token_id,
                epoch_id,
                deadline,
                max_price,
                ..
            } => {
                assert_eq!(token_id, U256::from(7));
                assert_eq!(epoch_id, U256::from(3));
                assert_eq!(deadline, U256::from(1_700_000_300u64));
                assert_eq!(max_price, U256::from(1_050_000u64));
            }
            other => panic!("expected collect, got {:?}", other),
        }
    }

    #[test]
    fn test_claim_carries_no_value() {
        let call = Call::claim_rewards(multicall(), content()).unwrap();

        assert_eq!(call.value(), U256::ZERO);
        assert_eq!(call.to(), multicall());
        assert_eq!(call.name(), "claim_rewards");
    }

    #[test]
    fn test_create_content_targets_content_contract() {
        let creator = Address::repeat_byte(0xAA);
        let call = Call::create_content(content(), creator, " ipfs://bafymeta ").unwrap();
        let request = call.to_request();

        assert_eq!(request.to, content());
        assert_eq!(request.value, U256::ZERO);
        assert_eq!(&request.data[0..4], selectors::CREATE_CONTENT.as_slice());
        let decoded = IContent::createCall::abi_decode(&request.data).unwrap();
        assert_eq!(decoded.to, creator);
        assert_eq!(decoded.tokenUri, "ipfs://bafymeta");
        assert_eq!(request.decode().unwrap(), call);
        assert_eq!(call.name(), "create_content");
    }

    #[test]
    fn test_create_content_validation() {
        let creator = Address::repeat_byte(0xAA);

        assert_eq!(
            Call::create_content(Address::ZERO, creator, "ipfs://bafymeta"),
            Err(CallError::ZeroAddress("content"))
        );
        assert_eq!(
            Call::create_content(content(), Address::ZERO, "ipfs://bafymeta"),
            Err(CallError::ZeroAddress("creator"))
        );
        for uri in ["", "   ", "ipfs://", "https://", "ar://xyz", "bafymeta"] {
            assert!(matches!(
                Call::create_content(content(), creator, uri),
                Err(CallError::InvalidUri(_))
            ));
        }
        assert!(Call::create_content(content(), creator, "https://example.com/meta.json").is_ok());
    }

    #[test]
    fn test_unknown_selector_is_swap() {
        let request = CallRequest {
            to: Address::repeat_byte(0x09),
            data: Bytes::from(vec![0xde, 0xad, 0xbe, 0xef, 0x00]),
            value: U256::from(5),
        };

        let call = request.decode().unwrap();
        assert_eq!(call.name(), "swap");
        assert_eq!(call.value(), U256::from(5));
    }

    #[test]
    fn test_short_swap_calldata_rejected() {
        let err = Call::swap(Address::repeat_byte(0x09), Bytes::from(vec![0x01]), U256::ZERO)
            .unwrap_err();
        assert!(matches!(err, CallError::InvalidCalldata(_)));
    }
}
