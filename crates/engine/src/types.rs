//! Core type definitions for the engine.
//!
//! Re-exports from alloy-primitives for Ethereum-compatible types.

use std::fmt;

pub use alloy::primitives::{address, Address, Bytes, TxHash, U256};

/// Sentinel address the quoting service uses for the chain's native asset.
pub const NATIVE_TOKEN: Address = address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

/// Decimals of the native asset and of community unit tokens.
pub const TOKEN_DECIMALS: u8 = 18;

/// Decimals of the quote token (USDC) used to price collects.
pub const USDC_DECIMALS: u8 = 6;

/// Amount of tokens in the smallest unit (wei for ETH, 1e-6 for USDC).
pub type Amount = U256;

/// Returns true when `token` is the native-asset sentinel.
pub fn is_native(token: Address) -> bool {
    token == NATIVE_TOKEN
}

/// Direction of a trade from the user's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TradeDirection {
    /// Spend the native asset to buy the community token.
    #[default]
    Buy,
    /// Sell the community token for the native asset.
    Sell,
}

impl TradeDirection {
    /// Resolve the (sell, buy) token pair for a community `token`.
    pub fn tokens(&self, token: Address) -> (Address, Address) {
        match self {
            TradeDirection::Buy => (NATIVE_TOKEN, token),
            TradeDirection::Sell => (token, NATIVE_TOKEN),
        }
    }
}

impl fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeDirection::Buy => write!(f, "buy"),
            TradeDirection::Sell => write!(f, "sell"),
        }
    }
}

/// Which panel the community page is showing. Quotes are only fetched in
/// trade mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Feed,
    Trade,
}
