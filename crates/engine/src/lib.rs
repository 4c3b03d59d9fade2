//! Transaction orchestration and quote engine for trading community tokens
//! and collecting content on-chain.
//!
//! This library provides:
//! - Indicative and firm quotes from an allowance-holder swap API
//! - Dynamic slippage derived from observed price impact
//! - Multi-call batches (approve + swap/collect) with a sequential fallback
//! - A transaction lifecycle state machine with at-most-once terminal effects
//! - Trade, collect, claim and create-content actions composed from the above

pub mod actions;
pub mod batcher;
pub mod call;
pub mod config;
pub mod contracts;
pub mod lifecycle;
pub mod metadata;
pub mod quote;
pub mod reader;
pub mod slippage;
pub mod types;
pub mod units;
pub mod wallet;

#[cfg(test)]
mod test_utils;

pub use actions::{
    ActionError, AuctionBuyRequest, ClaimAction, CollectAction, CollectRequest,
    CreateContentAction, CreateContentRequest, SubmitReadiness, TradeAction, TradeView,
};
pub use batcher::CallBatcher;
pub use call::{Call, CallError, CallRequest};
pub use config::{ContractAddresses, EngineConfig, SlippageBounds};
pub use lifecycle::{
    EffectFns, EffectKey, LifecycleController, LifecycleError, ProcessedHashes, Submission,
    TerminalEffects, TxError, TxSnapshot, TxState,
};
pub use metadata::{resolve_uri, ContentMetadata, MetadataError, MetadataStore};
pub use quote::{
    FirmRequest, HttpQuoteClient, PriceRequest, PriceState, Quote, QuoteError, QuoteInputs,
    QuoteSource, TxPayload,
};
pub use reader::{
    rank_auctions, AuctionSnapshot, ContentSnapshot, RankedAuction, ReadError, RewardsSummary,
    StateReader, UnitSnapshot,
};
pub use slippage::{FallbackPrices, ImpactLevel, SlippagePolicy};
pub use types::{Address, Amount, Bytes, Mode, TradeDirection, TxHash, NATIVE_TOKEN, U256};
pub use wallet::{Receipt, WalletClient, WalletError};
