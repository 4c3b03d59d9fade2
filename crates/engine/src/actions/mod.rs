//! User-facing actions.
//!
//! Each action owns one [`LifecycleController`](crate::lifecycle::LifecycleController)
//! and exposes `{action(args), state, error, reset}`. Preconditions are
//! checked before anything is sent; a refused action leaves the lifecycle
//! untouched.

mod claim;
mod collect;
mod create;
mod trade;

pub use claim::ClaimAction;
pub use collect::{AuctionBuyRequest, CollectAction, CollectRequest};
pub use create::{CreateContentAction, CreateContentRequest};
pub use trade::{SubmitReadiness, TradeAction, TradeView};

use crate::call::CallError;
use crate::lifecycle::{LifecycleError, TxError};
use crate::quote::QuoteError;
use crate::units::UnitsError;
use std::time::{SystemTime, UNIX_EPOCH};

/// Reasons an action was refused or failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActionError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("wallet not connected")]
    NotConnected,

    #[error("invalid amount: {0}")]
    Amount(#[from] UnitsError),

    #[error(transparent)]
    Quote(#[from] QuoteError),

    #[error("firm quote is missing or stale; refresh before submitting")]
    StaleQuote,

    #[error(transparent)]
    Call(#[from] CallError),

    #[error(transparent)]
    Tx(#[from] TxError),
}

/// Current unix time in seconds.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
