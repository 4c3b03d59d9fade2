//! Indicative prices and firm quotes from the external quoting service.

mod client;
mod types;

pub use client::{HttpQuoteClient, QuoteSource};
pub use types::{FirmRequest, PriceRequest, PriceState, Quote, QuoteError, QuoteInputs, TxPayload};
