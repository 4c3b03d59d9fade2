//! Quote types and the rules deciding when a quote may be requested.

use crate::call::{Call, CallError};
use crate::types::{Address, Amount, Bytes, Mode, TradeDirection, U256};
use crate::units;
use serde::Deserialize;

/// Errors surfaced by a quote source. These are values, never panics:
/// every variant except [`QuoteError::Disabled`] is displayed as "no
/// liquidity".
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QuoteError {
    #[error("no route found")]
    NoRoute,

    #[error("quote request timed out")]
    Timeout,

    #[error("quoting service returned status {0}")]
    Http(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed quote payload: {0}")]
    Malformed(String),

    #[error("quote disabled: {0}")]
    Disabled(&'static str),
}

/// Executable transaction attached to a firm quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxPayload {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

/// A price returned by the quoting service.
///
/// Indicative quotes have no `transaction` and are only used for display
/// and slippage derivation; firm quotes carry the router call to submit.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub sell_token: Address,
    pub buy_token: Address,
    pub sell_amount: Amount,
    pub buy_amount: Amount,
    pub sell_amount_usd: Option<f64>,
    pub buy_amount_usd: Option<f64>,
    pub transaction: Option<TxPayload>,
}

impl Quote {
    pub fn is_firm(&self) -> bool {
        self.transaction.is_some()
    }

    /// A zero `buy_amount` means the service found no route.
    pub fn has_route(&self) -> bool {
        !self.buy_amount.is_zero()
    }

    /// Build the router call for a firm quote.
    pub fn swap_call(&self) -> Result<Call, CallError> {
        let tx = self
            .transaction
            .as_ref()
            .ok_or_else(|| CallError::InvalidCalldata("quote has no transaction".to_string()))?;
        Call::swap(tx.to, tx.data.clone(), tx.value)
    }

    /// Parse a service response for `request`.
    pub fn from_json(body: &[u8], request: &PriceRequest) -> Result<Self, QuoteError> {
        let raw: RawQuote =
            serde_json::from_slice(body).map_err(|e| QuoteError::Malformed(e.to_string()))?;
        raw.into_quote(request)
    }
}

/// Parameters of an indicative price request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceRequest {
    pub sell_token: Address,
    pub buy_token: Address,
    pub sell_amount: Amount,
}

/// Parameters of a firm quote request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmRequest {
    pub price: PriceRequest,
    pub taker: Address,
    pub slippage_bps: u32,
}

/// Everything the trade form knows when deciding whether to fetch.
#[derive(Debug, Clone, Default)]
pub struct QuoteInputs {
    pub mode: Mode,
    /// The community token; quotes are disabled until it is known.
    pub token: Option<Address>,
    pub direction: TradeDirection,
    /// Raw amount text as typed by the user.
    pub amount: String,
    pub sell_decimals: u8,
    /// Connected account, required for firm quotes.
    pub taker: Option<Address>,
}

impl QuoteInputs {
    /// The indicative price request, or why fetching is disabled.
    pub fn price_request(&self) -> Result<PriceRequest, QuoteError> {
        if self.mode != Mode::Trade {
            return Err(QuoteError::Disabled("not in trade mode"));
        }
        let token = self.token.ok_or(QuoteError::Disabled("token address unknown"))?;
        let sell_amount = self
            .sell_amount()
            .ok_or(QuoteError::Disabled("amount is not a positive decimal"))?;

        let (sell_token, buy_token) = self.direction.tokens(token);
        Ok(PriceRequest {
            sell_token,
            buy_token,
            sell_amount,
        })
    }

    /// The amount in base units of the sell token. `None` unless the text
    /// is a plain positive decimal with at most `sell_decimals` fractional
    /// digits.
    pub fn sell_amount(&self) -> Option<Amount> {
        units::parse_amount(&self.amount, self.sell_decimals)
            .ok()
            .filter(|amount| !amount.is_zero())
    }

    /// The firm quote request at `slippage_bps`, or why fetching is disabled.
    pub fn firm_request(&self, slippage_bps: u32) -> Result<FirmRequest, QuoteError> {
        let price = self.price_request()?;
        let taker = self.taker.ok_or(QuoteError::Disabled("no taker address"))?;
        Ok(FirmRequest {
            price,
            taker,
            slippage_bps,
        })
    }
}

/// Outcome of the latest indicative price lookup, as seen by the form.
#[derive(Debug, Clone, Default)]
pub enum PriceState {
    /// Fetching is disabled for the current inputs.
    #[default]
    Disabled,
    Ready(Quote),
    Failed(QuoteError),
}

impl PriceState {
    pub fn quote(&self) -> Option<&Quote> {
        match self {
            PriceState::Ready(quote) => Some(quote),
            _ => None,
        }
    }

    /// True when an amount is entered and the service has nothing to offer:
    /// a fetch error, or a settled lookup without a positive `buy_amount`.
    pub fn has_no_liquidity(&self, amount: &str) -> bool {
        match self {
            PriceState::Failed(QuoteError::Disabled(_)) => false,
            PriceState::Failed(_) => true,
            PriceState::Ready(quote) => units::is_positive_amount(amount) && !quote.has_route(),
            PriceState::Disabled => false,
        }
    }
}

impl From<Result<Quote, QuoteError>> for PriceState {
    fn from(result: Result<Quote, QuoteError>) -> Self {
        match result {
            Ok(quote) => PriceState::Ready(quote),
            Err(QuoteError::Disabled(_)) => PriceState::Disabled,
            Err(err) => PriceState::Failed(err),
        }
    }
}

/// USD valuations arrive either as JSON numbers or as decimal strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UsdValue {
    Number(f64),
    Text(String),
}

impl UsdValue {
    fn as_f64(&self) -> Option<f64> {
        match self {
            UsdValue::Number(v) => Some(*v),
            UsdValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
        .filter(|v| v.is_finite() && *v >= 0.0)
    }
}

#[derive(Debug, Deserialize)]
struct RawTransaction {
    to: Address,
    data: Bytes,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuote {
    #[serde(default)]
    liquidity_available: Option<bool>,
    #[serde(default)]
    buy_amount: Option<String>,
    #[serde(default)]
    sell_amount: Option<String>,
    #[serde(default)]
    sell_amount_usd: Option<UsdValue>,
    #[serde(default)]
    buy_amount_usd: Option<UsdValue>,
    #[serde(default)]
    transaction: Option<RawTransaction>,
}

fn parse_u256(field: &str, text: &str) -> Result<U256, QuoteError> {
    text.trim()
        .parse::<U256>()
        .map_err(|e| QuoteError::Malformed(format!("{field}: {e}")))
}

impl RawQuote {
    fn into_quote(self, request: &PriceRequest) -> Result<Quote, QuoteError> {
        if self.liquidity_available == Some(false) {
            return Err(QuoteError::NoRoute);
        }

        let buy_amount = match self.buy_amount.as_deref() {
            Some(text) => parse_u256("buyAmount", text)?,
            None => return Err(QuoteError::NoRoute),
        };
        let sell_amount = match self.sell_amount.as_deref() {
            Some(text) => parse_u256("sellAmount", text)?,
            None => request.sell_amount,
        };

        let transaction = match self.transaction {
            Some(tx) => {
                let value = match tx.value.as_deref() {
                    Some(text) if !text.is_empty() => parse_u256("transaction.value", text)?,
                    _ => U256::ZERO,
                };
                Some(TxPayload {
                    to: tx.to,
                    data: tx.data,
                    value,
                })
            }
            None => None,
        };

        Ok(Quote {
            sell_token: request.sell_token,
            buy_token: request.buy_token,
            sell_amount,
            buy_amount,
            sell_amount_usd: self.sell_amount_usd.as_ref().and_then(UsdValue::as_f64),
            buy_amount_usd: self.buy_amount_usd.as_ref().and_then(UsdValue::as_f64),
            transaction,
        })
    }
}
