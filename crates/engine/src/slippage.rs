//! Dynamic slippage tolerance derived from observed price impact.
//!
//! Everything here is a pure function of the latest indicative quote, the
//! typed amount, the trade direction and fallback prices. Nothing is cached
//! between calls, so the UI can recompute on every render.

use crate::config::SlippageBounds;
use crate::quote::Quote;
use crate::types::{Amount, TradeDirection};
use crate::units;

/// Secondary USD prices used when the quote carries no USD valuation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FallbackPrices {
    /// USD price of the native asset.
    pub native_usd: f64,
    /// External market price of the community token, when listed.
    pub token_market_usd: Option<f64>,
    /// On-chain reference price of the community token in USD.
    pub token_onchain_usd: f64,
}

impl FallbackPrices {
    /// Build fallback prices from the on-chain unit price, quoted in the
    /// reference token (18 decimals), and that token's USD price.
    pub fn from_onchain(
        native_usd: f64,
        token_market_usd: Option<f64>,
        unit_price: Amount,
        reference_usd: f64,
    ) -> Self {
        let token_onchain_usd = if unit_price.is_zero() {
            0.0
        } else {
            units::amount_as_f64(unit_price, 18) * reference_usd
        };
        Self {
            native_usd,
            token_market_usd,
            token_onchain_usd,
        }
    }

    /// Market price when available, otherwise the on-chain reference.
    pub fn token_usd(&self) -> f64 {
        self.token_market_usd.unwrap_or(self.token_onchain_usd)
    }
}

/// Inputs of one slippage evaluation.
#[derive(Debug, Clone, Copy)]
pub struct SlippageInput<'a> {
    pub quote: Option<&'a Quote>,
    /// Raw amount text as typed.
    pub amount: &'a str,
    pub direction: TradeDirection,
    /// Decimals of the token being bought.
    pub buy_decimals: u8,
    pub prices: FallbackPrices,
}

/// USD value on each side of a trade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Valuation {
    pub input_usd: f64,
    pub output_usd: f64,
}

impl Valuation {
    /// Percentage lost between input and output, clamped at zero.
    /// `None` when the input is worth nothing.
    pub fn impact(&self) -> Option<f64> {
        if self.input_usd == 0.0 {
            return None;
        }
        let impact = (self.input_usd - self.output_usd) / self.input_usd * 100.0;
        Some(impact.max(0.0))
    }
}

/// Value both sides of the trade, preferring the quote's own USD fields and
/// falling back to `price * amount` when either is missing or zero.
///
/// Returns `None` when there is nothing to value: no quote, no route, or
/// an empty/zero amount.
pub fn valuation(input: &SlippageInput<'_>, output_amount: Amount) -> Option<Valuation> {
    let quote = input.quote?;
    if !quote.has_route() {
        return None;
    }
    let amount = units::parse_decimal(input.amount).filter(|v| *v > 0.0)?;

    let mut input_usd = quote.sell_amount_usd.unwrap_or(0.0);
    let mut output_usd = quote.buy_amount_usd.unwrap_or(0.0);

    if input_usd == 0.0 || output_usd == 0.0 {
        let token_usd = input.prices.token_usd();
        let output = units::amount_as_f64(output_amount, input.buy_decimals);
        let (sell_price, buy_price) = match input.direction {
            TradeDirection::Buy => (input.prices.native_usd, token_usd),
            TradeDirection::Sell => (token_usd, input.prices.native_usd),
        };
        input_usd = amount * sell_price;
        output_usd = output * buy_price;
    }

    Some(Valuation {
        input_usd,
        output_usd,
    })
}

/// Derives slippage tolerances within configured bounds.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlippagePolicy {
    bounds: SlippageBounds,
}

impl SlippagePolicy {
    pub fn new(bounds: SlippageBounds) -> Self {
        Self { bounds }
    }

    pub fn bounds(&self) -> &SlippageBounds {
        &self.bounds
    }

    /// Tolerance in whole percent for the current inputs:
    /// `clamp(ceil(impact) + buffer, min, max)`.
    pub fn tolerance(&self, input: &SlippageInput<'_>) -> u32 {
        let Some(quote) = input.quote else {
            return self.bounds.no_amount_percent;
        };
        let Some(valuation) = valuation(input, quote.buy_amount) else {
            return self.bounds.no_amount_percent;
        };
        let Some(impact) = valuation.impact() else {
            return self.bounds.unvalued_percent;
        };

        // Impact is finite and non-negative here; saturate absurd values.
        let rounded = impact.ceil().min(u32::MAX as f64) as u32;
        rounded
            .saturating_add(self.bounds.buffer_percent)
            .clamp(self.bounds.min_percent, self.bounds.max_percent)
    }

    /// Tolerance in basis points for the firm quote request.
    pub fn tolerance_bps(&self, input: &SlippageInput<'_>) -> u32 {
        self.tolerance(input).saturating_mul(100)
    }
}

/// Price impact shown to the user, computed against the quoted output.
/// `None` when the amount is empty or zero, or nothing can be valued.
pub fn price_impact(input: &SlippageInput<'_>) -> Option<f64> {
    let quote = input.quote?;
    price_impact_for_output(input, quote.buy_amount)
}

/// Price impact against an explicit output amount, e.g. the amount actually
/// received. Zero and missing inputs are handled exactly like
/// [`price_impact`].
pub fn price_impact_for_output(input: &SlippageInput<'_>, output_amount: Amount) -> Option<f64> {
    valuation(input, output_amount)?.impact()
}

/// Least amount the user receives at `tolerance` percent.
pub fn min_received(buy_amount: Amount, tolerance: u32) -> Amount {
    units::apply_discount(buy_amount, tolerance)
}

/// Whether a displayed impact deserves a warning, and how loud.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpactLevel {
    Normal,
    Warning,
    Severe,
}

impl ImpactLevel {
    pub fn of(impact: Option<f64>) -> Self {
        match impact {
            Some(v) if v > 10.0 => ImpactLevel::Severe,
            Some(v) if v > 5.0 => ImpactLevel::Warning,
            _ => ImpactLevel::Normal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, NATIVE_TOKEN, U256};

    fn one_token(decimals: u8) -> Amount {
        U256::from(10u64).pow(U256::from(decimals))
    }

    fn quote(buy_amount: Amount, sell_usd: Option<f64>, buy_usd: Option<f64>) -> Quote {
        Quote {
            sell_token: NATIVE_TOKEN,
            buy_token: Address::repeat_byte(0x01),
            sell_amount: one_token(18),
            buy_amount,
            sell_amount_usd: sell_usd,
            buy_amount_usd: buy_usd,
            transaction: None,
        }
    }

    fn input<'a>(quote: Option<&'a Quote>, amount: &'a str, prices: FallbackPrices) -> SlippageInput<'a> {
        SlippageInput {
            quote,
            amount,
            direction: TradeDirection::Buy,
            buy_decimals: 18,
            prices,
        }
    }

    #[test]
    fn test_no_amount_defaults_to_one_percent() {
        let policy = SlippagePolicy::default();
        let q = quote(one_token(18), Some(100.0), Some(99.0));

        assert_eq!(policy.tolerance(&input(Some(&q), "", FallbackPrices::default())), 1);
        assert_eq!(policy.tolerance(&input(Some(&q), "0", FallbackPrices::default())), 1);
        assert_eq!(policy.tolerance(&input(None, "1", FallbackPrices::default())), 1);
    }

    #[test]
    fn test_unvalued_amount_defaults_to_two_percent() {
        let policy = SlippagePolicy::default();
        // No USD fields and no fallback prices: input value is zero.
        let q = quote(one_token(18), None, None);

        assert_eq!(policy.tolerance(&input(Some(&q), "1", FallbackPrices::default())), 2);
        assert_eq!(price_impact(&input(Some(&q), "1", FallbackPrices::default())), None);
    }

    #[test]
    fn test_zero_impact_clamps_to_floor() {
        let policy = SlippagePolicy::default();
        let q = quote(one_token(18), Some(100.0), Some(100.0));
        let i = input(Some(&q), "1", FallbackPrices::default());

        assert_eq!(price_impact(&i), Some(0.0));
        assert_eq!(policy.tolerance(&i), 2);
    }

    #[test]
    fn test_negative_impact_clamps_to_zero() {
        let policy = SlippagePolicy::default();
        let q = quote(one_token(18), Some(100.0), Some(120.0));
        let i = input(Some(&q), "1", FallbackPrices::default());

        assert_eq!(price_impact(&i), Some(0.0));
        assert_eq!(policy.tolerance(&i), 2);
    }

    #[test]
    fn test_large_impact_clamps_to_ceiling() {
        let policy = SlippagePolicy::default();
        let q = quote(one_token(18), Some(100.0), Some(40.0));
        let i = input(Some(&q), "1", FallbackPrices::default());

        let impact = price_impact(&i).unwrap();
        assert!((impact - 60.0).abs() < 1e-9);
        assert_eq!(policy.tolerance(&i), 49);
    }

    #[test]
    fn test_impact_rounds_up_then_buffers() {
        let policy = SlippagePolicy::default();
        // 3.2% impact -> ceil 4 -> +2 -> 6
        let q = quote(one_token(18), Some(100.0), Some(96.8));
        let i = input(Some(&q), "1", FallbackPrices::default());

        assert_eq!(policy.tolerance(&i), 6);
        assert_eq!(policy.tolerance_bps(&i), 600);
    }

    #[test]
    fn test_fallback_prices_used_when_usd_missing() {
        let policy = SlippagePolicy::default();
        // Buying 1000 tokens with 1 ETH.
        let q = quote(one_token(18) * U256::from(1000), Some(4000.0), None);
        let prices = FallbackPrices {
            native_usd: 4000.0,
            token_market_usd: Some(3.0),
            token_onchain_usd: 100.0,
        };
        let i = input(Some(&q), "1", prices);

        // input $4000, output $3000 -> 25% impact -> 27%
        assert_eq!(price_impact(&i), Some(25.0));
        assert_eq!(policy.tolerance(&i), 27);
    }

    #[test]
    fn test_onchain_price_when_not_listed() {
        // 0.5 reference tokens per unit at $2 each = $1
        let prices = FallbackPrices::from_onchain(
            3000.0,
            None,
            one_token(18) / U256::from(2),
            2.0,
        );
        assert_eq!(prices.token_usd(), 1.0);

        let listed = FallbackPrices::from_onchain(3000.0, Some(1.5), one_token(18), 2.0);
        assert_eq!(listed.token_usd(), 1.5);
    }

    #[test]
    fn test_sell_direction_swaps_prices() {
        let q = quote(one_token(18) / U256::from(1000), None, None);
        let prices = FallbackPrices {
            native_usd: 3000.0,
            token_market_usd: Some(3.0),
            token_onchain_usd: 0.0,
        };
        let mut i = input(Some(&q), "1", prices);
        i.direction = TradeDirection::Sell;

        // Selling 1 token ($3) for 0.001 ETH ($3): no impact.
        assert_eq!(price_impact(&i), Some(0.0));
    }

    #[test]
    fn test_actual_output_impact_agrees_on_zero_handling() {
        let q = quote(one_token(18), Some(100.0), Some(100.0));

        for amount in ["", "0"] {
            let i = input(Some(&q), amount, FallbackPrices::default());
            assert_eq!(price_impact(&i), None);
            assert_eq!(price_impact_for_output(&i, one_token(18)), None);
        }
    }

    #[test]
    fn test_min_received_and_levels() {
        assert_eq!(min_received(U256::from(1_000u64), 3), U256::from(970u64));
        assert_eq!(ImpactLevel::of(None), ImpactLevel::Normal);
        assert_eq!(ImpactLevel::of(Some(6.0)), ImpactLevel::Warning);
        assert_eq!(ImpactLevel::of(Some(11.0)), ImpactLevel::Severe);
    }
}
