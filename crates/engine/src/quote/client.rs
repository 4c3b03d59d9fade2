//! HTTP client for the external quoting service.

use super::types::{FirmRequest, PriceRequest, Quote, QuoteError};
use crate::config::EngineConfig;
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

/// Anything that can price a trade. Implemented over HTTP by
/// [`HttpQuoteClient`] and by fixtures in tests.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Indicative price for display; never carries a transaction.
    async fn get_price(&self, request: &PriceRequest) -> Result<Quote, QuoteError>;

    /// Firm quote with an executable transaction for `request.taker`.
    async fn get_quote(&self, request: &FirmRequest) -> Result<Quote, QuoteError>;
}

/// Quote client for an allowance-holder style swap API exposing
/// `GET {base}/price` and `GET {base}/quote`.
#[derive(Debug, Clone)]
pub struct HttpQuoteClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    chain_id: u64,
}

impl HttpQuoteClient {
    /// Create a client from the engine configuration. The configured quote
    /// timeout applies to every request.
    pub fn new(config: &EngineConfig) -> Result<Self, QuoteError> {
        let http = Client::builder()
            .timeout(config.quote_timeout)
            .build()
            .map_err(|e| QuoteError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.quote_api_url.trim_end_matches('/').to_string(),
            api_key: config.quote_api_key.clone(),
            chain_id: config.chain_id,
        })
    }

    fn base_params(&self, request: &PriceRequest) -> Vec<(&'static str, String)> {
        vec![
            ("chainId", self.chain_id.to_string()),
            ("sellToken", request.sell_token.to_string()),
            ("buyToken", request.buy_token.to_string()),
            ("sellAmount", request.sell_amount.to_string()),
        ]
    }

    async fn fetch(
        &self,
        path: &str,
        params: &[(&'static str, String)],
        request: &PriceRequest,
    ) -> Result<Quote, QuoteError> {
        let url = format!("{}/{}", self.base_url, path);

        let mut builder = self
            .http
            .get(&url)
            .query(params)
            .header("0x-version", "v2");
        if let Some(key) = &self.api_key {
            builder = builder.header("0x-api-key", key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                QuoteError::Timeout
            } else {
                QuoteError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "quote request failed");
            return Err(QuoteError::Http(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                QuoteError::Timeout
            } else {
                QuoteError::Transport(e.to_string())
            }
        })?;

        let quote = Quote::from_json(&body, request)?;
        debug!(
            path,
            sell_amount = %quote.sell_amount,
            buy_amount = %quote.buy_amount,
            firm = quote.is_firm(),
            "quote received"
        );
        Ok(quote)
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteClient {
    async fn get_price(&self, request: &PriceRequest) -> Result<Quote, QuoteError> {
        let params = self.base_params(request);
        let mut quote = self.fetch("price", &params, request).await?;
        // Indicative prices are display-only even if the service attaches a payload.
        quote.transaction = None;
        Ok(quote)
    }

    async fn get_quote(&self, request: &FirmRequest) -> Result<Quote, QuoteError> {
        let mut params = self.base_params(&request.price);
        params.push(("taker", request.taker.to_string()));
        params.push(("slippageBps", request.slippage_bps.to_string()));

        let quote = self.fetch("quote", &params, &request.price).await?;
        if !quote.is_firm() {
            return Err(QuoteError::Malformed(
                "firm quote without transaction".to_string(),
            ));
        }
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, NATIVE_TOKEN, U256};
    use mockito::Matcher;

    fn request() -> PriceRequest {
        PriceRequest {
            sell_token: NATIVE_TOKEN,
            buy_token: Address::repeat_byte(0x01),
            sell_amount: U256::from(1_000u64),
        }
    }

    fn client(url: &str) -> HttpQuoteClient {
        let config = EngineConfig::default().with_quote_api(url, Some("secret".to_string()));
        HttpQuoteClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_price_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/price")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("chainId".into(), "8453".into()),
                Matcher::UrlEncoded("sellToken".into(), NATIVE_TOKEN.to_string()),
                Matcher::UrlEncoded("sellAmount".into(), "1000".into()),
            ]))
            .match_header("0x-api-key", "secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"buyAmount": "42", "sellAmountUsd": "3.5", "buyAmountUsd": "3.4"}"#)
            .create_async()
            .await;

        let quote = client(&server.url()).get_price(&request()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(quote.buy_amount, U256::from(42));
        assert_eq!(quote.sell_amount, U256::from(1_000u64));
        assert_eq!(quote.sell_amount_usd, Some(3.5));
        assert!(!quote.is_firm());
    }

    #[tokio::test]
    async fn test_firm_quote_request() {
        let mut server = mockito::Server::new_async().await;
        let taker = Address::repeat_byte(0xAA);
        let mock = server
            .mock("GET", "/quote")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("taker".into(), taker.to_string()),
                Matcher::UrlEncoded("slippageBps".into(), "300".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{
                    "buyAmount": "42",
                    "transaction": {
                        "to": "0x0909090909090909090909090909090909090909",
                        "data": "0x12345678",
                        "value": "1000"
                    }
                }"#,
            )
            .create_async()
            .await;

        let firm = FirmRequest {
            price: request(),
            taker,
            slippage_bps: 300,
        };
        let quote = client(&server.url()).get_quote(&firm).await.unwrap();

        mock.assert_async().await;
        let tx = quote.transaction.unwrap();
        assert_eq!(tx.to, Address::repeat_byte(0x09));
        assert_eq!(tx.value, U256::from(1_000u64));
    }

    #[tokio::test]
    async fn test_http_error_is_a_value() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/price")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"name": "INPUT_INVALID"}"#)
            .create_async()
            .await;

        let err = client(&server.url()).get_price(&request()).await.unwrap_err();
        assert_eq!(err, QuoteError::Http(400));
    }

    #[tokio::test]
    async fn test_firm_quote_without_transaction_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/quote")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"buyAmount": "42"}"#)
            .create_async()
            .await;

        let firm = FirmRequest {
            price: request(),
            taker: Address::repeat_byte(0xAA),
            slippage_bps: 100,
        };
        let err = client(&server.url()).get_quote(&firm).await.unwrap_err();
        assert!(matches!(err, QuoteError::Malformed(_)));
    }
}
