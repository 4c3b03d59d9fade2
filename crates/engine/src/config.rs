//! Engine configuration parameters.

use crate::types::{address, Address};
use serde::Deserialize;
use std::time::Duration;

/// Deployed contract addresses the engine talks to.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContractAddresses {
    /// Router contract fronting collect, auction buy and reward claims.
    pub multicall: Address,
    /// Quote token (USDC) used to pay for collects.
    pub usdc: Address,
}

impl Default for ContractAddresses {
    fn default() -> Self {
        Self {
            multicall: address!("BBa2533E00a685D76099b9bd6708bd2D677da11E"),
            usdc: address!("e90495BE187d434e23A9B1FeC0B6Ce039700870e"),
        }
    }
}

/// Bounds applied by the dynamic slippage policy, in whole percent.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SlippageBounds {
    /// Lowest tolerance ever returned when a valuation exists.
    pub min_percent: u32,
    /// Highest tolerance ever returned.
    pub max_percent: u32,
    /// Added on top of the observed price impact.
    pub buffer_percent: u32,
    /// Returned when no amount or no quote is available.
    pub no_amount_percent: u32,
    /// Returned when an amount is entered but could not be valued in USD.
    pub unvalued_percent: u32,
}

impl Default for SlippageBounds {
    fn default() -> Self {
        Self {
            min_percent: 2,
            max_percent: 49,
            buffer_percent: 2,
            no_amount_percent: 1,
            unvalued_percent: 2,
        }
    }
}

/// Configuration for the engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Chain the transactions are sent to (Base mainnet by default).
    pub chain_id: u64,

    pub contracts: ContractAddresses,

    /// Base URL of the quoting service; `/price` and `/quote` are appended.
    pub quote_api_url: String,

    /// Optional API key sent as `0x-api-key`.
    pub quote_api_key: Option<String>,

    /// Caller-side timeout for a single quote request.
    #[serde(with = "secs")]
    pub quote_timeout: Duration,

    /// How long a firm quote may be submitted after it was fetched.
    #[serde(with = "secs")]
    pub firm_quote_ttl: Duration,

    pub slippage: SlippageBounds,

    /// Slippage buffer applied to the auction price for collects.
    pub collect_slippage_percent: u32,

    /// Seconds added to "now" for the deadline of time-bound calls.
    pub deadline_buffer_secs: u64,

    /// How long a trade result stays on screen before auto-reset.
    #[serde(with = "secs")]
    pub trade_display_window: Duration,

    /// How long a collect result stays on screen before auto-reset.
    #[serde(with = "secs")]
    pub collect_display_window: Duration,

    /// How long a claim result stays on screen before auto-reset.
    #[serde(with = "secs")]
    pub claim_display_window: Duration,

    /// How long a create-content result stays on screen before auto-reset.
    #[serde(with = "secs")]
    pub create_display_window: Duration,

    /// HTTP gateway `ipfs://` URIs are rewritten to.
    pub ipfs_gateway: String,

    /// How long fetched metadata is served from cache.
    #[serde(with = "secs")]
    pub metadata_ttl: Duration,

    /// Caller-side timeout for a single metadata fetch.
    #[serde(with = "secs")]
    pub metadata_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chain_id: 8453,
            contracts: ContractAddresses::default(),
            quote_api_url: "https://api.0x.org/swap/allowance-holder".to_string(),
            quote_api_key: None,
            quote_timeout: Duration::from_secs(10),
            firm_quote_ttl: Duration::from_secs(30),
            slippage: SlippageBounds::default(),
            collect_slippage_percent: 5,
            deadline_buffer_secs: 300,
            trade_display_window: Duration::from_secs(3),
            collect_display_window: Duration::from_secs(3),
            claim_display_window: Duration::from_secs(2),
            create_display_window: Duration::from_secs(3),
            ipfs_gateway: "https://ipfs.io/ipfs/".to_string(),
            metadata_ttl: Duration::from_secs(300),
            metadata_timeout: Duration::from_secs(10),
        }
    }
}

impl EngineConfig {
    /// Create a new configuration with a custom chain id.
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    /// Create a new configuration pointing at another quoting service.
    pub fn with_quote_api(mut self, url: impl Into<String>, api_key: Option<String>) -> Self {
        self.quote_api_url = url.into();
        self.quote_api_key = api_key;
        self
    }

    /// Create a new configuration with a custom quote timeout.
    pub fn with_quote_timeout(mut self, timeout: Duration) -> Self {
        self.quote_timeout = timeout;
        self
    }

    /// Create a new configuration with a custom firm quote validity window.
    pub fn with_firm_quote_ttl(mut self, ttl: Duration) -> Self {
        self.firm_quote_ttl = ttl;
        self
    }

    /// Create a new configuration with custom contract addresses.
    pub fn with_contracts(mut self, contracts: ContractAddresses) -> Self {
        self.contracts = contracts;
        self
    }

    /// Create a new configuration with a custom collect slippage buffer.
    pub fn with_collect_slippage(mut self, percent: u32) -> Self {
        self.collect_slippage_percent = percent;
        self
    }

    /// Create a new configuration with a custom IPFS gateway.
    pub fn with_ipfs_gateway(mut self, gateway: impl Into<String>) -> Self {
        self.ipfs_gateway = gateway.into();
        self
    }

    /// Create a new configuration with a custom metadata fetch timeout.
    pub fn with_metadata_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_timeout = timeout;
        self
    }
}

/// Durations are written as whole seconds in config files.
mod secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
