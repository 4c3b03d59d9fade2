//! Configuration file loading.

use eyre::Context;
use serde::Deserialize;
use std::path::Path;
use trade_engine::EngineConfig;

/// Contents of the optional `--config` TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub rpc_url: Option<String>,
    pub engine: EngineConfig,
}

impl FileConfig {
    pub fn load(path: Option<&Path>) -> eyre::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&text).wrap_err_with(|| format!("invalid config file {}", path.display()))
    }

    pub fn parse(text: &str) -> eyre::Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = FileConfig::parse("").unwrap();

        assert!(config.rpc_url.is_none());
        assert_eq!(config.engine.chain_id, 8453);
        assert_eq!(config.engine.collect_slippage_percent, 5);
    }

    #[test]
    fn test_overrides() {
        let config = FileConfig::parse(
            r#"
            rpc_url = "http://localhost:8545"

            [engine]
            chain_id = 84532
            quote_timeout = 3
            collect_slippage_percent = 10

            [engine.slippage]
            max_percent = 30

            [engine.contracts]
            multicall = "0x0000000000000000000000000000000000000042"
            "#,
        )
        .unwrap();

        assert_eq!(config.rpc_url.as_deref(), Some("http://localhost:8545"));
        assert_eq!(config.engine.chain_id, 84532);
        assert_eq!(config.engine.quote_timeout, Duration::from_secs(3));
        assert_eq!(config.engine.collect_slippage_percent, 10);
        assert_eq!(config.engine.slippage.max_percent, 30);
        assert_eq!(config.engine.slippage.min_percent, 2);
        assert_eq!(
            config.engine.contracts.multicall,
            trade_engine::Address::with_last_byte(0x42)
        );
        // Unset contract keeps its default.
        assert_eq!(
            config.engine.contracts.usdc,
            trade_engine::ContractAddresses::default().usdc
        );
    }
}
