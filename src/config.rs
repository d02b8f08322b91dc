//! Engine Configuration
//!
//! TOML file for engine knobs and per-chain overrides, with a `.env`
//! overlay for secrets and RPC endpoints:
//! - `RPC_URL_<CHAIN_ID>` fills a chain's missing `rpc_url`
//! - `COINGECKO_API_KEY` fills a missing oracle key
//!
//! Every field has a default, so an empty file is a valid configuration.

use crate::aggregator::{QuoteSettings, GWEI};
use crate::oracle::COINGECKO_API_URL;
use crate::registry::{
    ChainDeployment, ChainRegistry, ReserveVenueDeployment, TierVenueDeployment, UNISWAP_V2_PAIR_INIT_CODE_HASH,
    UNISWAP_V3_POOL_INIT_CODE_HASH,
};
use crate::types::{Venue, MAX_SLIPPAGE_BPS};
use crate::venues::bridge::ACROSS_API_URL;
use alloy::primitives::Address;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub engine: EngineSection,
    pub oracle: OracleSection,
    pub bridge: BridgeSection,
    pub chains: Vec<ChainConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub default_slippage_bps: u32,
    pub deadline_secs: u64,
    pub gas_price_fallback_gwei: u64,
    pub price_cache_ttl_secs: u64,
    pub router_gas_overhead: u64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            default_slippage_bps: 50,
            deadline_secs: 1200,
            gas_price_fallback_gwei: 20,
            price_cache_ttl_secs: 30,
            router_gas_overhead: 50_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OracleSection {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
}

impl Default for OracleSection {
    fn default() -> Self {
        Self {
            base_url: COINGECKO_API_URL.to_string(),
            api_key: None,
            timeout_ms: 5000,
        }
    }
}

impl OracleSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeSection {
    pub enabled: bool,
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: ACROSS_API_URL.to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl BridgeSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// One `[[chains]]` entry. Unset overrides keep the built-in deployment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub rpc_url: Option<String>,
    pub name: Option<String>,
    pub wrapped_native: Option<Address>,
    pub universal_router: Option<Address>,
    pub v3_factory: Option<Address>,
    pub v3_quoter: Option<Address>,
    pub v2_factory: Option<Address>,
    /// Reserve venue swap fee in thousandths (3 = 0.3%)
    pub v2_fee_units: Option<u32>,
    pub spoke_pool: Option<Address>,
    pub enabled_venues: Option<Vec<Venue>>,
}

impl EngineConfig {
    /// Load a TOML file, apply the environment overlay and validate
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config = Self::from_toml(&content)?;

        dotenv::dotenv().ok();
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Fill unset secrets/endpoints from `lookup` (the process environment in production)
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for chain in &mut self.chains {
            if chain.rpc_url.is_none() {
                chain.rpc_url = lookup(&format!("RPC_URL_{}", chain.chain_id));
            }
        }
        if self.oracle.api_key.is_none() {
            self.oracle.api_key = lookup("COINGECKO_API_KEY").filter(|k| !k.is_empty());
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.default_slippage_bps >= MAX_SLIPPAGE_BPS {
            bail!(
                "default_slippage_bps {} must be below {}",
                self.engine.default_slippage_bps,
                MAX_SLIPPAGE_BPS
            );
        }
        if self.engine.deadline_secs == 0 {
            bail!("deadline_secs must be greater than zero");
        }

        let mut seen = HashSet::new();
        for chain in &self.chains {
            if chain.chain_id == 0 {
                bail!("chains entry without chain_id");
            }
            if !seen.insert(chain.chain_id) {
                bail!("chain {} configured twice", chain.chain_id);
            }
        }
        Ok(())
    }

    pub fn quote_settings(&self) -> QuoteSettings {
        QuoteSettings {
            default_slippage_bps: self.engine.default_slippage_bps,
            deadline_secs: self.engine.deadline_secs,
            gas_price_fallback_wei: u128::from(self.engine.gas_price_fallback_gwei) * GWEI,
            router_gas_overhead: self.engine.router_gas_overhead,
        }
    }

    pub fn price_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.engine.price_cache_ttl_secs)
    }

    pub fn chain(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }

    /// Built-in registry with every `[[chains]]` override applied
    pub fn registry(&self) -> Result<ChainRegistry> {
        let mut registry = ChainRegistry::with_defaults();
        for chain in &self.chains {
            chain.apply_to(&mut registry)?;
        }
        Ok(registry)
    }
}

impl ChainConfig {
    /// Merge this entry into `registry`; unknown chains start from a bare deployment
    pub fn apply_to(&self, registry: &mut ChainRegistry) -> Result<()> {
        let mut deployment = match registry.get(self.chain_id) {
            Ok(existing) => existing.clone(),
            Err(_) => ChainDeployment::bare(self.chain_id),
        };

        if let Some(name) = &self.name {
            deployment.name = name.clone();
        }
        if let Some(wrapped_native) = self.wrapped_native {
            deployment.wrapped_native = Some(wrapped_native);
        }
        if let Some(router) = self.universal_router {
            deployment.universal_router = Some(router);
        }
        if let Some(spoke_pool) = self.spoke_pool {
            deployment.spoke_pool = Some(spoke_pool);
        }

        if let Some(v3) = deployment.uniswap_v3.as_mut() {
            if let Some(factory) = self.v3_factory {
                v3.factory = factory;
            }
            if let Some(quoter) = self.v3_quoter {
                v3.quoter = quoter;
            }
        } else {
            match (self.v3_factory, self.v3_quoter) {
                (Some(factory), Some(quoter)) => {
                    deployment.uniswap_v3 = Some(TierVenueDeployment {
                        factory,
                        quoter,
                        pool_init_code_hash: UNISWAP_V3_POOL_INIT_CODE_HASH,
                    });
                }
                (None, None) => {}
                _ => bail!(
                    "chain {}: v3_factory and v3_quoter must be set together",
                    self.chain_id
                ),
            }
        }

        if let Some(v2) = deployment.uniswap_v2.as_mut() {
            if let Some(factory) = self.v2_factory {
                v2.factory = factory;
            }
        } else if let Some(factory) = self.v2_factory {
            deployment.uniswap_v2 = Some(ReserveVenueDeployment {
                factory,
                pair_init_code_hash: UNISWAP_V2_PAIR_INIT_CODE_HASH,
                fee_units: 3,
            });
        }
        if let (Some(v2), Some(fee_units)) = (&mut deployment.uniswap_v2, self.v2_fee_units) {
            if fee_units >= 1000 {
                bail!("chain {}: v2_fee_units {} out of range", self.chain_id, fee_units);
            }
            v2.fee_units = fee_units;
        }

        if let Some(venues) = &self.enabled_venues {
            deployment.enabled_venues = venues.clone();
        }

        registry.insert(deployment);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{CHAIN_BASE, CHAIN_ETHEREUM};
    use std::collections::HashMap;

    #[test]
    fn test_empty_file_is_valid() {
        let config = EngineConfig::from_toml("").unwrap();
        config.validate().unwrap();
        assert_eq!(config.engine.default_slippage_bps, 50);
        assert_eq!(config.engine.deadline_secs, 1200);
        assert!(config.bridge.enabled);
        assert_eq!(config.oracle.base_url, COINGECKO_API_URL);
        assert_eq!(config.quote_settings(), QuoteSettings::default());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[engine]
default_slippage_bps = 100
gas_price_fallback_gwei = 5

[oracle]
timeout_ms = 2000

[bridge]
enabled = false

[[chains]]
chain_id = 8453
rpc_url = "https://base.example"
enabled_venues = ["uniswap_v3"]

[[chains]]
chain_id = 1
universal_router = "0x66a9893cc07d91d95644aedd05d03f95e1dba8af"
v2_fee_units = 2
"#;
        let config = EngineConfig::from_toml(toml_str).unwrap();
        config.validate().unwrap();
        assert_eq!(config.quote_settings().gas_price_fallback_wei, 5 * GWEI);
        assert_eq!(config.oracle.timeout(), Duration::from_millis(2000));
        assert!(!config.bridge.enabled);
        assert_eq!(
            config.chain(CHAIN_BASE).unwrap().rpc_url.as_deref(),
            Some("https://base.example")
        );

        let registry = config.registry().unwrap();
        assert_eq!(registry.get(CHAIN_BASE).unwrap().enabled_venues, vec![Venue::UniswapV3]);
        let eth = registry.get(CHAIN_ETHEREUM).unwrap();
        assert_eq!(
            eth.universal_router().unwrap(),
            "0x66a9893cc07d91d95644aedd05d03f95e1dba8af".parse::<Address>().unwrap()
        );
        assert_eq!(eth.uniswap_v2.as_ref().unwrap().fee_units, 2);
        // Untouched fields keep their defaults
        assert!(eth.uniswap_v3.is_some());
    }

    #[test]
    fn test_env_overlay_fills_missing_values() {
        let mut config = EngineConfig::from_toml(
            r#"
[[chains]]
chain_id = 10

[[chains]]
chain_id = 1
rpc_url = "https://explicit.example"
"#,
        )
        .unwrap();
        let env: HashMap<&str, &str> = [
            ("RPC_URL_10", "https://op.example"),
            ("RPC_URL_1", "https://ignored.example"),
            ("COINGECKO_API_KEY", "cg-key"),
        ]
        .into_iter()
        .collect();

        config.apply_env(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.chain(10).unwrap().rpc_url.as_deref(), Some("https://op.example"));
        assert_eq!(config.chain(1).unwrap().rpc_url.as_deref(), Some("https://explicit.example"));
        assert_eq!(config.oracle.api_key.as_deref(), Some("cg-key"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.engine.default_slippage_bps = 10_000;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.engine.deadline_secs = 0;
        assert!(config.validate().is_err());

        let config = EngineConfig::from_toml("[[chains]]\nchain_id = 1\n[[chains]]\nchain_id = 1\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_new_chain_from_config() {
        let config = EngineConfig::from_toml(
            r#"
[[chains]]
chain_id = 424242
name = "devnet"
wrapped_native = "0x4200000000000000000000000000000000000006"
universal_router = "0x0000000000000000000000000000000000000777"
v3_factory = "0x0000000000000000000000000000000000000f00"
v3_quoter = "0x0000000000000000000000000000000000000f01"
enabled_venues = ["uniswap_v3"]
"#,
        )
        .unwrap();
        let registry = config.registry().unwrap();
        let chain = registry.get(424242).unwrap();
        assert_eq!(chain.name, "devnet");
        assert!(chain.uniswap_v3.is_some());
        assert!(chain.uniswap_v2.is_none());
        assert!(chain.wrapped_native().is_ok());
    }

    #[test]
    fn test_partial_v3_override_on_new_chain_fails() {
        let config = EngineConfig::from_toml(
            "[[chains]]\nchain_id = 424242\nv3_factory = \"0x0000000000000000000000000000000000000f00\"\n",
        )
        .unwrap();
        assert!(config.registry().is_err());
    }
}
