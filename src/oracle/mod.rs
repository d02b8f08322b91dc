//! USD Price Oracle
//!
//! Best-effort USD prices for fee reporting. `CoinGeckoOracle` reads the
//! CoinGecko simple-price endpoints and keeps each answer for a short TTL.
//!
//! Key features:
//! - Native coin lookups by CoinGecko coin id
//! - ERC-20 lookups by contract address on the chain's asset platform
//! - Stablecoin handling (USDC, USDT, DAI = $1)
//! - Per (chain, asset) TTL cache shared across requests

use crate::error::{EngineError, Result};
use crate::registry::ChainRegistry;
use alloy::primitives::Address;
use anyhow::Context;
use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// Stablecoins that are pegged to $1
const STABLECOINS: &[&str] = &["USDC", "USDT", "DAI"];

/// What to price
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PriceAsset {
    /// CoinGecko coin id, e.g. "ethereum"
    Coin(String),
    Token(Address),
}

impl PriceAsset {
    fn cache_key(&self) -> String {
        match self {
            PriceAsset::Coin(id) => id.to_lowercase(),
            PriceAsset::Token(addr) => format!("{:#x}", addr),
        }
    }
}

#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// USD price of one whole unit of `asset` on `chain_id`; `None` when unknown
    async fn usd_price(&self, chain_id: u64, asset: &PriceAsset) -> Result<Option<Decimal>>;
}

#[derive(Debug, Clone, Copy)]
struct CachedPrice {
    price: Option<Decimal>,
    fetched_at: Instant,
}

pub struct CoinGeckoOracle {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    registry: Arc<ChainRegistry>,
    cache: DashMap<(u64, String), CachedPrice>,
    cache_ttl: Duration,
}

impl CoinGeckoOracle {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
        registry: Arc<ChainRegistry>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::external("build coingecko http client", e))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            registry,
            cache: DashMap::new(),
            cache_ttl: Duration::from_secs(30),
        })
    }

    /// Set cache TTL
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    fn cached(&self, key: &(u64, String)) -> Option<Option<Decimal>> {
        let entry = self.cache.get(key)?;
        if entry.fetched_at.elapsed() < self.cache_ttl {
            Some(entry.price)
        } else {
            None
        }
    }

    fn store(&self, key: (u64, String), price: Option<Decimal>) {
        self.cache.insert(
            key,
            CachedPrice {
                price,
                fetched_at: Instant::now(),
            },
        );
    }

    fn api_key_header(&self) -> &'static str {
        if self.base_url.contains("pro-api") {
            "x-cg-pro-api-key"
        } else {
            "x-cg-demo-api-key"
        }
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> anyhow::Result<serde_json::Value> {
        let mut req = self.client.get(url).query(query);
        if let Some(key) = &self.api_key {
            req = req.header(self.api_key_header(), key);
        }
        let resp = req.send().await.context("CoinGecko request failed")?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("CoinGecko returned {}", status);
        }
        resp.json().await.context("CoinGecko decode failed")
    }

    async fn fetch(&self, chain_id: u64, asset: &PriceAsset) -> anyhow::Result<Option<Decimal>> {
        match asset {
            PriceAsset::Coin(id) => {
                let url = format!("{}/simple/price", self.base_url);
                let body = self
                    .get_json(&url, &[("ids", id.clone()), ("vs_currencies", "usd".into())])
                    .await?;
                Ok(parse_usd(&body, &id.to_lowercase()))
            }
            PriceAsset::Token(address) => {
                let chain = self.registry.get(chain_id)?;
                let url = format!(
                    "{}/simple/token_price/{}",
                    self.base_url, chain.coingecko_platform
                );
                let key = format!("{:#x}", address);
                let body = self
                    .get_json(
                        &url,
                        &[("contract_addresses", key.clone()), ("vs_currencies", "usd".into())],
                    )
                    .await?;
                Ok(parse_usd(&body, &key))
            }
        }
    }

    fn is_stablecoin(&self, chain_id: u64, asset: &PriceAsset) -> bool {
        let PriceAsset::Token(address) = asset else {
            return false;
        };
        self.registry
            .get(chain_id)
            .ok()
            .and_then(|chain| chain.symbol_of(*address))
            .is_some_and(|symbol| STABLECOINS.contains(&symbol))
    }
}

#[async_trait]
impl PriceOracle for CoinGeckoOracle {
    async fn usd_price(&self, chain_id: u64, asset: &PriceAsset) -> Result<Option<Decimal>> {
        if self.is_stablecoin(chain_id, asset) {
            return Ok(Some(Decimal::ONE));
        }

        let key = (chain_id, asset.cache_key());
        if let Some(price) = self.cached(&key) {
            return Ok(price);
        }

        let price = self
            .fetch(chain_id, asset)
            .await
            .map_err(|e| EngineError::external("coingecko price", e))?;
        debug!("CoinGecko price chain={} asset={} usd={:?}", chain_id, key.1, price);

        self.store(key, price);
        Ok(price)
    }
}

/// `{ "<key>": { "usd": <number> } }` -> price, without a float round trip
fn parse_usd(body: &serde_json::Value, key: &str) -> Option<Decimal> {
    let value = body.get(key)?.get("usd")?;
    let text = match value {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CHAIN_ETHEREUM;
    use rust_decimal_macros::dec;

    fn oracle() -> CoinGeckoOracle {
        CoinGeckoOracle::new(
            COINGECKO_API_URL,
            None,
            Duration::from_secs(5),
            Arc::new(ChainRegistry::with_defaults()),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_usd() {
        let body = serde_json::json!({
            "ethereum": { "usd": 3150.42 },
            "0xabc": { "usd": "0.0001" },
            "tiny": { "usd": 1.5e-7 }
        });
        assert_eq!(parse_usd(&body, "ethereum"), Some(dec!(3150.42)));
        assert_eq!(parse_usd(&body, "0xabc"), Some(dec!(0.0001)));
        assert_eq!(parse_usd(&body, "tiny"), Some(dec!(0.00000015)));
        assert_eq!(parse_usd(&body, "missing"), None);
    }

    #[tokio::test]
    async fn test_stablecoins_are_one_dollar() {
        let usdc = ChainRegistry::with_defaults()
            .get(CHAIN_ETHEREUM)
            .unwrap()
            .token("USDC")
            .unwrap();
        let price = oracle()
            .usd_price(CHAIN_ETHEREUM, &PriceAsset::Token(usdc))
            .await
            .unwrap();
        assert_eq!(price, Some(Decimal::ONE));
    }

    #[tokio::test]
    async fn test_cache_hit_within_ttl() {
        let oracle = oracle();
        let asset = PriceAsset::Coin("Ethereum".into());
        oracle.store((CHAIN_ETHEREUM, asset.cache_key()), Some(dec!(3000)));

        let price = oracle.usd_price(CHAIN_ETHEREUM, &asset).await.unwrap();
        assert_eq!(price, Some(dec!(3000)));
    }

    #[test]
    fn test_cache_expires() {
        let oracle = oracle().with_cache_ttl(Duration::ZERO);
        let key = (CHAIN_ETHEREUM, "ethereum".to_string());
        oracle.store(key.clone(), Some(dec!(3000)));
        assert!(oracle.cached(&key).is_none());
    }

    #[test]
    fn test_cache_keys_are_per_chain() {
        let oracle = oracle();
        oracle.store((1, "ethereum".into()), Some(dec!(1)));
        assert!(oracle.cached(&(10, "ethereum".into())).is_none());
        assert_eq!(oracle.cached(&(1, "ethereum".into())), Some(Some(dec!(1))));
    }

    #[test]
    fn test_api_key_header_follows_plan() {
        assert_eq!(oracle().api_key_header(), "x-cg-demo-api-key");
        let pro = CoinGeckoOracle::new(
            "https://pro-api.coingecko.com/api/v3",
            Some("k".into()),
            Duration::from_secs(1),
            Arc::new(ChainRegistry::with_defaults()),
        )
        .unwrap();
        assert_eq!(pro.api_key_header(), "x-cg-pro-api-key");
    }
}
