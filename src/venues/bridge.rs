//! Cross-chain bridge venues
//!
//! `AcrossBridge` quotes through the Across `/suggested-fees` API and
//! builds SpokePool `depositV3` calls. Amounts outside the relayer
//! deposit limits are rejected with no quote, not an error.

use crate::contracts::ISpokePool;
use crate::error::{EngineError, Result};
use crate::registry::ChainRegistry;
use crate::types::{is_native, BridgeQuote, TxPayload, Venue};
use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;
use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const ACROSS_API_URL: &str = "https://app.across.to/api";

/// Fill deadline used when the API does not return one
const DEFAULT_FILL_WINDOW_SECS: u64 = 4 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeQuoteRequest {
    pub source_chain_id: u64,
    pub target_chain_id: u64,
    /// Token on the source chain (may be the native sentinel)
    pub input_token: Address,
    /// Token on the target chain (may be the native sentinel)
    pub output_token: Address,
    pub amount: U256,
    pub recipient: Address,
}

#[async_trait]
pub trait BridgeVenue: Send + Sync {
    fn venue(&self) -> Venue;

    /// `Ok(None)` when the bridge declines the transfer (limits, unsupported route)
    async fn get_quote(&self, request: &BridgeQuoteRequest) -> Result<Option<BridgeQuote>>;

    fn build_transaction(&self, quote: &BridgeQuote, sender: Address) -> Result<TxPayload>;
}

/// Decimal string or bare JSON number
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum NumberLike {
    Text(String),
    Int(u64),
}

impl NumberLike {
    fn to_u256(&self) -> Result<U256> {
        match self {
            NumberLike::Int(n) => Ok(U256::from(*n)),
            NumberLike::Text(s) => U256::from_str_radix(s.trim(), 10)
                .map_err(|e| EngineError::external("across response", anyhow::anyhow!("bad number {:?}: {}", s, e))),
        }
    }

    fn to_u32(&self) -> Result<u32> {
        let value = self.to_u256()?;
        u32::try_from(value).map_err(|_| {
            EngineError::external("across response", anyhow::anyhow!("{} does not fit u32", value))
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelayFee {
    total: NumberLike,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DepositLimits {
    min_deposit: NumberLike,
    max_deposit: NumberLike,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestedFees {
    total_relay_fee: RelayFee,
    timestamp: NumberLike,
    #[serde(default)]
    is_amount_too_low: bool,
    #[serde(default)]
    spoke_pool_address: Option<Address>,
    #[serde(default)]
    exclusive_relayer: Option<Address>,
    #[serde(default)]
    exclusivity_deadline: Option<NumberLike>,
    #[serde(default)]
    fill_deadline: Option<NumberLike>,
    #[serde(default)]
    output_amount: Option<NumberLike>,
    limits: DepositLimits,
}

pub struct AcrossBridge {
    client: reqwest::Client,
    base_url: String,
    registry: Arc<ChainRegistry>,
}

impl AcrossBridge {
    pub fn new(base_url: impl Into<String>, timeout: Duration, registry: Arc<ChainRegistry>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::external("build across http client", e))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            registry,
        })
    }

    /// Token address the SpokePool sees (native becomes wrapped native)
    fn deposit_token(&self, chain_id: u64, token: Address) -> Result<Address> {
        self.registry.get(chain_id)?.pricing_token(token)
    }

    async fn fetch_suggested_fees(
        &self,
        request: &BridgeQuoteRequest,
        input_token: Address,
        output_token: Address,
    ) -> anyhow::Result<SuggestedFees> {
        let url = format!("{}/suggested-fees", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("inputToken", input_token.to_string()),
                ("outputToken", output_token.to_string()),
                ("originChainId", request.source_chain_id.to_string()),
                ("destinationChainId", request.target_chain_id.to_string()),
                ("amount", request.amount.to_string()),
                ("recipient", request.recipient.to_string()),
            ])
            .send()
            .await
            .context("Across suggested-fees request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Across suggested-fees returned {}: {}", status, body);
        }

        resp.json::<SuggestedFees>()
            .await
            .context("Across suggested-fees decode failed")
    }
}

/// Turn an Across fee quote into a BridgeQuote, or `None` when the amount is
/// outside the deposit limits
fn quote_from_fees(
    request: &BridgeQuoteRequest,
    output_token: Address,
    default_spoke_pool: Address,
    fees: &SuggestedFees,
    now: u64,
) -> Result<Option<BridgeQuote>> {
    let min_deposit = fees.limits.min_deposit.to_u256()?;
    let max_deposit = fees.limits.max_deposit.to_u256()?;

    if fees.is_amount_too_low || request.amount < min_deposit {
        debug!(
            "Across declines {} (below minimum deposit {})",
            request.amount, min_deposit
        );
        return Ok(None);
    }
    if request.amount > max_deposit {
        debug!(
            "Across declines {} (above maximum deposit {})",
            request.amount, max_deposit
        );
        return Ok(None);
    }

    let total_fee = fees.total_relay_fee.total.to_u256()?;
    let output_amount = match &fees.output_amount {
        Some(amount) => amount.to_u256()?,
        None => request.amount.saturating_sub(total_fee),
    };
    if output_amount.is_zero() {
        return Ok(None);
    }

    let quote_timestamp = fees.timestamp.to_u32()?;
    let fill_deadline = match &fees.fill_deadline {
        Some(deadline) => deadline.to_u32()?,
        None => u32::try_from(now + DEFAULT_FILL_WINDOW_SECS).unwrap_or(u32::MAX),
    };
    let exclusivity_deadline = match &fees.exclusivity_deadline {
        Some(deadline) => deadline.to_u32()?,
        None => 0,
    };

    Ok(Some(BridgeQuote {
        venue: Venue::Across,
        source_chain_id: request.source_chain_id,
        target_chain_id: request.target_chain_id,
        input_token: request.input_token,
        output_token,
        input_amount: request.amount,
        output_amount,
        total_fee,
        recipient: request.recipient,
        spoke_pool: fees.spoke_pool_address.unwrap_or(default_spoke_pool),
        exclusive_relayer: fees.exclusive_relayer.unwrap_or(Address::ZERO),
        quote_timestamp,
        fill_deadline,
        exclusivity_deadline,
    }))
}

#[async_trait]
impl BridgeVenue for AcrossBridge {
    fn venue(&self) -> Venue {
        Venue::Across
    }

    async fn get_quote(&self, request: &BridgeQuoteRequest) -> Result<Option<BridgeQuote>> {
        let source = self.registry.get(request.source_chain_id)?;
        let spoke_pool = source.spoke_pool()?;
        let input_token = self.deposit_token(request.source_chain_id, request.input_token)?;
        let output_token = self.deposit_token(request.target_chain_id, request.output_token)?;

        let fees = self
            .fetch_suggested_fees(request, input_token, output_token)
            .await
            .map_err(|e| EngineError::external("across suggested-fees", e))?;

        let now = Utc::now().timestamp().max(0) as u64;
        let quote = quote_from_fees(request, output_token, spoke_pool, &fees, now)?;
        if let Some(q) = &quote {
            info!(
                "Across quote {} -> {}: in={} out={} fee={}",
                q.source_chain_id, q.target_chain_id, q.input_amount, q.output_amount, q.total_fee
            );
        }
        Ok(quote)
    }

    fn build_transaction(&self, quote: &BridgeQuote, sender: Address) -> Result<TxPayload> {
        if sender == Address::ZERO {
            return Err(EngineError::InvalidInput("sender is the zero address".into()));
        }
        let input_token = self.deposit_token(quote.source_chain_id, quote.input_token)?;

        let call = ISpokePool::depositV3Call {
            depositor: sender,
            recipient: quote.recipient,
            inputToken: input_token,
            outputToken: quote.output_token,
            inputAmount: quote.input_amount,
            outputAmount: quote.output_amount,
            destinationChainId: U256::from(quote.target_chain_id),
            exclusiveRelayer: quote.exclusive_relayer,
            quoteTimestamp: quote.quote_timestamp,
            fillDeadline: quote.fill_deadline,
            exclusivityDeadline: quote.exclusivity_deadline,
            message: Bytes::new(),
        };

        let value = if is_native(quote.input_token) {
            quote.input_amount
        } else {
            U256::ZERO
        };

        Ok(TxPayload {
            to: quote.spoke_pool,
            data: call.abi_encode().into(),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{CHAIN_BASE, CHAIN_ETHEREUM};
    use crate::types::NATIVE_TOKEN;

    const FEES_JSON: &str = r#"{
        "totalRelayFee": { "pct": "1000000000000000", "total": "1000000" },
        "timestamp": "1760000000",
        "isAmountTooLow": false,
        "spokePoolAddress": "0x5c7BCd6E7De5423a257D81B442095A1a6ced35C5",
        "exclusiveRelayer": "0x0000000000000000000000000000000000000000",
        "exclusivityDeadline": 0,
        "fillDeadline": "1760010000",
        "limits": {
            "minDeposit": "500000",
            "maxDeposit": "5000000000000",
            "maxDepositInstant": "1000000000"
        }
    }"#;

    fn request(amount: u64) -> BridgeQuoteRequest {
        let registry = ChainRegistry::with_defaults();
        BridgeQuoteRequest {
            source_chain_id: CHAIN_ETHEREUM,
            target_chain_id: CHAIN_BASE,
            input_token: registry.get(CHAIN_ETHEREUM).unwrap().token("USDC").unwrap(),
            output_token: registry.get(CHAIN_BASE).unwrap().token("USDC").unwrap(),
            amount: U256::from(amount),
            recipient: Address::repeat_byte(0x44),
        }
    }

    fn bridge() -> AcrossBridge {
        AcrossBridge::new(
            ACROSS_API_URL,
            Duration::from_secs(5),
            Arc::new(ChainRegistry::with_defaults()),
        )
        .unwrap()
    }

    fn fees() -> SuggestedFees {
        serde_json::from_str(FEES_JSON).unwrap()
    }

    #[test]
    fn test_quote_from_fees() {
        let req = request(100_000_000);
        let quote = quote_from_fees(&req, req.output_token, Address::ZERO, &fees(), 0)
            .unwrap()
            .unwrap();

        assert_eq!(quote.output_amount, U256::from(99_000_000u64));
        assert_eq!(quote.total_fee, U256::from(1_000_000u64));
        assert!(quote.output_amount < quote.input_amount);
        assert_eq!(quote.quote_timestamp, 1_760_000_000);
        assert_eq!(quote.fill_deadline, 1_760_010_000);
        assert_eq!(quote.exclusivity_deadline, 0);
        assert_ne!(quote.spoke_pool, Address::ZERO);
    }

    #[test]
    fn test_rejects_outside_limits() {
        let low = request(499_999);
        assert!(quote_from_fees(&low, low.output_token, Address::ZERO, &fees(), 0)
            .unwrap()
            .is_none());

        let high = request(5_000_000_000_001);
        assert!(quote_from_fees(&high, high.output_token, Address::ZERO, &fees(), 0)
            .unwrap()
            .is_none());

        let mut too_low = fees();
        too_low.is_amount_too_low = true;
        let req = request(100_000_000);
        assert!(quote_from_fees(&req, req.output_token, Address::ZERO, &too_low, 0)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_missing_fill_deadline_uses_window() {
        let mut f = fees();
        f.fill_deadline = None;
        f.spoke_pool_address = None;
        let req = request(100_000_000);
        let fallback = Address::repeat_byte(0x66);
        let quote = quote_from_fees(&req, req.output_token, fallback, &f, 1_000).unwrap().unwrap();
        assert_eq!(quote.fill_deadline, 1_000 + DEFAULT_FILL_WINDOW_SECS as u32);
        assert_eq!(quote.spoke_pool, fallback);
    }

    #[test]
    fn test_build_transaction_erc20() {
        let req = request(100_000_000);
        let quote = quote_from_fees(&req, req.output_token, Address::ZERO, &fees(), 0)
            .unwrap()
            .unwrap();
        let sender = Address::repeat_byte(0x33);

        let tx = bridge().build_transaction(&quote, sender).unwrap();
        assert_eq!(tx.to, quote.spoke_pool);
        assert_eq!(tx.value, U256::ZERO);

        let call = ISpokePool::depositV3Call::abi_decode(&tx.data).unwrap();
        assert_eq!(call.depositor, sender);
        assert_eq!(call.recipient, req.recipient);
        assert_eq!(call.inputToken, req.input_token);
        assert_eq!(call.outputAmount, U256::from(99_000_000u64));
        assert_eq!(call.destinationChainId, U256::from(CHAIN_BASE));
        assert!(call.message.is_empty());
    }

    #[test]
    fn test_build_transaction_native_sends_value() {
        let registry = ChainRegistry::with_defaults();
        let mut req = request(1_000_000_000);
        req.input_token = NATIVE_TOKEN;
        req.output_token = registry.get(CHAIN_BASE).unwrap().wrapped_native().unwrap();
        let quote = quote_from_fees(&req, req.output_token, Address::ZERO, &fees(), 0)
            .unwrap()
            .unwrap();

        let tx = bridge().build_transaction(&quote, Address::repeat_byte(0x33)).unwrap();
        assert_eq!(tx.value, U256::from(1_000_000_000u64));
        let call = ISpokePool::depositV3Call::abi_decode(&tx.data).unwrap();
        assert_eq!(
            call.inputToken,
            registry.get(CHAIN_ETHEREUM).unwrap().wrapped_native().unwrap()
        );
    }
}
