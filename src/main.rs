//! swap-quote
//!
//! Quotes a swap (or a cross-chain transfer when --to-chain differs)
//! across every venue configured for the chain and prints the ranked
//! routes as JSON on stdout. Logs go to stderr.
//!
//! Usage:
//!   swap-quote --chain 1 --from USDC --to native --amount 1000000000
//!   swap-quote --chain 1 --to-chain 8453 --from USDC --to USDC --amount 250000000

use alloy::primitives::{address, Address, U256};
use alloy::providers::ProviderBuilder;
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use swap_router_engine::oracle::CoinGeckoOracle;
use swap_router_engine::registry::ChainDeployment;
use swap_router_engine::venues::AcrossBridge;
use swap_router_engine::{ChainRegistry, EngineConfig, QuoteRequest, QuoteService, RpcChainReader, NATIVE_TOKEN};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Placeholder sender used when only a price is wanted
const QUOTE_ONLY_SENDER: Address = address!("000000000000000000000000000000000000dEaD");

#[derive(Parser)]
#[command(name = "swap-quote", about = "Quote swaps and bridge transfers across EVM venues")]
struct Args {
    /// Engine configuration (TOML). Defaults apply when omitted.
    #[arg(short, long, env = "SWAP_ENGINE_CONFIG")]
    config: Option<PathBuf>,

    /// Source chain id
    #[arg(long, default_value_t = 1)]
    chain: u64,

    /// Target chain id (defaults to --chain)
    #[arg(long)]
    to_chain: Option<u64>,

    /// Input token: symbol, address or "native"
    #[arg(long)]
    from: String,

    /// Output token on the target chain: symbol, address or "native"
    #[arg(long)]
    to: String,

    /// Input amount in base units
    #[arg(long)]
    amount: String,

    #[arg(long)]
    slippage_bps: Option<u32>,

    #[arg(long)]
    sender: Option<Address>,

    #[arg(long)]
    recipient: Option<Address>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// "native", a registered symbol, or a hex address
fn resolve_token(chain: &ChainDeployment, token: &str) -> Result<Address> {
    if token.eq_ignore_ascii_case("native") || token.eq_ignore_ascii_case(&chain.native_symbol) {
        return Ok(NATIVE_TOKEN);
    }
    if let Some(address) = chain.token(token) {
        return Ok(address);
    }
    token
        .parse::<Address>()
        .with_context(|| format!("Unknown token '{}' on chain {}", token, chain.chain_id))
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path),
        None => {
            dotenv::dotenv().ok();
            let mut config = EngineConfig::default();
            config.apply_env(|key| std::env::var(key).ok());
            config.validate()?;
            Ok(config)
        }
    }
}

fn rpc_url(config: &EngineConfig, chain_id: u64) -> Result<String> {
    config
        .chain(chain_id)
        .and_then(|c| c.rpc_url.clone())
        .or_else(|| std::env::var(format!("RPC_URL_{}", chain_id)).ok())
        .with_context(|| format!("No rpc_url for chain {} (set RPC_URL_{})", chain_id, chain_id))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let config = load_config(args.config.as_ref())?;
    let registry: Arc<ChainRegistry> = Arc::new(config.registry()?);

    let source_chain = args.chain;
    let target_chain = args.to_chain.unwrap_or(source_chain);
    let source = registry.get(source_chain)?;
    let target = registry.get(target_chain)?;

    let request = QuoteRequest {
        source_chain_id: source_chain,
        target_chain_id: target_chain,
        from_token: resolve_token(source, &args.from)?,
        to_token: resolve_token(target, &args.to)?,
        amount: U256::from_str_radix(args.amount.trim(), 10)
            .with_context(|| format!("Invalid amount '{}'", args.amount))?,
        sender: args.sender.unwrap_or(QUOTE_ONLY_SENDER),
        recipient: args.recipient,
        slippage_bps: args.slippage_bps,
        intermediate_tokens: Vec::new(),
    };

    let oracle = CoinGeckoOracle::new(
        config.oracle.base_url.clone(),
        config.oracle.api_key.clone(),
        config.oracle.timeout(),
        registry.clone(),
    )?
    .with_cache_ttl(config.price_cache_ttl());

    let mut service = QuoteService::new(registry.clone(), config.quote_settings()).with_oracle(Arc::new(oracle));

    let mut chain_ids = vec![source_chain];
    if target_chain != source_chain {
        chain_ids.push(target_chain);
    }
    for chain_id in chain_ids {
        // Target chain reader only feeds token metadata
        let url = match rpc_url(&config, chain_id) {
            Ok(url) => url,
            Err(e) if chain_id != source_chain => {
                warn!("{}; target token metadata unavailable", e);
                continue;
            }
            Err(e) => return Err(e),
        };
        let provider = ProviderBuilder::new().connect_http(url.parse().context("Invalid RPC URL")?);
        let deployment = registry.get(chain_id)?;
        let reader = RpcChainReader::new(provider, chain_id).with_multicall(deployment.multicall3);
        service = service.with_reader(Arc::new(reader))?;
        info!("Connected to {} (chain {})", deployment.name, chain_id);
    }

    if target_chain != source_chain {
        if !config.bridge.enabled {
            bail!("Cross-chain quote requested but [bridge] is disabled");
        }
        let bridge = AcrossBridge::new(config.bridge.base_url.clone(), config.bridge.timeout(), registry.clone())?;
        service = service.with_bridge(Arc::new(bridge));
    }

    let results = service.build_quote(&request).await?;
    if results.is_empty() {
        info!("No viable route");
    }
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
