//! Swap Router Engine
//!
//! Off-chain swap quoting and transaction building for EVM chains:
//! multi-hop path building, a concurrent fee-tier tournament over
//! Uniswap V3 quoters, constant-product pricing for V2-style pairs,
//! Universal Router command batches with optional Permit2 authorization,
//! and an aggregation service that ranks venue and bridge routes.

pub mod aggregator;
pub mod chain;
pub mod config;
pub mod contracts;
pub mod error;
pub mod execution;
pub mod oracle;
pub mod pool;
pub mod quoter;
pub mod registry;
pub mod types;
pub mod venues;

// Re-export commonly used types
pub use aggregator::{QuoteService, QuoteSettings};
pub use chain::{ChainReader, RpcChainReader};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use execution::{min_amount_out, CommandBatch, PermitSigner};
pub use pool::{decode_path, derive_pool_address, encode_path, get_amount_out, PathBuilder};
pub use quoter::select_best;
pub use registry::ChainRegistry;
pub use types::{
    BridgeQuote, FeeBreakdown, QuoteRequest, QuoteResult, RouteStep, SwapPath, SwapQuote, TxPayload, Venue,
    NATIVE_TOKEN,
};
