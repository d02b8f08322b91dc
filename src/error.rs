//! Engine Error Taxonomy
//!
//! Separates the outcomes that are expected during normal quoting
//! (no path, no liquidity, missing deployment) from integrity faults
//! (bad input, encoder preconditions) that must abort the request.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Reference data is insufficient to build any route.
    #[error("No path available: {0}")]
    NoPath(String),

    /// Every pricing attempt for the path failed.
    #[error("No quote available: {0}")]
    NoLiquidity(String),

    #[error("Chain {chain_id} is missing configuration: {what}")]
    ConfigurationMissing { chain_id: u64, what: String },

    /// A quote reached the encoder without data the encoder requires.
    #[error("Encoding precondition violated: {0}")]
    EncodingPrecondition(String),

    #[error("External service failure ({context}): {source}")]
    ExternalService {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl EngineError {
    pub fn external(context: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        EngineError::ExternalService {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn missing(chain_id: u64, what: impl Into<String>) -> Self {
        EngineError::ConfigurationMissing {
            chain_id,
            what: what.into(),
        }
    }

    /// True for outcomes that degrade to an empty result instead of failing a request.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::NoPath(_)
                | EngineError::NoLiquidity(_)
                | EngineError::ConfigurationMissing { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(EngineError::NoPath("x".into()).is_recoverable());
        assert!(EngineError::NoLiquidity("x".into()).is_recoverable());
        assert!(EngineError::missing(1, "quoter").is_recoverable());
        assert!(!EngineError::InvalidInput("x".into()).is_recoverable());
        assert!(!EngineError::EncodingPrecondition("x".into()).is_recoverable());
        assert!(!EngineError::external("rpc", anyhow::anyhow!("timeout")).is_recoverable());
    }

    #[test]
    fn test_external_message_carries_context() {
        let err = EngineError::external("gas price", anyhow::anyhow!("connection reset"));
        let msg = err.to_string();
        assert!(msg.contains("gas price"));
        assert!(msg.contains("connection reset"));
    }
}
