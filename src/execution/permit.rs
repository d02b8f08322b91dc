//! Permit Authorization Flow
//!
//! Reads the live Permit2 nonce for (owner, token, spender), builds the
//! `PermitSingle` typed-data message, has the caller's signer sign it and
//! returns the message together with the opaque signature. The same
//! message is what goes into the PERMIT2_PERMIT command, so the two can
//! never drift apart.
//!
//! Keys never pass through here; signing is delegated to `PermitSigner`.

use crate::chain::ChainReader;
use crate::contracts::{IAllowanceTransfer, PermitDetails, PermitSingle};
use crate::error::{EngineError, Result};
use alloy::primitives::aliases::{U160, U48};
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use alloy::sol_types::{Eip712Domain, SolCall, SolStruct};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

/// How long the granted allowance stays valid
pub const PERMIT_EXPIRATION_SECS: u64 = 30 * 24 * 60 * 60;

/// How long the signature itself can be submitted
pub const PERMIT_SIG_DEADLINE_SECS: u64 = 30 * 60;

const PERMIT2_DOMAIN_NAME: &str = "Permit2";

/// Current Permit2 allowance state for (owner, token, spender)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermitAllowance {
    pub amount: U160,
    pub expiration: U48,
    pub nonce: U48,
}

#[async_trait]
pub trait AllowanceReader: Send + Sync {
    async fn allowance(&self, owner: Address, token: Address, spender: Address) -> Result<PermitAllowance>;
}

/// Reads allowances from the Permit2 contract through a ChainReader
pub struct ChainAllowanceReader {
    reader: Arc<dyn ChainReader>,
    permit2: Address,
}

impl ChainAllowanceReader {
    pub fn new(reader: Arc<dyn ChainReader>, permit2: Address) -> Self {
        Self { reader, permit2 }
    }
}

#[async_trait]
impl AllowanceReader for ChainAllowanceReader {
    async fn allowance(&self, owner: Address, token: Address, spender: Address) -> Result<PermitAllowance> {
        let call = IAllowanceTransfer::allowanceCall {
            user: owner,
            token,
            spender,
        };
        let output = self
            .reader
            .simulate_call(self.permit2, call.abi_encode().into())
            .await?;
        let ret = IAllowanceTransfer::allowanceCall::abi_decode_returns(&output)
            .map_err(|e| EngineError::external("decode Permit2 allowance", e))?;

        Ok(PermitAllowance {
            amount: ret.amount,
            expiration: ret.expiration,
            nonce: ret.nonce,
        })
    }
}

/// Typed-data request handed to the signer
#[derive(Debug, Clone)]
pub struct PermitSigningRequest {
    pub domain: Eip712Domain,
    pub message: PermitSingle,
    /// EIP-712 digest of `message` under `domain`
    pub signing_hash: B256,
}

/// Caller-supplied signing capability. Used for one call, never stored.
#[async_trait]
pub trait PermitSigner: Send + Sync {
    async fn sign_permit(&self, request: &PermitSigningRequest) -> Result<Bytes>;
}

#[async_trait]
impl PermitSigner for PrivateKeySigner {
    async fn sign_permit(&self, request: &PermitSigningRequest) -> Result<Bytes> {
        let signature = self
            .sign_hash(&request.signing_hash)
            .await
            .map_err(|e| EngineError::external("sign permit", e))?;
        Ok(Bytes::from(signature.as_bytes().to_vec()))
    }
}

/// Permit plus the signature over it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPermit {
    pub permit: PermitSingle,
    pub signature: Bytes,
}

/// Permit2's EIP-712 domain: name "Permit2", chain id, verifying contract. No version.
pub fn permit2_domain(chain_id: u64, permit2: Address) -> Eip712Domain {
    Eip712Domain::new(
        Some(PERMIT2_DOMAIN_NAME.into()),
        None,
        Some(U256::from(chain_id)),
        Some(permit2),
        None,
    )
}

/// Build the PermitSingle message for `amount` of `token`, valid from `now`
pub fn build_permit(
    token: Address,
    amount: U256,
    spender: Address,
    nonce: U48,
    now: u64,
) -> Result<PermitSingle> {
    if amount > U256::from(U160::MAX) {
        return Err(EngineError::InvalidInput(format!(
            "permit amount {} exceeds uint160",
            amount
        )));
    }

    Ok(PermitSingle {
        details: PermitDetails {
            token,
            amount: U160::from(amount),
            expiration: U48::from(now + PERMIT_EXPIRATION_SECS),
            nonce,
        },
        spender,
        sigDeadline: U256::from(now + PERMIT_SIG_DEADLINE_SECS),
    })
}

pub fn signing_request(message: PermitSingle, chain_id: u64, permit2: Address) -> PermitSigningRequest {
    let domain = permit2_domain(chain_id, permit2);
    let signing_hash = message.eip712_signing_hash(&domain);
    PermitSigningRequest {
        domain,
        message,
        signing_hash,
    }
}

/// Nonce read + signing round-trip for one transaction build
pub struct PermitFlow<'a> {
    allowances: &'a dyn AllowanceReader,
    chain_id: u64,
    permit2: Address,
}

impl<'a> PermitFlow<'a> {
    pub fn new(allowances: &'a dyn AllowanceReader, chain_id: u64, permit2: Address) -> Self {
        Self {
            allowances,
            chain_id,
            permit2,
        }
    }

    /// Read/sign failures propagate unchanged; there is no fallback to
    /// a plain approval.
    pub async fn authorize(
        &self,
        owner: Address,
        token: Address,
        amount: U256,
        spender: Address,
        signer: &dyn PermitSigner,
    ) -> Result<SignedPermit> {
        let current = self.allowances.allowance(owner, token, spender).await?;
        debug!(
            "Permit2 state for {} / {} -> {}: nonce={} expiration={}",
            owner, token, spender, current.nonce, current.expiration
        );

        let now = Utc::now().timestamp().max(0) as u64;
        let permit = build_permit(token, amount, spender, current.nonce, now)?;
        let request = signing_request(permit, self.chain_id, self.permit2);

        let signature = signer.sign_permit(&request).await?;

        Ok(SignedPermit {
            permit: request.message,
            signature,
        })
    }
}
