//! Transaction building: Universal Router command batches and Permit2
//! authorizations.

pub mod commands;
pub mod permit;

pub use commands::{
    build_swap_batch, deadline_from_now, encode_swap, min_amount_out, Command, CommandBatch,
    CommandType, SwapParams, ADDRESS_THIS, DEFAULT_DEADLINE_SECS,
};
pub use permit::{
    AllowanceReader, ChainAllowanceReader, PermitAllowance, PermitFlow, PermitSigner,
    PermitSigningRequest, SignedPermit,
};
