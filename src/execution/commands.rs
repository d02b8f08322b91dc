//! Command Batch Encoder
//!
//! Builds Universal Router `execute(bytes commands, bytes[] inputs, uint256 deadline)`
//! calldata. Each command is one opcode byte (high bit = allow revert) plus
//! one input blob. Input blobs are the ABI encoding of the command's
//! parameters as a parameter list, without an outer tuple offset; the
//! router decodes them positionally.
//!
//! Batch order for a swap:
//!   [PERMIT2_PERMIT] -> [WRAP_ETH] -> V3/V2_SWAP_EXACT_IN -> [UNWRAP_WETH]

use super::permit::SignedPermit;
use crate::contracts::{
    IUniversalRouter, UnwrapNativeInput, V2SwapExactInInput, V3SwapExactInInput, WrapNativeInput,
};
use crate::error::{EngineError, Result};
use crate::types::{is_native, validate_slippage, SwapQuote, TxPayload, Venue};
use alloy::primitives::{address, Address, Bytes, U256};
use alloy::sol_types::{SolCall, SolValue};
use chrono::Utc;
use tracing::debug;

/// Default validity window of a built transaction
pub const DEFAULT_DEADLINE_SECS: u64 = 20 * 60;

/// Router recipient sentinel: "the router itself"
pub const ADDRESS_THIS: Address = address!("0000000000000000000000000000000000000002");

/// Opcode high bit: a failing command does not revert the batch
pub const FLAG_ALLOW_REVERT: u8 = 0x80;

const BPS_DENOMINATOR: u64 = 10_000;

/// Universal Router opcodes used by this engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    V3SwapExactIn = 0x00,
    V2SwapExactIn = 0x08,
    Permit2Permit = 0x0a,
    WrapEth = 0x0b,
    UnwrapWeth = 0x0c,
}

impl CommandType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte & !FLAG_ALLOW_REVERT {
            0x00 => Some(Self::V3SwapExactIn),
            0x08 => Some(Self::V2SwapExactIn),
            0x0a => Some(Self::Permit2Permit),
            0x0b => Some(Self::WrapEth),
            0x0c => Some(Self::UnwrapWeth),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandType,
    pub allow_revert: bool,
    pub input: Bytes,
}

impl Command {
    fn new(kind: CommandType, input: Vec<u8>) -> Self {
        Self {
            kind,
            allow_revert: false,
            input: input.into(),
        }
    }

    pub fn allowing_revert(mut self) -> Self {
        self.allow_revert = true;
        self
    }

    pub fn opcode(&self) -> u8 {
        let op = self.kind as u8;
        if self.allow_revert {
            op | FLAG_ALLOW_REVERT
        } else {
            op
        }
    }

    /// PERMIT2_PERMIT: (PermitSingle, bytes signature)
    pub fn permit(signed: &SignedPermit) -> Self {
        let input = (signed.permit.clone(), signed.signature.clone()).abi_encode_params();
        Self::new(CommandType::Permit2Permit, input)
    }

    pub fn v3_swap_exact_in(
        recipient: Address,
        amount_in: U256,
        amount_out_min: U256,
        path: Bytes,
        payer_is_user: bool,
    ) -> Self {
        let input = V3SwapExactInInput {
            recipient,
            amountIn: amount_in,
            amountOutMin: amount_out_min,
            path,
            payerIsUser: payer_is_user,
        }
        .abi_encode_params();
        Self::new(CommandType::V3SwapExactIn, input)
    }

    pub fn v2_swap_exact_in(
        recipient: Address,
        amount_in: U256,
        amount_out_min: U256,
        path: Vec<Address>,
        payer_is_user: bool,
    ) -> Self {
        let input = V2SwapExactInInput {
            recipient,
            amountIn: amount_in,
            amountOutMin: amount_out_min,
            path,
            payerIsUser: payer_is_user,
        }
        .abi_encode_params();
        Self::new(CommandType::V2SwapExactIn, input)
    }

    pub fn wrap_native(recipient: Address, amount_min: U256) -> Self {
        let input = WrapNativeInput {
            recipient,
            amountMin: amount_min,
        }
        .abi_encode_params();
        Self::new(CommandType::WrapEth, input)
    }

    pub fn unwrap_native(recipient: Address, amount_min: U256) -> Self {
        let input = UnwrapNativeInput {
            recipient,
            amountMin: amount_min,
        }
        .abi_encode_params();
        Self::new(CommandType::UnwrapWeth, input)
    }
}

/// Ordered router commands; `commands` and `inputs` always have equal length
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandBatch {
    commands: Vec<Command>,
}

impl CommandBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// One opcode byte per command
    pub fn command_bytes(&self) -> Bytes {
        self.commands.iter().map(Command::opcode).collect::<Vec<u8>>().into()
    }

    pub fn inputs(&self) -> Vec<Bytes> {
        self.commands.iter().map(|c| c.input.clone()).collect()
    }

    /// Full `execute(commands, inputs, deadline)` calldata
    pub fn encode_execute(&self, deadline: U256) -> Bytes {
        IUniversalRouter::executeCall {
            commands: self.command_bytes(),
            inputs: self.inputs(),
            deadline,
        }
        .abi_encode()
        .into()
    }
}

/// floor(amount * (10000 - bps) / 10000); bps must be in [0, 10000).
/// Split into quotient and remainder so it is exact for any U256.
pub fn min_amount_out(amount: U256, slippage_bps: u32) -> Result<U256> {
    validate_slippage(slippage_bps)?;
    let denominator = U256::from(BPS_DENOMINATOR);
    let keep = U256::from(BPS_DENOMINATOR - u64::from(slippage_bps));
    Ok(amount / denominator * keep + amount % denominator * keep / denominator)
}

/// Unix timestamp `window_secs` from now
pub fn deadline_from_now(window_secs: u64) -> U256 {
    let now = Utc::now().timestamp().max(0) as u64;
    U256::from(now.saturating_add(window_secs))
}

/// Execution parameters for one swap transaction
#[derive(Debug, Clone)]
pub struct SwapParams {
    pub recipient: Address,
    pub slippage_bps: u32,
    pub deadline: U256,
    pub permit: Option<SignedPermit>,
}

/// Swap command for the quote's venue. Tier-based venues require the
/// packed path; its absence is an integrity fault, never defaulted.
pub fn swap_command(
    quote: &SwapQuote,
    recipient: Address,
    amount_out_min: U256,
    payer_is_user: bool,
) -> Result<Command> {
    match quote.venue {
        Venue::UniswapV3 => {
            let path = quote.path.encoded.clone().ok_or_else(|| {
                EngineError::EncodingPrecondition(format!(
                    "{} quote {} -> {} has no packed path",
                    quote.venue, quote.from_token, quote.to_token
                ))
            })?;
            Ok(Command::v3_swap_exact_in(
                recipient,
                quote.from_amount,
                amount_out_min,
                path,
                payer_is_user,
            ))
        }
        Venue::UniswapV2 => {
            if quote.path.tokens.len() < 2 {
                return Err(EngineError::EncodingPrecondition(format!(
                    "{} quote has a {}-token path",
                    quote.venue,
                    quote.path.tokens.len()
                )));
            }
            Ok(Command::v2_swap_exact_in(
                recipient,
                quote.from_amount,
                amount_out_min,
                quote.path.tokens.clone(),
                payer_is_user,
            ))
        }
        Venue::Across => Err(EngineError::EncodingPrecondition(
            "bridge quotes are not router swaps".into(),
        )),
    }
}

/// Assemble the full batch for a swap quote
pub fn build_swap_batch(
    quote: &SwapQuote,
    wrapped_native: Address,
    params: &SwapParams,
) -> Result<CommandBatch> {
    if params.recipient == Address::ZERO {
        return Err(EngineError::InvalidInput("recipient is the zero address".into()));
    }
    let amount_out_min = min_amount_out(quote.to_amount, params.slippage_bps)?;

    let native_in = is_native(quote.from_token);
    let unwrap_out = is_native(quote.to_token) || quote.to_token == wrapped_native;

    let mut batch = CommandBatch::new();

    if let Some(signed) = &params.permit {
        if native_in {
            return Err(EngineError::InvalidInput(
                "native input cannot be authorized with a permit".into(),
            ));
        }
        if signed.permit.details.token != quote.from_token {
            return Err(EngineError::EncodingPrecondition(format!(
                "permit token {} does not match swap input {}",
                signed.permit.details.token, quote.from_token
            )));
        }
        batch.push(Command::permit(signed));
    }

    if native_in {
        batch.push(Command::wrap_native(ADDRESS_THIS, quote.from_amount));
    }

    let swap_recipient = if unwrap_out {
        ADDRESS_THIS
    } else {
        params.recipient
    };
    batch.push(swap_command(quote, swap_recipient, amount_out_min, !native_in)?);

    if unwrap_out {
        batch.push(Command::unwrap_native(params.recipient, amount_out_min));
    }

    debug!(
        "Command batch for {} {} -> {}: opcodes={:?} min_out={}",
        quote.venue,
        quote.from_token,
        quote.to_token,
        batch.commands().iter().map(Command::opcode).collect::<Vec<_>>(),
        amount_out_min
    );

    Ok(batch)
}

/// Finished router transaction for a swap quote
pub fn encode_swap(
    quote: &SwapQuote,
    wrapped_native: Address,
    params: &SwapParams,
) -> Result<TxPayload> {
    let batch = build_swap_batch(quote, wrapped_native, params)?;
    let value = if is_native(quote.from_token) {
        quote.from_amount
    } else {
        U256::ZERO
    };
    Ok(TxPayload {
        to: quote.router,
        data: batch.encode_execute(params.deadline),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{PermitDetails, PermitSingle};
    use crate::pool::path::{reserve_path, tier_path};
    use crate::registry::{ChainRegistry, CHAIN_ETHEREUM};
    use crate::types::NATIVE_TOKEN;
    use alloy::primitives::aliases::{U160, U48};
    use alloy::sol_types::SolType;

    const ROUTER: Address = Address::repeat_byte(0x77);
    const RECIPIENT: Address = Address::repeat_byte(0x55);
    const TOKEN_A: Address = Address::repeat_byte(0x0a);
    const TOKEN_B: Address = Address::repeat_byte(0x0b);

    fn weth() -> Address {
        ChainRegistry::with_defaults()
            .get(CHAIN_ETHEREUM)
            .unwrap()
            .wrapped_native()
            .unwrap()
    }

    fn v3_quote(from: Address, to: Address) -> SwapQuote {
        let registry = ChainRegistry::with_defaults();
        let chain = registry.get(CHAIN_ETHEREUM).unwrap();
        let path_from = chain.pricing_token(from).unwrap();
        let path_to = chain.pricing_token(to).unwrap();
        let path = tier_path(chain.uniswap_v3.as_ref().unwrap(), &[path_from, path_to], &[3000]).unwrap();
        SwapQuote {
            chain_id: CHAIN_ETHEREUM,
            from_token: from,
            to_token: to,
            from_amount: U256::from(1_000_000u64),
            to_amount: U256::from(2_000_000u64),
            venue: Venue::UniswapV3,
            router: ROUTER,
            estimated_gas: 180_000,
            venue_fee: U256::from(3_000u64),
            pool: path.pools[0].clone(),
            intermediate_pool: None,
            path,
        }
    }

    fn params() -> SwapParams {
        SwapParams {
            recipient: RECIPIENT,
            slippage_bps: 50,
            deadline: U256::from(1_700_000_000u64),
            permit: None,
        }
    }

    fn signed_permit(token: Address) -> SignedPermit {
        SignedPermit {
            permit: PermitSingle {
                details: PermitDetails {
                    token,
                    amount: U160::from(1_000_000u64),
                    expiration: U48::from(1_800_000_000u64),
                    nonce: U48::from(7u64),
                },
                spender: ROUTER,
                sigDeadline: U256::from(1_700_000_000u64),
            },
            signature: Bytes::from(vec![0x11; 65]),
        }
    }

    fn decode_execute(data: &[u8]) -> IUniversalRouter::executeCall {
        IUniversalRouter::executeCall::abi_decode(data).unwrap()
    }

    #[test]
    fn test_min_amount_out() {
        assert_eq!(
            min_amount_out(U256::from(2_000_000u64), 50).unwrap(),
            U256::from(1_990_000u64)
        );
        assert_eq!(
            min_amount_out(U256::from(10_000_000u64), 100).unwrap(),
            U256::from(9_900_000u64)
        );
        assert_eq!(min_amount_out(U256::from(12345u64), 0).unwrap(), U256::from(12345u64));
        // floors
        assert_eq!(min_amount_out(U256::from(999u64), 1).unwrap(), U256::from(998u64));
        assert!(min_amount_out(U256::from(1u64), 10_000).is_err());
    }

    #[test]
    fn test_min_amount_out_full_range() {
        // Matches the direct product wherever it fits
        let amount = U256::from(u128::MAX) * U256::from(3u64) + U256::from(7_777u64);
        let direct = amount * U256::from(9_950u64) / U256::from(10_000u64);
        assert_eq!(min_amount_out(amount, 50).unwrap(), direct);

        assert_eq!(min_amount_out(U256::MAX, 0).unwrap(), U256::MAX);
        let out = min_amount_out(U256::MAX, 50).unwrap();
        assert!(out < U256::MAX);
        assert!(out > U256::MAX / U256::from(2u64));
    }

    #[test]
    fn test_min_amount_out_monotonic() {
        let amount = U256::from(987_654_321u64);
        let mut previous = amount;
        for bps in [0u32, 1, 10, 50, 100, 500, 3000, 9999] {
            let out = min_amount_out(amount, bps).unwrap();
            assert!(out <= previous);
            previous = out;
        }
    }

    #[test]
    fn test_opcode_flag() {
        let cmd = Command::unwrap_native(RECIPIENT, U256::ZERO);
        assert_eq!(cmd.opcode(), 0x0c);
        assert_eq!(cmd.allowing_revert().opcode(), 0x8c);
        assert_eq!(CommandType::from_byte(0x8c), Some(CommandType::UnwrapWeth));
        assert_eq!(CommandType::from_byte(0x3f), None);
    }

    #[test]
    fn test_erc20_to_erc20_single_command() {
        let quote = v3_quote(TOKEN_A, TOKEN_B);
        let tx = encode_swap(&quote, weth(), &params()).unwrap();

        assert_eq!(tx.to, ROUTER);
        assert_eq!(tx.value, U256::ZERO);
        assert_eq!(&tx.data[..4], &[0x35, 0x93, 0x56, 0x4c]);

        let call = decode_execute(&tx.data);
        assert_eq!(call.commands.to_vec(), vec![0x00]);
        assert_eq!(call.inputs.len(), 1);
        assert_eq!(call.deadline, U256::from(1_700_000_000u64));

        let swap = <V3SwapExactInInput as SolType>::abi_decode_params(&call.inputs[0]).unwrap();
        assert_eq!(swap.recipient, RECIPIENT);
        assert_eq!(swap.amountIn, U256::from(1_000_000u64));
        assert_eq!(swap.amountOutMin, U256::from(1_990_000u64));
        assert_eq!(Some(swap.path), quote.path.encoded);
        assert!(swap.payerIsUser);
    }

    #[test]
    fn test_v3_input_layout_is_parameter_list() {
        let path = Bytes::from(vec![0xab; 43]);
        let cmd = Command::v3_swap_exact_in(RECIPIENT, U256::from(5u64), U256::from(4u64), path, true);
        // recipient | amountIn | amountOutMin | offset(0xa0) | payerIsUser | len | data(2 words)
        assert_eq!(cmd.input.len(), 32 * 8);
        assert_eq!(&cmd.input[12..32], RECIPIENT.as_slice());
        assert_eq!(cmd.input[32 * 3 + 31], 0xa0);
        assert_eq!(cmd.input[32 * 4 + 31], 1);
        assert_eq!(cmd.input[32 * 5 + 31], 43);
    }

    #[test]
    fn test_wrapped_native_output_appends_unwrap() {
        let quote = v3_quote(TOKEN_A, weth());
        let tx = encode_swap(&quote, weth(), &params()).unwrap();
        let call = decode_execute(&tx.data);

        assert_eq!(call.commands.to_vec(), vec![0x00, 0x0c]);
        assert_eq!(call.inputs.len(), 2);
        assert_eq!(tx.value, U256::ZERO);

        let swap = <V3SwapExactInInput as SolType>::abi_decode_params(&call.inputs[0]).unwrap();
        assert_eq!(swap.recipient, ADDRESS_THIS);
        let unwrap = <UnwrapNativeInput as SolType>::abi_decode_params(&call.inputs[1]).unwrap();
        assert_eq!(unwrap.recipient, RECIPIENT);
        assert_eq!(unwrap.amountMin, U256::from(1_990_000u64));
    }

    #[test]
    fn test_native_output_appends_unwrap() {
        let quote = v3_quote(TOKEN_A, NATIVE_TOKEN);
        let batch = build_swap_batch(&quote, weth(), &params()).unwrap();
        let kinds: Vec<_> = batch.commands().iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![CommandType::V3SwapExactIn, CommandType::UnwrapWeth]);
    }

    #[test]
    fn test_permit_is_prepended() {
        let quote = v3_quote(TOKEN_A, weth());
        let mut p = params();
        p.permit = Some(signed_permit(TOKEN_A));

        let tx = encode_swap(&quote, weth(), &p).unwrap();
        let call = decode_execute(&tx.data);
        assert_eq!(call.commands.to_vec(), vec![0x0a, 0x00, 0x0c]);
        assert_eq!(call.inputs.len(), 3);

        let (permit, signature) =
            <(PermitSingle, alloy::sol_types::sol_data::Bytes) as SolType>::abi_decode_params(&call.inputs[0])
                .unwrap();
        assert_eq!(permit, signed_permit(TOKEN_A).permit);
        assert_eq!(signature, Bytes::from(vec![0x11; 65]));
        // static PermitSingle (6 words) + offset + length + 65 bytes padded to 96
        assert_eq!(call.inputs[0].len(), 32 * 6 + 32 + 32 + 96);
    }

    #[test]
    fn test_permit_token_mismatch_rejected() {
        let quote = v3_quote(TOKEN_A, TOKEN_B);
        let mut p = params();
        p.permit = Some(signed_permit(TOKEN_B));
        assert!(matches!(
            encode_swap(&quote, weth(), &p),
            Err(EngineError::EncodingPrecondition(_))
        ));
    }

    #[test]
    fn test_native_input_wraps_and_sends_value() {
        let quote = v3_quote(NATIVE_TOKEN, TOKEN_B);
        let tx = encode_swap(&quote, weth(), &params()).unwrap();
        let call = decode_execute(&tx.data);

        assert_eq!(tx.value, U256::from(1_000_000u64));
        assert_eq!(call.commands.to_vec(), vec![0x0b, 0x00]);
        let wrap = <WrapNativeInput as SolType>::abi_decode_params(&call.inputs[0]).unwrap();
        assert_eq!(wrap.recipient, ADDRESS_THIS);
        assert_eq!(wrap.amountMin, U256::from(1_000_000u64));
        let swap = <V3SwapExactInInput as SolType>::abi_decode_params(&call.inputs[1]).unwrap();
        assert!(!swap.payerIsUser);
    }

    #[test]
    fn test_missing_packed_path_fails_loudly() {
        let mut quote = v3_quote(TOKEN_A, TOKEN_B);
        quote.path.encoded = None;
        let err = encode_swap(&quote, weth(), &params()).unwrap_err();
        assert!(matches!(err, EngineError::EncodingPrecondition(_)));
    }

    #[test]
    fn test_reserve_venue_uses_token_array() {
        let registry = ChainRegistry::with_defaults();
        let chain = registry.get(CHAIN_ETHEREUM).unwrap();
        let mut quote = v3_quote(TOKEN_A, TOKEN_B);
        quote.venue = Venue::UniswapV2;
        quote.path = reserve_path(chain.uniswap_v2.as_ref().unwrap(), &[TOKEN_A, TOKEN_B]).unwrap();

        let tx = encode_swap(&quote, weth(), &params()).unwrap();
        let call = decode_execute(&tx.data);
        assert_eq!(call.commands.to_vec(), vec![0x08]);
        let swap = <V2SwapExactInInput as SolType>::abi_decode_params(&call.inputs[0]).unwrap();
        assert_eq!(swap.path, vec![TOKEN_A, TOKEN_B]);
    }

    #[test]
    fn test_deadline_window() {
        let now = U256::from(Utc::now().timestamp() as u64);
        let deadline = deadline_from_now(DEFAULT_DEADLINE_SECS);
        assert!(deadline >= now + U256::from(DEFAULT_DEADLINE_SECS));
        assert!(deadline <= now + U256::from(DEFAULT_DEADLINE_SECS + 5));
    }
}
