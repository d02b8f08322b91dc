//! Centralized Contract Definitions
//!
//! Solidity interfaces the engine reads from or encodes calls for,
//! defined with alloy's `sol!` macro. Only read calls are ever executed
//! by this crate; the router, SpokePool and Permit2 definitions are used
//! purely for calldata and typed-data encoding.

use alloy::sol;

// ── ERC20 ─────────────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
    }
}

// ── Uniswap V2 ───────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IUniswapV2Pair {
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
    }
}

// ── Uniswap V3 QuoterV2 ──────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IQuoterV2 {
        struct QuoteExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint256 amountIn;
            uint24 fee;
            uint160 sqrtPriceLimitX96;
        }

        function quoteExactInputSingle(QuoteExactInputSingleParams memory params) external returns (uint256 amountOut, uint160 sqrtPriceX96After, uint32 initializedTicksCrossed, uint256 gasEstimate);
        function quoteExactInput(bytes memory path, uint256 amountIn) external returns (uint256 amountOut, uint160[] memory sqrtPriceX96AfterList, uint32[] memory initializedTicksCrossedList, uint256 gasEstimate);
    }
}

// ── Multicall3 ───────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Call3Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls) external payable returns (Call3Result[] memory returnData);
    }
}

// ── Universal Router ─────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IUniversalRouter {
        function execute(bytes calldata commands, bytes[] calldata inputs, uint256 deadline) external payable;
    }
}

// Parameter layouts of individual router commands. Each command input is
// the ABI encoding of these fields as a parameter list (no outer tuple offset).
sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct V3SwapExactInInput {
        address recipient;
        uint256 amountIn;
        uint256 amountOutMin;
        bytes path;
        bool payerIsUser;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct V2SwapExactInInput {
        address recipient;
        uint256 amountIn;
        uint256 amountOutMin;
        address[] path;
        bool payerIsUser;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct WrapNativeInput {
        address recipient;
        uint256 amountMin;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct UnwrapNativeInput {
        address recipient;
        uint256 amountMin;
    }
}

// ── Permit2 ──────────────────────────────────────────────────────────

// Struct names are part of the EIP-712 type strings and must match Permit2 exactly.
sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct PermitDetails {
        address token;
        uint160 amount;
        uint48 expiration;
        uint48 nonce;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct PermitSingle {
        PermitDetails details;
        address spender;
        uint256 sigDeadline;
    }
}

sol! {
    #[sol(rpc)]
    interface IAllowanceTransfer {
        function allowance(address user, address token, address spender) external view returns (uint160 amount, uint48 expiration, uint48 nonce);
    }
}

// ── Across SpokePool ─────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface ISpokePool {
        function depositV3(
            address depositor,
            address recipient,
            address inputToken,
            address outputToken,
            uint256 inputAmount,
            uint256 outputAmount,
            uint256 destinationChainId,
            address exclusiveRelayer,
            uint32 quoteTimestamp,
            uint32 fillDeadline,
            uint32 exclusivityDeadline,
            bytes calldata message
        ) external payable;
    }
}
