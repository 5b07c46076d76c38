//! Parameter and result types for every position-manager operation.
//!
//! Each parameter struct implements [`ContractCall`], tying it to its
//! [`Operation`], its ABI argument list and its decoded output type.
//! Parameter structs also deserialize from plan files, where amounts may be
//! written as integers or as decimal or `0x` strings.

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{TxHash, U256};
use serde::Deserialize;

use crate::connection::ReceiptSummary;
use crate::descriptor::{boolean, int24, uint128, uint256};
use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::lifecycle::TxLifecycle;
use crate::policy::Operation;

// ─── Call trait ───────────────────────────────────────────────────────────────

/// A typed invocation of one contract function.
pub trait ContractCall {
    const OPERATION: Operation;
    type Output: DecodeOutputs;

    /// ABI arguments, in declaration order.
    fn args(&self) -> Vec<DynSolValue>;

    /// Native value attached to the call, in wei.
    fn value(&self) -> U256 {
        U256::ZERO
    }
}

/// Conversion from the descriptor-decoded output list.
pub trait DecodeOutputs: Sized {
    fn decode_outputs(operation: Operation, values: Vec<DynSolValue>) -> Result<Self>;
}

impl DecodeOutputs for () {
    fn decode_outputs(_: Operation, _: Vec<DynSolValue>) -> Result<Self> {
        Ok(())
    }
}

impl DecodeOutputs for U256 {
    fn decode_outputs(operation: Operation, values: Vec<DynSolValue>) -> Result<Self> {
        let mut out = Outputs::new(operation, values);
        out.u256("amountOut")
    }
}

// ─── Read: getDynamicInfo ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DynamicInfoParams {
    #[serde(deserialize_with = "amount::u256")]
    pub token_id: U256,
}

/// Live state of one position, re-read from the chain on every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicInfo {
    pub price:        U256,
    pub current_tick: i32,
    pub amount0:      U256,
    pub amount1:      U256,
}

impl ContractCall for DynamicInfoParams {
    const OPERATION: Operation = Operation::GetDynamicInfo;
    type Output = DynamicInfo;

    fn args(&self) -> Vec<DynSolValue> {
        vec![uint256(self.token_id)]
    }
}

impl DecodeOutputs for DynamicInfo {
    fn decode_outputs(operation: Operation, values: Vec<DynSolValue>) -> Result<Self> {
        let mut out = Outputs::new(operation, values);
        Ok(Self {
            price:        out.u256("price")?,
            current_tick: out.i32("currentTick")?,
            amount0:      out.u256("amount0")?,
            amount1:      out.u256("amount1")?,
        })
    }
}

// ─── Write: swapExactInputSingle ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SwapParams {
    #[serde(deserialize_with = "amount::u256")]
    pub amount_in:      U256,
    #[serde(deserialize_with = "amount::u256")]
    pub min_amount_out: U256,
    /// `true` sells token0 for token1.
    pub zero_for_one:   bool,
    /// Native value forwarded with the payable call. Usually zero.
    #[serde(default, deserialize_with = "amount::u256")]
    pub value:          U256,
}

impl ContractCall for SwapParams {
    const OPERATION: Operation = Operation::SwapExactInputSingle;
    type Output = U256;

    fn args(&self) -> Vec<DynSolValue> {
        vec![
            uint256(self.amount_in),
            uint256(self.min_amount_out),
            boolean(self.zero_for_one),
        ]
    }

    fn value(&self) -> U256 {
        self.value
    }
}

// ─── Write: collectPoolAllFees ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectFeesParams;

impl ContractCall for CollectFeesParams {
    const OPERATION: Operation = Operation::CollectPoolAllFees;
    type Output = ();

    fn args(&self) -> Vec<DynSolValue> {
        Vec::new()
    }
}

// ─── Write: mintPosition ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MintParams {
    pub tick_lower:  i32,
    pub tick_upper:  i32,
    #[serde(deserialize_with = "amount::u256")]
    pub amount0_max: U256,
    #[serde(deserialize_with = "amount::u256")]
    pub amount1_max: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintedPosition {
    pub token_id:  U256,
    pub liquidity: u128,
    pub amount0:   U256,
    pub amount1:   U256,
}

impl ContractCall for MintParams {
    const OPERATION: Operation = Operation::MintPosition;
    type Output = MintedPosition;

    fn args(&self) -> Vec<DynSolValue> {
        vec![
            int24(self.tick_lower),
            int24(self.tick_upper),
            uint256(self.amount0_max),
            uint256(self.amount1_max),
        ]
    }
}

impl DecodeOutputs for MintedPosition {
    fn decode_outputs(operation: Operation, values: Vec<DynSolValue>) -> Result<Self> {
        let mut out = Outputs::new(operation, values);
        Ok(Self {
            token_id:  out.u256("tokenId")?,
            liquidity: out.u128("liquidity")?,
            amount0:   out.u256("amount0")?,
            amount1:   out.u256("amount1")?,
        })
    }
}

// ─── Write: burnPosition ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BurnParams {
    #[serde(deserialize_with = "amount::u256")]
    pub token_id:    U256,
    #[serde(deserialize_with = "amount::u256")]
    pub amount0_min: U256,
    #[serde(deserialize_with = "amount::u256")]
    pub amount1_min: U256,
}

impl ContractCall for BurnParams {
    const OPERATION: Operation = Operation::BurnPosition;
    type Output = ();

    fn args(&self) -> Vec<DynSolValue> {
        vec![
            uint256(self.token_id),
            uint256(self.amount0_min),
            uint256(self.amount1_min),
        ]
    }
}

// ─── Write: increaseLiquidity ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct IncreaseLiquidityParams {
    #[serde(deserialize_with = "amount::u256")]
    pub token_id:    U256,
    #[serde(deserialize_with = "amount::u128")]
    pub amount0_max: u128,
    #[serde(deserialize_with = "amount::u128")]
    pub amount1_max: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidityIncrease {
    pub liquidity: u128,
    pub amount0:   U256,
    pub amount1:   U256,
}

impl ContractCall for IncreaseLiquidityParams {
    const OPERATION: Operation = Operation::IncreaseLiquidity;
    type Output = LiquidityIncrease;

    fn args(&self) -> Vec<DynSolValue> {
        vec![
            uint256(self.token_id),
            uint128(self.amount0_max),
            uint128(self.amount1_max),
        ]
    }
}

impl DecodeOutputs for LiquidityIncrease {
    fn decode_outputs(operation: Operation, values: Vec<DynSolValue>) -> Result<Self> {
        let mut out = Outputs::new(operation, values);
        Ok(Self {
            liquidity: out.u128("liquidity")?,
            amount0:   out.u256("amount0")?,
            amount1:   out.u256("amount1")?,
        })
    }
}

// ─── Write: decreaseLiquidity ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DecreaseLiquidityParams {
    #[serde(deserialize_with = "amount::u256")]
    pub token_id:    U256,
    #[serde(deserialize_with = "amount::u128")]
    pub liquidity:   u128,
    #[serde(deserialize_with = "amount::u256")]
    pub amount0_min: U256,
    #[serde(deserialize_with = "amount::u256")]
    pub amount1_min: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidityDecrease {
    pub amount0: U256,
    pub amount1: U256,
}

impl ContractCall for DecreaseLiquidityParams {
    const OPERATION: Operation = Operation::DecreaseLiquidity;
    type Output = LiquidityDecrease;

    fn args(&self) -> Vec<DynSolValue> {
        vec![
            uint256(self.token_id),
            uint128(self.liquidity),
            uint256(self.amount0_min),
            uint256(self.amount1_min),
        ]
    }
}

impl DecodeOutputs for LiquidityDecrease {
    fn decode_outputs(operation: Operation, values: Vec<DynSolValue>) -> Result<Self> {
        let mut out = Outputs::new(operation, values);
        Ok(Self {
            amount0: out.u256("amount0")?,
            amount1: out.u256("amount1")?,
        })
    }
}

// ─── Write outcome ────────────────────────────────────────────────────────────

/// A confirmed write: who signed it, what the contract returned, and the
/// receipt that confirmed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome<T> {
    pub operation: Operation,
    pub signer:    Identity,
    pub tx_hash:   TxHash,
    /// Return values from the pre-submission simulation. State that changes
    /// between simulation and mining can make the mined values differ.
    pub output:    T,
    pub receipt:   ReceiptSummary,
    pub lifecycle: TxLifecycle,
}

// ─── Output cursor ────────────────────────────────────────────────────────────

/// Pops decoded values in declaration order, converting each to a Rust type.
struct Outputs {
    operation: Operation,
    values:    std::vec::IntoIter<DynSolValue>,
}

impl Outputs {
    fn new(operation: Operation, values: Vec<DynSolValue>) -> Self {
        Self { operation, values: values.into_iter() }
    }

    fn next(&mut self, name: &str) -> Result<DynSolValue> {
        self.values
            .next()
            .ok_or_else(|| Error::decode(self.operation, format!("missing output '{name}'")))
    }

    fn u256(&mut self, name: &str) -> Result<U256> {
        match self.next(name)? {
            DynSolValue::Uint(v, _) => Ok(v),
            other => Err(self.mismatch(name, "uint", &other)),
        }
    }

    fn u128(&mut self, name: &str) -> Result<u128> {
        let v = self.u256(name)?;
        u128::try_from(v).map_err(|_| {
            Error::decode(self.operation, format!("output '{name}' = {v} overflows uint128"))
        })
    }

    fn i32(&mut self, name: &str) -> Result<i32> {
        match self.next(name)? {
            DynSolValue::Int(v, _) => i32::try_from(v).map_err(|_| {
                Error::decode(self.operation, format!("output '{name}' = {v} overflows int24"))
            }),
            other => Err(self.mismatch(name, "int", &other)),
        }
    }

    fn mismatch(&self, name: &str, expected: &str, got: &DynSolValue) -> Error {
        Error::decode(self.operation, format!("output '{name}' expected {expected}, got {got:?}"))
    }
}

// ─── Plan-file amounts ────────────────────────────────────────────────────────

mod amount {
    use alloy::primitives::U256;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};

    /// JSON numbers above `u64::MAX` lose precision in `serde_json`, so
    /// larger amounts must be written as strings.
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Text(String),
        Float(f64),
    }

    pub(super) fn u256<'de, D: Deserializer<'de>>(d: D) -> Result<U256, D::Error> {
        match Raw::deserialize(d)? {
            Raw::Int(v)  => Ok(U256::from(v)),
            Raw::Float(v) if v > u64::MAX as f64 => Err(D::Error::custom(format!(
                "amount {v} is too large for a JSON number; write it as a string, e.g. \"5000000000000000000000\""
            ))),
            Raw::Float(v) => Err(D::Error::custom(format!(
                "amount {v} must be a non-negative integer"
            ))),
            Raw::Text(s) => s
                .trim()
                .parse::<U256>()
                .map_err(|e| D::Error::custom(format!("invalid amount '{s}': {e}"))),
        }
    }

    pub(super) fn u128<'de, D: Deserializer<'de>>(d: D) -> Result<u128, D::Error> {
        let v = u256(d)?;
        u128::try_from(v).map_err(|_| D::Error::custom(format!("{v} does not fit in uint128")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::I256;

    #[test]
    fn dynamic_info_decodes_in_declaration_order() {
        let values = vec![
            DynSolValue::Uint(U256::from(79u8), 256),
            DynSolValue::Int(I256::unchecked_from(-887_220i64), 24),
            DynSolValue::Uint(U256::from(10u8), 256),
            DynSolValue::Uint(U256::from(20u8), 256),
        ];
        let info = DynamicInfo::decode_outputs(Operation::GetDynamicInfo, values).unwrap();
        assert_eq!(info.price, U256::from(79u8));
        assert_eq!(info.current_tick, -887_220);
        assert_eq!(info.amount0, U256::from(10u8));
        assert_eq!(info.amount1, U256::from(20u8));
    }

    #[test]
    fn short_output_list_is_a_decode_error() {
        let err = LiquidityDecrease::decode_outputs(
            Operation::DecreaseLiquidity,
            vec![DynSolValue::Uint(U256::from(1u8), 256)],
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot decode decreaseLiquidity output: missing output 'amount1'"
        );
    }

    #[test]
    fn liquidity_wider_than_uint128_is_rejected() {
        let values = vec![
            DynSolValue::Uint(U256::MAX, 256),
            DynSolValue::Uint(U256::ZERO, 256),
            DynSolValue::Uint(U256::ZERO, 256),
        ];
        assert!(LiquidityIncrease::decode_outputs(Operation::IncreaseLiquidity, values).is_err());
    }

    #[test]
    fn only_swap_carries_value() {
        let swap = SwapParams {
            amount_in:      U256::from(100u8),
            min_amount_out: U256::ZERO,
            zero_for_one:   true,
            value:          U256::from(7u8),
        };
        assert_eq!(swap.value(), U256::from(7u8));
        assert_eq!(CollectFeesParams.value(), U256::ZERO);
        assert_eq!(swap.args().len(), 3);
    }

    #[test]
    fn amounts_accept_integers_and_strings() {
        let mint: MintParams = serde_json::from_str(
            r#"{"tick_lower": -60, "tick_upper": 60, "amount0_max": 1000, "amount1_max": "5000000000000000000000"}"#,
        )
        .unwrap();
        assert_eq!(mint.amount0_max, U256::from(1000u64));
        assert_eq!(mint.amount1_max, U256::from(5u64) * U256::from(10u64).pow(U256::from(21u64)));

        let swap: SwapParams = serde_json::from_str(
            r#"{"amount_in": "0x64", "min_amount_out": 0, "zero_for_one": false}"#,
        )
        .unwrap();
        assert_eq!(swap.amount_in, U256::from(100u64));
        assert_eq!(swap.value, U256::ZERO);
    }

    #[test]
    fn bare_integer_above_u64_asks_for_a_string() {
        let err = serde_json::from_str::<MintParams>(
            r#"{"tick_lower": 0, "tick_upper": 60, "amount0_max": 5000000000000000000000, "amount1_max": 0}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("write it as a string"), "{err}");

        let err = serde_json::from_str::<SwapParams>(
            r#"{"amount_in": -5, "min_amount_out": 0, "zero_for_one": true}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("non-negative integer"), "{err}");
    }

    #[test]
    fn uint128_amounts_are_range_checked() {
        let err = serde_json::from_str::<IncreaseLiquidityParams>(&format!(
            r#"{{"token_id": 1, "amount0_max": "{}", "amount1_max": 0}}"#,
            U256::MAX
        ))
        .unwrap_err();
        assert!(err.to_string().contains("does not fit in uint128"));
    }
}
