//! Contract interface descriptor.
//!
//! The position manager's ABI is embedded at build time and parsed once into
//! a table of [`FunctionSpec`]s keyed by [`Operation`]. Every call is checked
//! against that table (arity, Solidity type, integer width, mutability)
//! before a single byte leaves the process.

use std::collections::BTreeMap;

use alloy::dyn_abi::{DynSolType, DynSolValue};
use alloy::json_abi::{JsonAbi, StateMutability};
use alloy::primitives::{address, Address, Bytes, Selector, I256, U256};

use crate::error::{Error, Result};
use crate::policy::Operation;

// ─── Constants ────────────────────────────────────────────────────────────────

/// Position manager deployment on Arbitrum Sepolia.
pub const DEFAULT_CONTRACT: Address = address!("0x1efc8d699d20c030b393Ffbf406cf2C317383ddf");

const POSITION_MANAGER_ABI: &str = include_str!("../abi/PositionManager.json");

// ─── Function table ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    /// `view` or `pure`: served by `eth_call`, never signed.
    View,
    NonPayable,
    /// Accepts native value with the call.
    Payable,
}

impl Mutability {
    pub fn is_read_only(self) -> bool {
        self == Mutability::View
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::View       => "view",
            Self::NonPayable => "nonpayable",
            Self::Payable    => "payable",
        }
    }
}

impl From<StateMutability> for Mutability {
    fn from(m: StateMutability) -> Self {
        match m {
            StateMutability::Pure | StateMutability::View => Mutability::View,
            StateMutability::NonPayable                   => Mutability::NonPayable,
            StateMutability::Payable                      => Mutability::Payable,
        }
    }
}

/// One named, typed parameter or return value.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty:   DynSolType,
}

/// Everything needed to encode a call and decode its return data.
#[derive(Debug, Clone)]
pub struct FunctionSpec {
    pub operation:  Operation,
    /// Canonical signature, e.g. `burnPosition(uint256,uint256,uint256)`.
    pub signature:  String,
    pub selector:   Selector,
    pub inputs:     Vec<Param>,
    pub outputs:    Vec<Param>,
    pub mutability: Mutability,
}

impl FunctionSpec {
    /// Validate `args` and produce `selector ‖ abi.encode(args)`.
    pub fn encode(&self, args: &[DynSolValue]) -> Result<Bytes> {
        if args.len() != self.inputs.len() {
            return Err(Error::invalid_call(
                self.operation,
                format!("expected {} argument(s), got {}", self.inputs.len(), args.len()),
            ));
        }
        for (index, (param, value)) in self.inputs.iter().zip(args).enumerate() {
            self.check_arg(index, param, value)?;
        }

        let mut data = self.selector.to_vec();
        data.extend(DynSolValue::Tuple(args.to_vec()).abi_encode_params());
        Ok(Bytes::from(data))
    }

    /// Decode return data into one value per declared output, in order.
    pub fn decode_output(&self, data: &[u8]) -> Result<Vec<DynSolValue>> {
        let ty = DynSolType::Tuple(self.outputs.iter().map(|p| p.ty.clone()).collect());
        let decoded = ty
            .abi_decode_params(data)
            .map_err(|e| Error::decode(self.operation, e.to_string()))?;
        match decoded {
            DynSolValue::Tuple(values) if values.len() == self.outputs.len() => Ok(values),
            other => Err(Error::decode(
                self.operation,
                format!("expected {} value(s), got {:?}", self.outputs.len(), other),
            )),
        }
    }

    /// Reject a native value sent to a function that cannot accept it.
    pub fn check_value(&self, value: U256) -> Result<()> {
        if !value.is_zero() && self.mutability != Mutability::Payable {
            return Err(Error::invalid_call(
                self.operation,
                format!("function is not payable but {value} wei was attached"),
            ));
        }
        Ok(())
    }

    fn check_arg(&self, index: usize, param: &Param, value: &DynSolValue) -> Result<()> {
        if !param.ty.matches(value) {
            return Err(Error::invalid_call(
                self.operation,
                format!(
                    "argument {index} ({}) expects {}, got {}",
                    param.name,
                    param.ty.sol_type_name(),
                    value_type_name(value),
                ),
            ));
        }
        let fits = match (&param.ty, value) {
            (DynSolType::Uint(bits), DynSolValue::Uint(v, _)) => v.bit_len() <= *bits,
            (DynSolType::Int(bits), DynSolValue::Int(v, _))   => int_fits(*v, *bits),
            _ => true,
        };
        if !fits {
            return Err(Error::invalid_call(
                self.operation,
                format!(
                    "argument {index} ({}) is out of range for {}",
                    param.name,
                    param.ty.sol_type_name(),
                ),
            ));
        }
        Ok(())
    }
}

// ─── Descriptor ───────────────────────────────────────────────────────────────

/// Address plus function table of the target contract. Built once, shared by
/// every invocation.
#[derive(Debug, Clone)]
pub struct ContractDescriptor {
    address:   Address,
    functions: BTreeMap<Operation, FunctionSpec>,
}

impl ContractDescriptor {
    /// The embedded position-manager ABI at the default deployment address.
    pub fn position_manager() -> Result<Self> {
        Self::from_abi_json(DEFAULT_CONTRACT, POSITION_MANAGER_ABI)
    }

    /// Parse a JSON ABI document. Every [`Operation`] must be present exactly
    /// once; extra functions are ignored.
    pub fn from_abi_json(address: Address, json: &str) -> Result<Self> {
        let abi: JsonAbi = serde_json::from_str(json)
            .map_err(|e| Error::Descriptor(format!("ABI is not valid JSON: {e}")))?;

        let mut functions = BTreeMap::new();
        for operation in Operation::ALL {
            let overloads = abi.function(operation.abi_name()).ok_or_else(|| {
                Error::Descriptor(format!("ABI has no function named {operation}"))
            })?;
            let [function] = overloads.as_slice() else {
                return Err(Error::Descriptor(format!(
                    "{operation} is overloaded {} times; expected exactly one",
                    overloads.len()
                )));
            };

            let spec = FunctionSpec {
                operation,
                signature:  function.signature(),
                selector:   function.selector(),
                inputs:     parse_params(operation, &function.inputs)?,
                outputs:    parse_params(operation, &function.outputs)?,
                mutability: function.state_mutability.into(),
            };
            functions.insert(operation, spec);
        }

        Ok(Self { address, functions })
    }

    /// Point the same function table at a different deployment.
    pub fn at(mut self, address: Address) -> Self {
        self.address = address;
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn function(&self, operation: Operation) -> &FunctionSpec {
        // Construction guarantees one entry per operation.
        &self.functions[&operation]
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionSpec> {
        self.functions.values()
    }

    /// Validate and encode calldata for `operation`.
    pub fn encode_call(&self, operation: Operation, args: &[DynSolValue]) -> Result<Bytes> {
        self.function(operation).encode(args)
    }
}

// ─── Argument constructors ────────────────────────────────────────────────────

/// `uint256` argument.
pub fn uint256(value: U256) -> DynSolValue {
    DynSolValue::Uint(value, 256)
}

/// `uint128` argument.
pub fn uint128(value: u128) -> DynSolValue {
    DynSolValue::Uint(U256::from(value), 128)
}

/// `int24` argument. Width is checked at encode time.
pub fn int24(value: i32) -> DynSolValue {
    DynSolValue::Int(I256::unchecked_from(i64::from(value)), 24)
}

pub fn boolean(value: bool) -> DynSolValue {
    DynSolValue::Bool(value)
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn parse_params(operation: Operation, params: &[alloy::json_abi::Param]) -> Result<Vec<Param>> {
    params
        .iter()
        .map(|p| {
            let ty = DynSolType::parse(&p.ty).map_err(|e| {
                Error::Descriptor(format!("{operation}: cannot parse type '{}': {e}", p.ty))
            })?;
            Ok(Param { name: p.name.trim_start_matches('_').to_string(), ty })
        })
        .collect()
}

/// Two's-complement range check for `int<bits>`.
fn int_fits(value: I256, bits: usize) -> bool {
    if bits >= 256 {
        return true;
    }
    let limit = U256::from(1u8) << (bits - 1);
    let magnitude = value.unsigned_abs();
    if value.is_negative() {
        magnitude <= limit
    } else {
        magnitude < limit
    }
}

fn value_type_name(value: &DynSolValue) -> String {
    match value {
        DynSolValue::Bool(_)       => "bool".into(),
        DynSolValue::Int(_, bits)  => format!("int{bits}"),
        DynSolValue::Uint(_, bits) => format!("uint{bits}"),
        DynSolValue::Address(_)    => "address".into(),
        DynSolValue::String(_)     => "string".into(),
        DynSolValue::Bytes(_)      => "bytes".into(),
        DynSolValue::Tuple(_)      => "tuple".into(),
        _                          => "unsupported value".into(),
    }
}
