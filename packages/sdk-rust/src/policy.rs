//! Operation names and the static signer-role table.
//!
//! Which identity may submit which write is declared once, in
//! [`ROLE_POLICY`], and checked by [`authorize`] on every submission.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::identity::Identity;

// ─── Operations ───────────────────────────────────────────────────────────────

/// Every contract function this client can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    SwapExactInputSingle,
    CollectPoolAllFees,
    MintPosition,
    BurnPosition,
    IncreaseLiquidity,
    DecreaseLiquidity,
    GetDynamicInfo,
}

impl Operation {
    pub const ALL: [Operation; 7] = [
        Operation::SwapExactInputSingle,
        Operation::CollectPoolAllFees,
        Operation::MintPosition,
        Operation::BurnPosition,
        Operation::IncreaseLiquidity,
        Operation::DecreaseLiquidity,
        Operation::GetDynamicInfo,
    ];

    /// The Solidity function name.
    pub fn abi_name(self) -> &'static str {
        match self {
            Self::SwapExactInputSingle => "swapExactInputSingle",
            Self::CollectPoolAllFees   => "collectPoolAllFees",
            Self::MintPosition         => "mintPosition",
            Self::BurnPosition         => "burnPosition",
            Self::IncreaseLiquidity    => "increaseLiquidity",
            Self::DecreaseLiquidity    => "decreaseLiquidity",
            Self::GetDynamicInfo       => "getDynamicInfo",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abi_name())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Operation::ALL
            .into_iter()
            .find(|op| op.abi_name() == s)
            .ok_or_else(|| Error::UnknownOperation(s.to_string()))
    }
}

// ─── Roles ────────────────────────────────────────────────────────────────────

/// The two configured signing identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    User,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Admin => "admin",
            Self::User  => "user",
        })
    }
}

/// Signer required for each write. Reads are absent: they need no signer.
///
/// The contract enforces `ADMIN_ROLE` on position management; swaps and fee
/// collection are open to any account and go out under the user key.
pub const ROLE_POLICY: &[(Operation, Role)] = &[
    (Operation::SwapExactInputSingle, Role::User),
    (Operation::CollectPoolAllFees,   Role::User),
    (Operation::MintPosition,         Role::Admin),
    (Operation::BurnPosition,         Role::Admin),
    (Operation::IncreaseLiquidity,    Role::Admin),
    (Operation::DecreaseLiquidity,    Role::Admin),
];

/// Look up the role that must sign `operation`, or `None` for reads.
pub fn required_role(operation: Operation) -> Option<Role> {
    ROLE_POLICY
        .iter()
        .find(|(op, _)| *op == operation)
        .map(|(_, role)| *role)
}

/// Fail unless `signer` holds the role that `operation` requires.
pub fn authorize(operation: Operation, signer: &Identity) -> Result<()> {
    let Some(required) = required_role(operation) else {
        return Err(Error::invalid_call(operation, "read-only operations are never signed"));
    };
    if signer.role != required {
        return Err(Error::RoleMismatch { operation, required, actual: signer.role });
    }
    Ok(())
}
