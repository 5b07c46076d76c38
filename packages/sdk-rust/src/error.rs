//! SDK error type.

use std::time::Duration;

use alloy::primitives::TxHash;
use alloy::transports::TransportError;

use crate::policy::{Operation, Role};

/// Coarse classification of an [`Error`], for per-kind retry policy at the
/// call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or malformed settings. Fatal, raised before any network activity.
    Configuration,
    /// Node unreachable, transport failure or confirmation timeout.
    Network,
    /// The node refused the signed transaction (nonce, funds, gas).
    Submission,
    /// The call or transaction reverted on-chain.
    Execution,
    /// The response did not match the declared output shape.
    Decode,
    /// Arguments rejected by the descriptor before any network call.
    Validation,
    /// The selected identity does not hold the operation's required role.
    Policy,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Configuration => "configuration",
            Self::Network       => "network",
            Self::Submission    => "submission",
            Self::Execution     => "execution",
            Self::Decode        => "decode",
            Self::Validation    => "validation",
            Self::Policy        => "policy",
        };
        f.write_str(s)
    }
}

/// All errors returned by the Pool Master SDK.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // ── Configuration ────────────────────────────────────────────────────────
    /// A required setting is absent from the environment.
    #[error("{key} is not set (add it to the environment or a .env file)")]
    MissingConfig { key: &'static str },

    /// A setting is present but cannot be used.
    #[error("{key} is invalid: {reason}")]
    InvalidConfig { key: &'static str, reason: String },

    /// The embedded ABI document does not describe the expected functions.
    #[error("Contract descriptor error: {0}")]
    Descriptor(String),

    /// A plan document that cannot be parsed.
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    // ── RPC / network ────────────────────────────────────────────────────────
    /// A JSON-RPC call failed at the transport level.
    #[error("RPC error: {0}")]
    Rpc(#[source] TransportError),

    /// No receipt appeared before the configured timeout elapsed.
    #[error("Transaction {tx_hash} not confirmed after {waited:?}")]
    ConfirmationTimeout { tx_hash: TxHash, waited: Duration },

    // ── Submission ───────────────────────────────────────────────────────────
    /// The node rejected the signed transaction.
    #[error("{operation} rejected by node: {source}")]
    Rejected {
        operation: Operation,
        #[source]
        source:    TransportError,
    },

    // ── Execution ────────────────────────────────────────────────────────────
    /// The call reverted, either in simulation or after being mined.
    #[error("{operation} reverted{}: {reason}", .tx_hash.map(|h| format!(" in {h}")).unwrap_or_default())]
    Reverted {
        operation: Operation,
        tx_hash:   Option<TxHash>,
        reason:    String,
    },

    // ── Decoding ─────────────────────────────────────────────────────────────
    /// Return data did not match the descriptor's output types.
    #[error("Cannot decode {operation} output: {reason}")]
    Decode { operation: Operation, reason: String },

    // ── Validation ───────────────────────────────────────────────────────────
    /// Arguments, value or mutability do not match the descriptor.
    #[error("Invalid call to {operation}: {reason}")]
    InvalidCall { operation: Operation, reason: String },

    /// An operation name that the descriptor does not know.
    #[error("Unknown operation '{0}'")]
    UnknownOperation(String),

    /// A transaction lifecycle transition that the state machine forbids.
    #[error("Illegal transaction state transition {from} → {to}")]
    IllegalTransition { from: &'static str, to: &'static str },

    // ── Policy ───────────────────────────────────────────────────────────────
    #[error("{operation} requires the {required} identity, got {actual}")]
    RoleMismatch { operation: Operation, required: Role, actual: Role },
}

impl Error {
    /// Classify this error for the caller.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingConfig { .. }
            | Self::InvalidConfig { .. }
            | Self::Descriptor(_)
            | Self::InvalidPlan(_)                           => ErrorKind::Configuration,
            Self::Rpc(_) | Self::ConfirmationTimeout { .. } => ErrorKind::Network,
            Self::Rejected { .. }                            => ErrorKind::Submission,
            Self::Reverted { .. }                            => ErrorKind::Execution,
            Self::Decode { .. }                              => ErrorKind::Decode,
            Self::InvalidCall { .. }
            | Self::UnknownOperation(_)
            | Self::IllegalTransition { .. }                 => ErrorKind::Validation,
            Self::RoleMismatch { .. }                        => ErrorKind::Policy,
        }
    }

    pub(crate) fn invalid_call(operation: Operation, reason: impl Into<String>) -> Self {
        Self::InvalidCall { operation, reason: reason.into() }
    }

    pub(crate) fn decode(operation: Operation, reason: impl Into<String>) -> Self {
        Self::Decode { operation, reason: reason.into() }
    }
}

/// Convenience alias so every module can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_cover_the_taxonomy() {
        assert_eq!(
            Error::MissingConfig { key: "ADMIN_PRIVATE_KEY" }.kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            Error::invalid_call(Operation::MintPosition, "arity").kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            Error::decode(Operation::GetDynamicInfo, "short").kind(),
            ErrorKind::Decode
        );
        let reverted = Error::Reverted {
            operation: Operation::BurnPosition,
            tx_hash:   None,
            reason:    "not owner".into(),
        };
        assert_eq!(reverted.kind(), ErrorKind::Execution);
        assert_eq!(reverted.to_string(), "burnPosition reverted: not owner");
    }

    #[test]
    fn missing_config_names_the_variable() {
        let err = Error::MissingConfig { key: "USER_PRIVATE_KEY" };
        assert!(err.to_string().starts_with("USER_PRIVATE_KEY is not set"));
    }
}
