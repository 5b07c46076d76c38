//! Per-write transaction state machine.
//!
//! ```text
//! Built ──► Submitted ──► Pending ──► Confirmed
//!               │            │
//!               └────────────┴──────► Failed
//! ```
//!
//! `Confirmed` and `Failed` are terminal. A failed write is never retried
//! here; the caller builds a fresh one.

use std::fmt;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxStatus {
    /// Calldata encoded, signer chosen, nothing sent yet.
    Built,
    /// Handed to the node for signing and broadcast.
    Submitted,
    /// The node returned a hash; not yet mined.
    Pending,
    /// Mined with a successful receipt.
    Confirmed,
    /// Rejected, timed out, or mined but reverted.
    Failed,
}

impl TxStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Built     => "built",
            Self::Submitted => "submitted",
            Self::Pending   => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed    => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }

    fn can_advance_to(self, next: TxStatus) -> bool {
        use TxStatus::*;
        matches!(
            (self, next),
            (Built, Submitted)
                | (Submitted, Pending)
                | (Submitted, Failed)
                | (Pending, Confirmed)
                | (Pending, Failed)
        )
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered record of the states one write has passed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxLifecycle {
    history: Vec<TxStatus>,
}

impl Default for TxLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl TxLifecycle {
    pub fn new() -> Self {
        Self { history: vec![TxStatus::Built] }
    }

    pub fn status(&self) -> TxStatus {
        // `history` always starts with `Built`.
        *self.history.last().unwrap_or(&TxStatus::Built)
    }

    pub fn history(&self) -> &[TxStatus] {
        &self.history
    }

    /// Move to `next`, refusing any transition the diagram above lacks.
    pub fn advance(&mut self, next: TxStatus) -> Result<()> {
        let current = self.status();
        if !current.can_advance_to(next) {
            return Err(Error::IllegalTransition { from: current.as_str(), to: next.as_str() });
        }
        tracing::trace!(from = %current, to = %next, "tx state");
        self.history.push(next);
        Ok(())
    }

    /// Mark the write failed from whatever non-terminal state it is in.
    /// A `Built` write was never sent, so it stays `Built`.
    pub fn fail(&mut self) {
        if self.status().can_advance_to(TxStatus::Failed) {
            self.history.push(TxStatus::Failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_reaches_confirmed() {
        let mut lc = TxLifecycle::new();
        lc.advance(TxStatus::Submitted).unwrap();
        lc.advance(TxStatus::Pending).unwrap();
        assert_eq!(lc.status(), TxStatus::Pending);
        lc.advance(TxStatus::Confirmed).unwrap();
        assert_eq!(
            lc.history(),
            [TxStatus::Built, TxStatus::Submitted, TxStatus::Pending, TxStatus::Confirmed]
        );
    }

    #[test]
    fn terminal_states_are_final() {
        let mut lc = TxLifecycle::new();
        lc.advance(TxStatus::Submitted).unwrap();
        lc.advance(TxStatus::Pending).unwrap();
        lc.advance(TxStatus::Confirmed).unwrap();
        assert!(lc.advance(TxStatus::Failed).is_err());
        lc.fail();
        assert_eq!(lc.status(), TxStatus::Confirmed);
        assert_eq!(lc.history().iter().filter(|s| s.is_terminal()).count(), 1);
    }

    #[test]
    fn cannot_skip_submission() {
        let mut lc = TxLifecycle::new();
        let err = lc.advance(TxStatus::Pending).unwrap_err();
        assert_eq!(err.to_string(), "Illegal transaction state transition built → pending");
        lc.fail();
        assert_eq!(lc.status(), TxStatus::Built);
    }

    #[test]
    fn submission_can_fail_before_pending() {
        let mut lc = TxLifecycle::new();
        lc.advance(TxStatus::Submitted).unwrap();
        lc.fail();
        assert_eq!(lc.history(), [TxStatus::Built, TxStatus::Submitted, TxStatus::Failed]);
    }
}
