//! Per-operation transaction lifecycle

use alloy_primitives::TxHash;

use crate::error::StakingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TxPhase {
    Idle,
    /// Waiting on the wallet to sign and broadcast
    Submitting,
    /// Hash known, receipt pending
    AwaitingConfirmation,
    Confirmed,
    Failed,
}

/// Where one write operation currently stands
///
/// A hash is present exactly when the transaction made it past the wallet,
/// so a failure before submission never carries one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionState {
    phase: TxPhase,
    hash: Option<TxHash>,
    error: Option<StakingError>,
}

impl Default for TransactionState {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionState {
    pub fn new() -> Self {
        Self {
            phase: TxPhase::Idle,
            hash: None,
            error: None,
        }
    }

    pub fn phase(&self) -> TxPhase {
        self.phase
    }

    pub fn hash(&self) -> Option<TxHash> {
        self.hash
    }

    pub fn error(&self) -> Option<&StakingError> {
        self.error.as_ref()
    }

    /// Submitting or awaiting confirmation
    pub fn is_pending(&self) -> bool {
        matches!(
            self.phase,
            TxPhase::Submitting | TxPhase::AwaitingConfirmation
        )
    }

    pub fn is_confirmed(&self) -> bool {
        self.phase == TxPhase::Confirmed
    }

    /// New attempt: forget the previous hash and error
    pub fn begin(&mut self) {
        self.phase = TxPhase::Submitting;
        self.hash = None;
        self.error = None;
    }

    pub fn submitted(&mut self, hash: TxHash) {
        self.phase = TxPhase::AwaitingConfirmation;
        self.hash = Some(hash);
    }

    pub fn confirmed(&mut self) {
        self.phase = TxPhase::Confirmed;
    }

    pub fn failed(&mut self, err: StakingError) {
        self.phase = TxPhase::Failed;
        self.error = Some(err);
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut state = TransactionState::new();
        assert_eq!(state.phase(), TxPhase::Idle);

        state.begin();
        assert!(state.is_pending());
        assert_eq!(state.hash(), None);

        let hash = TxHash::repeat_byte(7);
        state.submitted(hash);
        assert_eq!(state.phase(), TxPhase::AwaitingConfirmation);
        assert_eq!(state.hash(), Some(hash));

        state.confirmed();
        assert!(state.is_confirmed());
        assert!(!state.is_pending());
        assert_eq!(state.hash(), Some(hash));
    }

    #[test]
    fn test_failure_before_submission_has_no_hash() {
        let mut state = TransactionState::new();
        state.begin();
        state.failed(StakingError::TransactionRejected);
        assert_eq!(state.phase(), TxPhase::Failed);
        assert_eq!(state.hash(), None);
        assert_eq!(state.error(), Some(&StakingError::TransactionRejected));
    }

    #[test]
    fn test_retry_clears_previous_attempt() {
        let mut state = TransactionState::new();
        state.begin();
        state.submitted(TxHash::repeat_byte(1));
        state.failed(StakingError::TransactionReverted(TxHash::repeat_byte(1)));
        assert!(state.hash().is_some());

        state.begin();
        assert_eq!(state.hash(), None);
        assert_eq!(state.error(), None);
    }
}
