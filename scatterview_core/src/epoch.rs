//! Run epochs.
//!
//! Every `start` and `reset` opens a new epoch. Worker tasks carry the epoch
//! they were spawned in and check it before touching anything shared, so a
//! task left over from a superseded run can neither emit events nor write
//! into a matrix that has since been replaced.

use crate::error::SimError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared handle to the current epoch.
#[derive(Debug, Clone, Default)]
pub struct EpochGate {
    current: Arc<AtomicU64>,
}

impl EpochGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current epoch.
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    /// Opens a new epoch and returns it.
    pub fn advance(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Ok if `epoch` is still current.
    pub fn check(&self, epoch: u64) -> Result<(), SimError> {
        let found = self.current();
        if found == epoch {
            Ok(())
        } else {
            Err(SimError::StaleEpoch {
                expected: epoch,
                found,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_invalidates_old_epoch() {
        let gate = EpochGate::new();
        let first = gate.advance();
        assert!(gate.check(first).is_ok());

        let clone = gate.clone();
        let second = clone.advance();
        assert_eq!(second, first + 1);
        assert!(matches!(
            gate.check(first),
            Err(SimError::StaleEpoch { expected, found }) if expected == first && found == second
        ));
    }
}
