//! Two-phase optimistic local updates.
//!
//! A local change is applied before the backend confirms it:
//! `pending -> applying -> confirmed | reverted`. A reverted update has
//! been undone locally and leaves the session needing a full reload.

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimisticPhase {
    Pending,
    Applying,
    Confirmed,
    Reverted,
}

impl OptimisticPhase {
    pub fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Applying)
                | (Self::Applying, Self::Confirmed)
                | (Self::Applying, Self::Reverted)
        )
    }

    pub fn is_settled(self) -> bool {
        matches!(self, Self::Confirmed | Self::Reverted)
    }
}

/// An optimistic change together with what is needed to undo it.
#[derive(Debug, Clone)]
pub struct OptimisticUpdate<S> {
    phase: OptimisticPhase,
    undo: S,
}

impl<S> OptimisticUpdate<S> {
    pub fn new(undo: S) -> Self {
        Self {
            phase: OptimisticPhase::Pending,
            undo,
        }
    }

    pub fn phase(&self) -> OptimisticPhase {
        self.phase
    }

    pub fn undo(&self) -> &S {
        &self.undo
    }

    /// Returns false, leaving the phase untouched, on an illegal step.
    pub fn advance(&mut self, next: OptimisticPhase) -> bool {
        if self.phase.can_advance_to(next) {
            self.phase = next;
            true
        } else {
            warn!(from = ?self.phase, to = ?next, "illegal optimistic update transition");
            false
        }
    }
}
