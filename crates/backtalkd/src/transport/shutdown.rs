//! Outcomes of the two-phase shutdown applied to each execution context.

/// Result of one shutdown phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    /// Every thread in the context finished within the grace period.
    Completed,
    /// The grace period elapsed with threads still running.
    TimedOut {
        /// Threads still running when the wait ended.
        remaining: usize,
    },
    /// The phase was not needed.
    Skipped,
}

/// Overall verdict for one execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Stopped during the graceful phase, or was never running.
    Graceful,
    /// Needed the forced phase to stop.
    Forced,
    /// Survived both phases and was detached.
    Incomplete {
        /// Threads left running.
        remaining: usize,
    },
}

/// Both phases of a context's shutdown, as observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Outcome of the cooperative phase.
    pub graceful: PhaseOutcome,
    /// Outcome of the forced phase.
    pub forced: PhaseOutcome,
}

impl ShutdownReport {
    /// Report for a context that had nothing to stop.
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            graceful: PhaseOutcome::Skipped,
            forced: PhaseOutcome::Skipped,
        }
    }

    pub(crate) const fn graceful() -> Self {
        Self {
            graceful: PhaseOutcome::Completed,
            forced: PhaseOutcome::Skipped,
        }
    }

    pub(crate) const fn escalated(remaining_after_graceful: usize, remaining: usize) -> Self {
        Self {
            graceful: PhaseOutcome::TimedOut {
                remaining: remaining_after_graceful,
            },
            forced: if remaining == 0 {
                PhaseOutcome::Completed
            } else {
                PhaseOutcome::TimedOut { remaining }
            },
        }
    }

    /// Collapses the two phases into a single verdict.
    #[must_use]
    pub const fn outcome(&self) -> ShutdownOutcome {
        match (self.graceful, self.forced) {
            (_, PhaseOutcome::TimedOut { remaining }) => ShutdownOutcome::Incomplete { remaining },
            (PhaseOutcome::TimedOut { .. }, _) => ShutdownOutcome::Forced,
            _ => ShutdownOutcome::Graceful,
        }
    }

    /// Returns `true` when nothing was left running.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        !matches!(self.outcome(), ShutdownOutcome::Incomplete { .. })
    }
}
