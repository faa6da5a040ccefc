//! Run state machine
//!
//! ```text
//! Unloaded -> Loaded -> Resolved -> Patched -> Relocated -> HandedOff
//!     \__________\__________\__________\
//!                                       -> Aborted
//! ```
//!
//! Only the next stage or `Aborted` is reachable. Once sections are
//! relocated the run can no longer abort; `Aborted` and `HandedOff` are
//! both terminal.

use crate::error::{FirmError, FirmResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootStage {
    Unloaded,
    Loaded,
    Resolved,
    Patched,
    Relocated,
    HandedOff,
    Aborted,
}

impl BootStage {
    /// The only forward transition
    pub fn next(self) -> Option<BootStage> {
        match self {
            Self::Unloaded => Some(Self::Loaded),
            Self::Loaded => Some(Self::Resolved),
            Self::Resolved => Some(Self::Patched),
            Self::Patched => Some(Self::Relocated),
            Self::Relocated => Some(Self::HandedOff),
            Self::HandedOff | Self::Aborted => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::HandedOff | Self::Aborted)
    }

    /// Can the run still be abandoned without side effects on the machine?
    pub fn can_abort(self) -> bool {
        matches!(
            self,
            Self::Unloaded | Self::Loaded | Self::Resolved | Self::Patched
        )
    }

    pub fn can_advance_to(self, to: BootStage) -> bool {
        if to == Self::Aborted {
            return self.can_abort();
        }
        self.next() == Some(to)
    }
}

/// Current stage of one run
#[derive(Debug, Clone, Copy)]
pub struct StageTracker {
    current: BootStage,
}

impl StageTracker {
    pub fn new() -> Self {
        Self {
            current: BootStage::Unloaded,
        }
    }

    pub fn current(&self) -> BootStage {
        self.current
    }

    /// Move to `to`, refusing skips and moves out of terminal stages
    pub fn advance(&mut self, to: BootStage) -> FirmResult<()> {
        if !self.current.can_advance_to(to) {
            return Err(FirmError::InvalidTransition {
                from: self.current,
                to,
            });
        }
        self.current = to;
        Ok(())
    }

    /// Fail the run; a no-op once past the point of no return
    pub fn abort(&mut self) -> bool {
        if self.current.can_abort() {
            self.current = BootStage::Aborted;
            true
        } else {
            false
        }
    }

    /// Error unless currently at `stage`
    pub fn expect(&self, stage: BootStage) -> FirmResult<()> {
        if self.current == stage {
            Ok(())
        } else {
            Err(FirmError::InvalidTransition {
                from: self.current,
                to: stage.next().unwrap_or(stage),
            })
        }
    }
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}
