//! Per-request stage tracking.
//!
//! ```text
//! Received → CorrelationAttached → AdmissionChecked → [Rejected]
//!                                                   → HandlerInvoked → [Responded]
//!                                                   → HandlerInvoked → Failed → Classified → [Responded]
//! ```
//!
//! `CorrelationAttached → Responded` covers requests answered by layers that
//! sit between the entry and admission stages (CORS preflights), and
//! `Failed` is reachable from any non-terminal stage after correlation so
//! bookkeeping failures of earlier stages are classified too.
//!
//! Terminal transitions succeed once; a second emission attempt is refused.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Stage {
    Received = 0,
    CorrelationAttached = 1,
    AdmissionChecked = 2,
    HandlerInvoked = 3,
    Failed = 4,
    Classified = 5,
    Rejected = 6,
    Responded = 7,
}

impl Stage {
    fn from_u8(value: u8) -> Stage {
        match value {
            0 => Stage::Received,
            1 => Stage::CorrelationAttached,
            2 => Stage::AdmissionChecked,
            3 => Stage::HandlerInvoked,
            4 => Stage::Failed,
            5 => Stage::Classified,
            6 => Stage::Rejected,
            _ => Stage::Responded,
        }
    }

    fn successors(self) -> &'static [Stage] {
        match self {
            Stage::Received => &[Stage::CorrelationAttached],
            Stage::CorrelationAttached => {
                &[Stage::AdmissionChecked, Stage::Responded, Stage::Failed]
            }
            Stage::AdmissionChecked => &[Stage::Rejected, Stage::HandlerInvoked, Stage::Failed],
            Stage::HandlerInvoked => &[Stage::Responded, Stage::Failed],
            Stage::Failed => &[Stage::Classified],
            Stage::Classified => &[Stage::Responded],
            Stage::Rejected | Stage::Responded => &[],
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Rejected | Stage::Responded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal pipeline transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: Stage,
    pub to: Stage,
}

/// Shared stage cell for one request; cloned into request extensions.
#[derive(Clone)]
pub struct Lifecycle {
    stage: Arc<AtomicU8>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            stage: Arc::new(AtomicU8::new(Stage::Received as u8)),
        }
    }

    pub fn current(&self) -> Stage {
        Stage::from_u8(self.stage.load(Ordering::Acquire))
    }

    /// Move to `to`, returning the stage left behind.
    pub fn advance(&self, to: Stage) -> Result<Stage, InvalidTransition> {
        let mut current = self.stage.load(Ordering::Acquire);
        loop {
            let from = Stage::from_u8(current);
            if !from.successors().contains(&to) {
                return Err(InvalidTransition { from, to });
            }
            match self.stage.compare_exchange(
                current,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(from),
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Lifecycle").field(&self.current()).finish()
    }
}
