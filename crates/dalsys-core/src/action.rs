//! Proposed changes that are validated before they may be committed.
//!
//! A store's `validate_*` call returns a `PendingAction` carrying the
//! candidate record, every eligibility message the rules produced, and a
//! tag naming the write the store will perform. The caller checks
//! `is_valid()` and then calls `commit()` once, handing back the store that
//! produced the action.

use serde::Serialize;

use crate::error::{DalsysError, Result};
use crate::types::Mission;

// ---------------------------------------------------------------------------
// ActionOp
// ---------------------------------------------------------------------------

/// The write a store performs when an action is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionOp {
    Create,
    Update,
    Allocate { operator_id: u64, mission: Mission },
    Unallocate { operator_id: u64 },
}

impl ActionOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionOp::Create => "create",
            ActionOp::Update => "update",
            ActionOp::Allocate { .. } => "allocate",
            ActionOp::Unallocate { .. } => "unallocate",
        }
    }
}

/// Implemented by each store: performs the tagged write for a candidate and
/// returns the record as persisted.
pub trait Committer<T> {
    fn apply(&mut self, op: &ActionOp, candidate: &T) -> Result<T>;
}

// ---------------------------------------------------------------------------
// PendingAction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct PendingAction<T> {
    candidate: T,
    op: ActionOp,
    messages: Vec<String>,
    committed: bool,
}

impl<T> PendingAction<T> {
    pub fn new(candidate: T, op: ActionOp) -> Self {
        Self {
            candidate,
            op,
            messages: Vec::new(),
            committed: false,
        }
    }

    pub fn candidate(&self) -> &T {
        &self.candidate
    }

    pub fn op(&self) -> &ActionOp {
        &self.op
    }

    /// Record a validation failure. Never fails.
    pub fn add_message(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn is_valid(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Perform the action through `store`.
    ///
    /// Precondition: `is_valid()` is true. This is not re-checked here;
    /// committing an invalid action is a caller bug. A second call fails with
    /// `AlreadyCommitted`. If the store fails, the action stays uncommitted
    /// and nothing was written.
    pub fn commit<S>(&mut self, store: &mut S) -> Result<T>
    where
        S: Committer<T> + ?Sized,
    {
        if self.committed {
            return Err(DalsysError::AlreadyCommitted);
        }
        let persisted = store.apply(&self.op, &self.candidate)?;
        self.committed = true;
        tracing::info!(op = self.op.as_str(), "action committed");
        Ok(persisted)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
