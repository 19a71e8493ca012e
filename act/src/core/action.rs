//! Planned steps and the capability interface that drives them.

use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::core::types::{ActionStatus, Operator};

/// Capability interface for actions whose effects happen in an external actuator.
///
/// Both calls must return promptly: `execute` starts the work, `check_complete`
/// polls it. An `Err` from either marks the action failed.
pub trait Executable: Send {
    /// Begin (or perform) the action.
    fn execute(&mut self) -> Result<()>;
    /// Non-blocking poll; `true` once the action has finished.
    fn check_complete(&mut self) -> Result<bool>;
}

/// A single planned step.
pub struct Action {
    operator: Operator,
    blocks: bool,
    status: ActionStatus,
    body: Option<Box<dyn Executable>>,
}

impl Action {
    /// An action without an executable body (synchronous plans, or steps the
    /// domain cannot run).
    pub fn new(operator: Operator) -> Self {
        Self {
            operator,
            blocks: false,
            status: ActionStatus::NotStarted,
            body: None,
        }
    }

    pub fn with_body(operator: Operator, body: Box<dyn Executable>) -> Self {
        Self {
            body: Some(body),
            ..Self::new(operator)
        }
    }

    pub fn blocking(mut self, blocks: bool) -> Self {
        self.blocks = blocks;
        self
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    pub fn blocks(&self) -> bool {
        self.blocks
    }

    pub fn status(&self) -> ActionStatus {
        self.status
    }

    pub fn body_mut(&mut self) -> Option<&mut (dyn Executable + 'static)> {
        self.body.as_deref_mut()
    }

    /// Move to `next`, ignoring transitions that would leave a terminal state
    /// or step backward. Returns whether the status changed.
    pub fn set_status(&mut self, next: ActionStatus) -> bool {
        if self.status == next || !self.status.can_become(next) {
            return false;
        }
        self.status = next;
        true
    }

    pub fn record(&self) -> ActionRecord {
        ActionRecord {
            operator: self.operator.clone(),
            blocks: self.blocks,
            status: self.status,
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("operator", &self.operator)
            .field("blocks", &self.blocks)
            .field("status", &self.status)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.operator.fmt(f)
    }
}

/// Owned snapshot of an action, stored in the action log and trace records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub operator: Operator,
    pub blocks: bool,
    pub status: ActionStatus,
}

impl fmt::Display for ActionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.operator.fmt(f)
    }
}
