//! Bounded per-cycle record of the actions taken.

use serde::Serialize;

use crate::core::action::ActionRecord;

/// Default number of batches retained before trimming.
pub const DEFAULT_MAX_ENTRIES: usize = 400;
/// Default number of oldest batches dropped by a trim.
pub const DEFAULT_TRIM_COUNT: usize = 200;

/// Actions selected in a single cycle (usually zero or one).
pub type ActionBatch = Vec<ActionRecord>;

/// Append-only log of action batches, one per cycle.
///
/// When the log grows past `max_entries` the oldest `trim_count` batches are
/// dropped, so the retained length after a trim is `len - trim_count`.
#[derive(Debug, Clone, Serialize)]
pub struct ActionLog {
    batches: Vec<ActionBatch>,
    max_entries: usize,
    trim_count: usize,
}

impl Default for ActionLog {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES, DEFAULT_TRIM_COUNT)
    }
}

impl ActionLog {
    pub fn new(max_entries: usize, trim_count: usize) -> Self {
        Self {
            batches: Vec::new(),
            max_entries,
            trim_count,
        }
    }

    /// Append one cycle's batch. Returns the number of batches trimmed (0 if none).
    ///
    /// Every push checks the bound, empty batches included, so the log never
    /// holds more than `max_entries + 1` batches.
    pub fn push(&mut self, batch: ActionBatch) -> usize {
        self.batches.push(batch);
        if self.batches.len() <= self.max_entries {
            return 0;
        }
        let dropped = self.trim_count.min(self.batches.len());
        self.batches.drain(..dropped);
        dropped
    }

    /// Replace the whole log.
    pub fn set(&mut self, batches: Vec<ActionBatch>) {
        self.batches = batches;
    }

    pub fn batches(&self) -> &[ActionBatch] {
        &self.batches
    }

    pub fn last(&self) -> Option<&ActionBatch> {
        self.batches.last()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Total number of actions across all retained batches.
    pub fn action_count(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }
}
