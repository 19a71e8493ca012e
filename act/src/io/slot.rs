//! Shared slot holding the pending instruction queue.
//!
//! Another component writes a serialized [`InstructionQueue`] into the slot;
//! the dispatch phase takes one instruction per cycle. Every read-modify-write
//! happens under a single lock guard, released when the guard drops.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, anyhow};
use tracing::debug;

use crate::io::instruction::{Instruction, InstructionQueue};

#[derive(Debug, Clone, Default)]
pub struct InstructionSlot {
    inner: Arc<Mutex<Option<String>>>,
}

/// Exclusive access to the slot contents.
pub struct SlotGuard<'a> {
    contents: MutexGuard<'a, Option<String>>,
}

impl SlotGuard<'_> {
    pub fn get(&self) -> Option<&str> {
        self.contents.as_deref()
    }

    pub fn set(&mut self, raw: Option<String>) {
        *self.contents = raw;
    }

    /// Parse the pending queue. An empty slot reads as `None`.
    ///
    /// A payload that fails validation is cleared so it cannot stall later
    /// cycles, and the validation error is returned.
    pub fn queue(&mut self) -> Result<Option<InstructionQueue>> {
        let Some(raw) = self.get().filter(|raw| !raw.trim().is_empty()) else {
            return Ok(None);
        };
        match InstructionQueue::parse(raw) {
            Ok(queue) => Ok(Some(queue)),
            Err(err) => {
                self.set(None);
                Err(err)
            }
        }
    }

    /// Write `queue` back in place of the current contents.
    pub fn replace(&mut self, queue: &InstructionQueue) -> Result<()> {
        self.set(Some(queue.to_wire()?));
        Ok(())
    }
}

impl InstructionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the slot.
    pub fn lock(&self) -> Result<SlotGuard<'_>> {
        let contents = self
            .inner
            .lock()
            .map_err(|_| anyhow!("instruction slot lock poisoned"))?;
        Ok(SlotGuard { contents })
    }

    /// Replace the slot contents with a serialized queue.
    pub fn store(&self, queue: &InstructionQueue) -> Result<()> {
        let raw = queue.to_wire()?;
        self.lock()?.set(Some(raw));
        Ok(())
    }

    /// Replace the slot contents with raw, unvalidated text.
    pub fn store_raw(&self, raw: impl Into<String>) -> Result<()> {
        self.lock()?.set(Some(raw.into()));
        Ok(())
    }

    pub fn is_pending(&self) -> Result<bool> {
        Ok(self
            .lock()?
            .get()
            .is_some_and(|raw| !raw.trim().is_empty()))
    }

    /// Current queue, if the slot holds one.
    pub fn snapshot(&self) -> Result<Option<InstructionQueue>> {
        let guard = self.lock()?;
        guard.get().map(InstructionQueue::parse).transpose()
    }

    /// Pop the first pending instruction and write the remainder back.
    ///
    /// Malformed payloads are cleared as in [`SlotGuard::queue`].
    pub fn pop_front(&self) -> Result<Option<Instruction>> {
        let mut guard = self.lock()?;
        let Some(mut queue) = guard.queue()? else {
            return Ok(None);
        };
        let next = queue.pop_front();
        guard.replace(&queue)?;
        debug!(remaining = queue.plan.len(), "instruction popped");
        Ok(next)
    }
}
