//! The interrupt queue.
//!
//! Kept sorted descending by priority; `Vec::sort_by` is stable, so equal
//! priorities stay in request order.  The head is the winner and the only
//! entry that may be live; every other entry is paused or not yet activated.

use crate::entry::{InterruptEntry, RequestId};
use crate::module::ModuleId;

#[derive(Debug, Default)]
pub struct InterruptQueue {
    entries: Vec<InterruptEntry>,
}

impl InterruptQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[InterruptEntry] {
        &self.entries
    }

    pub fn head(&self) -> Option<&InterruptEntry> {
        self.entries.first()
    }

    pub fn head_mut(&mut self) -> Option<&mut InterruptEntry> {
        self.entries.first_mut()
    }

    pub fn contains(&self, id: ModuleId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    pub fn insert(&mut self, entry: InterruptEntry) {
        self.entries.push(entry);
        self.entries.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Remove the module's entries matched by `request_id`.  Returns how many
    /// were removed.
    pub fn remove_matching(&mut self, id: ModuleId, request_id: RequestId) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|e| !(e.id == id && request_id.matches(e.request_id)));
        before - self.entries.len()
    }

    /// Pause every live entry behind the head.  Returns the names of the
    /// entries that were newly paused.
    pub fn pause_all_but_head(&mut self) -> Vec<String> {
        self.entries
            .iter_mut()
            .skip(1)
            .filter(|e| e.run.is_live())
            .map(|e| {
                e.run.pause();
                e.short_name.clone()
            })
            .collect()
    }
}
