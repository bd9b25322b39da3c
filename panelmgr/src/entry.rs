/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Core entry data structures for the panel scheduler.
//!
//! Three entry types model the three lists the scheduler keeps:
//!
//! ```text
//! register() ──► CatalogEntry ──(visible & enabled)──► PlaylistEntry   (round-robin)
//!                     │
//!                     └──(request_priority)──────────► InterruptEntry  (priority queue)
//!                                                        ↑ one per module
//! ```
//!
//! Both runtime entries share a [`RunState`]: the running/paused flags and
//! the countdown of the runtime budget.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::module::{ModuleId, Priority};

// ── RequestId ─────────────────────────────────────────────────────────────────

/// Caller-chosen identifier of a priority request.
///
/// `RequestId::ALL` (0) is reserved: it cannot be used to request an
/// interrupt, and in a release it matches every entry of the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RequestId(pub u32);

impl RequestId {
    pub const ALL: RequestId = RequestId(0);

    pub fn is_wildcard(self) -> bool {
        self == Self::ALL
    }

    /// `true` if a release carrying `self` removes an entry queued with `queued`.
    pub fn matches(self, queued: RequestId) -> bool {
        self.is_wildcard() || self == queued
    }
}

// ── CatalogEntry ──────────────────────────────────────────────────────────────

/// Registration record of one module.
///
/// Immutable after registration except for the disabled flag, which is shared
/// with the module's [`PriorityHandle`](crate::command::PriorityHandle) so a
/// disabled module's requests can be refused without touching the scheduler.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub id: ModuleId,
    pub short_name: String,
    pub display_name: String,
    pub is_hidden: bool,
    pub declared_priority: Priority,
    disabled: Arc<AtomicBool>,
}

impl CatalogEntry {
    pub fn new(
        id: ModuleId,
        short_name: impl Into<String>,
        display_name: impl Into<String>,
        is_hidden: bool,
        is_disabled: bool,
        declared_priority: Priority,
    ) -> Self {
        Self {
            id,
            short_name: short_name.into(),
            display_name: display_name.into(),
            is_hidden,
            declared_priority,
            disabled: Arc::new(AtomicBool::new(is_disabled)),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::Release);
    }

    /// Shared view of the disabled flag, handed to the module's handle.
    pub(crate) fn disabled_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.disabled)
    }
}

// ── RunState ──────────────────────────────────────────────────────────────────

/// Running/paused flags plus the runtime-budget countdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunState {
    pub is_running: bool,
    pub is_paused: bool,
    pub total_runtime_ms: u64,
    pub remaining_time_ms: u64,
}

impl RunState {
    /// A fresh, idle budget of `total_ms`.
    pub fn with_budget(total_ms: u64) -> Self {
        Self {
            total_runtime_ms: total_ms,
            remaining_time_ms: total_ms,
            ..Default::default()
        }
    }

    /// Start (or restart) the countdown from a freshly queried budget.
    pub fn activate(&mut self, total_ms: u64) {
        self.total_runtime_ms = total_ms;
        self.remaining_time_ms = total_ms;
        self.is_running = true;
        self.is_paused = false;
    }

    /// Pause without touching the remaining time.
    pub fn pause(&mut self) {
        self.is_paused = true;
    }

    pub fn resume(&mut self) {
        self.is_paused = false;
    }

    pub fn stop(&mut self) {
        self.is_running = false;
        self.is_paused = false;
    }

    /// Running and not paused: the entry may tick and draw.
    pub fn is_live(&self) -> bool {
        self.is_running && !self.is_paused
    }

    /// Charge `delta_ms` against the budget (floor 0).  Returns `true` once
    /// the budget is exhausted.
    pub fn consume(&mut self, delta_ms: u64) -> bool {
        self.remaining_time_ms = self.remaining_time_ms.saturating_sub(delta_ms);
        self.remaining_time_ms == 0
    }
}

// ── PlaylistEntry ─────────────────────────────────────────────────────────────

/// Runtime projection of a visible, enabled catalog module in the rotation.
#[derive(Debug, Clone, Serialize)]
pub struct PlaylistEntry {
    pub id: ModuleId,
    pub short_name: String,
    pub display_name: String,
    pub priority: Priority,
    #[serde(flatten)]
    pub run: RunState,
}

impl PlaylistEntry {
    pub fn from_catalog(entry: &CatalogEntry, total_runtime_ms: u64) -> Self {
        Self {
            id: entry.id,
            short_name: entry.short_name.clone(),
            display_name: entry.display_name.clone(),
            priority: entry.declared_priority,
            run: RunState::with_budget(total_runtime_ms),
        }
    }
}

// ── InterruptEntry ────────────────────────────────────────────────────────────

/// Snapshot pushed into the interrupt queue by a priority request.
///
/// `granted_ms` is the duration the module asked for; it becomes the budget
/// when the entry is activated.  Expiry of that budget is the dead-man's
/// switch that keeps a misbehaving module from holding the screen forever.
#[derive(Debug, Clone, Serialize)]
pub struct InterruptEntry {
    pub id: ModuleId,
    pub short_name: String,
    pub request_id: RequestId,
    pub priority: Priority,
    pub granted_ms: u64,
    #[serde(flatten)]
    pub run: RunState,
}

impl InterruptEntry {
    pub fn from_catalog(
        entry: &CatalogEntry,
        priority: Priority,
        request_id: RequestId,
        granted_ms: u64,
    ) -> Self {
        Self {
            id: entry.id,
            short_name: entry.short_name.clone(),
            request_id,
            priority,
            granted_ms,
            run: RunState::with_budget(granted_ms),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(name: &str) -> CatalogEntry {
        CatalogEntry::new(ModuleId(0), name, name.to_uppercase(), false, false, Priority::Normal)
    }

    // ── RequestId ─────────────────────────────────────────────────────────────

    #[test]
    fn wildcard_release_matches_any_request() {
        assert!(RequestId::ALL.matches(RequestId(7)));
        assert!(RequestId(7).matches(RequestId(7)));
        assert!(!RequestId(8).matches(RequestId(7)));
    }

    // ── CatalogEntry ──────────────────────────────────────────────────────────

    #[test]
    fn disabled_flag_is_shared_with_handles() {
        let entry = catalog("weather");
        let flag = entry.disabled_flag();
        assert!(!entry.is_disabled());

        entry.set_disabled(true);
        assert!(flag.load(Ordering::Acquire), "handle must see the toggle");
        assert!(entry.is_disabled());
    }

    // ── RunState ──────────────────────────────────────────────────────────────

    #[test]
    fn activate_resets_budget_and_flags() {
        let mut run = RunState::with_budget(1_000);
        run.consume(400);
        run.pause();

        run.activate(2_500);
        assert!(run.is_running);
        assert!(!run.is_paused);
        assert_eq!(run.total_runtime_ms, 2_500);
        assert_eq!(run.remaining_time_ms, 2_500);
    }

    #[test]
    fn pause_and_resume_preserve_remaining_time() {
        let mut run = RunState::default();
        run.activate(1_000);
        run.consume(300);

        run.pause();
        assert!(!run.is_live());
        assert_eq!(run.remaining_time_ms, 700);

        run.resume();
        assert!(run.is_live());
        assert_eq!(run.remaining_time_ms, 700);
    }

    #[test]
    fn consume_floors_at_zero() {
        let mut run = RunState::default();
        run.activate(100);
        assert!(!run.consume(60));
        assert!(run.consume(60), "second charge exhausts the budget");
        assert_eq!(run.remaining_time_ms, 0);
    }

    // ── Projections ───────────────────────────────────────────────────────────

    #[test]
    fn playlist_entry_copies_catalog_metadata() {
        let p = PlaylistEntry::from_catalog(&catalog("weather"), 10_000);
        assert_eq!(p.short_name, "weather");
        assert_eq!(p.display_name, "WEATHER");
        assert_eq!(p.run.remaining_time_ms, 10_000);
        assert!(!p.run.is_running);
    }

    #[test]
    fn interrupt_entry_budget_is_the_granted_duration() {
        let i = InterruptEntry::from_catalog(&catalog("cal"), Priority::High, RequestId(3), 500);
        assert_eq!(i.priority, Priority::High);
        assert_eq!(i.request_id, RequestId(3));
        assert_eq!(i.run.total_runtime_ms, 500);
        assert!(!i.run.is_running);
    }
}
