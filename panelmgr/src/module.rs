/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! The module contract every display module implements, plus the arena the
//! application keeps its modules in.
//!
//! # Ownership model
//! The application **owns** every module for the whole process lifetime by
//! moving it into a [`ModuleArena`].  The scheduler never holds a reference to
//! a module; it stores [`ModuleId`]s (stable arena indices) and is handed
//! `&mut ModuleArena` on every call that must reach a module hook.
//!
//! ```text
//! Application ──owns──► ModuleArena[ModuleId] ──&mut per call──► PanelScheduler
//!                              ▲                                      │
//!                              └──── PriorityHandle (mpsc) ◄──────────┘
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::command::PriorityHandle;
use crate::render::Canvas;

// ── Priority ──────────────────────────────────────────────────────────────────

/// Priority class of a request for screen time.
///
/// `Normal` is the play-next class: it never preempts anything and only
/// reorders the next rotation slot.  Every other level is a true interrupt.
/// The derived `Ord` gives the queue ordering (`Highest` wins).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Plays next in the normal rotation.
    #[default]
    Normal,
    Low,
    Medium,
    High,
    /// Preempts everything else.
    Highest,
}

impl Priority {
    /// `true` for every level that preempts the playlist.
    pub fn is_interrupt(self) -> bool {
        self > Priority::Normal
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Normal => "normal",
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Highest => "highest",
        };
        f.write_str(s)
    }
}

// ── ModuleId ──────────────────────────────────────────────────────────────────

/// Stable index of a module inside its [`ModuleArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ModuleId(pub(crate) usize);

impl ModuleId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ── DisplayModule ─────────────────────────────────────────────────────────────

/// Capability interface of a display module.
///
/// Only the hooks below are visible to the scheduler; it never depends on a
/// concrete module type.  None of the hooks may block: network fetches and
/// sensor reads happen elsewhere and are only observed through
/// [`is_enabled`](Self::is_enabled), [`is_finished`](Self::is_finished) and
/// the requests sent through the module's [`PriorityHandle`].
pub trait DisplayModule {
    /// Internal, unique name (e.g. `"darts"`).  Used as the configuration key.
    fn short_name(&self) -> &str;

    /// Human readable name for status pages.
    fn display_name(&self) -> &str {
        self.short_name()
    }

    /// Render into the data area.  Called at most once per frame and only
    /// while the module owns the screen.
    fn draw(&mut self, canvas: &mut Canvas);

    /// Runtime budget in milliseconds.  Re-queried on every activation, so it
    /// may depend on the date, the amount of data to page through, etc.
    fn display_duration_ms(&self) -> u64;

    /// Per-frame animation advance, only while the module owns the screen.
    fn tick(&mut self) {}

    /// Fixed ~100 ms cadence while the module owns the screen.  Modules
    /// decide here whether they are finished.
    fn logic_tick(&mut self) {}

    /// Called on every enabled catalog module on every scheduler tick,
    /// visible or not, so background modules can request or release screen
    /// time.
    fn periodic_tick(&mut self, _now_ms: u64) {}

    fn is_enabled(&self) -> bool {
        true
    }

    fn is_finished(&self) -> bool {
        false
    }

    /// Rewind to the first page.  Called right before [`activate`](Self::activate).
    fn reset_paging(&mut self) {}

    /// The module is now visible.  Called exactly once per activation.
    fn activate(&mut self) {}

    /// `false` marks an interrupt-only module: it never joins the rotation.
    fn can_be_in_playlist(&self) -> bool {
        true
    }

    /// While this returns `true` and the module owns the screen, it draws
    /// into a canvas covering the whole panel and the clock is not drawn.
    /// Asked again every frame.
    fn wants_fullscreen(&self) -> bool {
        false
    }

    /// Declared priority, recorded in the catalog at registration.
    fn priority(&self) -> Priority {
        Priority::Normal
    }

    /// Hands the module its channel into the scheduler.  Called once at
    /// registration; modules that never request screen time ignore it.
    fn attach(&mut self, _handle: PriorityHandle) {}
}

// ── ModuleArena ───────────────────────────────────────────────────────────────

/// Application-owned storage for all display modules.
///
/// Modules are never removed, so a [`ModuleId`] stays valid for the lifetime
/// of the arena.
#[derive(Default)]
pub struct ModuleArena {
    modules: Vec<Box<dyn DisplayModule>>,
}

impl ModuleArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move `module` into the arena and return its stable id.
    pub fn insert(&mut self, module: impl DisplayModule + 'static) -> ModuleId {
        self.insert_boxed(Box::new(module))
    }

    pub fn insert_boxed(&mut self, module: Box<dyn DisplayModule>) -> ModuleId {
        self.modules.push(module);
        ModuleId(self.modules.len() - 1)
    }

    pub fn get(&self, id: ModuleId) -> Option<&dyn DisplayModule> {
        self.modules.get(id.0).map(|m| m.as_ref())
    }

    pub fn get_mut(&mut self, id: ModuleId) -> Option<&mut (dyn DisplayModule + 'static)> {
        self.modules.get_mut(id.0).map(|m| m.as_mut())
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl fmt::Debug for ModuleArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.modules.iter().map(|m| m.short_name()))
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    struct Blank(&'static str);

    impl DisplayModule for Blank {
        fn short_name(&self) -> &str {
            self.0
        }
        fn draw(&mut self, _canvas: &mut Canvas) {}
        fn display_duration_ms(&self) -> u64 {
            1_000
        }
    }

    #[test]
    fn priority_orders_normal_lowest() {
        assert!(Priority::Normal < Priority::Low);
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
        assert!(Priority::High < Priority::Highest);
    }

    #[test]
    fn only_normal_is_not_an_interrupt() {
        assert!(!Priority::Normal.is_interrupt());
        assert!(Priority::Low.is_interrupt());
        assert!(Priority::Highest.is_interrupt());
    }

    #[test]
    fn priority_parses_lowercase_yaml() {
        let p: Priority = serde_yaml::from_str("high").unwrap();
        assert_eq!(p, Priority::High);
        assert_eq!(Priority::Medium.to_string(), "medium");
    }

    #[test]
    fn arena_ids_are_stable_insertion_indices() {
        let mut arena = ModuleArena::new();
        let a = arena.insert(Blank("a"));
        let b = arena.insert(Blank("b"));

        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(b).unwrap().short_name(), "b");
        assert!(arena.get(ModuleId(7)).is_none());
    }

    #[test]
    fn default_hooks_describe_a_plain_playlist_module() {
        let m = Blank("plain");
        assert_eq!(m.display_name(), "plain");
        assert!(m.is_enabled());
        assert!(!m.is_finished());
        assert!(m.can_be_in_playlist());
        assert_eq!(m.priority(), Priority::Normal);
    }
}
