/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error types for the panel scheduler.
//!
//! Two error enums model the two failure layers:
//!
//! * [`RegisterError`]: wiring mistakes made while building the catalog.
//! * [`RequestError`]: why a priority request was refused.  The module must
//!   not assume it owns the screen after any of these.
//!
//! Neither ever escapes the tick loop: requests drained from the command
//! channel are logged and dropped, and the worst visible outcome of any
//! scheduling anomaly is a blank data area for a frame.

use thiserror::Error;

use crate::module::ModuleId;

// ── Registration ──────────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegisterError {
    /// The id does not point into the arena passed to `register()`.
    #[error("module {0} does not exist in the arena")]
    UnknownModule(ModuleId),

    #[error("module '{name}' ({id}) is already registered")]
    AlreadyRegistered { id: ModuleId, name: String },

    /// Short names key the configuration, so they must be unique.
    #[error("another module is already registered under the short name '{0}'")]
    DuplicateName(String),
}

// ── Priority requests ─────────────────────────────────────────────────────────

/// Reason a priority request was refused.
///
/// | Variant | Raised by |
/// |---|---|
/// | `UnknownModule` | scheduler (id not in catalog) |
/// | `ModuleDisabled` | handle and scheduler |
/// | `NotInPlaylist` | play-next request from a hidden / interrupt-only module |
/// | `ReservedRequestId` | interrupt requested with `RequestId::ALL` |
/// | `ZeroDuration` | interrupt requested without a dead-man's switch |
/// | `SchedulerGone` | handle whose scheduler was dropped |
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("module {0} is not registered")]
    UnknownModule(ModuleId),

    #[error("module '{module}' is disabled: request refused")]
    ModuleDisabled { module: String },

    #[error("module '{module}' is not in the playlist and cannot be played next")]
    NotInPlaylist { module: String },

    #[error("module '{module}' used the reserved request id 0 for an interrupt")]
    ReservedRequestId { module: String },

    /// Every interrupt must carry a non-zero duration so it expires on its
    /// own even if the module never reports finished.
    #[error("module '{module}' requested an interrupt without a duration")]
    ZeroDuration { module: String },

    #[error("scheduler for module '{module}' is no longer running")]
    SchedulerGone { module: String },
}
