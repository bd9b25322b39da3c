/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Priority commands: how modules ask the scheduler for screen time.
//!
//! Modules never call into the scheduler directly.  Each one receives a
//! [`PriorityHandle`] at registration and sends [`PriorityCommand`]s through
//! it; the scheduler drains the channel once per tick, after every
//! `periodic_tick()` has run and before the ownership decision.  The channel
//! is a single-consumer `tokio::sync::mpsc` queue, so a handle may be cloned
//! into a background task on another thread without any lock around the
//! scheduler's state.
//!
//! The handle performs the same validation the scheduler performs on drain,
//! so the `bool` returned by [`PriorityHandle::request`] is meaningful right
//! away.  A module disabled between send and drain is refused again on drain.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::entry::RequestId;
use crate::module::{ModuleId, Priority};
use crate::scheduler::RequestError;

// ── PriorityCommand ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriorityCommand {
    Request {
        module: ModuleId,
        priority: Priority,
        request_id: RequestId,
        duration_ms: u64,
    },
    Release {
        module: ModuleId,
        request_id: RequestId,
    },
}

pub(crate) type CommandSender = UnboundedSender<PriorityCommand>;
pub(crate) type CommandReceiver = UnboundedReceiver<PriorityCommand>;

pub(crate) fn channel() -> (CommandSender, CommandReceiver) {
    mpsc::unbounded_channel()
}

// ── Validation ────────────────────────────────────────────────────────────────

/// Checks shared by the handle and the scheduler.  Order matters: a disabled
/// module is refused before anything else is looked at.
pub(crate) fn validate_request(
    module: &str,
    disabled: bool,
    in_playlist: bool,
    priority: Priority,
    request_id: RequestId,
    duration_ms: u64,
) -> Result<(), RequestError> {
    if disabled {
        return Err(RequestError::ModuleDisabled {
            module: module.to_string(),
        });
    }

    if !priority.is_interrupt() {
        if !in_playlist {
            return Err(RequestError::NotInPlaylist {
                module: module.to_string(),
            });
        }
        return Ok(());
    }

    if request_id.is_wildcard() {
        return Err(RequestError::ReservedRequestId {
            module: module.to_string(),
        });
    }
    if duration_ms == 0 {
        return Err(RequestError::ZeroDuration {
            module: module.to_string(),
        });
    }
    Ok(())
}

// ── PriorityHandle ────────────────────────────────────────────────────────────

/// A module's channel into the scheduler.
///
/// Cheap to clone and `Send`, so it can be moved into a background fetch
/// task.  Dropping every handle does not affect the scheduler.
#[derive(Debug, Clone)]
pub struct PriorityHandle {
    module: ModuleId,
    name: Arc<str>,
    disabled: Arc<AtomicBool>,
    in_playlist: bool,
    tx: CommandSender,
}

impl PriorityHandle {
    pub(crate) fn new(
        module: ModuleId,
        name: &str,
        disabled: Arc<AtomicBool>,
        in_playlist: bool,
        tx: CommandSender,
    ) -> Self {
        Self {
            module,
            name: Arc::from(name),
            disabled,
            in_playlist,
            tx,
        }
    }

    pub fn module(&self) -> ModuleId {
        self.module
    }

    /// Ask for screen time.
    ///
    /// `Priority::Normal` asks to be played next in the rotation; any other
    /// level queues an interrupt that expires after `duration_ms` at the
    /// latest.  Pad the duration beyond the expected display time.
    ///
    /// # Errors
    /// A [`RequestError`] if the request is refused; the module must not
    /// assume it will get the screen.
    pub fn try_request(
        &self,
        priority: Priority,
        request_id: RequestId,
        duration_ms: u64,
    ) -> Result<(), RequestError> {
        validate_request(
            &self.name,
            self.disabled.load(Ordering::Acquire),
            self.in_playlist,
            priority,
            request_id,
            duration_ms,
        )?;

        self.tx
            .send(PriorityCommand::Request {
                module: self.module,
                priority,
                request_id,
                duration_ms,
            })
            .map_err(|_| RequestError::SchedulerGone {
                module: self.name.to_string(),
            })
    }

    /// [`try_request`](Self::try_request) reduced to "accepted or not".
    pub fn request(&self, priority: Priority, request_id: RequestId, duration_ms: u64) -> bool {
        match self.try_request(priority, request_id, duration_ms) {
            Ok(()) => true,
            Err(e) => {
                debug!(module = %self.name, "priority request refused: {e}");
                false
            }
        }
    }

    /// Give the screen back.  `RequestId::ALL` releases every interrupt of
    /// this module.  Releasing something that is not queued is a no-op.
    pub fn release(&self, request_id: RequestId) {
        let cmd = PriorityCommand::Release {
            module: self.module,
            request_id,
        };
        if self.tx.send(cmd).is_err() {
            debug!(module = %self.name, "release dropped: scheduler is gone");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(in_playlist: bool) -> (PriorityHandle, CommandReceiver, Arc<AtomicBool>) {
        let (tx, rx) = channel();
        let disabled = Arc::new(AtomicBool::new(false));
        let h = PriorityHandle::new(ModuleId(4), "calendar", Arc::clone(&disabled), in_playlist, tx);
        (h, rx, disabled)
    }

    #[test]
    fn accepted_request_is_enqueued() {
        let (h, mut rx, _) = handle(false);
        assert!(h.request(Priority::High, RequestId(7), 500));

        assert_eq!(
            rx.try_recv().unwrap(),
            PriorityCommand::Request {
                module: ModuleId(4),
                priority: Priority::High,
                request_id: RequestId(7),
                duration_ms: 500,
            }
        );
    }

    #[test]
    fn disabled_module_is_refused_without_enqueueing() {
        let (h, mut rx, disabled) = handle(true);
        disabled.store(true, Ordering::Release);

        let err = h.try_request(Priority::High, RequestId(1), 500).unwrap_err();
        assert!(matches!(err, RequestError::ModuleDisabled { .. }));
        assert!(rx.try_recv().is_err(), "nothing may reach the scheduler");
    }

    #[test]
    fn interrupt_without_duration_is_refused() {
        let (h, _rx, _) = handle(false);
        let err = h.try_request(Priority::Low, RequestId(1), 0).unwrap_err();
        assert!(matches!(err, RequestError::ZeroDuration { .. }));
    }

    #[test]
    fn interrupt_with_reserved_id_is_refused() {
        let (h, _rx, _) = handle(false);
        let err = h.try_request(Priority::Low, RequestId::ALL, 100).unwrap_err();
        assert!(matches!(err, RequestError::ReservedRequestId { .. }));
    }

    #[test]
    fn play_next_requires_playlist_membership() {
        let (hidden, _rx, _) = handle(false);
        assert!(matches!(
            hidden.try_request(Priority::Normal, RequestId(1), 0),
            Err(RequestError::NotInPlaylist { .. })
        ));

        let (visible, _rx2, _) = handle(true);
        assert!(visible.request(Priority::Normal, RequestId(1), 0));
    }

    #[test]
    fn request_after_scheduler_dropped_reports_gone() {
        let (h, rx, _) = handle(false);
        drop(rx);
        assert!(matches!(
            h.try_request(Priority::High, RequestId(2), 100),
            Err(RequestError::SchedulerGone { .. })
        ));
        // release must not panic either
        h.release(RequestId(2));
    }

    #[test]
    fn release_is_enqueued() {
        let (h, mut rx, _) = handle(false);
        h.release(RequestId::ALL);
        assert_eq!(
            rx.try_recv().unwrap(),
            PriorityCommand::Release {
                module: ModuleId(4),
                request_id: RequestId::ALL,
            }
        );
    }

    #[test]
    fn handle_can_be_sent_to_another_thread() {
        let (h, mut rx, _) = handle(false);
        let worker = h.clone();
        std::thread::spawn(move || {
            worker.request(Priority::Medium, RequestId(9), 1_000);
        })
        .join()
        .unwrap();
        assert!(matches!(rx.try_recv(), Ok(PriorityCommand::Request { .. })));
    }
}
