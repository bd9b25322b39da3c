//! Priority scheduler for the panel's display modules.
//!
//! [`PanelScheduler`] decides, tick by tick, which single module owns the
//! data area of the panel.  It keeps three lists:
//!
//! * the **catalog** of every registered module,
//! * the **playlist** of visible, enabled modules rotating round-robin,
//! * the **interrupt queue** of modules that asked to preempt the rotation.
//!
//! # Tick order
//!
//! ```text
//! tick(now)
//!   ├─ delta = now − last tick
//!   ├─ periodic_tick() on every enabled catalog module
//!   ├─ drain PriorityCommands        (requests made above count this frame)
//!   ├─ queue non-empty? ── yes ─► winner = head: activate / resume, count down,
//!   │                             tick(), self-release on expiry or finished
//!   │                  └─ no ──► running playlist entry: count down, tick(),
//!   │                             advance on expiry or finished
//!   └─ logic_tick() on the owner every 100 ms
//! ```
//!
//! # Invariants
//! * At most one playlist entry is running; it only counts down unpaused.
//! * The queue is sorted by priority (desc, stable) and only its head is live.
//! * Pausing never touches the remaining time; resuming continues from it.
//! * Nothing here panics or fails a tick: refused requests are logged and
//!   the worst outcome is a blank frame.
//!
//! # Example
//! ```rust,ignore
//! let mut modules = ModuleArena::new();
//! let weather = modules.insert(WeatherModule::new());
//! let mut scheduler = PanelScheduler::new();
//! scheduler.register(&mut modules, weather, false, false)?;
//! loop {
//!     scheduler.tick(&mut modules, millis());
//!     renderer.render(&scheduler, &mut modules, SystemTime::now());
//! }
//! ```

pub mod catalog;
pub mod error;
pub mod playlist;
pub mod queue;

pub use error::{RegisterError, RequestError};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::command::{self, CommandReceiver, CommandSender, PriorityCommand, PriorityHandle};
use crate::config::PanelConfigManager;
use crate::entry::{CatalogEntry, InterruptEntry, PlaylistEntry, RequestId};
use crate::module::{ModuleArena, ModuleId, Priority};

use catalog::Catalog;
use playlist::Playlist;
use queue::InterruptQueue;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Cadence of [`DisplayModule::logic_tick`](crate::module::DisplayModule::logic_tick).
pub const LOGIC_TICK_INTERVAL_MS: u64 = 100;

/// Upper bound on logic ticks replayed after a long frame.
const MAX_LOGIC_TICKS_PER_FRAME: u64 = 10;

// ── Outcomes ──────────────────────────────────────────────────────────────────

/// What an accepted priority request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Interrupt inserted into the queue.
    Queued,
    /// The module already had an interrupt queued; nothing changed.
    AlreadyQueued,
    /// Play-next recorded for the very next playlist switch.
    PlayNextScheduled,
    /// Play-next recorded while interrupts are active; applied once the
    /// resumed playlist entry finishes.
    PlayNextDeferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TickMode {
    Interrupt,
    Rotation,
}

/// Summary of one [`PanelScheduler::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub delta_ms: u64,
    pub mode: TickMode,
    pub commands: usize,
    /// Module allowed to draw this frame.
    pub owner: Option<ModuleId>,
}

// ── Status snapshot ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct CatalogStatus {
    pub id: ModuleId,
    pub short_name: String,
    pub display_name: String,
    pub hidden: bool,
    pub disabled: bool,
    pub declared_priority: Priority,
}

impl From<&CatalogEntry> for CatalogStatus {
    fn from(e: &CatalogEntry) -> Self {
        Self {
            id: e.id,
            short_name: e.short_name.clone(),
            display_name: e.display_name.clone(),
            hidden: e.is_hidden,
            disabled: e.is_disabled(),
            declared_priority: e.declared_priority,
        }
    }
}

/// Serializable view of the whole scheduler, for status pages and logs.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub owner: Option<String>,
    pub current_playlist_index: Option<usize>,
    pub next_play_next: Option<String>,
    pub pending_play_next: Option<String>,
    pub catalog: Vec<CatalogStatus>,
    pub playlist: Vec<PlaylistEntry>,
    pub interrupts: Vec<InterruptEntry>,
}

/// Result of one winner step inside the interrupt branch.
enum WinnerStep {
    /// The winner keeps the screen this frame.
    Held,
    /// The winner gave the screen back; the next head (if any) takes over.
    Released,
}

// ── PanelScheduler ────────────────────────────────────────────────────────────

/// The panel scheduler.
///
/// Owns only bookkeeping.  Modules live in the application's
/// [`ModuleArena`], which is passed into every call that reaches a module.
pub struct PanelScheduler {
    catalog: Catalog,
    playlist: Playlist,
    queue: InterruptQueue,

    /// Play-next target consumed by the next playlist switch.
    next_play_next: Option<ModuleId>,
    /// Play-next requested while interrupts were active.
    pending_play_next: Option<ModuleId>,

    last_tick_ms: Option<u64>,
    logic_elapsed_ms: u64,

    tx: CommandSender,
    rx: CommandReceiver,
}

impl Default for PanelScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl PanelScheduler {
    pub fn new() -> Self {
        let (tx, rx) = command::channel();
        Self {
            catalog: Catalog::new(),
            playlist: Playlist::new(),
            queue: InterruptQueue::new(),
            next_play_next: None,
            pending_play_next: None,
            last_tick_ms: None,
            logic_elapsed_ms: 0,
            tx,
            rx,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a module to the catalog and, unless hidden, to the end of the
    /// playlist.  The module receives its [`PriorityHandle`] here.
    ///
    /// A module registered disabled still gets its playlist slot; the
    /// rotation skips it until [`set_disabled`](Self::set_disabled) clears
    /// the flag.  Interrupt-only modules (`can_be_in_playlist() == false`) are always
    /// registered hidden.
    ///
    /// # Errors
    /// [`RegisterError`] if `id` is not in `modules`, is already registered,
    /// or its short name is taken.
    pub fn register(
        &mut self,
        modules: &mut ModuleArena,
        id: ModuleId,
        hidden: bool,
        disabled: bool,
    ) -> Result<(), RegisterError> {
        let module = modules.get_mut(id).ok_or(RegisterError::UnknownModule(id))?;
        let name = module.short_name().to_string();

        if self.catalog.get(id).is_some() {
            return Err(RegisterError::AlreadyRegistered { id, name });
        }
        if self.catalog.find_by_name(&name).is_some() {
            return Err(RegisterError::DuplicateName(name));
        }

        let mut hidden = hidden;
        if !module.can_be_in_playlist() && !hidden {
            warn!(module = %name, "interrupt-only module registered as visible: forcing hidden");
            hidden = true;
        }

        let entry = CatalogEntry::new(
            id,
            &name,
            module.display_name(),
            hidden,
            disabled,
            module.priority(),
        );
        let in_playlist = !hidden;

        module.attach(PriorityHandle::new(
            id,
            &name,
            entry.disabled_flag(),
            in_playlist,
            self.tx.clone(),
        ));

        if in_playlist {
            let duration = module.display_duration_ms();
            self.playlist
                .push(PlaylistEntry::from_catalog(&entry, duration));
            info!(
                module = %name,
                duration_ms = duration,
                position = self.playlist.len() - 1,
                disabled,
                "registered and added to playlist"
            );
        } else {
            info!(module = %name, disabled, "registered hidden (not in playlist)");
        }

        self.catalog.push(entry);
        Ok(())
    }

    /// [`register`](Self::register) with hidden/disabled taken from the
    /// configuration entry for the module's short name.
    pub fn register_with_config(
        &mut self,
        modules: &mut ModuleArena,
        id: ModuleId,
        config: &PanelConfigManager,
    ) -> Result<(), RegisterError> {
        let name = modules
            .get(id)
            .ok_or(RegisterError::UnknownModule(id))?
            .short_name()
            .to_string();
        let settings = config.settings_for(&name);
        self.register(modules, id, settings.effective_hidden(), settings.disabled)
    }

    /// Toggle a module's disabled flag.  A disabled playlist module is
    /// skipped by the rotation and handed over on the next tick if it is
    /// running; a disabled interrupt is released.  Clearing the flag puts a
    /// playlist module back into the rotation at its registered position.
    /// Returns `false` for an unknown module.
    pub fn set_disabled(&mut self, id: ModuleId, disabled: bool) -> bool {
        match self.catalog.get(id) {
            Some(entry) => {
                if entry.is_disabled() != disabled {
                    info!(module = %entry.short_name, disabled, "module disabled flag changed");
                }
                entry.set_disabled(disabled);
                true
            }
            None => false,
        }
    }

    /// A handle for code that is not a module (e.g. a web handler) to send
    /// commands on behalf of `id`.
    pub fn handle_for(&self, id: ModuleId) -> Option<PriorityHandle> {
        let entry = self.catalog.get(id)?;
        Some(PriorityHandle::new(
            id,
            &entry.short_name,
            entry.disabled_flag(),
            self.playlist.position(id).is_some(),
            self.tx.clone(),
        ))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Priority requests
    // ─────────────────────────────────────────────────────────────────────────

    /// Ask for screen time on behalf of `id`.
    ///
    /// * `Priority::Normal` records a play-next.  Nothing is paused.
    /// * Any other priority queues an interrupt that expires after
    ///   `duration_ms`.  The first interrupt pauses the running playlist
    ///   entry.  A module that already has an interrupt queued gets
    ///   [`RequestOutcome::AlreadyQueued`] and its duration is not refreshed.
    ///
    /// Called between ticks, the pause takes effect immediately; see
    /// [`tick`](Self::tick) for how the gap is accounted.
    ///
    /// # Errors
    /// A [`RequestError`] for unknown or disabled modules and invalid
    /// requests.  The queue and playlist are untouched in that case.
    pub fn request_priority(
        &mut self,
        id: ModuleId,
        priority: Priority,
        request_id: RequestId,
        duration_ms: u64,
    ) -> Result<RequestOutcome, RequestError> {
        let entry = self
            .catalog
            .get(id)
            .ok_or(RequestError::UnknownModule(id))?;

        command::validate_request(
            &entry.short_name,
            entry.is_disabled(),
            self.playlist.position(id).is_some(),
            priority,
            request_id,
            duration_ms,
        )?;

        if !priority.is_interrupt() {
            return Ok(if self.queue.is_empty() {
                self.next_play_next = Some(id);
                info!(module = %entry.short_name, "play-next scheduled");
                RequestOutcome::PlayNextScheduled
            } else {
                self.pending_play_next = Some(id);
                info!(module = %entry.short_name, "play-next deferred until interrupts clear");
                RequestOutcome::PlayNextDeferred
            });
        }

        if self.queue.contains(id) {
            debug!(
                module = %entry.short_name,
                request_id = request_id.0,
                "interrupt already queued: request ignored"
            );
            return Ok(RequestOutcome::AlreadyQueued);
        }

        if self.queue.is_empty() {
            if let Some(paused) = self.playlist.pause_running() {
                info!(
                    module = %paused.short_name,
                    remaining_ms = paused.run.remaining_time_ms,
                    "playlist paused for first interrupt"
                );
            }
        }

        self.queue.insert(InterruptEntry::from_catalog(
            entry,
            priority,
            request_id,
            duration_ms,
        ));
        info!(
            module = %entry.short_name,
            %priority,
            request_id = request_id.0,
            duration_ms,
            queue_len = self.queue.len(),
            "interrupt queued"
        );
        Ok(RequestOutcome::Queued)
    }

    /// Give the screen back on behalf of `id`.
    ///
    /// Removes the module's queued interrupt if `request_id` matches it
    /// (`RequestId::ALL` matches any).  When the queue empties, the paused
    /// playlist entry resumes, or the rotation advances if nothing was
    /// running.  Releasing something that is not queued changes nothing.
    /// Returns the number of entries removed.
    pub fn release_priority(
        &mut self,
        modules: &mut ModuleArena,
        id: ModuleId,
        request_id: RequestId,
    ) -> usize {
        let removed = self.queue.remove_matching(id, request_id);
        if removed == 0 {
            debug!(
                module = %self.catalog.name_of(id),
                request_id = request_id.0,
                "release ignored: nothing queued"
            );
            return 0;
        }

        info!(
            module = %self.catalog.name_of(id),
            request_id = request_id.0,
            queue_len = self.queue.len(),
            "interrupt released"
        );

        if self.queue.is_empty() {
            self.resume_playlist(modules);
        }
        removed
    }

    fn resume_playlist(&mut self, modules: &mut ModuleArena) {
        if let Some(idx) = self.playlist.paused_index() {
            if let Some(entry) = self.playlist.get_mut(idx) {
                entry.run.resume();
                info!(
                    module = %entry.short_name,
                    remaining_ms = entry.run.remaining_time_ms,
                    "playlist resumed"
                );
            }
            self.playlist.set_current(Some(idx));
            return;
        }

        if self.playlist.running_index().is_some() {
            return;
        }

        if let Some(pending) = self.pending_play_next.take() {
            self.next_play_next = Some(pending);
        }
        self.advance(modules);
    }

    fn drain_commands(&mut self, modules: &mut ModuleArena) -> usize {
        let mut drained = 0;
        while let Ok(cmd) = self.rx.try_recv() {
            drained += 1;
            match cmd {
                PriorityCommand::Request {
                    module,
                    priority,
                    request_id,
                    duration_ms,
                } => {
                    if let Err(e) = self.request_priority(module, priority, request_id, duration_ms)
                    {
                        warn!("priority request dropped: {e}");
                    }
                }
                PriorityCommand::Release { module, request_id } => {
                    self.release_priority(modules, module, request_id);
                }
            }
        }
        drained
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tick
    // ─────────────────────────────────────────────────────────────────────────

    /// Advance the scheduler by one frame.  `now_ms` is a monotonic
    /// millisecond counter; the first tick counts as zero elapsed time.
    ///
    /// Time is only charged to the entry that is live when the tick runs.
    /// An interrupt requested directly between two ticks pauses the playlist
    /// entry at once, so the delta up to the next tick is charged to
    /// neither: the paused entry keeps its remaining time and the interrupt
    /// starts its budget at activation.  Requests sent through a
    /// [`PriorityHandle`] are drained inside `tick` and never open such a gap.
    pub fn tick(&mut self, modules: &mut ModuleArena, now_ms: u64) -> TickReport {
        let delta_ms = self
            .last_tick_ms
            .map_or(0, |last| now_ms.saturating_sub(last));
        self.last_tick_ms = Some(now_ms);

        for entry in self.catalog.iter() {
            if entry.is_disabled() {
                continue;
            }
            if let Some(module) = modules.get_mut(entry.id) {
                module.periodic_tick(now_ms);
            }
        }

        let commands = self.drain_commands(modules);

        let mode = if self.queue.is_empty() {
            self.tick_playlist(modules, delta_ms);
            TickMode::Rotation
        } else {
            self.tick_interrupts(modules, delta_ms);
            TickMode::Interrupt
        };

        self.run_logic_ticks(modules, delta_ms);

        TickReport {
            delta_ms,
            mode,
            commands,
            owner: self.owner(),
        }
    }

    fn tick_interrupts(&mut self, modules: &mut ModuleArena, delta_ms: u64) {
        let mut delta_ms = delta_ms;
        // Each pass either keeps the head or removes it, so this terminates.
        while !self.queue.is_empty() {
            match self.step_winner(modules, delta_ms) {
                WinnerStep::Held => return,
                // A head promoted mid-frame has not run yet.
                WinnerStep::Released => delta_ms = 0,
            }
        }
    }

    fn step_winner(&mut self, modules: &mut ModuleArena, delta_ms: u64) -> WinnerStep {
        for name in self.queue.pause_all_but_head() {
            info!(module = %name, "interrupt paused by higher priority");
        }

        let Some(head) = self.queue.head() else {
            return WinnerStep::Released;
        };
        let (id, request_id) = (head.id, head.request_id);

        let enabled = !self.catalog.is_disabled(id)
            && modules.get(id).map_or(false, |m| m.is_enabled());
        if !enabled {
            info!(module = %self.catalog.name_of(id), "interrupt owner disabled: releasing");
            self.release_priority(modules, id, request_id);
            return WinnerStep::Released;
        }

        let (Some(head), Some(module)) = (self.queue.head_mut(), modules.get_mut(id)) else {
            return WinnerStep::Held;
        };

        let expired = if !head.run.is_running {
            head.run.activate(head.granted_ms);
            module.reset_paging();
            module.activate();
            info!(
                module = %head.short_name,
                priority = %head.priority,
                budget_ms = head.granted_ms,
                "interrupt activated"
            );
            false
        } else {
            if head.run.is_paused {
                head.run.resume();
                info!(
                    module = %head.short_name,
                    remaining_ms = head.run.remaining_time_ms,
                    "interrupt resumed"
                );
            }
            head.run.consume(delta_ms)
        };

        module.tick();
        let finished = module.is_finished();

        if expired || finished {
            if finished {
                info!(module = %head.short_name, "interrupt finished");
            } else {
                info!(
                    module = %head.short_name,
                    budget_ms = head.granted_ms,
                    "interrupt timed out"
                );
            }
            self.release_priority(modules, id, request_id);
            return WinnerStep::Released;
        }
        WinnerStep::Held
    }

    fn tick_playlist(&mut self, modules: &mut ModuleArena, delta_ms: u64) {
        let Some(idx) = self.playlist.running_index() else {
            self.advance(modules);
            return;
        };
        let Some(entry) = self.playlist.get(idx) else {
            return;
        };
        if entry.run.is_paused {
            return;
        }

        let id = entry.id;
        if !self.is_eligible(modules, id) {
            info!(module = %entry.short_name, "running module disabled: switching");
            self.stop_playlist_entry(idx);
            self.advance(modules);
            return;
        }

        let (Some(entry), Some(module)) = (self.playlist.get_mut(idx), modules.get_mut(id)) else {
            return;
        };

        let expired = entry.run.consume(delta_ms);
        module.tick();
        let finished = module.is_finished();

        if expired || finished {
            if finished {
                debug!(module = %entry.short_name, "module finished");
            } else {
                debug!(
                    module = %entry.short_name,
                    budget_ms = entry.run.total_runtime_ms,
                    "module runtime elapsed"
                );
            }
            entry.run.stop();
            if let Some(pending) = self.pending_play_next.take() {
                self.next_play_next = Some(pending);
            }
            self.advance(modules);
        }
    }

    fn stop_playlist_entry(&mut self, idx: usize) {
        if let Some(entry) = self.playlist.get_mut(idx) {
            entry.run.stop();
        }
    }

    fn run_logic_ticks(&mut self, modules: &mut ModuleArena, delta_ms: u64) {
        self.logic_elapsed_ms += delta_ms;
        let due = self.logic_elapsed_ms / LOGIC_TICK_INTERVAL_MS;
        self.logic_elapsed_ms %= LOGIC_TICK_INTERVAL_MS;

        let Some(owner) = self.owner() else {
            return;
        };
        if let Some(module) = modules.get_mut(owner) {
            for _ in 0..due.min(MAX_LOGIC_TICKS_PER_FRAME) {
                module.logic_tick();
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Rotation
    // ─────────────────────────────────────────────────────────────────────────

    fn is_eligible(&self, modules: &ModuleArena, id: ModuleId) -> bool {
        let visible = self
            .catalog
            .get(id)
            .map_or(false, |e| !e.is_hidden && !e.is_disabled());
        visible && modules.get(id).map_or(false, |m| m.is_enabled())
    }

    /// Switch to the next playlist entry.
    ///
    /// Starts one past the current entry, or at the play-next target if one
    /// is recorded, and walks the playlist circularly once.  The first
    /// eligible entry is activated.  A play-next target is honoured even when
    /// it is the module that just finished: it plays again.
    fn advance(&mut self, modules: &mut ModuleArena) {
        if let Some(idx) = self.playlist.running_index() {
            self.stop_playlist_entry(idx);
        }

        let mut start = self.playlist.next_index();
        if let Some(target) = self.next_play_next.take() {
            if let Some(pos) = self.playlist.position(target) {
                debug!(module = %self.catalog.name_of(target), "playing next on request");
                start = pos;
            }
        }

        let candidate = self
            .playlist
            .scan_from(start)
            .find(|&idx| {
                self.playlist
                    .get(idx)
                    .map_or(false, |e| self.is_eligible(modules, e.id))
            });

        match candidate {
            Some(idx) => self.activate_playlist_entry(modules, idx),
            None => {
                if self.playlist.current().is_some() {
                    warn!(
                        playlist_len = self.playlist.len(),
                        "no eligible module in playlist, going idle"
                    );
                }
                self.playlist.set_current(None);
            }
        }
    }

    fn activate_playlist_entry(&mut self, modules: &mut ModuleArena, idx: usize) {
        let Some(entry) = self.playlist.get_mut(idx) else {
            return;
        };
        let Some(module) = modules.get_mut(entry.id) else {
            return;
        };

        entry.run.activate(module.display_duration_ms());
        module.reset_paging();
        module.activate();
        info!(
            module = %entry.short_name,
            index = idx,
            budget_ms = entry.run.total_runtime_ms,
            "playlist module activated"
        );
        self.playlist.set_current(Some(idx));
    }

    /// Restart the rotation from the top: every playlist entry is stopped
    /// and play-next requests are forgotten.  Queued interrupts are kept.
    pub fn restart_playlist(&mut self) {
        self.playlist.stop_all();
        self.playlist.set_current(None);
        self.next_play_next = None;
        self.pending_play_next = None;
        info!("playlist restarted");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// The module allowed to draw: the live head of the interrupt queue, or
    /// else the running, unpaused playlist entry.
    pub fn owner(&self) -> Option<ModuleId> {
        if let Some(head) = self.queue.head() {
            return head.run.is_live().then_some(head.id);
        }
        self.playlist
            .running_index()
            .and_then(|idx| self.playlist.get(idx))
            .filter(|e| e.run.is_live())
            .map(|e| e.id)
    }

    pub fn current_playlist_index(&self) -> Option<usize> {
        self.playlist.current()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn playlist(&self) -> &[PlaylistEntry] {
        self.playlist.entries()
    }

    pub fn interrupts(&self) -> &[InterruptEntry] {
        self.queue.entries()
    }

    pub fn status(&self) -> SchedulerStatus {
        let name = |id: ModuleId| self.catalog.name_of(id).to_string();
        SchedulerStatus {
            owner: self.owner().map(name),
            current_playlist_index: self.playlist.current(),
            next_play_next: self.next_play_next.map(name),
            pending_play_next: self.pending_play_next.map(name),
            catalog: self.catalog.iter().map(CatalogStatus::from).collect(),
            playlist: self.playlist.entries().to_vec(),
            interrupts: self.queue.entries().to_vec(),
        }
    }
}
