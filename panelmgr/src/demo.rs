//! Simulator pieces: modules driven entirely by configuration, a text clock
//! and a log-backed panel output.
//!
//! Nothing here knows about real hardware.  `panelmgr` (the binary) wires
//! these into the scheduler so the rotation and interrupt logic can be
//! watched in the log.

use std::time::{SystemTime, UNIX_EPOCH};

use embedded_graphics::mono_font::{ascii::FONT_6X10, MonoTextStyleBuilder};
use embedded_graphics::pixelcolor::{Rgb565, Rgb888};
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Baseline, Text};
use tracing::{debug, trace};

use crate::command::PriorityHandle;
use crate::config::{ModuleSettings, PanelConfigManager};
use crate::entry::RequestId;
use crate::module::{DisplayModule, ModuleArena, ModuleId, Priority};
use crate::render::{Canvas, ClockOverlay, PanelOutput};
use crate::scheduler::{PanelScheduler, RegisterError};

// ── ScriptedModule ────────────────────────────────────────────────────────────

/// A display module whose whole behaviour comes from its [`ModuleSettings`]:
/// fills the data area with its colour, prints its display name and, if
/// `request_every_ms` is set, asks for screen time on that cadence.
#[derive(Debug)]
pub struct ScriptedModule {
    settings: ModuleSettings,
    handle: Option<PriorityHandle>,
    last_request_ms: Option<u64>,
    next_request_id: u32,
    frames: u64,
}

impl ScriptedModule {
    pub fn new(settings: ModuleSettings) -> Self {
        Self {
            settings,
            handle: None,
            last_request_ms: None,
            next_request_id: 1,
            frames: 0,
        }
    }

    pub fn settings(&self) -> &ModuleSettings {
        &self.settings
    }

    /// Frames ticked since the last activation.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn color(&self) -> Rgb565 {
        let [r, g, b] = self.settings.color;
        Rgb888::new(r, g, b).into()
    }

    fn take_request_id(&mut self) -> RequestId {
        let id = RequestId(self.next_request_id);
        // 0 is the release wildcard.
        self.next_request_id = self.next_request_id.checked_add(1).unwrap_or(1);
        id
    }
}

impl DisplayModule for ScriptedModule {
    fn short_name(&self) -> &str {
        &self.settings.name
    }

    fn display_name(&self) -> &str {
        &self.settings.display_name
    }

    fn draw(&mut self, canvas: &mut Canvas) {
        let color = self.color();
        Rectangle::new(Point::zero(), canvas.size())
            .into_styled(PrimitiveStyle::with_fill(color))
            .draw(canvas)
            .ok();

        let style = MonoTextStyleBuilder::new()
            .font(&FONT_6X10)
            .text_color(Rgb565::BLACK)
            .build();
        Text::with_baseline(
            &self.settings.display_name,
            Point::new(2, 2),
            style,
            Baseline::Top,
        )
        .draw(canvas)
        .ok();
    }

    fn display_duration_ms(&self) -> u64 {
        self.settings.duration_ms
    }

    fn tick(&mut self) {
        self.frames += 1;
    }

    fn periodic_tick(&mut self, now_ms: u64) {
        let every = self.settings.request_every_ms;
        if every == 0 {
            return;
        }
        let Some(last) = self.last_request_ms else {
            self.last_request_ms = Some(now_ms);
            return;
        };
        if now_ms.saturating_sub(last) < every {
            return;
        }
        self.last_request_ms = Some(now_ms);

        let duration = match self.settings.request_duration_ms {
            0 => self.settings.duration_ms,
            ms => ms,
        };
        let priority = self.settings.priority;
        let request_id = self.take_request_id();
        if let Some(handle) = &self.handle {
            let accepted = handle.request(priority, request_id, duration);
            debug!(
                module = %self.settings.name,
                %priority,
                request_id = request_id.0,
                accepted,
                "scripted priority request"
            );
        }
    }

    fn activate(&mut self) {
        self.frames = 0;
    }

    fn can_be_in_playlist(&self) -> bool {
        !self.settings.interrupt_only
    }

    fn wants_fullscreen(&self) -> bool {
        self.settings.fullscreen
    }

    fn priority(&self) -> Priority {
        self.settings.priority
    }

    fn attach(&mut self, handle: PriorityHandle) {
        self.handle = Some(handle);
    }
}

/// Build one [`ScriptedModule`] per configured module, in file order, and
/// register each with the scheduler.
pub fn populate(
    config: &PanelConfigManager,
    modules: &mut ModuleArena,
    scheduler: &mut PanelScheduler,
) -> Result<Vec<ModuleId>, RegisterError> {
    let mut ids = Vec::with_capacity(config.get_all_modules().len());
    for settings in config.get_all_modules() {
        let id = modules.insert(ScriptedModule::new(settings.clone()));
        scheduler.register_with_config(modules, id, config)?;
        ids.push(id);
    }
    Ok(ids)
}

// ── TextClock ─────────────────────────────────────────────────────────────────

/// `HH:MM:SS` (UTC) in the time area.
#[derive(Debug)]
pub struct TextClock {
    now: SystemTime,
    color: Rgb565,
}

impl TextClock {
    pub fn new(color: Rgb565) -> Self {
        Self {
            now: UNIX_EPOCH,
            color,
        }
    }

    pub fn text(&self) -> String {
        let secs = self
            .now
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
            % 86_400;
        format!("{:02}:{:02}:{:02}", secs / 3_600, secs / 60 % 60, secs % 60)
    }
}

impl Default for TextClock {
    fn default() -> Self {
        Self::new(Rgb565::WHITE)
    }
}

impl ClockOverlay for TextClock {
    fn set_time(&mut self, now: SystemTime) {
        self.now = now;
    }

    fn draw(&mut self, canvas: &mut Canvas) {
        canvas.blank();
        let style = MonoTextStyleBuilder::new()
            .font(&FONT_6X10)
            .text_color(self.color)
            .build();
        Text::with_baseline(&self.text(), Point::new(2, 2), style, Baseline::Top)
            .draw(canvas)
            .ok();
    }
}

// ── LogOutput ─────────────────────────────────────────────────────────────────

/// Panel output that only counts frames and logs power transitions.
#[derive(Debug, Default)]
pub struct LogOutput {
    presented: u64,
    fullscreen: u64,
    blanked: u64,
    dark: bool,
}

impl LogOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames presented, fullscreen ones included.
    pub fn presented(&self) -> u64 {
        self.presented
    }

    pub fn fullscreen(&self) -> u64 {
        self.fullscreen
    }

    pub fn blanked(&self) -> u64 {
        self.blanked
    }
}

impl LogOutput {
    fn wake(&mut self) {
        if self.dark {
            debug!("display on");
            self.dark = false;
        }
        self.presented += 1;
    }
}

fn lit_pixels(canvas: &Canvas) -> usize {
    canvas.pixels().iter().filter(|&&p| p != Rgb565::BLACK).count()
}

impl PanelOutput for LogOutput {
    fn present(&mut self, time_area: &Canvas, data_area: &Canvas) {
        self.wake();
        let lit = lit_pixels(data_area);
        trace!(
            frame = self.presented,
            time_area_blank = time_area.is_blank(),
            data_lit_pixels = lit,
            "present"
        );
    }

    fn present_fullscreen(&mut self, full: &Canvas) {
        self.wake();
        self.fullscreen += 1;
        trace!(
            frame = self.presented,
            lit_pixels = lit_pixels(full),
            "present fullscreen"
        );
    }

    fn blank(&mut self) {
        if !self.dark {
            debug!("display off");
            self.dark = true;
        }
        self.blanked += 1;
    }
}
