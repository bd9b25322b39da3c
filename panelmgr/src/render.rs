/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Frame rendering: the canvases, the collaborators that surround the
//! scheduler, and the [`Renderer`] that ties them together once per frame.
//!
//! ```text
//!  ┌──────────── time area ────────────┐   ClockOverlay (always, outside rotation)
//!  ├──────────── data area ────────────┤   owner's draw() or blank
//!  └───────────────────────────────────┘
//!    (fullscreen owner: one canvas over both areas, no clock)
//!          │ present() / present_fullscreen() / blank()
//!          ▼
//!     PanelOutput  (HUB75 driver, SPI link, log sink, ...)
//! ```
//!
//! The scheduler decides *who* may draw ([`PanelScheduler::owner`]); the
//! renderer makes sure exactly that module and nobody else writes into the
//! data area, so the canvas needs no lock.

use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::module::{ModuleArena, ModuleId};
use crate::scheduler::PanelScheduler;

// ── Geometry ──────────────────────────────────────────────────────────────────

/// Pixel layout of the panel: a clock strip on top of the data area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelGeometry {
    pub width: u32,
    pub time_area_height: u32,
    pub data_area_height: u32,
}

impl Default for PanelGeometry {
    /// Three chained 64×32 HUB75 tiles, two rows high.
    fn default() -> Self {
        Self {
            width: 192,
            time_area_height: 30,
            data_area_height: 66,
        }
    }
}

// ── Canvas ────────────────────────────────────────────────────────────────────

/// Owned RGB565 framebuffer.
///
/// Implements `embedded-graphics`' [`DrawTarget`], so modules draw with the
/// usual primitives.  Pixels outside the canvas are clipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<Rgb565>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgb565::BLACK; (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb565> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get((y * self.width + x) as usize).copied()
    }

    /// Row-major pixel buffer, e.g. for streaming the frame elsewhere.
    pub fn pixels(&self) -> &[Rgb565] {
        &self.pixels
    }

    pub fn blank(&mut self) {
        self.pixels.fill(Rgb565::BLACK);
    }

    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(|p| *p == Rgb565::BLACK)
    }
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for Canvas {
    type Color = Rgb565;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            let (x, y) = (point.x as u32, point.y as u32);
            if x < self.width && y < self.height {
                self.pixels[(y * self.width + x) as usize] = color;
            }
        }
        Ok(())
    }
}

// ── Collaborators ─────────────────────────────────────────────────────────────

/// The fixed clock strip, drawn every frame outside the rotation.
pub trait ClockOverlay {
    fn set_time(&mut self, now: SystemTime);
    fn tick(&mut self) {}
    fn draw(&mut self, canvas: &mut Canvas);
}

/// "Is the physical display allowed to show content right now?"
///
/// Sourced from the presence sensor in the real panel.
pub trait DisplayPower {
    fn is_display_on(&self) -> bool;
}

impl DisplayPower for AtomicBool {
    fn is_display_on(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}

impl DisplayPower for Arc<AtomicBool> {
    fn is_display_on(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}

/// A display that is never switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOn;

impl DisplayPower for AlwaysOn {
    fn is_display_on(&self) -> bool {
        true
    }
}

/// The physical output (HUB75 DMA, SPI link to a secondary controller, ...).
pub trait PanelOutput {
    /// Push both areas to the panel.
    fn present(&mut self, time_area: &Canvas, data_area: &Canvas);

    /// Push a frame drawn by a fullscreen module.  `full` covers the whole
    /// panel, time area rows first.
    fn present_fullscreen(&mut self, full: &Canvas);

    /// Switch the panel dark.
    fn blank(&mut self);
}

// ── Renderer ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Display power is off; nothing was drawn.
    Blanked,
    /// Frame presented; `owner` drew the data area (`None` = left blank),
    /// or the whole panel when `fullscreen` is set.
    Drawn {
        owner: Option<ModuleId>,
        fullscreen: bool,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameCopyError {
    #[error("frame buffer holds {got} pixels, {needed} needed")]
    BufferTooSmall { needed: usize, got: usize },
}

/// Produces one frame per call from the scheduler's ownership decision.
pub struct Renderer<C, P, O> {
    clock: C,
    power: P,
    output: O,
    time_area: Canvas,
    data_area: Canvas,
    full_area: Canvas,
    fullscreen: bool,
}

impl<C, P, O> Renderer<C, P, O>
where
    C: ClockOverlay,
    P: DisplayPower,
    O: PanelOutput,
{
    pub fn new(geometry: PanelGeometry, clock: C, power: P, output: O) -> Self {
        Self {
            clock,
            power,
            output,
            time_area: Canvas::new(geometry.width, geometry.time_area_height),
            data_area: Canvas::new(geometry.width, geometry.data_area_height),
            full_area: Canvas::new(
                geometry.width,
                geometry.time_area_height + geometry.data_area_height,
            ),
            fullscreen: false,
        }
    }

    /// Render the next frame.
    ///
    /// The clock always gets the time and its tick.  When the display power
    /// signal is off nothing is drawn and the output is blanked.
    ///
    /// If the scheduler's owner [wants fullscreen], the full-panel canvas is
    /// cleared, the owner draws into it and the clock is not drawn.
    /// Otherwise the clock draws the time area, the data area is cleared and
    /// the owner, if any, draws into it.
    ///
    /// [wants fullscreen]: crate::module::DisplayModule::wants_fullscreen
    pub fn render(
        &mut self,
        scheduler: &PanelScheduler,
        modules: &mut ModuleArena,
        now: SystemTime,
    ) -> RenderOutcome {
        self.clock.set_time(now);
        self.clock.tick();

        if !self.power.is_display_on() {
            self.output.blank();
            return RenderOutcome::Blanked;
        }

        let owner = scheduler.owner();
        let fullscreen = owner
            .and_then(|id| modules.get(id))
            .is_some_and(|m| m.wants_fullscreen());
        if fullscreen != self.fullscreen {
            debug!(fullscreen, "layout changed");
            self.fullscreen = fullscreen;
        }

        if fullscreen {
            self.full_area.blank();
            draw_owner(modules, owner, &mut self.full_area);
            self.output.present_fullscreen(&self.full_area);
        } else {
            self.clock.draw(&mut self.time_area);
            self.data_area.blank();
            draw_owner(modules, owner, &mut self.data_area);
            self.output.present(&self.time_area, &self.data_area);
        }
        RenderOutcome::Drawn { owner, fullscreen }
    }

    /// Copy the last drawn frame into `dest` as one full-panel image, row
    /// major, and return the number of pixels written.
    ///
    /// After a fullscreen frame this is the full-panel canvas; otherwise the
    /// time area rows followed by the data area rows.  Frames skipped while
    /// the display was off leave the previous frame in place.  Takes `&self`,
    /// so a streaming task sharing the renderer behind a lock never sees a
    /// half-drawn frame.
    pub fn copy_frame(&self, dest: &mut [Rgb565]) -> Result<usize, FrameCopyError> {
        let needed = self.frame_len();
        if dest.len() < needed {
            return Err(FrameCopyError::BufferTooSmall {
                needed,
                got: dest.len(),
            });
        }

        if self.fullscreen {
            dest[..needed].copy_from_slice(self.full_area.pixels());
        } else {
            let split = self.time_area.pixels().len();
            dest[..split].copy_from_slice(self.time_area.pixels());
            dest[split..needed].copy_from_slice(self.data_area.pixels());
        }
        Ok(needed)
    }

    /// Pixels in one full-panel frame.
    pub fn frame_len(&self) -> usize {
        self.full_area.pixels().len()
    }

    /// Whether the last drawn frame was a fullscreen one.
    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn time_area(&self) -> &Canvas {
        &self.time_area
    }

    pub fn data_area(&self) -> &Canvas {
        &self.data_area
    }

    pub fn full_area(&self) -> &Canvas {
        &self.full_area
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    pub fn power(&self) -> &P {
        &self.power
    }
}

fn draw_owner(modules: &mut ModuleArena, owner: Option<ModuleId>, canvas: &mut Canvas) {
    let Some(id) = owner else {
        return;
    };
    match modules.get_mut(id) {
        Some(module) => {
            trace!(module = %module.short_name(), "draw");
            module.draw(canvas);
        }
        None => warn!(module = %id, "owner is missing from the module arena"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::DisplayModule;
    use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};

    #[test]
    fn canvas_starts_black() {
        let c = Canvas::new(8, 4);
        assert_eq!(c.size(), Size::new(8, 4));
        assert_eq!(c.pixels().len(), 32);
        assert!(c.is_blank());
    }

    #[test]
    fn canvas_accepts_embedded_graphics_primitives() {
        let mut c = Canvas::new(8, 4);
        Rectangle::new(Point::new(2, 1), Size::new(3, 2))
            .into_styled(PrimitiveStyle::with_fill(Rgb565::RED))
            .draw(&mut c)
            .unwrap();

        assert_eq!(c.pixel(2, 1), Some(Rgb565::RED));
        assert_eq!(c.pixel(4, 2), Some(Rgb565::RED));
        assert_eq!(c.pixel(5, 2), Some(Rgb565::BLACK));
        assert_eq!(c.pixel(8, 0), None);
    }

    #[test]
    fn canvas_clips_out_of_bounds_pixels() {
        let mut c = Canvas::new(4, 4);
        c.draw_iter([
            Pixel(Point::new(-1, 0), Rgb565::GREEN),
            Pixel(Point::new(0, 9), Rgb565::GREEN),
            Pixel(Point::new(3, 3), Rgb565::GREEN),
        ])
        .unwrap();

        assert_eq!(c.pixels().iter().filter(|p| **p == Rgb565::GREEN).count(), 1);
        c.blank();
        assert!(c.is_blank());
    }

    // ── Renderer ──────────────────────────────────────────────────────────────

    #[derive(Default)]
    struct CountingClock {
        ticks: u32,
        draws: u32,
    }

    impl ClockOverlay for CountingClock {
        fn set_time(&mut self, _now: SystemTime) {}
        fn tick(&mut self) {
            self.ticks += 1;
        }
        fn draw(&mut self, canvas: &mut Canvas) {
            self.draws += 1;
            canvas.clear(Rgb565::WHITE).unwrap();
        }
    }

    #[derive(Default)]
    struct RecordingOutput {
        presented: u32,
        fullscreen: u32,
        blanked: u32,
    }

    impl PanelOutput for RecordingOutput {
        fn present(&mut self, _time_area: &Canvas, _data_area: &Canvas) {
            self.presented += 1;
        }
        fn present_fullscreen(&mut self, _full: &Canvas) {
            self.fullscreen += 1;
        }
        fn blank(&mut self) {
            self.blanked += 1;
        }
    }

    struct Solid(Rgb565);

    impl DisplayModule for Solid {
        fn short_name(&self) -> &str {
            "solid"
        }
        fn draw(&mut self, canvas: &mut Canvas) {
            canvas.clear(self.0).unwrap();
        }
        fn display_duration_ms(&self) -> u64 {
            1_000
        }
    }

    /// Fills whatever canvas it gets; fullscreen while `wide` is set.
    struct Banner {
        color: Rgb565,
        wide: Arc<AtomicBool>,
    }

    impl DisplayModule for Banner {
        fn short_name(&self) -> &str {
            "banner"
        }
        fn draw(&mut self, canvas: &mut Canvas) {
            canvas.clear(self.color).unwrap();
        }
        fn display_duration_ms(&self) -> u64 {
            1_000
        }
        fn wants_fullscreen(&self) -> bool {
            self.wide.load(Ordering::Acquire)
        }
    }

    fn small() -> PanelGeometry {
        PanelGeometry {
            width: 4,
            time_area_height: 2,
            data_area_height: 3,
        }
    }

    #[test]
    fn owner_draws_into_the_data_area() {
        let mut modules = ModuleArena::new();
        let id = modules.insert(Solid(Rgb565::BLUE));
        let mut sched = PanelScheduler::new();
        sched.register(&mut modules, id, false, false).unwrap();
        sched.tick(&mut modules, 0);

        let mut r = Renderer::new(small(), CountingClock::default(), AlwaysOn, RecordingOutput::default());
        let outcome = r.render(&sched, &mut modules, SystemTime::UNIX_EPOCH);

        assert_eq!(outcome, RenderOutcome::Drawn { owner: Some(id), fullscreen: false });
        assert_eq!(r.data_area().pixel(0, 0), Some(Rgb565::BLUE));
        assert_eq!(r.time_area().pixel(0, 0), Some(Rgb565::WHITE));
        assert_eq!(r.output().presented, 1);
    }

    #[test]
    fn no_owner_leaves_the_data_area_blank() {
        let mut modules = ModuleArena::new();
        let sched = PanelScheduler::new();
        let mut r = Renderer::new(small(), CountingClock::default(), AlwaysOn, RecordingOutput::default());

        let outcome = r.render(&sched, &mut modules, SystemTime::UNIX_EPOCH);
        assert_eq!(outcome, RenderOutcome::Drawn { owner: None, fullscreen: false });
        assert!(r.data_area().is_blank());
        assert_eq!(r.output().presented, 1);
    }

    #[test]
    fn display_off_blanks_output_and_skips_drawing() {
        let mut modules = ModuleArena::new();
        let id = modules.insert(Solid(Rgb565::BLUE));
        let mut sched = PanelScheduler::new();
        sched.register(&mut modules, id, false, false).unwrap();
        sched.tick(&mut modules, 0);

        let power = Arc::new(AtomicBool::new(false));
        let mut r = Renderer::new(
            small(),
            CountingClock::default(),
            Arc::clone(&power),
            RecordingOutput::default(),
        );

        let outcome = r.render(&sched, &mut modules, SystemTime::UNIX_EPOCH);
        assert_eq!(outcome, RenderOutcome::Blanked);
        assert!(r.data_area().is_blank(), "owner must not draw while off");
        assert_eq!(r.output().blanked, 1);
        assert_eq!(r.output().presented, 0);
        assert_eq!(r.clock.ticks, 1, "clock keeps time while dark");
        assert_eq!(r.clock.draws, 0);

        power.store(true, Ordering::Release);
        r.render(&sched, &mut modules, SystemTime::UNIX_EPOCH);
        assert_eq!(r.data_area().pixel(1, 1), Some(Rgb565::BLUE));
    }

    fn banner_setup(wide: bool) -> (ModuleArena, PanelScheduler, ModuleId, Arc<AtomicBool>) {
        let flag = Arc::new(AtomicBool::new(wide));
        let mut modules = ModuleArena::new();
        let id = modules.insert(Banner {
            color: Rgb565::GREEN,
            wide: Arc::clone(&flag),
        });
        let mut sched = PanelScheduler::new();
        sched.register(&mut modules, id, false, false).unwrap();
        sched.tick(&mut modules, 0);
        (modules, sched, id, flag)
    }

    #[test]
    fn fullscreen_owner_covers_the_panel_and_hides_the_clock() {
        let (mut modules, sched, id, wide) = banner_setup(true);
        let mut r = Renderer::new(small(), CountingClock::default(), AlwaysOn, RecordingOutput::default());

        let outcome = r.render(&sched, &mut modules, SystemTime::UNIX_EPOCH);
        assert_eq!(outcome, RenderOutcome::Drawn { owner: Some(id), fullscreen: true });
        assert!(r.is_fullscreen());
        assert_eq!(r.full_area().size(), Size::new(4, 5));
        assert!(r.full_area().pixels().iter().all(|p| *p == Rgb565::GREEN));
        assert!(r.data_area().is_blank(), "split canvases untouched");
        assert_eq!(r.clock.draws, 0);
        assert_eq!(r.clock.ticks, 1, "clock keeps time in fullscreen");
        assert_eq!(r.output().fullscreen, 1);
        assert_eq!(r.output().presented, 0);

        // Back to the split layout as soon as the module lets go.
        wide.store(false, Ordering::Release);
        let outcome = r.render(&sched, &mut modules, SystemTime::UNIX_EPOCH);
        assert_eq!(outcome, RenderOutcome::Drawn { owner: Some(id), fullscreen: false });
        assert!(!r.is_fullscreen());
        assert_eq!(r.clock.draws, 1);
        assert_eq!(r.data_area().pixel(0, 0), Some(Rgb565::GREEN));
        assert_eq!(r.output().presented, 1);
    }

    #[test]
    fn copy_frame_stacks_time_and_data_areas() {
        let (mut modules, sched, _, _) = banner_setup(false);
        let mut r = Renderer::new(small(), CountingClock::default(), AlwaysOn, RecordingOutput::default());
        r.render(&sched, &mut modules, SystemTime::UNIX_EPOCH);

        let mut frame = vec![Rgb565::BLACK; r.frame_len() + 3];
        assert_eq!(r.copy_frame(&mut frame), Ok(20));
        // 4 wide: two clock rows, then three data rows.
        assert!(frame[..8].iter().all(|p| *p == Rgb565::WHITE));
        assert!(frame[8..20].iter().all(|p| *p == Rgb565::GREEN));
        assert!(frame[20..].iter().all(|p| *p == Rgb565::BLACK), "tail untouched");
    }

    #[test]
    fn copy_frame_after_fullscreen_returns_the_full_canvas() {
        let (mut modules, sched, _, _) = banner_setup(true);
        let mut r = Renderer::new(small(), CountingClock::default(), AlwaysOn, RecordingOutput::default());
        r.render(&sched, &mut modules, SystemTime::UNIX_EPOCH);

        let mut frame = vec![Rgb565::BLACK; r.frame_len()];
        assert_eq!(r.copy_frame(&mut frame), Ok(20));
        assert_eq!(frame.as_slice(), r.full_area().pixels());
        assert!(frame.iter().all(|p| *p == Rgb565::GREEN));
    }

    #[test]
    fn copy_frame_rejects_a_short_buffer() {
        let r = Renderer::new(small(), CountingClock::default(), AlwaysOn, RecordingOutput::default());
        let mut frame = vec![Rgb565::RED; 19];
        assert_eq!(
            r.copy_frame(&mut frame),
            Err(FrameCopyError::BufferTooSmall { needed: 20, got: 19 })
        );
        assert!(frame.iter().all(|p| *p == Rgb565::RED));
    }
}
