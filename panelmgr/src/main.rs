/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use clap::Parser;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use panelmgr::config::PanelConfigManager;
use panelmgr::demo::{self, LogOutput, TextClock};
use panelmgr::module::ModuleArena;
use panelmgr::render::{PanelGeometry, RenderOutcome, Renderer};
use panelmgr::scheduler::PanelScheduler;

// ── CLI argument definition ───────────────────────────────────────────────────

/// Panel manager simulator: runs the display-module scheduler against
/// configured demo modules and logs who owns the screen.
///
/// Example:
///   RUST_LOG=panelmgr=debug panelmgr -c panelmgr/config/panel.yaml -n 600
#[derive(Debug, Parser)]
#[command(
    name = "panelmgr",
    about = "LED panel display-module scheduler (simulator)",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML panel configuration file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Stop after this many frames (0 = run until Ctrl-C).
    #[arg(short = 'n', long = "frames", default_value_t = 0)]
    frames: u64,

    /// Override the frame interval from the configuration file.
    #[arg(short = 'i', long = "frame-ms")]
    frame_ms: Option<u64>,

    /// Simulate the presence sensor switching the display off after this
    /// many seconds.
    #[arg(long = "sleep-after")]
    sleep_after_secs: Option<u64>,

    /// Print the scheduler status as YAML on exit.
    #[arg(long = "dump-status", default_value_t = false)]
    dump_status: bool,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!(
        config      = ?cli.config,
        frames      = cli.frames,
        frame_ms    = ?cli.frame_ms,
        sleep_after = ?cli.sleep_after_secs,
        "panelmgr starting up"
    );

    // ── Load panel configuration ──────────────────────────────────────────────
    let mut config = PanelConfigManager::new();

    match &cli.config {
        Some(path) => {
            info!("Loading panel configuration from: {}", path.display());
            if let Err(e) = config.load_from_file(path) {
                error!("Failed to load panel configuration: {:#}", e);
                process::exit(1);
            }
        }
        None => {
            warn!("No panel configuration file provided, only the clock will be shown");
        }
    }

    let frame_ms = cli.frame_ms.unwrap_or_else(|| config.frame_interval_ms());
    if frame_ms == 0 {
        error!("Frame interval must be greater than zero");
        process::exit(1);
    }

    // ── Build modules and scheduler ───────────────────────────────────────────
    let mut modules = ModuleArena::new();
    let mut scheduler = PanelScheduler::new();

    if let Err(e) = demo::populate(&config, &mut modules, &mut scheduler) {
        error!("Failed to register modules: {}", e);
        process::exit(1);
    }
    info!(
        registered = scheduler.catalog().len(),
        playlist = scheduler.playlist().len(),
        "Modules ready"
    );

    let power = Arc::new(AtomicBool::new(true));
    if let Some(secs) = cli.sleep_after_secs {
        let power = Arc::clone(&power);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            info!("Presence timeout, switching display off");
            power.store(false, Ordering::Release);
        });
    }

    let mut renderer = Renderer::new(
        PanelGeometry::default(),
        TextClock::default(),
        Arc::clone(&power),
        LogOutput::new(),
    );

    // ── Frame loop ────────────────────────────────────────────────────────────
    let start = Instant::now();
    let mut interval = tokio::time::interval(Duration::from_millis(frame_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut frame: u64 = 0;
    let mut last_owner = None;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, shutting down");
                break;
            }
        }

        let now_ms = start.elapsed().as_millis() as u64;
        let report = scheduler.tick(&mut modules, now_ms);
        let outcome = renderer.render(&scheduler, &mut modules, SystemTime::now());

        if report.owner != last_owner {
            let name = report
                .owner
                .and_then(|id| modules.get(id))
                .map_or("<none>", |m| m.short_name());
            info!(
                frame,
                now_ms,
                mode = ?report.mode,
                owner = name,
                "Screen owner changed"
            );
            last_owner = report.owner;
        }
        if outcome == RenderOutcome::Blanked {
            debug!(frame, "Frame blanked");
        }

        frame += 1;
        if cli.frames != 0 && frame >= cli.frames {
            break;
        }
    }

    info!(
        frames = frame,
        presented = renderer.output().presented(),
        fullscreen = renderer.output().fullscreen(),
        blanked = renderer.output().blanked(),
        "panelmgr stopped"
    );

    if cli.dump_status {
        match serde_yaml::to_string(&scheduler.status()) {
            Ok(yaml) => println!("{yaml}"),
            Err(e) => error!("Failed to serialize scheduler status: {}", e),
        }
    }
}
