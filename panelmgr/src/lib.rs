/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! panelmgr: display-module scheduler for a small LED matrix panel.
//!
//! The panel is split into a time area (always the clock) and a data area
//! owned by exactly one display module per frame.  Modules rotate through a
//! playlist and may interrupt it with prioritized requests.
//!
//! ```text
//! lib.rs
//! ├── module      – DisplayModule trait, Priority, ModuleArena
//! ├── entry       – catalog / playlist / interrupt records, RequestId
//! ├── command     – PriorityHandle + command channel into the scheduler
//! ├── scheduler/  – PanelScheduler: catalog, playlist, interrupt queue
//! ├── render      – Canvas, clock/power/output seams, Renderer
//! ├── config/     – YAML panel configuration
//! └── demo        – configurable modules and log output for the simulator
//! ```

pub mod command;
pub mod config;
pub mod demo;
pub mod entry;
pub mod module;
pub mod render;
pub mod scheduler;
