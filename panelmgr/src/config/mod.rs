//! Panel configuration loading and management.
//!
//! The configuration collaborator decides which modules are hidden or
//! disabled and how long they run.  The scheduler only sees the result at
//! registration time (see [`PanelScheduler::register_with_config`]).
//!
//! The expected YAML structure is:
//! ```yaml
//! frame_interval_ms: 50
//! modules:
//!   - name: weather
//!     display_name: "Wetter"
//!     duration_ms: 10000
//!     color: [0, 0, 255]
//!   - name: calendar_alert
//!     interrupt_only: true
//!     priority: high
//!     request_every_ms: 30000
//!     request_duration_ms: 5000
//! ```
//!
//! List order is registration order, which is playlist order.
//!
//! [`PanelScheduler::register_with_config`]: crate::scheduler::PanelScheduler::register_with_config

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::module::Priority;

/// Frame cadence used when the file does not set one.
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 50;

/// Runtime budget used when a module entry does not set one.
pub const DEFAULT_DURATION_MS: u64 = 10_000;

// ── Private YAML deserialization types ────────────────────────────────────────

/// Top-level wrapper that maps directly onto the YAML file layout.
#[derive(Debug, Deserialize)]
struct PanelConfigFile {
    #[serde(default = "default_frame_interval_ms")]
    frame_interval_ms: u64,
    #[serde(default)]
    modules: Vec<ModuleSettingsEntry>,
}

/// Per-module fields as they appear in the YAML file.  Only `name` is
/// required.
#[derive(Debug, Deserialize)]
struct ModuleSettingsEntry {
    name: String,
    display_name: Option<String>,
    #[serde(default)]
    hidden: bool,
    #[serde(default)]
    disabled: bool,
    #[serde(default = "default_duration_ms")]
    duration_ms: u64,
    #[serde(default)]
    priority: Priority,
    color: Option<[u8; 3]>,
    #[serde(default)]
    interrupt_only: bool,
    #[serde(default)]
    request_every_ms: u64,
    #[serde(default)]
    request_duration_ms: u64,
    #[serde(default)]
    fullscreen: bool,
}

fn default_frame_interval_ms() -> u64 {
    DEFAULT_FRAME_INTERVAL_MS
}

fn default_duration_ms() -> u64 {
    DEFAULT_DURATION_MS
}

// ── Public data structures ────────────────────────────────────────────────────

/// Settings for a single display module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSettings {
    pub name: String,
    pub display_name: String,
    pub hidden: bool,
    pub disabled: bool,
    pub duration_ms: u64,
    /// Priority the module uses when it asks for screen time.
    pub priority: Priority,
    /// RGB888 fill colour of the simulator's demo module.
    pub color: [u8; 3],
    /// Never joins the rotation; only shows up through requests.
    pub interrupt_only: bool,
    /// Simulator: how often the module asks for screen time (0 = never).
    pub request_every_ms: u64,
    /// Simulator: duration passed with each request.
    pub request_duration_ms: u64,
    /// Draw over the whole panel, clock strip included, while owning it.
    pub fullscreen: bool,
}

impl ModuleSettings {
    /// Settings for a module the configuration does not mention: visible,
    /// enabled, default duration.
    pub fn default_settings(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            hidden: false,
            disabled: false,
            duration_ms: DEFAULT_DURATION_MS,
            priority: Priority::Normal,
            color: [255, 255, 255],
            interrupt_only: false,
            request_every_ms: 0,
            request_duration_ms: 0,
            fullscreen: false,
        }
    }

    /// Hidden either explicitly or because the module is interrupt-only.
    pub fn effective_hidden(&self) -> bool {
        self.hidden || self.interrupt_only
    }
}

// ── PanelConfigManager ────────────────────────────────────────────────────────

/// Loads and manages the panel configuration from a YAML file.
#[derive(Debug)]
pub struct PanelConfigManager {
    frame_interval_ms: u64,

    /// Module settings in file order.
    modules: Vec<ModuleSettings>,

    /// Set to `true` after a successful [`load_from_file`](Self::load_from_file).
    loaded: bool,
}

impl Default for PanelConfigManager {
    fn default() -> Self {
        Self {
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
            modules: Vec::new(),
            loaded: false,
        }
    }
}

impl PanelConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `path` and replaces all previously loaded settings.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, the YAML is invalid,
    /// the frame interval is zero or two modules share a name.
    pub fn load_from_file(&mut self, path: &Path) -> Result<()> {
        info!("Loading panel configuration from: {}", path.display());

        self.modules.clear();
        self.frame_interval_ms = DEFAULT_FRAME_INTERVAL_MS;
        self.loaded = false;

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open configuration file: {}", path.display()))?;

        self.load_from_str(&content)
            .with_context(|| format!("Invalid panel configuration: {}", path.display()))
    }

    /// Same as [`load_from_file`](Self::load_from_file) for an in-memory document.
    pub fn load_from_str(&mut self, content: &str) -> Result<()> {
        self.modules.clear();
        self.loaded = false;

        let file: PanelConfigFile =
            serde_yaml::from_str(content).context("Failed to parse YAML")?;

        if file.frame_interval_ms == 0 {
            bail!("frame_interval_ms must be greater than zero");
        }

        let mut seen = HashSet::new();
        let mut modules = Vec::with_capacity(file.modules.len());
        for entry in file.modules {
            if !seen.insert(entry.name.clone()) {
                bail!("module '{}' is configured twice", entry.name);
            }

            let settings = ModuleSettings {
                display_name: entry.display_name.unwrap_or_else(|| entry.name.clone()),
                name: entry.name,
                hidden: entry.hidden,
                disabled: entry.disabled,
                duration_ms: entry.duration_ms,
                priority: entry.priority,
                color: entry.color.unwrap_or([255, 255, 255]),
                interrupt_only: entry.interrupt_only,
                request_every_ms: entry.request_every_ms,
                request_duration_ms: entry.request_duration_ms,
                fullscreen: entry.fullscreen,
            };

            debug!(
                "  Module: {} | hidden: {} | disabled: {} | duration: {}ms | priority: {}",
                settings.name,
                settings.effective_hidden(),
                settings.disabled,
                settings.duration_ms,
                settings.priority,
            );
            modules.push(settings);
        }

        if modules.is_empty() {
            warn!("No modules found in configuration file, the panel will only show the clock");
        }

        self.frame_interval_ms = file.frame_interval_ms;
        self.modules = modules;
        self.loaded = true;

        info!(
            frame_interval_ms = self.frame_interval_ms,
            "Successfully loaded {} module configuration(s)",
            self.modules.len()
        );
        Ok(())
    }

    /// Returns the settings for `name`, or `None` if the file does not
    /// mention the module.
    pub fn get_module_settings(&self, name: &str) -> Option<&ModuleSettings> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Settings for `name`, falling back to [`ModuleSettings::default_settings`].
    pub fn settings_for(&self, name: &str) -> ModuleSettings {
        self.get_module_settings(name)
            .cloned()
            .unwrap_or_else(|| ModuleSettings::default_settings(name))
    }

    /// All configured modules in file order.
    pub fn get_all_modules(&self) -> &[ModuleSettings] {
        &self.modules
    }

    pub fn frame_interval_ms(&self) -> u64 {
        self.frame_interval_ms
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
