//! Application configuration.
//!
//! Handles loading, validating, and merging `greetcard.toml`. Stock defaults
//! are serialized to a TOML table and the user file is merged on top, so a
//! user file only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [paths]
//! ledger_dir = "version_history"   # One <contact>.json ledger per contact
//! image_dir = "generate_img"       # <contact>.png + <contact>.json record
//! template_dir = "template"        # template_<n>.html documents
//!
//! [render]
//! viewport = [1920, 1080]          # Browser window size in CSS pixels
//! element_timeout_secs = 10        # Wait for the content container
//! settle_delay_ms = 2000           # Fixed delay for fonts/layout
//! container_selector = ".card-container"
//! # chrome_path = "/usr/bin/chromium"
//!
//! [card]
//! # year = "2025"                  # Omit for the current year
//! # signature = "小明"             # Omit to sign with the contact's name
//!
//! [processing]
//! # max_processes = 2              # Omit for auto = CPU cores
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::render::RenderSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `greetcard.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Where ledgers, images and templates live.
    pub paths: PathsConfig,
    /// Headless browser settings.
    pub render: RenderConfig,
    /// Defaults injected into every card.
    pub card: CardConfig,
    /// Parallel rendering settings.
    pub processing: ProcessingConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.render.viewport[0] == 0 || self.render.viewport[1] == 0 {
            return Err(ConfigError::Validation(
                "render.viewport values must be non-zero".into(),
            ));
        }
        if self.render.element_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "render.element_timeout_secs must be at least 1".into(),
            ));
        }
        if self.render.container_selector.trim().is_empty() {
            return Err(ConfigError::Validation(
                "render.container_selector must not be empty".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub ledger_dir: PathBuf,
    pub image_dir: PathBuf,
    pub template_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            ledger_dir: PathBuf::from("version_history"),
            image_dir: PathBuf::from("generate_img"),
            template_dir: PathBuf::from("template"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Browser window size `[width, height]` in CSS pixels.
    pub viewport: [u32; 2],
    /// How long to wait for the content container to appear.
    pub element_timeout_secs: u64,
    /// Fixed delay after the container appears, before measuring.
    pub settle_delay_ms: u64,
    /// CSS selector of the element whose box is cropped out.
    pub container_selector: String,
    /// Chrome/Chromium binary. When absent, headless_chrome searches for one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            viewport: [1920, 1080],
            element_timeout_secs: 10,
            settle_delay_ms: 2000,
            container_selector: ".card-container".to_string(),
            chrome_path: None,
        }
    }
}

impl RenderConfig {
    pub fn settings(&self) -> RenderSettings {
        RenderSettings {
            viewport: (self.viewport[0], self.viewport[1]),
            element_timeout: Duration::from_secs(self.element_timeout_secs),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            container_selector: self.container_selector.clone(),
            chrome_path: self.chrome_path.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CardConfig {
    /// Year printed on the card. `None` uses the current local year.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    /// Signature for every card. `None` signs with the contact's name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of cards rendered at once (one browser each).
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(AppConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `path` as a raw TOML value, or `None` if the file doesn't exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Load config from `path`, merged over stock defaults and validated.
///
/// A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match load_raw_config(path)? {
        Some(overlay) => merge_toml(base, overlay),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `greetcard.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# greetcard configuration
# =======================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

[paths]
# Ledger directory: one <contact-id>.json file per contact, holding every
# generated version for that contact.
ledger_dir = "version_history"
# Rendered cards: <contact-id>.png plus a <contact-id>.json generation record.
image_dir = "generate_img"
# Template documents, named template_<n>.html.
template_dir = "template"

[render]
# Browser window size in CSS pixels. The card must fit inside it.
viewport = [1920, 1080]
# Seconds to wait for the content container to appear in the page.
element_timeout_secs = 10
# Fixed delay (ms) after the container appears, so fonts and layout settle.
settle_delay_ms = 2000
# The element whose bounding box becomes the final image.
container_selector = ".card-container"
# Chrome/Chromium binary. Omit to let greetcard search the usual places.
# chrome_path = "/usr/bin/chromium"

[card]
# Year printed on every card. Omit for the current year.
# year = "2025"
# Signature printed on every card. Omit to sign with the contact's name.
# signature = ""

[processing]
# Maximum number of cards rendered in parallel (one browser each).
# Omit for auto-detection (number of CPU cores).
# max_processes = 2
"##
}
