//! Parameters for a render call.
//!
//! [`RenderSettings`] describes *how* the browser paints a card; it is built
//! from the `[render]` config section and shared read-only by every render.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSettings {
    /// Browser window size in CSS pixels.
    pub viewport: (u32, u32),
    /// How long to wait for the content container to exist.
    pub element_timeout: Duration,
    /// Fixed delay after the container appears, before measuring.
    pub settle_delay: Duration,
    /// CSS selector of the content container.
    pub container_selector: String,
    /// Chrome binary; `None` lets headless_chrome find one.
    pub chrome_path: Option<PathBuf>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            viewport: (1920, 1080),
            element_timeout: Duration::from_secs(10),
            settle_delay: Duration::from_millis(2000),
            container_selector: ".card-container".to_string(),
            chrome_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_config_defaults() {
        let from_config = crate::config::RenderConfig::default().settings();
        assert_eq!(RenderSettings::default(), from_config);
    }
}
