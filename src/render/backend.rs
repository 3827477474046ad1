//! Capture backend trait and its errors.
//!
//! A [`CaptureBackend`] turns an HTML document on disk into a full-viewport
//! PNG screenshot plus the content container's [`ContentBox`]. Cropping and
//! saving happen afterwards in [`CardRenderer`](super::card::CardRenderer),
//! so a backend only has to drive a browser.
//!
//! The production implementation is
//! [`ChromeBackend`](super::chrome::ChromeBackend).

use super::geometry::ContentBox;
use super::params::RenderSettings;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Browser error: {0}")]
    Browser(String),
    #[error("Content container {selector:?} did not appear within {timeout:?}")]
    ContainerTimeout { selector: String, timeout: Duration },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait CaptureBackend: Sync {
    /// Paint `document`, write a full-viewport PNG to `screenshot`, and
    /// return the bounding box of `settings.container_selector`.
    ///
    /// Any browser process started here must be gone when this returns,
    /// on success and on failure.
    fn capture(
        &self,
        document: &Path,
        screenshot: &Path,
        settings: &RenderSettings,
    ) -> Result<ContentBox, CaptureError>;
}
