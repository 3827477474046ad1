//! Card rendering through a headless browser.
//!
//! | Step | Where |
//! |---|---|
//! | **Inject** | [`crate::template::inject_file`] into a temp document |
//! | **Paint + measure** | [`CaptureBackend`]: [`ChromeBackend`] in production |
//! | **Crop** | [`crop_rect`] clamps the container box to the screenshot |
//! | **Save** | PNG plus generation record, both replaced atomically |
//!
//! The module is split into:
//! - **Geometry**: Pure crop math (unit testable)
//! - **Parameters**: [`RenderSettings`] built from the `[render]` config section
//! - **Backend**: [`CaptureBackend`] trait + [`ChromeBackend`]
//! - **Card**: [`CardRenderer`], which runs the steps above for one contact

pub mod backend;
pub mod card;
pub mod chrome;
mod geometry;
mod params;

pub use backend::{CaptureBackend, CaptureError};
pub use card::{CardRenderer, GenerationRecord, RenderError, RenderRequest, RenderedCard};
pub use chrome::ChromeBackend;
pub use geometry::{ContentBox, CropRect, crop_rect};
pub use params::RenderSettings;
