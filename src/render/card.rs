//! Card rendering: template → injected document → screenshot → cropped PNG.
//!
//! One [`CardRenderer::render`] call runs the whole pipeline for one contact:
//!
//! 1. Resolve the template data and inject it into `template_<n>.html`.
//!    The injected copy is a hidden temp file next to the template so that
//!    relative stylesheet and image URLs still resolve.
//! 2. Hand the document to the [`CaptureBackend`] for a full-viewport
//!    screenshot and the content container's box.
//! 3. Crop the screenshot to the box (see [`crop_rect`]) and write
//!    `<image_dir>/<contact>.png`.
//! 4. Write the generation record `<image_dir>/<contact>.json`.
//!
//! Both temp files are removed on every path. A failed render writes no
//! image and no record; an earlier card for the same contact stays intact
//! because outputs are replaced atomically.

use super::backend::{CaptureBackend, CaptureError};
use super::chrome::ChromeBackend;
use super::geometry::{ContentBox, CropRect, crop_rect};
use super::params::RenderSettings;
use crate::persist::write_atomic;
use crate::store::{now_local, validate_contact_id};
use crate::template::{ResolvedData, TemplateData, TemplateError, inject_file, template_path};
use image::DynamicImage;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("Capture failed: {0}")]
    Capture(#[from] CaptureError),
    #[error("Invalid contact id {0:?}")]
    InvalidContactId(String),
    #[error("Content container has no visible area ({bbox:?} on a {width}x{height} screenshot)")]
    EmptyCrop {
        bbox: ContentBox,
        width: u32,
        height: u32,
    },
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One card to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub contact_id: String,
    pub template_number: u32,
    pub data: TemplateData,
}

/// Sidecar written next to each card image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub template_number: u32,
    pub image_path: String,
    pub generation_time: String,
    pub template_data: ResolvedData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedCard {
    pub image_path: PathBuf,
    pub record_path: PathBuf,
    pub record: GenerationRecord,
    pub crop: CropRect,
}

pub struct CardRenderer<B: CaptureBackend = ChromeBackend> {
    backend: B,
    settings: RenderSettings,
    template_dir: PathBuf,
    image_dir: PathBuf,
}

impl CardRenderer<ChromeBackend> {
    pub fn new(
        settings: RenderSettings,
        template_dir: impl Into<PathBuf>,
        image_dir: impl Into<PathBuf>,
    ) -> Self {
        Self::with_backend(ChromeBackend::new(), settings, template_dir, image_dir)
    }
}

impl<B: CaptureBackend> CardRenderer<B> {
    pub fn with_backend(
        backend: B,
        settings: RenderSettings,
        template_dir: impl Into<PathBuf>,
        image_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            backend,
            settings,
            template_dir: template_dir.into(),
            image_dir: image_dir.into(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn template_dir(&self) -> &Path {
        &self.template_dir
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    pub fn image_path(&self, contact_id: &str) -> PathBuf {
        self.image_dir.join(format!("{contact_id}.png"))
    }

    pub fn record_path(&self, contact_id: &str) -> PathBuf {
        self.image_dir.join(format!("{contact_id}.json"))
    }

    pub fn render(&self, request: &RenderRequest) -> Result<RenderedCard, RenderError> {
        let contact_id = request.contact_id.as_str();
        validate_contact_id(contact_id)
            .map_err(|_| RenderError::InvalidContactId(contact_id.to_string()))?;

        let template = template_path(&self.template_dir, request.template_number);
        if !template.is_file() {
            return Err(TemplateError::NotFound(template).into());
        }
        let data = request.data.resolve();

        let document = tempfile::Builder::new()
            .prefix(".render-")
            .suffix(".html")
            .tempfile_in(&self.template_dir)?;
        inject_file(&template, &data, document.path())?;
        let screenshot = tempfile::Builder::new()
            .prefix("greetcard-")
            .suffix(".png")
            .tempfile()?;

        info!(
            contact = contact_id,
            template = request.template_number,
            "Rendering card"
        );
        let bbox = self
            .backend
            .capture(document.path(), screenshot.path(), &self.settings)?;

        let full = image::open(screenshot.path())?;
        let (width, height) = (full.width(), full.height());
        let crop = crop_rect(&bbox, (width, height)).ok_or(RenderError::EmptyCrop {
            bbox,
            width,
            height,
        })?;
        debug!(?bbox, ?crop, "Cropping {}x{} screenshot", width, height);
        let card = full.crop_imm(crop.x, crop.y, crop.width, crop.height);

        let image_path = self.image_path(contact_id);
        write_atomic(&image_path, &encode_png(&card)?)?;

        let record = GenerationRecord {
            template_number: request.template_number,
            image_path: image_path.to_string_lossy().into_owned(),
            generation_time: now_local(),
            template_data: data,
        };
        let record_path = self.record_path(contact_id);
        write_atomic(&record_path, serde_json::to_string_pretty(&record)?.as_bytes())?;

        Ok(RenderedCard {
            image_path,
            record_path,
            record,
            crop,
        })
    }
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut bytes = Vec::new();
    let encoder =
        PngEncoder::new_with_quality(&mut bytes, CompressionType::Best, FilterType::Adaptive);
    img.write_with_encoder(encoder)?;
    Ok(bytes)
}
