//! Crop geometry. Pure functions, no I/O.

use serde::{Deserialize, Serialize};

/// The content container's bounding box as the page reports it, in CSS
/// pixels, plus the page's device pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContentBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub device_pixel_ratio: f64,
}

/// A crop region in raster pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Scale `bbox` into raster pixels and clamp it to a `raster`-sized image.
///
/// Each edge is scaled by the device pixel ratio, truncated toward zero, and
/// clamped to `[0, width]` / `[0, height]`. A ratio that is not a positive
/// finite number counts as 1. Returns `None` when nothing of the box is left
/// inside the raster.
///
/// ```
/// # use greetcard::render::{ContentBox, CropRect, crop_rect};
/// let bbox = ContentBox { left: 10.0, top: 20.0, width: 50.0, height: 30.0, device_pixel_ratio: 2.0 };
/// assert_eq!(
///     crop_rect(&bbox, (400, 200)),
///     Some(CropRect { x: 20, y: 40, width: 100, height: 60 })
/// );
/// ```
pub fn crop_rect(bbox: &ContentBox, raster: (u32, u32)) -> Option<CropRect> {
    let (raster_w, raster_h) = raster;
    let dpr = if bbox.device_pixel_ratio.is_finite() && bbox.device_pixel_ratio > 0.0 {
        bbox.device_pixel_ratio
    } else {
        1.0
    };

    // `as` saturates and maps NaN to 0, so the clamps below see sane values
    let edge = |css: f64, max: u32| ((css * dpr) as i64).clamp(0, i64::from(max)) as u32;
    let left = edge(bbox.left, raster_w);
    let top = edge(bbox.top, raster_h);
    let right = edge(bbox.left + bbox.width, raster_w);
    let bottom = edge(bbox.top + bbox.height, raster_h);

    if right <= left || bottom <= top {
        return None;
    }
    Some(CropRect {
        x: left,
        y: top,
        width: right - left,
        height: bottom - top,
    })
}
