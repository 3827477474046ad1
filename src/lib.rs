//! # greetcard
//!
//! Per-contact greeting cards with a full version history. Each generated
//! greeting is painted into an HTML template by headless Chrome, cropped to
//! the card, saved as a PNG, and recorded as a numbered version in the
//! contact's ledger.
//!
//! # Architecture: Render, Then Record
//!
//! ```text
//! CardJob ─→ template::inject_file ─→ render (Chrome → screenshot → crop)
//!                                          │
//!                                          ├─→ generate_img/<id>.png + <id>.json
//!                                          └─→ store.append ─→ version_history/<id>.json
//! ```
//!
//! A version is only recorded after its card image exists, so every image
//! path in a ledger pointed at a real file when it was written.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`store`] | Per-contact version ledgers: numbering, normalization, atomic JSON persistence, legacy migration |
//! | [`template`] | `{placeholder}` substitution into `template_<n>.html`, plus the stock template |
//! | [`render`] | Headless Chrome capture, crop geometry, PNG output and generation records |
//! | [`batch`] | Many card jobs on the rayon pool with cancellation and progress events |
//! | [`compare`] | Field-level differences between two versions |
//! | [`export`] | One folder per contact with its avatar-free history and latest card |
//! | [`config`] | `greetcard.toml` loading, merging and validation |
//! | [`codec`] | Base64 for avatar bytes stored in JSON |
//! | [`persist`] | Write-to-temp-then-rename file replacement |
//! | [`types`] | Shared data model (`ContactRef`, `Style`, `Version`, ...) |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Ledgers Are Append-Only
//!
//! Version numbers are assigned by the store as `len + 1` under the
//! contact's lock and never reused. There is no delete; the only mutation is
//! replacing a record with the same number. Retention is unbounded, and each
//! ledger is rewritten whole on every append, so a contact with thousands of
//! versions pays for it on each write.
//!
//! ## One Card Image Per Contact
//!
//! The output image is `<image_dir>/<id>.png` and is replaced by each new
//! render. Older versions keep their recorded `image_path`, which then names
//! the newest card.
//!
//! ## The Browser Is a Trait
//!
//! [`render::CaptureBackend`] is the only place that talks to Chrome. Crop
//! math, output writing and batch orchestration are tested against a mock
//! that paints a synthetic screenshot.

pub mod batch;
pub mod codec;
pub mod compare;
pub mod config;
pub mod export;
pub mod output;
pub mod persist;
pub mod render;
pub mod store;
pub mod template;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
