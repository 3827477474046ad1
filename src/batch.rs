//! Batch card generation: render each job, then record it as a new version.
//!
//! Jobs run on the global rayon pool (sized from `[processing]` in `main`).
//! Each job checks the cancel flag before it starts; once the flag is set,
//! the jobs that haven't started yet are reported as cancelled. A render
//! already in flight finishes normally.
//!
//! Jobs for the same contact hold that contact's lock from render through
//! append, so the card image, its generation record and the new version
//! always come from the same job. Jobs for different contacts run freely.
//!
//! Progress goes out as [`BatchEvent`]s over an optional channel, in
//! completion order. The returned [`BatchSummary`] lists one outcome per job
//! in input order.

use crate::render::{CaptureBackend, CardRenderer, RenderError, RenderRequest};
use crate::store::{StoreError, VersionStore};
use crate::template::TemplateData;
use crate::types::{ContactRef, Delivery, GreetingText, Style, Version};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Render failed: {0}")]
    Render(#[from] RenderError),
    #[error("Saving version failed: {0}")]
    Store(#[from] StoreError),
}

fn default_template_number() -> u32 {
    1
}

/// One card to generate. This is also the element type of the request file
/// read by `greetcard card`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardJob {
    pub contact: ContactRef,
    #[serde(default)]
    pub style: Style,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_prompt: Option<String>,
    #[serde(default)]
    pub text: GreetingText,
    #[serde(default = "default_template_number")]
    pub template_number: u32,
    /// Defaults to the contact's display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Defaults to the current year.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
}

impl CardJob {
    pub fn new(contact: ContactRef, style: Style, text: GreetingText) -> Self {
        Self {
            contact,
            style,
            custom_prompt: None,
            text,
            template_number: default_template_number(),
            signature: None,
            year: None,
        }
    }

    pub fn signature(&self) -> &str {
        self.signature
            .as_deref()
            .unwrap_or(&self.contact.display_name)
    }

    /// Template data for this job. Empty text fields are left to the
    /// template's fallbacks.
    pub fn template_data(&self) -> TemplateData {
        let given = |s: &str| (!s.is_empty()).then(|| s.to_string());
        TemplateData {
            year: self.year.clone(),
            greeting_text: given(&self.text.greeting),
            poem_text: given(&self.text.poem),
            idioms_text: given(&self.text.idioms),
            wishes_text: given(&self.text.wishes),
            signature: given(self.signature()),
        }
    }

    /// The version this job records, before the store numbers it.
    pub fn to_version(&self) -> Version {
        let mut version = Version::new(self.contact.clone(), self.style, self.text.clone());
        version.custom_prompt = self.custom_prompt.clone();
        version.template_number = self.template_number;
        version
    }
}

/// Progress notification for one job.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Started {
        index: usize,
        contact_id: String,
    },
    Rendered {
        index: usize,
        contact_id: String,
        version_number: u32,
        image_path: String,
    },
    Failed {
        index: usize,
        contact_id: String,
        error: String,
    },
    Cancelled {
        index: usize,
        contact_id: String,
    },
}

#[derive(Debug)]
pub enum BatchOutcome {
    Rendered { version: Version, delivery: Delivery },
    Failed { error: BatchError },
    Cancelled,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub outcomes: Vec<BatchOutcome>,
}

impl BatchSummary {
    pub fn rendered(&self) -> usize {
        self.count(|o| matches!(o, BatchOutcome::Rendered { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, BatchOutcome::Failed { .. }))
    }

    pub fn cancelled(&self) -> usize {
        self.count(|o| matches!(o, BatchOutcome::Cancelled))
    }

    /// Finished cards, ready to hand to the sender, in input order.
    pub fn deliveries(&self) -> Vec<&Delivery> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                BatchOutcome::Rendered { delivery, .. } => Some(delivery),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&BatchOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}

pub fn run<B: CaptureBackend>(
    renderer: &CardRenderer<B>,
    store: &VersionStore,
    jobs: Vec<CardJob>,
    cancel: &AtomicBool,
    events: Option<Sender<BatchEvent>>,
) -> BatchSummary {
    info!(jobs = jobs.len(), "Starting batch");
    let send = |event: BatchEvent| {
        if let Some(tx) = &events {
            // A dropped receiver only means nobody is watching.
            let _ = tx.send(event);
        }
    };

    let contact_locks: HashMap<String, Mutex<()>> = jobs
        .iter()
        .map(|job| (job.contact.id.clone(), Mutex::new(())))
        .collect();

    let outcomes = jobs
        .into_par_iter()
        .enumerate()
        .map(|(index, job)| {
            let contact_id = job.contact.id.clone();
            if cancel.load(Ordering::SeqCst) {
                send(BatchEvent::Cancelled { index, contact_id });
                return BatchOutcome::Cancelled;
            }
            send(BatchEvent::Started {
                index,
                contact_id: contact_id.clone(),
            });
            let result = {
                let _contact = contact_locks
                    .get(&contact_id)
                    .map(|lock| lock.lock().unwrap_or_else(PoisonError::into_inner));
                run_job(renderer, store, &job)
            };
            match result {
                Ok((version, delivery)) => {
                    send(BatchEvent::Rendered {
                        index,
                        contact_id,
                        version_number: version.version_number,
                        image_path: delivery.image_path.clone(),
                    });
                    BatchOutcome::Rendered { version, delivery }
                }
                Err(error) => {
                    warn!(contact = %contact_id, %error, "Card job failed");
                    send(BatchEvent::Failed {
                        index,
                        contact_id,
                        error: error.to_string(),
                    });
                    BatchOutcome::Failed { error }
                }
            }
        })
        .collect();

    BatchSummary { outcomes }
}

fn run_job<B: CaptureBackend>(
    renderer: &CardRenderer<B>,
    store: &VersionStore,
    job: &CardJob,
) -> Result<(Version, Delivery), BatchError> {
    let card = renderer.render(&RenderRequest {
        contact_id: job.contact.id.clone(),
        template_number: job.template_number,
        data: job.template_data(),
    })?;

    let mut version = job.to_version();
    version.image_path = card.record.image_path.clone();
    let version = store.append(version)?;

    let delivery = Delivery {
        contact_display_name: version.contact.display_name.clone(),
        image_path: version.image_path.clone(),
    };
    Ok((version, delivery))
}
