//! Per-contact version ledgers with durable JSON persistence.
//!
//! Every contact gets one ledger file, `<ledger_dir>/<contact_id>.json`,
//! holding a JSON array of [`Version`] records in append order. The whole
//! directory is loaded when the store is opened and kept in memory for the
//! lifetime of the process.
//!
//! # Numbering
//!
//! Version numbers are assigned on [`VersionStore::append`] as
//! `len(ledger) + 1`, so a ledger always reads `1, 2, 3, …` with no gaps.
//! Nothing ever renumbers or removes a record; [`VersionStore::update`]
//! replaces the record with the same number in place.
//!
//! # Persistence
//!
//! Each write re-serializes the entire ledger and swaps it in with
//! [`write_atomic`](crate::persist::write_atomic). The cost is linear in
//! ledger size, and retention is unbounded: there is no delete and no cap.
//! Avatars are base64 only inside the file; in memory they are raw bytes.
//!
//! If the write fails the in-memory change is rolled back before the error
//! is returned, so memory and disk never disagree about a ledger.
//!
//! # Concurrency
//!
//! Each ledger sits behind its own mutex, held across the whole
//! read-number-push-write sequence. Appends to one contact are serialized;
//! appends to different contacts only share the briefly-held map lock.
//! [`VersionStore::load`] takes the map's write lock and each ledger's
//! mutex, so a reload never interleaves with an append.
//!
//! # Legacy ledgers
//!
//! Older files are migrated at load time, in memory only:
//!
//! | Found on disk | Loaded as |
//! |---|---|
//! | `{"latest_version": {...}}` | one-element ledger |
//! | a single version object | one-element ledger |
//! | missing or out-of-sequence numbers | renumbered `1..=N` by position |
//! | `contact.wxid` instead of `contact.id` | `contact.id` |
//! | custom style without `custom_prompt` | prompt taken from `style_content` |
//!
//! A file that can't be read or parsed is skipped with a warning; it never
//! stops other ledgers from loading.

use crate::persist::write_atomic;
use crate::types::{Style, Version};
use serde::de::Error as _;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Format of `Version::create_time`.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const LEDGER_EXTENSION: &str = "json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid contact id {0:?}")]
    InvalidContactId(String),
    #[error("Contact {contact_id} has no version {version_number}")]
    VersionNotFound {
        contact_id: String,
        version_number: u32,
    },
    #[error("Failed to write ledger {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A ledger file that was skipped during load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLedger {
    pub path: PathBuf,
    pub reason: String,
}

/// What [`VersionStore::load`] found.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Number of ledgers loaded.
    pub ledgers: usize,
    /// Total versions across loaded ledgers.
    pub versions: usize,
    /// Contacts whose ledger needed a legacy migration.
    pub migrated: Vec<String>,
    pub skipped: Vec<SkippedLedger>,
}

type Ledger = Arc<Mutex<Vec<Version>>>;

/// The ledger directory plus every ledger in it.
pub struct VersionStore {
    dir: PathBuf,
    ledgers: RwLock<HashMap<String, Ledger>>,
}

impl VersionStore {
    /// Open (creating if needed) the ledger directory and load it.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::open_with_report(dir).map(|(store, _)| store)
    }

    /// Like [`open`](Self::open), also returning what the load found.
    pub fn open_with_report(dir: impl Into<PathBuf>) -> Result<(Self, LoadReport), StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let store = Self {
            dir,
            ledgers: RwLock::new(HashMap::new()),
        };
        let report = store.load()?;
        Ok((store, report))
    }

    /// (Re)load every ledger file from disk.
    ///
    /// Runs under the map's write lock, and each ledger already in memory is
    /// locked before its file is read and refilled in place. An append in
    /// flight therefore either finishes before its file is read or waits for
    /// the reload, and handles to a ledger stay valid across reloads. A file
    /// that fails to load leaves that contact's in-memory ledger as it was;
    /// a ledger whose file is gone is emptied.
    pub fn load(&self) -> Result<LoadReport, StoreError> {
        let mut ledgers = self.ledgers.write().unwrap_or_else(PoisonError::into_inner);
        let mut report = LoadReport::default();
        let mut seen = HashSet::new();

        let walker = WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => return Err(std::io::Error::from(e).into()),
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    warn!(path = %path.display(), error = %e, "skipping unreadable ledger");
                    report.skipped.push(SkippedLedger {
                        path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Some(contact_id) = ledger_contact_id(path) else {
                continue;
            };
            seen.insert(contact_id.clone());

            let ledger = Arc::clone(ledgers.entry(contact_id.clone()).or_default());
            let mut versions = ledger.lock().unwrap_or_else(PoisonError::into_inner);
            match read_ledger(path, &contact_id) {
                Ok((loaded, migrated)) => {
                    if migrated {
                        info!(contact = %contact_id, "migrated legacy ledger");
                        report.migrated.push(contact_id.clone());
                    }
                    report.ledgers += 1;
                    report.versions += loaded.len();
                    *versions = loaded;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping corrupt ledger");
                    report.skipped.push(SkippedLedger {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        // The directory was listed before these ledgers were locked, so a
        // file written in between is read now rather than cleared.
        for (id, ledger) in ledgers.iter().filter(|(id, _)| !seen.contains(*id)) {
            let mut versions = ledger.lock().unwrap_or_else(PoisonError::into_inner);
            let path = self.ledger_path(id);
            if !path.is_file() {
                versions.clear();
                continue;
            }
            match read_ledger(&path, id) {
                Ok((loaded, migrated)) => {
                    if migrated {
                        report.migrated.push(id.clone());
                    }
                    report.ledgers += 1;
                    report.versions += loaded.len();
                    *versions = loaded;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping corrupt ledger");
                    report.skipped.push(SkippedLedger {
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }

        debug!(
            dir = %self.dir.display(),
            ledgers = report.ledgers,
            versions = report.versions,
            "loaded version store"
        );
        Ok(report)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the ledger file for `contact_id`.
    pub fn ledger_path(&self, contact_id: &str) -> PathBuf {
        self.dir.join(format!("{contact_id}.{LEDGER_EXTENSION}"))
    }

    /// Number, timestamp, normalize and persist `version`, returning the
    /// finalized record.
    pub fn append(&self, mut version: Version) -> Result<Version, StoreError> {
        let contact_id = version.contact.id.clone();
        validate_contact_id(&contact_id)?;

        let ledger = self.ledger_or_insert(&contact_id);
        let mut versions = ledger.lock().unwrap_or_else(PoisonError::into_inner);

        version.version_number = versions.len() as u32 + 1;
        if version.create_time.is_empty() {
            version.create_time = now_local();
        }
        version.normalize_style();

        versions.push(version.clone());
        if let Err(e) = self.write_ledger(&contact_id, &versions) {
            versions.pop();
            return Err(e);
        }

        debug!(
            contact = %contact_id,
            version = version.version_number,
            "appended version"
        );
        Ok(version)
    }

    /// Replace the record with the same `version_number` in that contact's
    /// ledger. Every other record is left as it was.
    ///
    /// An empty `create_time` keeps the time of the record being replaced.
    pub fn update(&self, mut version: Version) -> Result<Version, StoreError> {
        let contact_id = version.contact.id.clone();
        validate_contact_id(&contact_id)?;
        let not_found = || StoreError::VersionNotFound {
            contact_id: contact_id.clone(),
            version_number: version.version_number,
        };

        let ledger = self.ledger(&contact_id).ok_or_else(not_found)?;
        let mut versions = ledger.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = versions
            .iter()
            .position(|v| v.version_number == version.version_number)
            .ok_or_else(not_found)?;

        if version.create_time.is_empty() {
            version.create_time = versions[slot].create_time.clone();
        }
        version.normalize_style();

        let previous = std::mem::replace(&mut versions[slot], version.clone());
        if let Err(e) = self.write_ledger(&contact_id, &versions) {
            versions[slot] = previous;
            return Err(e);
        }
        Ok(version)
    }

    /// All versions for a contact in append order (possibly empty).
    pub fn versions(&self, contact_id: &str) -> Vec<Version> {
        self.ledger(contact_id)
            .map(|l| l.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .unwrap_or_default()
    }

    pub fn version(&self, contact_id: &str, version_number: u32) -> Option<Version> {
        let ledger = self.ledger(contact_id)?;
        let versions = ledger.lock().unwrap_or_else(PoisonError::into_inner);
        versions
            .iter()
            .find(|v| v.version_number == version_number)
            .cloned()
    }

    pub fn latest(&self, contact_id: &str) -> Option<Version> {
        let ledger = self.ledger(contact_id)?;
        let versions = ledger.lock().unwrap_or_else(PoisonError::into_inner);
        versions.last().cloned()
    }

    /// Every non-empty ledger, keyed by contact id.
    ///
    /// A contact whose first append failed keeps an empty placeholder in
    /// memory and has no file on disk; it is left out here.
    pub fn all(&self) -> BTreeMap<String, Vec<Version>> {
        let ledgers = self.ledgers.read().unwrap_or_else(PoisonError::into_inner);
        ledgers
            .iter()
            .filter_map(|(id, ledger)| {
                let versions = ledger.lock().unwrap_or_else(PoisonError::into_inner);
                (!versions.is_empty()).then(|| (id.clone(), versions.clone()))
            })
            .collect()
    }

    fn ledger(&self, contact_id: &str) -> Option<Ledger> {
        self.ledgers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(contact_id)
            .cloned()
    }

    fn ledger_or_insert(&self, contact_id: &str) -> Ledger {
        if let Some(ledger) = self.ledger(contact_id) {
            return ledger;
        }
        self.ledgers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(contact_id.to_string())
            .or_default()
            .clone()
    }

    fn write_ledger(&self, contact_id: &str, versions: &[Version]) -> Result<(), StoreError> {
        let path = self.ledger_path(contact_id);
        let json = serde_json::to_string_pretty(versions)?;
        write_atomic(&path, json.as_bytes()).map_err(|source| StoreError::Persist { path, source })
    }
}

/// Contact ids become file names, so anything that could escape the ledger
/// directory or hide the file is refused.
pub fn validate_contact_id(contact_id: &str) -> Result<(), StoreError> {
    let bad = contact_id.is_empty()
        || contact_id.starts_with('.')
        || contact_id.contains(['/', '\\'])
        || contact_id.chars().any(char::is_control);
    if bad {
        Err(StoreError::InvalidContactId(contact_id.to_string()))
    } else {
        Ok(())
    }
}

/// Current local time in [`TIME_FORMAT`].
pub fn now_local() -> String {
    chrono::Local::now().format(TIME_FORMAT).to_string()
}

/// Contact id for a ledger file, or `None` if the file isn't a ledger.
fn ledger_contact_id(path: &Path) -> Option<String> {
    if path.extension().and_then(|e| e.to_str()) != Some(LEDGER_EXTENSION) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    validate_contact_id(stem).ok()?;
    Some(stem.to_string())
}

/// Read one ledger file. Returns the versions and whether a legacy
/// migration was applied.
fn read_ledger(path: &Path, contact_id: &str) -> Result<(Vec<Version>, bool), StoreError> {
    let content = fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&content)?;
    Ok(migrate_ledger(value, contact_id)?)
}

fn migrate_ledger(
    value: serde_json::Value,
    contact_id: &str,
) -> Result<(Vec<Version>, bool), serde_json::Error> {
    use serde_json::Value;

    let (entries, mut migrated) = match value {
        Value::Array(items) => (items, false),
        Value::Object(mut obj) => match obj.remove("latest_version") {
            Some(latest) => (vec![latest], true),
            None => (vec![Value::Object(obj)], true),
        },
        other => {
            return Err(serde_json::Error::custom(format!(
                "expected an array of versions, found {}",
                json_kind(&other)
            )));
        }
    };

    let mut versions = entries
        .into_iter()
        .map(serde_json::from_value::<Version>)
        .collect::<Result<Vec<_>, _>>()?;

    let in_sequence = versions
        .iter()
        .enumerate()
        .all(|(i, v)| v.version_number as usize == i + 1);
    if !in_sequence {
        for (i, v) in versions.iter_mut().enumerate() {
            v.version_number = i as u32 + 1;
        }
        migrated = true;
    }

    for v in &mut versions {
        if v.contact.id.is_empty() {
            v.contact.id = contact_id.to_string();
            migrated = true;
        }
        if v.style == Style::Custom && v.custom_prompt.is_none() {
            v.custom_prompt = Some(v.style_content.clone());
            migrated = true;
        }
    }

    Ok((versions, migrated))
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
