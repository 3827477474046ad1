//! Export contacts' history and latest card into one folder per contact.
//!
//! ```text
//! <dest>/
//! └── Alice/
//!     ├── Alice.json       # Every version, avatars removed
//!     └── w1.png           # Copy of the latest version's card image
//! ```
//!
//! The folder name is the contact's display name reduced to letters, digits,
//! spaces and `_-()`; if nothing is left it falls back to the contact id. Two
//! contacts that reduce to the same name get the second one suffixed with
//! `(<id>)`.
//!
//! Contacts are exported one at a time. The cancel flag is checked before
//! each contact, so a contact already being copied always finishes.

use crate::persist::write_atomic;
use crate::store::VersionStore;
use crate::types::Version;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("No versions recorded for {0}")]
    NoVersions(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Files written for one contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedContact {
    pub contact_id: String,
    pub folder: PathBuf,
    pub ledger_path: PathBuf,
    /// `None` when the latest version's image no longer exists.
    pub image_path: Option<PathBuf>,
}

#[derive(Debug)]
pub enum ExportOutcome {
    Exported(ExportedContact),
    Failed {
        contact_id: String,
        error: ExportError,
    },
    Cancelled {
        contact_id: String,
    },
}

impl ExportOutcome {
    pub fn contact_id(&self) -> &str {
        match self {
            ExportOutcome::Exported(exported) => &exported.contact_id,
            ExportOutcome::Failed { contact_id, .. } | ExportOutcome::Cancelled { contact_id } => {
                contact_id
            }
        }
    }
}

/// Display name reduced to characters that are safe in a folder name.
pub fn folder_name(display_name: &str, contact_id: &str) -> String {
    let safe: String = display_name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-' | '(' | ')'))
        .collect();
    let safe = safe.trim();
    if safe.is_empty() {
        contact_id.to_string()
    } else {
        safe.to_string()
    }
}

/// Export each contact in `contact_ids` under `dest`, in order.
///
/// Returns one outcome per contact. A contact with no versions fails with
/// [`ExportError::NoVersions`]; other contacts are still exported. Once
/// `cancel` is set, the remaining contacts are reported as cancelled.
pub fn export_contacts(
    store: &VersionStore,
    contact_ids: &[String],
    dest: &Path,
    cancel: &AtomicBool,
) -> Vec<ExportOutcome> {
    info!(contacts = contact_ids.len(), dest = %dest.display(), "Exporting");
    let mut taken = HashSet::new();

    contact_ids
        .iter()
        .map(|contact_id| {
            if cancel.load(Ordering::SeqCst) {
                return ExportOutcome::Cancelled {
                    contact_id: contact_id.clone(),
                };
            }
            match export_contact(store, contact_id, dest, &mut taken) {
                Ok(exported) => ExportOutcome::Exported(exported),
                Err(error) => {
                    warn!(contact = %contact_id, %error, "Export failed");
                    ExportOutcome::Failed {
                        contact_id: contact_id.clone(),
                        error,
                    }
                }
            }
        })
        .collect()
}

fn export_contact(
    store: &VersionStore,
    contact_id: &str,
    dest: &Path,
    taken: &mut HashSet<String>,
) -> Result<ExportedContact, ExportError> {
    let mut versions = store.versions(contact_id);
    let Some(latest) = versions.last() else {
        return Err(ExportError::NoVersions(contact_id.to_string()));
    };

    let mut name = folder_name(&latest.contact.display_name, contact_id);
    if !taken.insert(name.clone()) {
        name = format!("{name} ({contact_id})");
        taken.insert(name.clone());
    }
    let folder = dest.join(&name);
    fs::create_dir_all(&folder)?;

    let image_path = copy_latest_image(latest, &folder)?;

    for version in &mut versions {
        version.contact.avatar = None;
    }
    let ledger_path = folder.join(format!("{name}.json"));
    write_atomic(&ledger_path, &serde_json::to_vec_pretty(&versions)?)?;

    debug!(contact = %contact_id, folder = %folder.display(), "Exported");
    Ok(ExportedContact {
        contact_id: contact_id.to_string(),
        folder,
        ledger_path,
        image_path,
    })
}

fn copy_latest_image(latest: &Version, folder: &Path) -> Result<Option<PathBuf>, ExportError> {
    let source = Path::new(&latest.image_path);
    let Some(file_name) = source.file_name().filter(|_| source.is_file()) else {
        warn!(
            contact = %latest.contact.id,
            image = %latest.image_path,
            "Latest card image not found; exporting history only"
        );
        return Ok(None);
    };
    let target = folder.join(file_name);
    fs::copy(source, &target)?;
    Ok(Some(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::sample_version;
    use tempfile::TempDir;

    struct Fixture {
        tmp: TempDir,
        store: VersionStore,
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let store = VersionStore::open(tmp.path().join("version_history")).unwrap();
        Fixture { tmp, store }
    }

    /// Append a version whose image exists on disk, with an avatar attached.
    fn record(fx: &Fixture, id: &str, name: &str) -> Version {
        let image = fx.tmp.path().join("generate_img").join(format!("{id}.png"));
        fs::create_dir_all(image.parent().unwrap()).unwrap();
        fs::write(&image, format!("png for {id}")).unwrap();
        let mut version = sample_version(id, name);
        version.contact.avatar = Some(vec![1, 2, 3]);
        version.image_path = image.to_string_lossy().into_owned();
        fx.store.append(version).unwrap()
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn exported(outcome: &ExportOutcome) -> &ExportedContact {
        match outcome {
            ExportOutcome::Exported(e) => e,
            other => panic!("expected an export, got {other:?}"),
        }
    }

    // =========================================================================
    // Folder names
    // =========================================================================

    #[test]
    fn folder_name_keeps_safe_characters() {
        assert_eq!(folder_name("Alice (work)", "w1"), "Alice (work)");
        assert_eq!(folder_name("小明_2025-春", "w1"), "小明_2025-春");
        assert_eq!(folder_name("a/b:c*?", "w1"), "abc");
        assert_eq!(folder_name("../..", "w1"), "w1");
        assert_eq!(folder_name("  ", "w1"), "w1");
        assert_eq!(folder_name("🎉", "w1"), "w1");
    }

    // =========================================================================
    // Export
    // =========================================================================

    #[test]
    fn exports_history_without_avatars_and_latest_image() {
        let fx = fixture();
        record(&fx, "w1", "Alice");
        record(&fx, "w1", "Alice");
        let dest = fx.tmp.path().join("export");

        let outcomes = export_contacts(&fx.store, &ids(&["w1"]), &dest, &AtomicBool::new(false));

        let e = exported(&outcomes[0]);
        assert_eq!(e.folder, dest.join("Alice"));
        assert_eq!(e.ledger_path, dest.join("Alice").join("Alice.json"));
        assert_eq!(e.image_path, Some(dest.join("Alice").join("w1.png")));
        assert_eq!(fs::read_to_string(dest.join("Alice/w1.png")).unwrap(), "png for w1");

        let content = fs::read_to_string(&e.ledger_path).unwrap();
        assert!(!content.contains("avatar"));
        assert!(content.contains("新年快乐"));
        let versions: Vec<Version> = serde_json::from_str(&content).unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[1].version_number, 2);
        assert!(versions.iter().all(|v| v.contact.avatar.is_none()));

        // The store itself keeps the avatar
        assert_eq!(fx.store.latest("w1").unwrap().contact.avatar, Some(vec![1, 2, 3]));
    }

    #[test]
    fn missing_image_exports_history_only() {
        let fx = fixture();
        let version = record(&fx, "w1", "Alice");
        fs::remove_file(&version.image_path).unwrap();
        let dest = fx.tmp.path().join("export");

        let outcomes = export_contacts(&fx.store, &ids(&["w1"]), &dest, &AtomicBool::new(false));

        let e = exported(&outcomes[0]);
        assert_eq!(e.image_path, None);
        assert!(e.ledger_path.is_file());
    }

    #[test]
    fn contact_without_versions_fails_alone() {
        let fx = fixture();
        record(&fx, "w1", "Alice");
        let dest = fx.tmp.path().join("export");

        let outcomes = export_contacts(
            &fx.store,
            &ids(&["ghost", "w1"]),
            &dest,
            &AtomicBool::new(false),
        );

        assert!(matches!(
            &outcomes[0],
            ExportOutcome::Failed { contact_id, error: ExportError::NoVersions(_) } if contact_id == "ghost"
        ));
        assert!(!dest.join("ghost").exists());
        assert_eq!(exported(&outcomes[1]).contact_id, "w1");
    }

    #[test]
    fn clashing_names_get_distinct_folders() {
        let fx = fixture();
        record(&fx, "w1", "Alice");
        record(&fx, "w2", "Alice!");
        let dest = fx.tmp.path().join("export");

        let outcomes = export_contacts(&fx.store, &ids(&["w1", "w2"]), &dest, &AtomicBool::new(false));

        assert_eq!(exported(&outcomes[0]).folder, dest.join("Alice"));
        assert_eq!(exported(&outcomes[1]).folder, dest.join("Alice (w2)"));
        assert!(dest.join("Alice (w2)").join("Alice (w2).json").is_file());
        assert!(dest.join("Alice (w2)").join("w2.png").is_file());
    }

    #[test]
    fn cancel_stops_remaining_contacts() {
        let fx = fixture();
        record(&fx, "w1", "Alice");
        record(&fx, "w2", "Bob");
        let dest = fx.tmp.path().join("export");

        let outcomes = export_contacts(&fx.store, &ids(&["w1", "w2"]), &dest, &AtomicBool::new(true));

        assert!(outcomes.iter().all(|o| matches!(o, ExportOutcome::Cancelled { .. })));
        assert_eq!(outcomes[1].contact_id(), "w2");
        assert!(!dest.exists());
    }

    #[test]
    fn re_export_replaces_previous_files() {
        let fx = fixture();
        record(&fx, "w1", "Alice");
        let dest = fx.tmp.path().join("export");
        export_contacts(&fx.store, &ids(&["w1"]), &dest, &AtomicBool::new(false));
        record(&fx, "w1", "Alice");

        let outcomes = export_contacts(&fx.store, &ids(&["w1"]), &dest, &AtomicBool::new(false));

        let content = fs::read_to_string(&exported(&outcomes[0]).ledger_path).unwrap();
        let versions: Vec<Version> = serde_json::from_str(&content).unwrap();
        assert_eq!(versions.len(), 2);
    }
}
