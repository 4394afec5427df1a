//! # fanzone-adapter-json-store
//!
//! File-backed implementation of the `ModeStore` port.
//!
//! ## Layout
//!
//! Each zone owns a directory under the store root and the selected mode is
//! kept as a JSON string:
//!
//! ```text
//! <root>/<zone>/CurrentMode    "QUIET"
//! ```
//!
//! ## Dependency rule
//! Depends on `fanzone-app` (for the port trait) and `fanzone-domain` (for errors).

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fanzone_app::ports::ModeStore;
use fanzone_domain::error::PersistError;

const CURRENT_MODE_FILE: &str = "CurrentMode";

/// Mode store rooted at a directory.
#[derive(Debug, Clone)]
pub struct JsonModeStore {
    root: PathBuf,
}

impl JsonModeStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file(&self, zone: usize) -> PathBuf {
        self.root.join(zone.to_string()).join(CURRENT_MODE_FILE)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> PersistError {
    PersistError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl ModeStore for JsonModeStore {
    fn save(&self, zone: usize, mode: &str) -> Result<(), PersistError> {
        let file = self.file(zone);
        if let Some(dir) = file.parent() {
            fs::create_dir_all(dir).map_err(|err| io_error(dir, err))?;
        }
        let encoded = serde_json::to_string(mode).map_err(|err| PersistError::Malformed {
            path: file.display().to_string(),
            reason: err.to_string(),
        })?;
        fs::write(&file, encoded).map_err(|err| io_error(&file, err))?;
        tracing::debug!(zone, mode, path = %file.display(), "thermal mode persisted");
        Ok(())
    }

    fn restore(&self, zone: usize) -> Result<Option<String>, PersistError> {
        let file = self.file(zone);
        let content = match fs::read_to_string(&file) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_error(&file, err)),
        };
        serde_json::from_str::<String>(&content)
            .map(Some)
            .map_err(|err| PersistError::Malformed {
                path: file.display().to_string(),
                reason: err.to_string(),
            })
    }

    fn discard(&self, zone: usize) -> Result<(), PersistError> {
        let file = self.file(zone);
        match fs::remove_file(&file) {
            Ok(()) => {
                tracing::debug!(zone, path = %file.display(), "persisted thermal mode discarded");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(&file, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, JsonModeStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonModeStore::new(dir.path().join("control"));
        (dir, store)
    }

    #[test]
    fn should_restore_nothing_when_never_saved() {
        let (_dir, store) = store();
        assert_eq!(store.restore(0).unwrap(), None);
    }

    #[test]
    fn should_restore_saved_mode() {
        let (_dir, store) = store();
        store.save(1, "QUIET").unwrap();
        assert_eq!(store.restore(1).unwrap().as_deref(), Some("QUIET"));
        assert_eq!(store.restore(0).unwrap(), None);
    }

    #[test]
    fn should_write_json_string_under_zone_directory() {
        let (_dir, store) = store();
        store.save(3, "DEFAULT").unwrap();
        let written = fs::read_to_string(store.root().join("3").join("CurrentMode")).unwrap();
        assert_eq!(written, "\"DEFAULT\"");
    }

    #[test]
    fn should_report_malformed_content() {
        let (_dir, store) = store();
        let dir = store.root().join("0");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("CurrentMode"), "{not json").unwrap();
        assert!(matches!(store.restore(0), Err(PersistError::Malformed { .. })));
    }

    #[test]
    fn should_discard_saved_mode() {
        let (_dir, store) = store();
        store.save(0, "QUIET").unwrap();
        store.discard(0).unwrap();
        store.discard(0).unwrap();
        assert_eq!(store.restore(0).unwrap(), None);
    }
}
