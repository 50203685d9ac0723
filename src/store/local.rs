//! Local file snapshot store
//!
//! The history lives in `<dir>/schemas.json`. Writes go through a temporary
//! file in the same directory and are renamed into place, so readers never
//! see a half-written document.

use super::{corrupt_suffix, History, SnapshotStore};
use crate::checkpoint::CheckpointId;
use crate::config::{DEFAULT_STORAGE_DIR, DOCUMENT_NAME};
use crate::error::{load_error, save_error, DriftResult};
use crate::snapshot::SchemaSnapshot;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct LocalFileStore {
    dir: PathBuf,
    document: PathBuf,
}

impl LocalFileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let document = dir.join(DOCUMENT_NAME);
        Self { dir, document }
    }

    pub fn document_path(&self) -> &Path {
        &self.document
    }

    /// Overwrite the whole document with `history`, creating parent directories as needed
    pub fn replace(&self, history: &History) -> DriftResult<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| save_error(format!("creating {}: {}", self.dir.display(), e)))?;

        let body = history
            .to_json()
            .map_err(|e| save_error(format!("serializing history: {}", e)))?;

        let mut tmp = NamedTempFile::new_in(&self.dir)
            .map_err(|e| save_error(format!("creating temp file in {}: {}", self.dir.display(), e)))?;
        tmp.write_all(body.as_bytes())
            .map_err(|e| save_error(format!("writing temp file: {}", e)))?;
        tmp.persist(&self.document)
            .map_err(|e| save_error(format!("replacing {}: {}", self.document.display(), e.error)))?;

        Ok(())
    }

    /// Raw document text, `None` when it does not exist yet
    fn read_document(&self) -> DriftResult<Option<String>> {
        match fs::read_to_string(&self.document) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No history document at {} yet", self.document.display());
                Ok(None)
            }
            Err(e) => Err(load_error(format!("reading {}: {}", self.document.display(), e))),
        }
    }

    /// Move an unreadable document aside so the next write does not destroy it
    fn quarantine(&self) -> DriftResult<PathBuf> {
        let target = self
            .document
            .with_file_name(format!("{}.{}", DOCUMENT_NAME, corrupt_suffix()));
        fs::rename(&self.document, &target).map_err(|e| {
            save_error(format!(
                "moving corrupt {} aside: {}",
                self.document.display(),
                e
            ))
        })?;
        Ok(target)
    }
}

impl Default for LocalFileStore {
    fn default() -> Self {
        Self::new(DEFAULT_STORAGE_DIR)
    }
}

impl SnapshotStore for LocalFileStore {
    fn fetch(&self) -> DriftResult<Option<History>> {
        let Some(text) = self.read_document()? else {
            return Ok(None);
        };

        History::from_json(&text)
            .map(Some)
            .map_err(|e| load_error(format!("corrupt document {}: {}", self.document.display(), e)))
    }

    fn save(&self, checkpoint_id: &CheckpointId, snapshot: &SchemaSnapshot) -> DriftResult<()> {
        // Only a document that was read and failed to parse may be replaced
        let text = self
            .read_document()
            .map_err(|e| save_error(format!("re-reading before merge: {}", e)))?;

        let mut history = match text.as_deref().map(History::from_json) {
            None => History::new(),
            Some(Ok(existing)) => existing,
            Some(Err(parse_err)) => {
                let moved_to = self.quarantine()?;
                warn!(
                    "Replacing unreadable history at {} ({}); previous document kept at {}",
                    self.document.display(),
                    parse_err,
                    moved_to.display()
                );
                History::new()
            }
        };

        history.insert(checkpoint_id.clone(), snapshot.clone());
        self.replace(&history)?;

        info!(
            "Saved snapshot for {} to {}: {} columns, {} rows, fingerprint {}",
            checkpoint_id,
            self.document.display(),
            snapshot.column_count(),
            snapshot.row_count(),
            &snapshot.fingerprint()[..12]
        );
        Ok(())
    }

    fn location(&self) -> String {
        self.document.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriftError;
    use crate::snapshot::ColumnDescriptor;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn snapshot(type_tag: &str, rows: u64) -> SchemaSnapshot {
        SchemaSnapshot::new(
            vec![
                ColumnDescriptor::new("user_id", type_tag, 0),
                ColumnDescriptor::new("name", "string", 1),
            ],
            rows,
        )
        .unwrap()
    }

    #[test]
    fn test_missing_document_is_empty() {
        let dir = tempdir().unwrap();
        let store = LocalFileStore::new(dir.path().join("never-created"));

        assert!(store.fetch().unwrap().is_none());
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = LocalFileStore::new(dir.path().join("nested/schemas"));
        let id = CheckpointId::new("job:42");

        store.save(&id, &snapshot("int64", 3)).unwrap();

        assert!(store.document_path().exists());
        assert_eq!(store.load().get(&id), Some(&snapshot("int64", 3)));
    }

    #[test]
    fn test_save_merges_into_existing_document() {
        let dir = tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());
        let a = CheckpointId::new("a.rs:1");
        let b = CheckpointId::new("b.rs:2");

        store.save(&a, &snapshot("int64", 3)).unwrap();
        store.save(&b, &snapshot("string", 5)).unwrap();
        store.save(&a, &snapshot("int64", 100)).unwrap();

        let history = store.load();
        assert_eq!(history.len(), 2);
        assert_eq!(history.get(&a).map(|s| s.row_count()), Some(100));
        assert_eq!(history.get(&b), Some(&snapshot("string", 5)));
    }

    #[test]
    fn test_corrupt_document_loads_empty_and_is_preserved_on_save() {
        let dir = tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());
        fs::write(store.document_path(), "{ not json").unwrap();

        assert!(matches!(store.fetch(), Err(DriftError::StoreLoad(_))));
        assert!(store.load().is_empty());

        let id = CheckpointId::new("job:42");
        store.save(&id, &snapshot("int64", 3)).unwrap();

        assert_eq!(store.load().len(), 1);
        let preserved: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().contains(".corrupt-"))
            .collect();
        assert_eq!(preserved.len(), 1);
        assert_eq!(fs::read_to_string(preserved[0].path()).unwrap(), "{ not json");
    }

    #[test]
    fn test_read_failure_is_not_treated_as_corruption() {
        let dir = tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());
        // A directory where the document should be makes every read fail
        fs::create_dir(store.document_path()).unwrap();

        assert!(matches!(store.fetch(), Err(DriftError::StoreLoad(_))));
        assert!(store.load().is_empty());

        let result = store.save(&CheckpointId::new("job:1"), &snapshot("int64", 3));
        assert!(matches!(result, Err(DriftError::StoreSave(_))));

        let entries: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec!["schemas.json".to_string()]);
        assert!(store.document_path().is_dir());
    }

    #[test]
    fn test_stale_writer_overwrites_other_checkpoints() {
        // Document-level last-writer-wins: a worker that read the document
        // before another worker saved will drop that worker's entry.
        let dir = tempdir().unwrap();
        let worker_a = LocalFileStore::new(dir.path());
        let worker_b = LocalFileStore::new(dir.path());
        let a = CheckpointId::new("a.rs:1");
        let b = CheckpointId::new("b.rs:2");

        let mut stale = worker_a.load();
        worker_b.save(&b, &snapshot("int64", 1)).unwrap();

        stale.insert(a.clone(), snapshot("int64", 1));
        worker_a.replace(&stale).unwrap();

        let history = worker_a.load();
        assert!(history.get(&a).is_some());
        assert!(history.get(&b).is_none());
    }

    #[test]
    fn test_reads_document_written_by_other_tools() {
        let dir = tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());
        fs::write(
            store.document_path(),
            r#"{
  "pipeline.py:12": {
    "columns": {
      "user_id": {"dtype": "int64", "null_count": 0, "total_count": 3},
      "name": {"dtype": "object", "null_count": 0, "total_count": 3}
    },
    "shape": [3, 2]
  }
}"#,
        )
        .unwrap();

        let history = store.load();
        let snapshot = history.get(&CheckpointId::new("pipeline.py:12")).unwrap();
        assert_eq!(snapshot.row_count(), 3);
        assert_eq!(snapshot.column("name").map(|c| c.type_tag.as_str()), Some("object"));
    }
}
