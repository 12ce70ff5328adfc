//! File-backed store with locking and atomic writes.

use super::{BlobKey, Store};
use crate::{Error, Result};
use fs2::FileExt;
use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// One JSON file per blob inside `dir`
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: BlobKey) -> PathBuf {
        self.dir.join(key.file_name())
    }
}

impl Store for FileStore {
    /// Read a blob under a shared lock
    fn read_blob(&self, key: BlobKey) -> Result<Option<String>> {
        let path = self.path_for(key);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        file.lock_shared()?;
        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        read?;

        tracing::debug!("Read {} from {:?}", key.name(), path);
        Ok(Some(contents))
    }

    /// Atomically replace a blob
    ///
    /// Writes to a temp file in the same directory under an exclusive lock,
    /// syncs it, then renames it over the old file.
    fn write_blob(&mut self, key: BlobKey, contents: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);

        let temp = NamedTempFile::new_in(&self.dir)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;
        temp.persist(&path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved {} to {:?}", key.name(), path);
        Ok(())
    }

    fn remove_blob(&mut self, key: BlobKey) -> Result<()> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!("Removed {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Phase, Settings, WorkoutSession};

    #[test]
    fn test_save_and_load_session() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(temp_dir.path().join("data"));

        let mut session = WorkoutSession::new(Settings::default(), 4);
        session.phase = Phase::Rest;
        session.current_set = 2;
        store.save_session(&session).unwrap();

        let loaded = store.load_session().unwrap().unwrap();
        assert_eq!(loaded, session);
    }

    #[test]
    fn test_missing_blob_is_none() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path());

        assert!(store.load_session().unwrap().is_none());
        assert!(store.load_history().unwrap().is_empty());
    }

    #[test]
    fn test_corrupted_blob_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path());
        std::fs::write(store.path_for(BlobKey::Settings), "{ invalid json }").unwrap();

        assert!(matches!(store.load_settings(), Err(Error::Json(_))));
    }

    #[test]
    fn test_clear_session_is_idempotent() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(temp_dir.path());
        store.save_session(&WorkoutSession::default()).unwrap();

        store.clear_session().unwrap();
        store.clear_session().unwrap();
        assert!(store.load_session().unwrap().is_none());
    }

    #[test]
    fn test_atomic_save_leaves_no_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(temp_dir.path());
        store.save_settings(&Settings::default()).unwrap();
        store.save_settings(&Settings::default()).unwrap();

        let extras: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != "settings.json")
            .collect();
        assert!(
            extras.is_empty(),
            "Expected only settings.json, found extras: {:?}",
            extras
        );
    }

    #[test]
    fn test_two_stores_last_write_wins() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut first = FileStore::new(temp_dir.path());
        let mut second = FileStore::new(temp_dir.path());

        first.save_session(&WorkoutSession::new(Settings::default(), 2)).unwrap();
        second.save_session(&WorkoutSession::new(Settings::default(), 7)).unwrap();

        assert_eq!(first.load_session().unwrap().unwrap().total_sets, 7);
    }
}
