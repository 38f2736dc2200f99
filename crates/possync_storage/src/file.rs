//! File-based key/value store for persistent storage.

use crate::error::StorageResult;
use crate::store::{validate_key, KeyValueStore};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const VALUE_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "json.tmp";

/// A directory-backed key/value store.
///
/// Each key lives in its own file named `<key>.json` inside the store
/// directory. Data survives process restarts.
///
/// # Durability
///
/// A `set` writes the new value to a temporary sibling file, calls
/// `File::sync_all()`, then renames it over the old value. A crash at any
/// point leaves either the old or the new value in place, never a torn one.
///
/// # Thread Safety
///
/// This store is thread-safe. Writes are serialized by an internal lock;
/// reads go straight to the file system.
///
/// # Example
///
/// ```no_run
/// use possync_storage::{FileStore, KeyValueStore};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("terminal-data")).unwrap();
/// store.set("offline", b"false").unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Opens or creates a store rooted at `root`.
    ///
    /// Missing directories are created. Temporary files left behind by an
    /// interrupted write are removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or read.
    pub fn open(root: &Path) -> StorageResult<Self> {
        fs::create_dir_all(root)?;
        let store = Self {
            root: root.to_path_buf(),
            write_lock: Mutex::new(()),
        };
        store.remove_stale_temp_files()?;
        Ok(store)
    }

    /// Returns the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    fn value_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.{VALUE_EXTENSION}"))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.{TEMP_EXTENSION}"))
    }

    fn remove_stale_temp_files(&self) -> StorageResult<()> {
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            let is_temp = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(TEMP_EXTENSION));
            if is_temp {
                debug!(path = %path.display(), "removing interrupted write");
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    fn sync_dir(&self) -> StorageResult<()> {
        // Directory handles cannot be opened for syncing on every platform.
        #[cfg(unix)]
        File::open(&self.root)?.sync_all()?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_key(key)?;
        let mut file = match File::open(self.value_path(key)) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        Ok(Some(buffer))
    }

    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        validate_key(key)?;
        let _guard = self.write_lock.lock();

        let temp = self.temp_path(key);
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp)?;
            file.write_all(value)?;
            file.sync_all()?;
        }
        fs::rename(&temp, self.value_path(key))?;
        self.sync_dir()
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        let _guard = self.write_lock.lock();

        match fs::remove_file(self.value_path(key)) {
            Ok(()) => self.sync_dir(),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let suffix = format!(".{VALUE_EXTENSION}");
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(key) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.strip_suffix(&suffix))
            {
                if validate_key(key).is_ok() {
                    keys.push(key.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_create_new() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("store");

        let store = FileStore::open(&root).unwrap();
        assert!(root.is_dir());
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn file_set_and_get() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        store.set("queue", b"[1,2,3]").unwrap();
        assert_eq!(store.get("queue").unwrap(), Some(b"[1,2,3]".to_vec()));
        assert_eq!(store.get("missing").unwrap(), None);
    }

    #[test]
    fn file_overwrite_replaces_value() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        store.set("queue", b"a long original value").unwrap();
        store.set("queue", b"[]").unwrap();
        assert_eq!(store.get("queue").unwrap(), Some(b"[]".to_vec()));
    }

    #[test]
    fn file_persistence() {
        let dir = tempdir().unwrap();

        {
            let store = FileStore::open(dir.path()).unwrap();
            store.set("audit", b"persistent data").unwrap();
        }

        {
            let store = FileStore::open(dir.path()).unwrap();
            assert_eq!(store.get("audit").unwrap(), Some(b"persistent data".to_vec()));
        }
    }

    #[test]
    fn file_remove() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        store.set("queue", b"[]").unwrap();
        store.remove("queue").unwrap();
        store.remove("queue").unwrap();
        assert_eq!(store.get("queue").unwrap(), None);
    }

    #[test]
    fn file_keys_ignore_foreign_files() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        store.set("beta", b"2").unwrap();
        store.set("alpha", b"1").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"not a value").unwrap();

        assert_eq!(store.keys().unwrap(), vec!["alpha", "beta"]);
    }

    #[test]
    fn file_open_removes_interrupted_writes() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("queue.json.tmp"), b"half written").unwrap();

        let store = FileStore::open(dir.path()).unwrap();
        assert!(!dir.path().join("queue.json.tmp").exists());
        assert_eq!(store.get("queue").unwrap(), None);
    }

    #[test]
    fn file_path() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.path(), dir.path());
    }
}
