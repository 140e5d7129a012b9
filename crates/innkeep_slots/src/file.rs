//! File-based slot store for persistent storage.

use crate::error::{SlotError, SlotResult};
use crate::store::{validate_key, SlotStore};
use parking_lot::RwLock;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const SLOT_EXTENSION: &str = "slot";

/// A directory-backed slot store.
///
/// Every slot lives in its own file `<key>.slot` inside the directory.
/// Data survives process restarts.
///
/// # Durability
///
/// A write goes to a temporary file which is then renamed over the slot
/// file, so a crash leaves either the old or the new value, never a torn
/// one. With `sync_on_write` enabled the temporary file is also synced
/// before the rename.
///
/// # Thread Safety
///
/// The store is thread-safe; an internal lock serializes writers.
///
/// # Example
///
/// ```no_run
/// use innkeep_slots::{SlotStore, FileSlots};
/// use std::path::Path;
///
/// let slots = FileSlots::open(Path::new("data/slots")).unwrap();
/// slots.set("rooms", "[]").unwrap();
/// ```
#[derive(Debug)]
pub struct FileSlots {
    dir: PathBuf,
    sync_on_write: bool,
    lock: RwLock<()>,
}

impl FileSlots {
    /// Opens or creates a slot directory at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, or if the
    /// path exists and is not a directory.
    pub fn open(dir: &Path) -> SlotResult<Self> {
        fs::create_dir_all(dir)?;
        if !dir.is_dir() {
            return Err(SlotError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", dir.display()),
            )));
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            sync_on_write: false,
            lock: RwLock::new(()),
        })
    }

    /// Sets whether every write is synced to disk before it is published.
    #[must_use]
    pub fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Returns the slot directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{SLOT_EXTENSION}"))
    }
}

impl SlotStore for FileSlots {
    fn get(&self, key: &str) -> SlotResult<Option<String>> {
        validate_key(key)?;
        let _guard = self.lock.read();

        match fs::read(self.slot_path(key)) {
            Ok(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| SlotError::Corrupted(format!("slot {key} is not valid UTF-8"))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> SlotResult<()> {
        validate_key(key)?;
        let _guard = self.lock.write();

        let path = self.slot_path(key);
        let tmp = self.dir.join(format!(".{key}.{SLOT_EXTENSION}.tmp"));

        {
            let mut file: File = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp)?;
            file.write_all(value.as_bytes())?;
            if self.sync_on_write {
                file.sync_all()?;
            }
        }
        fs::rename(&tmp, &path)?;

        debug!(slot = key, bytes = value.len(), "slot written");
        Ok(())
    }

    fn remove(&self, key: &str) -> SlotResult<()> {
        validate_key(key)?;
        let _guard = self.lock.write();

        match fs::remove_file(self.slot_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> SlotResult<Vec<String>> {
        let _guard = self.lock.read();

        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SLOT_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_key(stem).is_ok() {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}
