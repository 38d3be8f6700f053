//! # File-Backed Snapshot Store
//!
//! Keeps each snapshot as one file in a directory. Saves write to a
//! temporary sibling and rename it over the target, so a crash mid-save
//! leaves the previous snapshot intact; the rename is the commit point.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use eyre::{Result, WrapErr};

use super::SnapshotStore;

#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at `dir`. The directory is created on the
    /// first save, not here, so constructing a store is infallible.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }
}

impl SnapshotStore for FileStore {
    fn save(&self, key: &str, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .wrap_err_with(|| format!("failed to create snapshot dir '{}'", self.dir.display()))?;

        let target = self.dir.join(key);
        let tmp = self.dir.join(format!("{key}.tmp"));
        fs::write(&tmp, bytes)
            .wrap_err_with(|| format!("failed to write snapshot to '{}'", tmp.display()))?;
        fs::rename(&tmp, &target)
            .wrap_err_with(|| format!("failed to publish snapshot at '{}'", target.display()))?;
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let target = self.dir.join(key);
        match fs::read(&target) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err)
                .wrap_err_with(|| format!("failed to read snapshot from '{}'", target.display())),
        }
    }
}
