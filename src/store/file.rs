//! File-backed durable store
//!
//! Protocol for `write_pending`:
//! 1. Write `<path>.tmp`
//! 2. fsync the temp file
//! 3. Atomic rename over `<path>`
//! 4. fsync the parent directory (unix) so the rename itself is durable
//!
//! A crash at any point leaves either the old or the new record, never a mix.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{DurableStore, StoreError};

pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "pending".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl DurableStore for FileStore {
    fn read_pending(&self) -> Result<Option<Vec<u8>>, StoreError> {
        let mut file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        Ok(Some(bytes))
    }

    fn write_pending(&self, bytes: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.tmp_path();
        {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }

        fs::rename(&tmp, &self.path)?;

        #[cfg(unix)]
        {
            if let Some(parent) = self.path.parent()
                && !parent.as_os_str().is_empty()
            {
                File::open(parent)?.sync_all()?;
            }
        }

        debug!(path = %self.path.display(), bytes = bytes.len(), "Pending record written");
        Ok(())
    }
}
