//! Write guard that removes unfinished files.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// A file being written. Dropped before [`commit`](Self::commit), it deletes itself.
#[derive(Debug)]
pub struct PartialFile {
    path: PathBuf,
    file: Option<File>,
}

impl PartialFile {
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
        })
    }

    pub fn file_mut(&mut self) -> &mut File {
        self.file
            .as_mut()
            .expect("file is present until commit consumes the guard")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sync and keep the file.
    pub fn commit(mut self) -> io::Result<PathBuf> {
        if let Some(file) = self.file.take() {
            file.sync_all()?;
        }
        Ok(std::mem::take(&mut self.path))
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        // Only an uncommitted guard still owns its handle
        if let Some(file) = self.file.take() {
            drop(file);
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!("Failed to remove partial file {:?}: {}", self.path, e);
            } else {
                tracing::debug!("Removed partial file {:?}", self.path);
            }
        }
    }
}
