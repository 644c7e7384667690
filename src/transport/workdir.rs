//! Per-run scratch directory with randomly named files.

use std::io;
use std::path::{Path, PathBuf};

/// Scratch directory removed when dropped.
#[derive(Debug)]
pub struct WorkDir {
    root: PathBuf,
}

/// 16 random bytes as lowercase hex.
pub fn random_name() -> String {
    rand::random::<[u8; 16]>()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

impl WorkDir {
    /// Create a fresh directory under the system temp dir.
    pub fn create() -> io::Result<Self> {
        Self::create_in(&std::env::temp_dir())
    }

    pub fn create_in(parent: &Path) -> io::Result<Self> {
        let root = parent.join(format!("music-fetcher-{}", random_name()));
        std::fs::create_dir_all(&root)?;
        tracing::debug!("Created work dir {:?}", root);
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// A path for a new scratch file. Nothing is created on disk.
    pub fn temp_file(&self) -> PathBuf {
        self.root.join(random_name())
    }
}

/// Move a file, falling back to copy + delete across filesystems.
pub fn move_file(source: &Path, dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if std::fs::rename(source, dest).is_err() {
        std::fs::copy(source, dest)?;
        std::fs::remove_file(source)?;
    }
    Ok(())
}

/// `path` with `.ext` appended, keeping any dots already in the name.
pub fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.root) {
            tracing::warn!("Failed to remove work dir {:?}: {}", self.root, e);
        }
    }
}
