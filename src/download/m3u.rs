//! M3U playlist index files.

use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::{M3uPaths, PlaylistSettings};

/// One playlist line.
#[derive(Debug, Clone, PartialEq)]
pub struct M3uEntry {
    pub path: PathBuf,
    /// Seconds
    pub duration: Option<u32>,
    pub artist: String,
    pub title: String,
}

fn entry_path(path: &Path, paths: M3uPaths, m3u_dir: &Path) -> PathBuf {
    match paths {
        M3uPaths::Relative => path
            .strip_prefix(m3u_dir)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf()),
        M3uPaths::Absolute => std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()),
    }
}

pub fn render(entries: &[M3uEntry], settings: &PlaylistSettings, m3u_dir: &Path) -> String {
    let mut out = String::new();
    if settings.extended_m3u {
        out.push_str("#EXTM3U\n");
    }
    for entry in entries {
        if settings.extended_m3u {
            let duration = entry.duration.map(i64::from).unwrap_or(-1);
            let _ = writeln!(out, "#EXTINF:{},{} - {}", duration, entry.artist, entry.title);
        }
        let _ = writeln!(
            out,
            "{}",
            entry_path(&entry.path, settings.paths_m3u, m3u_dir).display()
        );
    }
    out
}

/// Write the index to `path`, replacing any previous one.
pub fn write(path: &Path, entries: &[M3uEntry], settings: &PlaylistSettings) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new(""));
    std::fs::write(path, render(entries, settings, dir))?;
    tracing::info!(tracks = entries.len(), "Wrote playlist index {:?}", path);
    Ok(())
}
