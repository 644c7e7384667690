//! Plain-text fallback for tags that could not be saved.

use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

use crate::model::CreditsInfo;

/// `<dir>/<stem>_tags.txt` for a media file.
pub fn sidecar_path(media: &Path) -> PathBuf {
    let stem = media
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    media.with_file_name(format!("{}_tags.txt", stem))
}

fn render(
    media: &Path,
    fields: &[(String, String)],
    credits: &[CreditsInfo],
    lyrics: Option<&str>,
) -> String {
    let name = media
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut out = String::new();
    let _ = writeln!(out, "Tags for {}", name);
    let _ = writeln!(
        out,
        "Written {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    out.push('\n');

    for (label, value) in fields {
        let _ = writeln!(out, "{}: {}", label, value);
    }

    if !credits.is_empty() {
        out.push_str("\nCredits\n");
        for credit in credits {
            let _ = writeln!(out, "{}: {}", credit.role, credit.names.join(", "));
        }
    }

    if let Some(lyrics) = lyrics {
        out.push_str("\nLyrics\n");
        out.push_str(lyrics);
        out.push('\n');
    }

    out
}

/// Write the sidecar. On failure the error carries the path that was tried.
pub(super) fn write(
    media: &Path,
    fields: &[(String, String)],
    credits: &[CreditsInfo],
    lyrics: Option<&str>,
) -> Result<PathBuf, (PathBuf, io::Error)> {
    let path = sidecar_path(media);
    match std::fs::write(&path, render(media, fields, credits, lyrics)) {
        Ok(()) => Ok(path),
        Err(e) => Err((path, e)),
    }
}
