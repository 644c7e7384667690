//! Naming and path building.
//!
//! Turns metadata records and user format templates such as
//! `{track_number}. {name}` into filesystem-safe relative paths.
//!
//! # Rules
//! - Interpolated values are sanitized ([`sanitize_name`])
//! - Ordering numbers are zero-padded to the width of their total ([`pad_number`])
//! - Each path segment is truncated on its own to the configured limit
//! - `/` in a template separates directory levels
//! - Unknown placeholders are configuration errors

mod fields;

pub use fields::FieldSet;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Template errors. All of them are fatal for a run.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NamingError {
    #[error("Unknown placeholder {{{0}}} in format template")]
    UnknownField(String),

    #[error("Unbalanced brace in format template: {0}")]
    UnbalancedBrace(String),
}

impl NamingError {
    pub fn is_template_error(&self) -> bool {
        matches!(self, Self::UnknownField(_) | Self::UnbalancedBrace(_))
    }
}

/// Characters that are illegal in file names on at least one common filesystem.
const ILLEGAL_CHARS: [char; 8] = ['\\', '/', '*', '?', '"', '<', '>', '|'];

/// Sanitizes a string for use inside a single path segment.
///
/// Strips control and illegal characters, turns `:` into ` - ` and trims
/// trailing whitespace.
pub fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            ':' => out.push_str(" - "),
            c if ILLEGAL_CHARS.contains(&c) || c.is_control() => {}
            c => out.push(c),
        }
    }
    out.truncate(out.trim_end().len());
    out
}

/// Formats an ordering number padded to the width of `total`.
///
/// Without a total, or with padding disabled, the number is left as is.
/// An absent value formats as an empty string.
pub fn pad_number(value: Option<u32>, total: Option<u32>, zfill: bool) -> String {
    let Some(value) = value else {
        return String::new();
    };
    let width = match total {
        Some(total) if zfill => total.to_string().len(),
        _ => 1,
    };
    format!("{:0width$}", value, width = width)
}

/// Interpolates `{field}` placeholders. `{{` and `}}` are literal braces.
pub fn render(template: &str, fields: &FieldSet) -> Result<String, NamingError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut key = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(k) => key.push(k),
                        None => return Err(NamingError::UnbalancedBrace(template.to_string())),
                    }
                }
                let value = fields
                    .get(key.trim())
                    .ok_or_else(|| NamingError::UnknownField(key.clone()))?;
                out.push_str(value);
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(NamingError::UnbalancedBrace(template.to_string())),
            c => out.push(c),
        }
    }

    Ok(out)
}

/// Truncates to at most `limit` characters and trims trailing whitespace.
///
/// Segments that end up empty or made only of dots become `_`.
fn finish_segment(segment: &str, limit: usize) -> String {
    let truncated: String = segment.chars().take(limit).collect();
    let trimmed = truncated.trim_end();
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Builds relative paths from templates with a per-segment length limit.
#[derive(Debug, Clone, Copy)]
pub struct PathBuilder {
    segment_limit: usize,
}

impl PathBuilder {
    pub fn new(segment_limit: usize) -> Self {
        Self { segment_limit }
    }

    /// Render `template` into a relative path.
    ///
    /// When `extension` is given it is appended to the last segment, and the
    /// segment is shortened so that the whole file name fits the limit.
    pub fn relative(
        &self,
        template: &str,
        fields: &FieldSet,
        extension: Option<&str>,
    ) -> Result<PathBuf, NamingError> {
        let rendered = render(template, fields)?;
        let raw: Vec<&str> = rendered.split('/').collect();
        let last = raw.len() - 1;

        let mut path = PathBuf::new();
        for (i, raw_segment) in raw.iter().enumerate() {
            let segment = sanitize_name(raw_segment);
            if segment.trim().is_empty() && i != last {
                continue;
            }

            let segment = match extension.filter(|_| i == last) {
                Some(ext) => {
                    let room = self.segment_limit.saturating_sub(ext.chars().count() + 1);
                    format!("{}.{}", finish_segment(&segment, room.max(1)), ext)
                }
                None => finish_segment(&segment, self.segment_limit),
            };
            path.push(segment);
        }

        Ok(path)
    }

    /// [`relative`](Self::relative) joined onto `base`.
    pub fn build(
        &self,
        base: &Path,
        template: &str,
        fields: &FieldSet,
        extension: Option<&str>,
    ) -> Result<PathBuf, NamingError> {
        Ok(base.join(self.relative(template, fields, extension)?))
    }
}

/// Paths handed out during a run, keyed to the id that claimed them.
///
/// Two different tracks that render to the same path get distinct files;
/// the same track always gets the same path back.
#[derive(Debug, Default)]
pub struct PathAllocator {
    claimed: HashMap<PathBuf, String>,
}

impl PathAllocator {
    pub fn claim(&mut self, path: PathBuf, id: &str) -> PathBuf {
        let mut candidate = path.clone();
        let mut n = 1;
        loop {
            match self.claimed.get(&candidate) {
                None => {
                    self.claimed.insert(candidate.clone(), id.to_string());
                    return candidate;
                }
                Some(owner) if owner == id => return candidate,
                Some(_) => {
                    n += 1;
                    candidate = with_counter(&path, n);
                }
            }
        }
    }
}

fn with_counter(path: &Path, n: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{} ({}).{}", stem, n, ext.to_string_lossy()),
        None => format!("{} ({})", stem, n),
    };
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> FieldSet {
        let mut set = FieldSet::default();
        for (k, v) in pairs {
            set.insert(k, *v);
        }
        set
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("AC/DC"), "ACDC");
        assert_eq!(sanitize_name("Track: Title"), "Track -  Title");
        assert_eq!(sanitize_name("Valid Name"), "Valid Name");
        assert_eq!(sanitize_name("Artist?  "), "Artist");
        assert_eq!(sanitize_name("a<b>c"), "abc");
        assert_eq!(sanitize_name("tab\there\u{7}"), "tabhere");
        assert_eq!(sanitize_name("Intro:"), "Intro -");
    }

    #[test]
    fn test_pad_number() {
        assert_eq!(pad_number(Some(3), Some(12), true), "03");
        assert_eq!(pad_number(Some(3), Some(120), true), "003");
        assert_eq!(pad_number(Some(3), None, true), "3");
        assert_eq!(pad_number(Some(3), Some(12), false), "3");
        assert_eq!(pad_number(None, Some(12), true), "");
        assert_eq!(pad_number(Some(12), Some(12), true), "12");
    }

    #[test]
    fn test_render_placeholders_and_escapes() {
        let set = fields(&[("name", "Song"), ("track_number", "03")]);
        assert_eq!(render("{track_number}. {name}", &set).unwrap(), "03. Song");
        assert_eq!(render("{{literal}} {name}", &set).unwrap(), "{literal} Song");
    }

    #[test]
    fn test_render_unknown_field() {
        let set = fields(&[("name", "Song")]);
        assert!(matches!(
            render("{nam}", &set),
            Err(NamingError::UnknownField(k)) if k == "nam"
        ));
    }

    #[test]
    fn test_render_unbalanced() {
        let set = fields(&[("name", "Song")]);
        assert!(matches!(render("{name", &set), Err(NamingError::UnbalancedBrace(_))));
        assert!(matches!(render("name}", &set), Err(NamingError::UnbalancedBrace(_))));
    }

    #[test]
    fn test_relative_splits_directories() {
        let set = fields(&[("artist", "AC/DC"), ("name", "Back: In Black")]);
        let path = PathBuilder::new(250)
            .relative("{artist}/{name}", &set, Some("flac"))
            .unwrap();
        assert_eq!(path, PathBuf::from("ACDC/Back -  In Black.flac"));
    }

    #[test]
    fn test_relative_truncates_each_segment() {
        let long = "x".repeat(40);
        let set = fields(&[("album", &long), ("name", &long)]);
        let path = PathBuilder::new(20)
            .relative("{album}/{name}", &set, Some("flac"))
            .unwrap();
        let segments: Vec<String> = path
            .iter()
            .map(|s| s.to_string_lossy().into_owned())
            .collect();
        assert_eq!(segments[0], "x".repeat(20));
        assert_eq!(segments[1], format!("{}.flac", "x".repeat(15)));
    }

    #[test]
    fn test_relative_neutralizes_dot_segments() {
        let set = fields(&[("album", ".."), ("name", "Song")]);
        let path = PathBuilder::new(250)
            .relative("{album}/{name}", &set, None)
            .unwrap();
        assert_eq!(path, PathBuf::from("_/Song"));
    }

    #[test]
    fn test_allocator_disambiguates_collisions() {
        let mut allocator = PathAllocator::default();
        let path = PathBuf::from("/music/Album/01. Intro.flac");

        assert_eq!(allocator.claim(path.clone(), "a"), path);
        assert_eq!(allocator.claim(path.clone(), "a"), path);
        assert_eq!(
            allocator.claim(path.clone(), "b"),
            PathBuf::from("/music/Album/01. Intro (2).flac")
        );
        assert_eq!(
            allocator.claim(path.clone(), "c"),
            PathBuf::from("/music/Album/01. Intro (3).flac")
        );
    }
}
