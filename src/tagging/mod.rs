//! Tag writing for the five supported containers.
//!
//! Uses lofty's format-independent [`Tag`] and lets it convert to the
//! container's native format on save. What differs per container lives in
//! [`ContainerProfile`]:
//!
//! | Container | Tag format | Numbering | Date | Explicit |
//! |-----------|------------|-----------|------|----------|
//! | FLAC, Opus, Ogg | Vorbis comments | separate totals | full | `RATING` text |
//! | M4A | MP4 ilst | native pair atom | full | advisory atom |
//! | MP3 | ID3v2 | `N/Total` | year | `Rating` user text |
//!
//! A failed save never loses metadata: the attempted fields are written to a
//! `<stem>_tags.txt` sidecar instead ([`TagOutcome::FailedWithSidecar`]).

mod sidecar;

pub use sidecar::sidecar_path;

use lofty::config::WriteOptions;
use lofty::id3::v2::Id3v2Tag;
use lofty::picture::{Picture, PictureType};
use lofty::tag::{Accessor, ItemKey, ItemValue, Tag, TagExt, TagItem, TagType};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::model::{Container, CreditsInfo, TrackInfo};

/// Covers larger than this are not embedded.
pub const MAX_EMBEDDED_COVER: u64 = 16 * 1024 * 1024;

/// Tagging failures that left nothing usable behind.
#[derive(Debug, thiserror::Error)]
pub enum TagError {
    #[error("Failed to save tags ({save}) and to write sidecar {path:?}: {source}")]
    Sidecar {
        save: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Tagging {path:?} aborted: {reason}")]
    Aborted { path: PathBuf, reason: String },
}

/// How tagging went for one file.
#[derive(Debug, Clone, PartialEq)]
pub enum TagOutcome {
    Written,
    /// Saved, but some fields could not be included
    WrittenDegraded { skipped: Vec<String> },
    /// Saving failed; the tags are in a sidecar text file
    FailedWithSidecar { sidecar: PathBuf },
}

/// How user-defined keys are spelled in a tag format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CustomKeys {
    /// Upper-case Vorbis comment field names
    Vorbis,
    /// `----:com.apple.iTunes:<name>` atoms
    Freeform,
    /// ID3v2 `TXXX` frames
    UserText,
}

/// Per-container field mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerProfile {
    tag_type: TagType,
    custom_keys: CustomKeys,
    /// Track and disc numbers written as `N/Total`
    compound_numbering: bool,
    full_date: bool,
    advisory_atom: bool,
    replay_gain: bool,
    description: bool,
    extra_tags: bool,
}

impl ContainerProfile {
    pub fn for_container(container: Container) -> Self {
        let vorbis = Self {
            tag_type: TagType::VorbisComments,
            custom_keys: CustomKeys::Vorbis,
            compound_numbering: false,
            full_date: true,
            advisory_atom: false,
            replay_gain: true,
            description: false,
            extra_tags: true,
        };
        match container {
            Container::Flac | Container::Opus | Container::Ogg => vorbis,
            Container::M4a => Self {
                tag_type: TagType::Mp4Ilst,
                custom_keys: CustomKeys::Freeform,
                advisory_atom: true,
                replay_gain: false,
                description: true,
                ..vorbis
            },
            Container::Mp3 => Self {
                tag_type: TagType::Id3v2,
                custom_keys: CustomKeys::UserText,
                compound_numbering: true,
                full_date: false,
                extra_tags: false,
                ..vorbis
            },
        }
    }

    pub fn tag_type(&self) -> TagType {
        self.tag_type
    }
}

/// Collects fields into a lofty [`Tag`] and remembers what was attempted.
struct TagBuilder {
    profile: ContainerProfile,
    tag: Tag,
    /// ID3v2 user text frames, added after conversion
    user_text: Vec<(String, String)>,
    attempted: Vec<(String, String)>,
    skipped: Vec<String>,
}

impl TagBuilder {
    fn new(profile: ContainerProfile) -> Self {
        Self {
            profile,
            tag: Tag::new(profile.tag_type),
            user_text: Vec::new(),
            attempted: Vec::new(),
            skipped: Vec::new(),
        }
    }

    fn text(&mut self, key: ItemKey, label: &str, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            return;
        }
        self.attempted.push((label.to_string(), value.clone()));
        self.tag
            .push_unchecked(TagItem::new(key, ItemValue::Text(value)));
    }

    fn opt(&mut self, key: ItemKey, label: &str, value: Option<&str>) {
        if let Some(value) = value {
            self.text(key, label, value);
        }
    }

    /// A field with a user-defined name. Repeating a name keeps every value.
    fn custom(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        self.attempted.push((name.to_string(), value.clone()));
        let key = match self.profile.custom_keys {
            CustomKeys::Vorbis => name.to_uppercase(),
            CustomKeys::Freeform => format!("----:com.apple.iTunes:{}", name),
            CustomKeys::UserText => {
                self.user_text.push((name.to_string(), value));
                return;
            }
        };
        self.tag
            .push_unchecked(TagItem::new(ItemKey::Unknown(key), ItemValue::Text(value)));
    }

    /// Repeated values, or one joined value for ID3v2.
    fn multi(&mut self, key: ItemKey, label: &str, values: &[String]) {
        if self.profile.compound_numbering {
            self.text(key, label, values.join("/"));
        } else {
            for value in values {
                self.text(key.clone(), label, value.as_str());
            }
        }
    }

    fn numbering(
        &mut self,
        number_key: ItemKey,
        total_key: ItemKey,
        label: &str,
        number: Option<u32>,
        total: Option<u32>,
    ) {
        let Some(number) = number else {
            return;
        };
        if self.profile.compound_numbering {
            let value = match total {
                Some(total) => format!("{}/{}", number, total),
                None => number.to_string(),
            };
            self.attempted.push((label.to_string(), value));
        } else {
            self.attempted.push((label.to_string(), number.to_string()));
            if let Some(total) = total {
                self.attempted
                    .push((format!("{} total", label), total.to_string()));
            }
        }
        // Stored as separate keys; ID3v2 conversion joins them into one frame
        self.tag
            .push_unchecked(TagItem::new(number_key, ItemValue::Text(number.to_string())));
        if let Some(total) = total {
            self.tag
                .push_unchecked(TagItem::new(total_key, ItemValue::Text(total.to_string())));
        }
    }

    fn cover(&mut self, path: &Path) {
        match read_cover(path) {
            Ok(Some(picture)) => {
                self.attempted
                    .push(("Cover".to_string(), path.display().to_string()));
                self.tag.push_picture(picture);
            }
            Ok(None) => self.skipped.push("cover".to_string()),
            Err(e) => {
                tracing::warn!("Could not read cover {:?}: {}", path, e);
                self.skipped.push("cover".to_string());
            }
        }
    }

    fn save(self, path: &Path, track: &TrackInfo) -> Result<(), lofty::error::LoftyError> {
        if self.profile.custom_keys != CustomKeys::UserText {
            return self.tag.save_to_path(path, WriteOptions::default());
        }

        let mut id3 = Id3v2Tag::from(self.tag);
        // Id3v2Tag keeps number and total together in TRCK/TPOS
        if let Some(n) = track.tags.track_number {
            id3.set_track(n);
            if let Some(total) = track.tags.total_tracks {
                id3.set_track_total(total);
            }
        }
        if let Some(n) = track.tags.disc_number {
            id3.set_disk(n);
            if let Some(total) = track.tags.total_discs {
                id3.set_disk_total(total);
            }
        }
        for (description, content) in self.user_text {
            id3.insert_user_text(description, content);
        }
        id3.save_to_path(path, WriteOptions::default())
    }
}

/// Load a cover for embedding. `None` when it's over the size limit.
fn read_cover(path: &Path) -> Result<Option<Picture>, Box<dyn std::error::Error>> {
    let size = std::fs::metadata(path)?.len();
    if size > MAX_EMBEDDED_COVER {
        tracing::warn!(
            size,
            "Cover {:?} is larger than {} bytes, not embedding",
            path,
            MAX_EMBEDDED_COVER
        );
        return Ok(None);
    }
    let mut reader = BufReader::new(File::open(path)?);
    let mut picture = Picture::from_reader(&mut reader)?;
    picture.set_pic_type(PictureType::CoverFront);
    Ok(Some(picture))
}

/// Write all metadata for `track` into the media file at `path`.
///
/// On a failed save, the attempted fields, credits and lyrics go into a
/// sidecar text file next to the media instead.
pub fn tag_file(
    path: &Path,
    cover: Option<&Path>,
    track: &TrackInfo,
    credits: &[CreditsInfo],
    embedded_lyrics: Option<&str>,
    container: Container,
) -> Result<TagOutcome, TagError> {
    let profile = ContainerProfile::for_container(container);
    let mut builder = TagBuilder::new(profile);
    let tags = &track.tags;

    builder.text(ItemKey::TrackTitle, "Title", track.name.as_str());
    builder.multi(ItemKey::TrackArtist, "Artist", &track.artists);
    builder.text(ItemKey::AlbumTitle, "Album", track.album.as_str());
    builder.opt(ItemKey::AlbumArtist, "Album artist", tags.album_artist.as_deref());
    builder.opt(ItemKey::Composer, "Composer", tags.composer.as_deref());
    builder.numbering(
        ItemKey::TrackNumber,
        ItemKey::TrackTotal,
        "Track number",
        tags.track_number,
        tags.total_tracks,
    );
    builder.numbering(
        ItemKey::DiscNumber,
        ItemKey::DiscTotal,
        "Disc number",
        tags.disc_number,
        tags.total_discs,
    );

    let date = match (&tags.release_date, track.release_year) {
        (Some(date), _) if profile.full_date => Some(date.clone()),
        (Some(date), _) => date.get(..4).map(str::to_string),
        (None, Some(year)) => Some(year.to_string()),
        (None, None) => None,
    };
    builder.opt(ItemKey::RecordingDate, "Date", date.as_deref());

    if !tags.genres.is_empty() {
        builder.multi(ItemKey::Genre, "Genre", &tags.genres);
    }

    if profile.advisory_atom {
        let advisory = if track.explicit { "1" } else { "2" };
        builder.text(ItemKey::ParentalAdvisory, "Explicit", advisory);
    } else {
        builder.custom("Rating", if track.explicit { "Explicit" } else { "Clean" });
    }

    builder.opt(ItemKey::Isrc, "ISRC", tags.isrc.as_deref());
    builder.opt(ItemKey::Barcode, "UPC", tags.upc.as_deref());
    builder.opt(ItemKey::CopyrightMessage, "Copyright", tags.copyright.as_deref());
    builder.opt(ItemKey::Label, "Label", tags.label.as_deref());
    builder.opt(ItemKey::Comment, "Comment", tags.comment.as_deref());
    if profile.description {
        builder.opt(ItemKey::Description, "Description", tags.description.as_deref());
    }

    if profile.replay_gain {
        if let Some(gain) = tags.replay_gain {
            builder.text(ItemKey::ReplayGainTrackGain, "Replay gain", format!("{:.2} dB", gain));
        }
        if let Some(peak) = tags.replay_peak {
            builder.text(ItemKey::ReplayGainTrackPeak, "Replay peak", format!("{:.6}", peak));
        }
    }

    if profile.extra_tags {
        for (key, value) in &tags.extra_tags {
            builder.custom(key, value.as_str());
        }
    }

    for credit in credits {
        if profile.custom_keys == CustomKeys::UserText {
            builder.custom(&credit.role, credit.names.join("/"));
        } else {
            for name in &credit.names {
                builder.custom(&credit.role, name.as_str());
            }
        }
    }

    builder.opt(ItemKey::Lyrics, "Lyrics", embedded_lyrics);

    if let Some(cover) = cover {
        builder.cover(cover);
    }

    let attempted = builder.attempted.clone();
    let skipped = builder.skipped.clone();

    match builder.save(path, track) {
        Ok(()) if skipped.is_empty() => {
            tracing::debug!("Tagged {:?}", path);
            Ok(TagOutcome::Written)
        }
        Ok(()) => {
            tracing::warn!(?skipped, "Tagged {:?} without some fields", path);
            Ok(TagOutcome::WrittenDegraded { skipped })
        }
        Err(save_error) => {
            tracing::warn!("Failed to save tags to {:?}: {}", path, save_error);
            let sidecar = sidecar::write(path, &attempted, credits, embedded_lyrics).map_err(
                |(sidecar_path, source)| TagError::Sidecar {
                    save: save_error.to_string(),
                    path: sidecar_path,
                    source,
                },
            )?;
            tracing::info!("Wrote tags to {:?} instead", sidecar);
            Ok(TagOutcome::FailedWithSidecar { sidecar })
        }
    }
}

/// Everything [`tag_file`] needs, owned so it can move to a blocking thread.
#[derive(Debug, Clone)]
pub struct TagJob {
    pub path: PathBuf,
    pub cover: Option<PathBuf>,
    pub track: TrackInfo,
    pub credits: Vec<CreditsInfo>,
    pub embedded_lyrics: Option<String>,
    pub container: Container,
}

impl TagJob {
    /// Tag on the blocking pool.
    ///
    /// A panic inside the tag library ends up as [`TagError::Aborted`] for
    /// this file only.
    pub async fn run(self) -> Result<TagOutcome, TagError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            tag_file(
                &self.path,
                self.cover.as_deref(),
                &self.track,
                &self.credits,
                self.embedded_lyrics.as_deref(),
                self.container,
            )
        })
        .await
        .map_err(|e| {
            tracing::error!("Tagging {:?} panicked: {}", path, e);
            TagError::Aborted {
                path,
                reason: e.to_string(),
            }
        })?
    }
}
