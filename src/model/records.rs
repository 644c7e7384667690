//! Metadata records exchanged between source modules and the pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::codec::Codec;

/// Opaque per-record context a module hands back to itself on follow-up calls.
///
/// The pipeline passes it along untouched and never inspects its contents.
pub type ExtraParams = serde_json::Map<String, serde_json::Value>;

/// Requested download quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    Medium,
    High,
    Lossless,
    #[default]
    HiFi,
}

/// Image file formats for covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Jpg,
    Png,
    Webp,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverCompression {
    Low,
    #[default]
    High,
}

/// What a module should hand back from `get_track_cover`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverOptions {
    pub file_type: ImageFormat,
    pub resolution: u32,
    pub compression: CoverCompression,
}

/// Which exotic codecs a module may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CodecOptions {
    pub proprietary_codecs: bool,
    pub spatial_codecs: bool,
}

/// Kinds of media a run can be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Track,
    Album,
    Playlist,
    Artist,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Track => "track",
            MediaKind::Album => "album",
            MediaKind::Playlist => "playlist",
            MediaKind::Artist => "artist",
        }
    }
}

impl std::str::FromStr for MediaKind {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "track" | "tracks" => Ok(MediaKind::Track),
            "album" | "albums" => Ok(MediaKind::Album),
            "playlist" | "playlists" => Ok(MediaKind::Playlist),
            "artist" | "artists" => Ok(MediaKind::Artist),
            other => Err(crate::error::Error::config(format!(
                "unknown media type '{other}'"
            ))),
        }
    }
}

/// Secondary metadata carried alongside a track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tags {
    pub album_artist: Option<String>,
    pub composer: Option<String>,
    pub track_number: Option<u32>,
    pub total_tracks: Option<u32>,
    pub disc_number: Option<u32>,
    pub total_discs: Option<u32>,
    pub copyright: Option<String>,
    pub isrc: Option<String>,
    pub upc: Option<String>,
    pub replay_gain: Option<f32>,
    pub replay_peak: Option<f32>,
    pub genres: Vec<String>,
    /// `YYYY-MM-DD`
    pub release_date: Option<String>,
    pub label: Option<String>,
    pub description: Option<String>,
    pub comment: Option<String>,
    /// Passthrough fields for containers that accept arbitrary keys
    pub extra_tags: BTreeMap<String, String>,
}

/// Normalized track metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub name: String,
    pub album: String,
    pub album_id: String,
    pub artists: Vec<String>,
    pub artist_id: String,
    pub tags: Tags,
    pub codec: Codec,
    pub cover_url: Option<String>,
    pub release_year: Option<i32>,
    /// Seconds
    pub duration: Option<u32>,
    pub explicit: bool,
    pub bit_depth: u8,
    /// kHz
    pub sample_rate: f32,
    /// kbps
    pub bitrate: Option<u32>,
    pub animated_cover_url: Option<String>,
    pub download_extra: ExtraParams,
    pub cover_extra: ExtraParams,
    pub credits_extra: ExtraParams,
    pub lyrics_extra: ExtraParams,
    /// A module-reported problem; the track is not downloaded when set
    pub error: Option<String>,
}

impl TrackInfo {
    /// Create a track with the given identity and defaults for everything else.
    pub fn new(name: impl Into<String>, artists: Vec<String>, codec: Codec) -> Self {
        Self {
            name: name.into(),
            album: String::new(),
            album_id: String::new(),
            artists,
            artist_id: String::new(),
            tags: Tags::default(),
            codec,
            cover_url: None,
            release_year: None,
            duration: None,
            explicit: false,
            bit_depth: 16,
            sample_rate: 44.1,
            bitrate: None,
            animated_cover_url: None,
            download_extra: ExtraParams::new(),
            cover_extra: ExtraParams::new(),
            credits_extra: ExtraParams::new(),
            lyrics_extra: ExtraParams::new(),
            error: None,
        }
    }

    /// First credited artist, or an empty string.
    pub fn primary_artist(&self) -> &str {
        self.artists.first().map(String::as_str).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlbumInfo {
    pub name: String,
    pub artist: String,
    pub artist_id: String,
    pub tracks: Vec<String>,
    pub release_year: Option<i32>,
    pub explicit: bool,
    /// Display tag such as "24-bit FLAC", appended to folder names
    pub quality: Option<String>,
    pub booklet_url: Option<String>,
    pub cover_url: Option<String>,
    pub cover_type: ImageFormat,
    pub animated_cover_url: Option<String>,
    pub description: Option<String>,
    pub upc: Option<String>,
    pub track_extra: ExtraParams,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaylistInfo {
    pub name: String,
    pub creator: String,
    pub creator_id: String,
    pub tracks: Vec<String>,
    pub release_year: Option<i32>,
    pub explicit: bool,
    pub cover_url: Option<String>,
    pub cover_type: ImageFormat,
    pub animated_cover_url: Option<String>,
    pub description: Option<String>,
    pub track_extra: ExtraParams,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtistInfo {
    pub name: String,
    pub albums: Vec<String>,
    pub album_extra: ExtraParams,
    pub tracks: Vec<String>,
    pub track_extra: ExtraParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverInfo {
    pub url: String,
    pub file_type: ImageFormat,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LyricsInfo {
    pub embedded: Option<String>,
    /// LRC formatted
    pub synced: Option<String>,
}

/// One contributor role and the people credited for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditsInfo {
    pub role: String,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchResult {
    pub result_id: String,
    pub name: Option<String>,
    pub artists: Vec<String>,
    pub year: Option<i32>,
    pub explicit: bool,
    pub additional: Vec<String>,
    pub extra: ExtraParams,
}

/// Where the media bytes for a track come from.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadSource {
    Url {
        url: String,
        headers: Vec<(String, String)>,
    },
    /// The module already wrote the file; the pipeline takes ownership of it
    TempFile { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackDownload {
    pub source: DownloadSource,
    /// Set when the delivered file isn't in `TrackInfo::codec`
    pub different_codec: Option<Codec>,
}

impl TrackDownload {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            source: DownloadSource::Url {
                url: url.into(),
                headers: Vec::new(),
            },
            different_codec: None,
        }
    }

    pub fn temp_file(path: impl Into<PathBuf>) -> Self {
        Self {
            source: DownloadSource::TempFile { path: path.into() },
            different_codec: None,
        }
    }
}

/// A request to acquire one piece of media from one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaIdentification {
    pub kind: MediaKind,
    pub id: String,
    #[serde(default)]
    pub extra: ExtraParams,
}

impl MediaIdentification {
    pub fn new(kind: MediaKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            extra: ExtraParams::new(),
        }
    }
}
