//! Test utilities and fixtures for music-fetcher tests.
//!
//! This module provides an in-memory source module, a counting fetcher and
//! minimal media files so pipeline tests run without a network.
//!
//! # Example
//!
//! ```ignore
//! use music_fetcher::test_utils::{MockFetcher, MockModule, sample_track};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let module = MockModule::new("svc", ModuleModes::DOWNLOAD)
//!         .with_track("1", sample_track("Song"));
//!     let fetcher = MockFetcher::default().with_default(flac_fixture());
//!     // ... test logic
//! }
//! ```

use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::path::Path;
use std::sync::Mutex;

use crate::model::{
    AlbumInfo, ArtistInfo, Codec, CodecOptions, CoverInfo, CoverOptions, CreditsInfo,
    ExtraParams, LyricsInfo, MediaKind, PlaylistInfo, Quality, SearchResult, TrackDownload,
    TrackInfo,
};
use crate::module::{ModuleError, ModuleInformation, ModuleModes, SourceModule};
use crate::transport::{Fetcher, TransportError};

// ============================================================================
// Records
// ============================================================================

/// A FLAC track by "Test Artist" on "Test Album", three minutes long.
///
/// Customize using struct update syntax or by mutating fields.
pub fn sample_track(name: &str) -> TrackInfo {
    let mut track = TrackInfo::new(name, vec!["Test Artist".to_string()], Codec::Flac);
    track.album = "Test Album".to_string();
    track.album_id = "album-1".to_string();
    track.duration = Some(180);
    track
}

// ============================================================================
// Media Fixtures
// ============================================================================

/// Smallest FLAC lofty can rewrite: the marker, STREAMINFO and PADDING.
///
/// 44.1 kHz, 2 channels, 16 bits, one second of samples, no audio frames.
/// lofty needs a block after STREAMINFO to splice tags in front of.
pub fn flac_fixture() -> Vec<u8> {
    let mut bytes = b"fLaC".to_vec();
    // Type 0 (STREAMINFO), length 34
    bytes.extend_from_slice(&[0x00, 0x00, 0x00, 34]);
    bytes.extend_from_slice(&4096u16.to_be_bytes());
    bytes.extend_from_slice(&4096u16.to_be_bytes());
    bytes.extend_from_slice(&[0; 6]);
    let packed: u64 = (44_100u64 << 44) | (1 << 41) | (15 << 36) | 44_100;
    bytes.extend_from_slice(&packed.to_be_bytes());
    bytes.extend_from_slice(&[0; 16]);
    // Last-metadata-block flag, type 1 (PADDING), length 8
    bytes.extend_from_slice(&[0x81, 0x00, 0x00, 8]);
    bytes.extend_from_slice(&[0; 8]);
    bytes
}

/// A FLAC whose only metadata block is STREAMINFO.
///
/// Valid, but lofty panics when asked to write tags into it.
pub fn bare_flac_fixture() -> Vec<u8> {
    let mut bytes = flac_fixture();
    bytes.truncate(4 + 4 + 34);
    // Last-metadata-block flag on STREAMINFO
    bytes[4] = 0x80;
    bytes
}

/// Ten silent MPEG-1 Layer III frames at 128 kbps, 44.1 kHz.
pub fn mp3_fixture() -> Vec<u8> {
    const FRAME_LEN: usize = 417;
    let mut bytes = Vec::with_capacity(FRAME_LEN * 10);
    for _ in 0..10 {
        let mut frame = vec![0u8; FRAME_LEN];
        frame[..4].copy_from_slice(&[0xFF, 0xFB, 0x90, 0x00]);
        bytes.extend_from_slice(&frame);
    }
    bytes
}

/// One second of 48 kHz stereo Opus: OpusHead, OpusTags and one audio page.
pub fn opus_fixture() -> Vec<u8> {
    const PRE_SKIP: u16 = 312;
    let mut head = b"OpusHead".to_vec();
    head.push(1); // Version
    head.push(2); // Channels
    head.extend_from_slice(&PRE_SKIP.to_le_bytes());
    head.extend_from_slice(&48_000u32.to_le_bytes());
    head.extend_from_slice(&0i16.to_le_bytes()); // Output gain
    head.push(0); // Mapping family

    let tags = comment_packet(b"OpusTags", false);
    // Single TOC byte with no frames, enough for a page to carry
    let audio = [0xFC_u8, 0xFF, 0xFE];

    let mut bytes = ogg_page(OGG_FIRST_PAGE, 0, 0, &[&head]);
    bytes.extend(ogg_page(0, 0, 1, &[&tags]));
    bytes.extend(ogg_page(
        OGG_LAST_PAGE,
        u64::from(PRE_SKIP) + 48_000,
        2,
        &[&audio],
    ));
    bytes
}

/// One second of 44.1 kHz stereo Ogg Vorbis: the three header packets and
/// one audio page.
pub fn vorbis_fixture() -> Vec<u8> {
    let mut ident = vec![0x01];
    ident.extend_from_slice(b"vorbis");
    ident.extend_from_slice(&0u32.to_le_bytes()); // Version
    ident.push(2); // Channels
    ident.extend_from_slice(&44_100u32.to_le_bytes());
    ident.extend_from_slice(&0i32.to_le_bytes()); // Maximum bitrate
    ident.extend_from_slice(&128_000i32.to_le_bytes()); // Nominal bitrate
    ident.extend_from_slice(&0i32.to_le_bytes()); // Minimum bitrate
    ident.push(0xB8); // Block sizes 256 / 2048
    ident.push(1); // Framing

    let comments = comment_packet(b"\x03vorbis", true);
    let mut setup = vec![0x05];
    setup.extend_from_slice(b"vorbis");
    setup.extend_from_slice(&[0; 8]);

    let mut bytes = ogg_page(OGG_FIRST_PAGE, 0, 0, &[&ident]);
    bytes.extend(ogg_page(0, 0, 1, &[&comments, &setup]));
    bytes.extend(ogg_page(OGG_LAST_PAGE, 44_100, 2, &[&[0x00]]));
    bytes
}

/// One second of empty AAC in an M4A: `ftyp`, a `moov` with a single sound
/// track and an empty `mdat`.
pub fn m4a_fixture() -> Vec<u8> {
    let mut mdhd = vec![0; 4]; // Version 0, no flags
    mdhd.extend_from_slice(&[0; 8]); // Creation and modification time
    mdhd.extend_from_slice(&44_100u32.to_be_bytes()); // Timescale
    mdhd.extend_from_slice(&44_100u32.to_be_bytes()); // Duration
    mdhd.extend_from_slice(&[0x55, 0xC4, 0, 0]); // Language "und", quality

    let mut hdlr = vec![0; 8]; // Version, flags, pre-defined
    hdlr.extend_from_slice(b"soun");
    hdlr.extend_from_slice(&[0; 12]);
    hdlr.push(0); // Empty name

    let mdia = mp4_atom(b"mdia", &[mp4_atom(b"mdhd", &mdhd), mp4_atom(b"hdlr", &hdlr)].concat());
    let moov = mp4_atom(b"moov", &mp4_atom(b"trak", &mdia));

    let mut bytes = mp4_atom(b"ftyp", b"M4A \0\0\0\0M4A isom");
    bytes.extend(moov);
    bytes.extend(mp4_atom(b"mdat", &[]));
    bytes
}

fn mp4_atom(fourcc: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut atom = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
    atom.extend_from_slice(fourcc);
    atom.extend_from_slice(payload);
    atom
}

const OGG_FIRST_PAGE: u8 = 0x02;
const OGG_LAST_PAGE: u8 = 0x04;

/// An empty comment header with a `"music-fetcher"` vendor string.
fn comment_packet(signature: &[u8], framing_bit: bool) -> Vec<u8> {
    const VENDOR: &[u8] = b"music-fetcher";
    let mut packet = signature.to_vec();
    packet.extend_from_slice(&(VENDOR.len() as u32).to_le_bytes());
    packet.extend_from_slice(VENDOR);
    packet.extend_from_slice(&0u32.to_le_bytes()); // No comments
    if framing_bit {
        packet.push(1);
    }
    packet
}

/// One Ogg page holding whole packets, with its checksum filled in.
fn ogg_page(header_type: u8, granule: u64, sequence: u32, packets: &[&[u8]]) -> Vec<u8> {
    let mut lacing = Vec::new();
    for packet in packets {
        lacing.extend(std::iter::repeat_n(255u8, packet.len() / 255));
        lacing.push((packet.len() % 255) as u8);
    }

    let mut page = b"OggS".to_vec();
    page.push(0); // Version
    page.push(header_type);
    page.extend_from_slice(&granule.to_le_bytes());
    page.extend_from_slice(&0x4D46_u32.to_le_bytes()); // Stream serial
    page.extend_from_slice(&sequence.to_le_bytes());
    page.extend_from_slice(&[0; 4]); // Checksum, filled in below
    page.push(lacing.len() as u8);
    page.extend_from_slice(&lacing);
    for packet in packets {
        page.extend_from_slice(packet);
    }

    let crc = ogg_crc(&page);
    page[22..26].copy_from_slice(&crc.to_le_bytes());
    page
}

/// CRC-32 with polynomial 0x04C11DB7, no reflection, zero initial value.
fn ogg_crc(data: &[u8]) -> u32 {
    data.iter().fold(0u32, |mut crc, &byte| {
        crc ^= u32::from(byte) << 24;
        for _ in 0..8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ 0x04C1_1DB7
            } else {
                crc << 1
            };
        }
        crc
    })
}

// ============================================================================
// Images
// ============================================================================

pub fn gradient_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 4) as u8, (y * 4) as u8, 128])
    }))
}

pub fn solid_image(width: u32, height: u32, rgb: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(rgb)))
}

pub fn encode_png(image: &DynamicImage) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, image::ImageFormat::Png)
        .expect("Failed to encode PNG");
    buffer.into_inner()
}

// ============================================================================
// Tools
// ============================================================================

/// A stand-in for ffmpeg that writes `output` to the last argument, or fails
/// when there is none.
#[cfg(unix)]
pub fn fake_ffmpeg(dir: &Path, output: Option<&Path>) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = match output {
        Some(output) => format!(
            "#!/bin/sh\nfor arg; do last=\"$arg\"; done\ncp '{}' \"$last\"\n",
            output.display()
        ),
        None => "#!/bin/sh\necho 'Conversion failed!' >&2\nexit 1\n".to_string(),
    };
    let path = dir.join("fake-ffmpeg");
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

// ============================================================================
// Mock Fetcher
// ============================================================================

/// Serves canned bodies by URL and counts requests.
///
/// URLs match exactly first, then by longest registered prefix, then fall
/// back to the default body. Anything else is a 404.
#[derive(Default)]
pub struct MockFetcher {
    bodies: Vec<(String, Vec<u8>)>,
    default_body: Option<Vec<u8>>,
    log: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn with_body(mut self, url: &str, body: &[u8]) -> Self {
        self.bodies.push((url.to_string(), body.to_vec()));
        self
    }

    pub fn with_default(mut self, body: Vec<u8>) -> Self {
        self.default_body = Some(body);
        self
    }

    pub fn calls(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn body_for(&self, url: &str) -> Option<&[u8]> {
        if let Some((_, body)) = self.bodies.iter().find(|(u, _)| u == url) {
            return Some(body.as_slice());
        }
        self.bodies
            .iter()
            .filter(|(u, _)| url.starts_with(u.as_str()))
            .max_by_key(|(u, _)| u.len())
            .map(|(_, body)| body.as_slice())
            .or(self.default_body.as_deref())
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch_to_file(
        &self,
        url: &str,
        _headers: &[(String, String)],
        dest: &Path,
    ) -> Result<(), TransportError> {
        self.log.lock().unwrap().push(url.to_string());
        let body = self.body_for(url).ok_or_else(|| TransportError::Status {
            url: url.to_string(),
            status: 404,
        })?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, body)?;
        Ok(())
    }
}

// ============================================================================
// Mock Module
// ============================================================================

/// In-memory source module with call recording.
///
/// Downloads resolve to `https://media.example.com/<id>`, so pair it with a
/// [`MockFetcher`] that has a default body.
pub struct MockModule {
    info: ModuleInformation,
    tracks: HashMap<String, TrackInfo>,
    failing_downloads: HashSet<String>,
    downloads: HashMap<String, TrackDownload>,
    albums: HashMap<String, AlbumInfo>,
    playlists: HashMap<String, PlaylistInfo>,
    artists: HashMap<String, ArtistInfo>,
    covers: HashMap<String, String>,
    lyrics: HashMap<String, LyricsInfo>,
    credits: HashMap<String, Vec<CreditsInfo>>,
    search_results: Vec<SearchResult>,
    calls: Mutex<Vec<String>>,
}

impl MockModule {
    pub fn new(name: &str, modes: ModuleModes) -> Self {
        Self {
            info: ModuleInformation {
                service_name: name.to_string(),
                supported_modes: modes,
                netlocs: Vec::new(),
            },
            tracks: HashMap::new(),
            failing_downloads: HashSet::new(),
            downloads: HashMap::new(),
            albums: HashMap::new(),
            playlists: HashMap::new(),
            artists: HashMap::new(),
            covers: HashMap::new(),
            lyrics: HashMap::new(),
            credits: HashMap::new(),
            search_results: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_netlocs(mut self, netlocs: &[&str]) -> Self {
        self.info.netlocs = netlocs.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn with_track(mut self, id: &str, track: TrackInfo) -> Self {
        self.tracks.insert(id.to_string(), track);
        self
    }

    /// A track whose metadata resolves but whose download is refused.
    pub fn with_failing_track(mut self, id: &str, track: TrackInfo) -> Self {
        self.failing_downloads.insert(id.to_string());
        self.with_track(id, track)
    }

    /// Answer `get_track_download` for `id` with `download` instead of a URL.
    pub fn with_download(mut self, id: &str, download: TrackDownload) -> Self {
        self.downloads.insert(id.to_string(), download);
        self
    }

    pub fn with_album(mut self, id: &str, album: AlbumInfo) -> Self {
        self.albums.insert(id.to_string(), album);
        self
    }

    pub fn with_playlist(mut self, id: &str, playlist: PlaylistInfo) -> Self {
        self.playlists.insert(id.to_string(), playlist);
        self
    }

    pub fn with_artist(mut self, id: &str, artist: ArtistInfo) -> Self {
        self.artists.insert(id.to_string(), artist);
        self
    }

    pub fn with_cover(mut self, id: &str, url: &str) -> Self {
        self.covers.insert(id.to_string(), url.to_string());
        self
    }

    pub fn with_lyrics(mut self, id: &str, lyrics: LyricsInfo) -> Self {
        self.lyrics.insert(id.to_string(), lyrics);
        self
    }

    pub fn with_credits(mut self, id: &str, credits: Vec<CreditsInfo>) -> Self {
        self.credits.insert(id.to_string(), credits);
        self
    }

    pub fn with_search_results(mut self, results: Vec<SearchResult>) -> Self {
        self.search_results = results;
        self
    }

    /// Recorded calls as `operation:id`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn record(&self, operation: &str, id: &str) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{}:{}", operation, id));
    }
}

/// Search result pointing at `id` with a marker in its extra parameters.
pub fn search_hit(id: &str) -> SearchResult {
    let mut extra = ExtraParams::new();
    extra.insert("hit".to_string(), serde_json::Value::String(id.to_string()));
    SearchResult {
        result_id: id.to_string(),
        extra,
        ..Default::default()
    }
}

#[async_trait]
impl SourceModule for MockModule {
    fn information(&self) -> &ModuleInformation {
        &self.info
    }

    async fn get_track_info(
        &self,
        id: &str,
        _quality: Quality,
        _codec_options: CodecOptions,
        _ctx: &ExtraParams,
    ) -> Result<TrackInfo, ModuleError> {
        self.record("get_track_info", id);
        self.tracks
            .get(id)
            .cloned()
            .ok_or_else(|| ModuleError::NotFound(id.to_string()))
    }

    async fn get_album_info(
        &self,
        id: &str,
        _ctx: &ExtraParams,
    ) -> Result<Option<AlbumInfo>, ModuleError> {
        self.record("get_album_info", id);
        Ok(self.albums.get(id).cloned())
    }

    async fn get_playlist_info(
        &self,
        id: &str,
        _ctx: &ExtraParams,
    ) -> Result<PlaylistInfo, ModuleError> {
        self.record("get_playlist_info", id);
        self.playlists
            .get(id)
            .cloned()
            .ok_or_else(|| ModuleError::NotFound(id.to_string()))
    }

    async fn get_artist_info(
        &self,
        id: &str,
        _return_credited_albums: bool,
        _ctx: &ExtraParams,
    ) -> Result<ArtistInfo, ModuleError> {
        self.record("get_artist_info", id);
        self.artists
            .get(id)
            .cloned()
            .ok_or_else(|| ModuleError::NotFound(id.to_string()))
    }

    async fn get_track_download(
        &self,
        id: &str,
        _ctx: &ExtraParams,
    ) -> Result<TrackDownload, ModuleError> {
        self.record("get_track_download", id);
        if self.failing_downloads.contains(id) {
            return Err(ModuleError::Api(format!("download refused for {}", id)));
        }
        if let Some(download) = self.downloads.get(id) {
            return Ok(download.clone());
        }
        Ok(TrackDownload::url(format!("https://media.example.com/{}", id)))
    }

    async fn get_track_cover(
        &self,
        id: &str,
        options: CoverOptions,
        _ctx: &ExtraParams,
    ) -> Result<CoverInfo, ModuleError> {
        self.record("get_track_cover", id);
        self.covers
            .get(id)
            .map(|url| CoverInfo {
                url: url.clone(),
                file_type: options.file_type,
            })
            .ok_or_else(|| ModuleError::NotFound(id.to_string()))
    }

    async fn get_track_lyrics(
        &self,
        id: &str,
        _ctx: &ExtraParams,
    ) -> Result<LyricsInfo, ModuleError> {
        self.record("get_track_lyrics", id);
        Ok(self.lyrics.get(id).cloned().unwrap_or_default())
    }

    async fn get_track_credits(
        &self,
        id: &str,
        _ctx: &ExtraParams,
    ) -> Result<Vec<CreditsInfo>, ModuleError> {
        self.record("get_track_credits", id);
        Ok(self.credits.get(id).cloned().unwrap_or_default())
    }

    async fn search(
        &self,
        _kind: MediaKind,
        query: &str,
        _context: Option<&TrackInfo>,
        limit: usize,
    ) -> Result<Vec<SearchResult>, ModuleError> {
        self.record("search", query);
        Ok(self.search_results.iter().take(limit).cloned().collect())
    }
}
