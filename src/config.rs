//! Settings stored as TOML.
//!
//! Settings live in the OS-standard config directory:
//! - Windows: %APPDATA%\music-fetcher\settings.toml
//! - macOS: ~/Library/Application Support/music-fetcher/settings.toml
//! - Linux: ~/.config/music-fetcher/settings.toml
//!
//! Every section is `#[serde(default)]`, so a partial file only overrides
//! what it names.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::model::{Codec, CodecOptions, CoverCompression, CoverOptions, ImageFormat, Quality};

/// Name of the primary module in `module_defaults`.
pub const DEFAULT_MODULE: &str = "default";

/// Run settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub artist_downloading: ArtistSettings,
    pub formatting: FormattingSettings,
    pub codecs: CodecSettings,
    pub module_defaults: ModuleDefaults,
    pub lyrics: LyricsSettings,
    pub covers: CoverSettings,
    pub playlist: PlaylistSettings,
    pub advanced: AdvancedSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    pub download_path: PathBuf,
    pub download_quality: Quality,
    /// Max results requested from cross-catalog searches
    pub search_limit: usize,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            download_path: PathBuf::from("./downloads/"),
            download_quality: Quality::HiFi,
            search_limit: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtistSettings {
    pub return_credited_albums: bool,
    /// Skip flat-list tracks already fetched as part of an album
    pub separate_tracks_skip_downloaded: bool,
}

impl Default for ArtistSettings {
    fn default() -> Self {
        Self {
            return_credited_albums: true,
            separate_tracks_skip_downloaded: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormattingSettings {
    pub album_format: String,
    pub playlist_format: String,
    pub artist_format: String,
    pub track_filename_format: String,
    pub single_full_path_format: String,
    pub enable_zfill: bool,
    /// Keep album folders even for single-track releases
    pub force_album_format: bool,
    /// Max characters per path segment
    pub path_segment_limit: usize,
}

impl Default for FormattingSettings {
    fn default() -> Self {
        Self {
            album_format: "{name}{explicit}".to_string(),
            playlist_format: "{name}{explicit}".to_string(),
            artist_format: "{name}".to_string(),
            track_filename_format: "{track_number}. {name}".to_string(),
            single_full_path_format: "{name}".to_string(),
            enable_zfill: true,
            force_album_format: false,
            path_segment_limit: 250,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecSettings {
    pub proprietary_codecs: bool,
    pub spatial_codecs: bool,
}

impl Default for CodecSettings {
    fn default() -> Self {
        Self {
            proprietary_codecs: false,
            spatial_codecs: true,
        }
    }
}

impl CodecSettings {
    pub fn options(&self) -> CodecOptions {
        CodecOptions {
            proprietary_codecs: self.proprietary_codecs,
            spatial_codecs: self.spatial_codecs,
        }
    }
}

/// Third-party module per enrichment kind; `"default"` means the primary module.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleDefaults {
    pub lyrics: String,
    pub covers: String,
    pub credits: String,
}

impl Default for ModuleDefaults {
    fn default() -> Self {
        Self {
            lyrics: DEFAULT_MODULE.to_string(),
            covers: DEFAULT_MODULE.to_string(),
            credits: DEFAULT_MODULE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LyricsSettings {
    pub embed_lyrics: bool,
    pub save_synced_lyrics: bool,
}

impl Default for LyricsSettings {
    fn default() -> Self {
        Self {
            embed_lyrics: true,
            save_synced_lyrics: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverSettings {
    pub embed_cover: bool,
    pub main_compression: CoverCompression,
    pub main_resolution: u32,
    pub save_external: bool,
    pub external_format: ImageFormat,
    pub external_compression: CoverCompression,
    pub external_resolution: u32,
    pub save_animated_cover: bool,
}

impl Default for CoverSettings {
    fn default() -> Self {
        Self {
            embed_cover: true,
            main_compression: CoverCompression::High,
            main_resolution: 1400,
            save_external: false,
            external_format: ImageFormat::Png,
            external_compression: CoverCompression::Low,
            external_resolution: 3000,
            save_animated_cover: true,
        }
    }
}

impl CoverSettings {
    /// Options for the embedded cover. Always JPEG.
    pub fn main_options(&self) -> CoverOptions {
        CoverOptions {
            file_type: ImageFormat::Jpg,
            resolution: self.main_resolution,
            compression: self.main_compression,
        }
    }

    pub fn external_options(&self) -> CoverOptions {
        CoverOptions {
            file_type: self.external_format,
            resolution: self.external_resolution,
            compression: self.external_compression,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum M3uPaths {
    #[default]
    Absolute,
    Relative,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaylistSettings {
    pub save_m3u: bool,
    pub paths_m3u: M3uPaths,
    pub extended_m3u: bool,
}

impl Default for PlaylistSettings {
    fn default() -> Self {
        Self {
            save_m3u: true,
            paths_m3u: M3uPaths::Absolute,
            extended_m3u: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedSettings {
    /// Source codec key → target codec key, e.g. `alac = "flac"`
    pub codec_conversions: BTreeMap<String, String>,
    /// Target codec key → ffmpeg option → value
    pub conversion_flags: BTreeMap<String, BTreeMap<String, String>>,
    pub conversion_keep_original: bool,
    /// Max RMS distance for a third-party cover to count as the same artwork
    pub cover_variance_threshold: f64,
    /// Re-raise per-track failures instead of recording them
    pub debug_mode: bool,
    pub enable_undesirable_conversions: bool,
    pub ignore_existing_files: bool,
    pub ignore_different_artists: bool,
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        Self {
            codec_conversions: BTreeMap::from([("alac".to_string(), "flac".to_string())]),
            conversion_flags: BTreeMap::from([(
                "flac".to_string(),
                BTreeMap::from([("compression_level".to_string(), "5".to_string())]),
            )]),
            conversion_keep_original: false,
            cover_variance_threshold: 8.0,
            debug_mode: false,
            enable_undesirable_conversions: false,
            ignore_existing_files: false,
            ignore_different_artists: true,
        }
    }
}

impl AdvancedSettings {
    /// Parsed conversion map. Unknown codec names are configuration errors.
    pub fn conversions(&self) -> Result<BTreeMap<Codec, Codec>> {
        self.codec_conversions
            .iter()
            .map(|(from, to)| -> Result<(Codec, Codec)> {
                Ok((from.parse()?, to.parse()?))
            })
            .collect()
    }

    /// ffmpeg options for encoding to `target`, empty when none are configured.
    pub fn flags_for(&self, target: Codec) -> Vec<(String, String)> {
        self.conversion_flags
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(target.key()))
            .map(|(_, flags)| flags.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }
}

impl Settings {
    /// Check everything that would otherwise fail halfway through a run.
    pub fn validate(&self) -> Result<()> {
        self.advanced.conversions()?;
        for codec in self.advanced.conversion_flags.keys() {
            codec.parse::<Codec>()?;
        }
        if self.formatting.path_segment_limit < 16 {
            return Err(Error::config("path_segment_limit must be at least 16"));
        }
        Ok(())
    }
}

// ============================================================================
// Settings File Operations
// ============================================================================

/// Get the settings directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("music-fetcher"))
}

/// Get the full path to the settings file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("settings.toml"))
}

/// Load settings from the default location.
///
/// Returns defaults if the file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail - we always return usable settings.
pub fn load() -> Settings {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Settings::default();
    };

    if !path.exists() {
        tracing::info!("No settings file found at {:?}, using defaults", path);
        return Settings::default();
    }

    match load_from(&path) {
        Ok(settings) => {
            tracing::info!("Loaded settings from {:?}", path);
            settings
        }
        Err(e) => {
            tracing::error!("{}", e);
            tracing::warn!("Using default settings");
            Settings::default()
        }
    }
}

/// Load settings from an explicit path, failing on any error.
pub fn load_from(path: &Path) -> Result<Settings, ConfigError> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
    toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
}

/// Save settings to `path`, creating parent directories as needed.
pub fn save_to(settings: &Settings, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;
    }

    let contents = toml::to_string_pretty(settings).map_err(ConfigError::Serialize)?;

    // Write atomically (write to temp, then rename)
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!("Saved settings to {:?}", path);
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Settings file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read settings from {0:?}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Failed to parse settings file {0:?}: {1}")]
    Parse(PathBuf, toml::de::Error),

    #[error("Failed to create config directory {0:?}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize settings: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write settings to {0:?}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0:?} to {1:?}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
