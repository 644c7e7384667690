//! Source-module contract.
//!
//! A source module wraps one external service and hands the pipeline
//! normalized records. Optional operations are guarded by the module's
//! declared [`ModuleModes`]; the orchestrator checks [`SourceModule::supports`]
//! before calling them and treats a missing capability as a configuration
//! error rather than attempting the call.
//!
//! # Example
//!
//! ```ignore
//! use music_fetcher::module::{ModuleRegistry, SourceModule};
//!
//! let mut registry = ModuleRegistry::default();
//! registry.register(Arc::new(MyService::login(&credentials).await?));
//! ```

mod registry;

pub use registry::ModuleRegistry;

use async_trait::async_trait;
use bitflags::bitflags;

use crate::model::{
    AlbumInfo, ArtistInfo, CodecOptions, CoverInfo, CoverOptions, CreditsInfo, ExtraParams,
    LyricsInfo, MediaKind, PlaylistInfo, Quality, SearchResult, TrackDownload, TrackInfo,
};

bitflags! {
    /// Capabilities a module declares.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ModuleModes: u8 {
        /// Can deliver media files
        const DOWNLOAD = 1 << 0;
        /// Can list playlists
        const PLAYLIST = 1 << 1;
        const LYRICS = 1 << 2;
        const CREDITS = 1 << 3;
        const COVERS = 1 << 4;
    }
}

/// Static description of a module.
#[derive(Debug, Clone)]
pub struct ModuleInformation {
    /// Registry key, e.g. "deezer"
    pub service_name: String,
    pub supported_modes: ModuleModes,
    /// URL hosts this module answers for, e.g. "open.example.com"
    pub netlocs: Vec<String>,
}

/// Errors a module may raise for a single entity.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModuleError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("API request failed: {0}")]
    Api(String),

    #[error("{0}")]
    General(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation not supported by this module")]
    Unsupported,
}

/// The contract every source module implements.
///
/// Only the track operations are required. The rest default to
/// [`ModuleError::Unsupported`] and should be paired with the matching
/// [`ModuleModes`] flag when implemented.
///
/// `ctx` bags are the module's own [`ExtraParams`] from an earlier record,
/// passed back verbatim.
#[async_trait]
pub trait SourceModule: Send + Sync {
    fn information(&self) -> &ModuleInformation;

    fn name(&self) -> &str {
        &self.information().service_name
    }

    fn supports(&self, mode: ModuleModes) -> bool {
        self.information().supported_modes.contains(mode)
    }

    async fn get_track_info(
        &self,
        id: &str,
        quality: Quality,
        codec_options: CodecOptions,
        ctx: &ExtraParams,
    ) -> Result<TrackInfo, ModuleError>;

    /// `Ok(None)` ends the album traversal without an error.
    async fn get_album_info(
        &self,
        _id: &str,
        _ctx: &ExtraParams,
    ) -> Result<Option<AlbumInfo>, ModuleError> {
        Err(ModuleError::Unsupported)
    }

    async fn get_playlist_info(
        &self,
        _id: &str,
        _ctx: &ExtraParams,
    ) -> Result<PlaylistInfo, ModuleError> {
        Err(ModuleError::Unsupported)
    }

    async fn get_artist_info(
        &self,
        _id: &str,
        _return_credited_albums: bool,
        _ctx: &ExtraParams,
    ) -> Result<ArtistInfo, ModuleError> {
        Err(ModuleError::Unsupported)
    }

    async fn get_track_download(
        &self,
        _id: &str,
        _ctx: &ExtraParams,
    ) -> Result<TrackDownload, ModuleError> {
        Err(ModuleError::Unsupported)
    }

    async fn get_track_cover(
        &self,
        _id: &str,
        _options: CoverOptions,
        _ctx: &ExtraParams,
    ) -> Result<CoverInfo, ModuleError> {
        Err(ModuleError::Unsupported)
    }

    async fn get_track_lyrics(
        &self,
        _id: &str,
        _ctx: &ExtraParams,
    ) -> Result<LyricsInfo, ModuleError> {
        Err(ModuleError::Unsupported)
    }

    async fn get_track_credits(
        &self,
        _id: &str,
        _ctx: &ExtraParams,
    ) -> Result<Vec<CreditsInfo>, ModuleError> {
        Err(ModuleError::Unsupported)
    }

    /// Cross-catalog lookup. `context` is the track being matched, if any.
    async fn search(
        &self,
        _kind: MediaKind,
        _query: &str,
        _context: Option<&TrackInfo>,
        _limit: usize,
    ) -> Result<Vec<SearchResult>, ModuleError> {
        Err(ModuleError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockModule;

    #[test]
    fn test_supports_checks_declared_modes() {
        let module = MockModule::new("svc", ModuleModes::DOWNLOAD | ModuleModes::LYRICS);
        assert!(module.supports(ModuleModes::DOWNLOAD));
        assert!(module.supports(ModuleModes::LYRICS));
        assert!(!module.supports(ModuleModes::COVERS));
        assert!(!module.supports(ModuleModes::DOWNLOAD | ModuleModes::CREDITS));
        assert_eq!(module.name(), "svc");
    }

    struct Minimal(ModuleInformation);

    #[async_trait]
    impl SourceModule for Minimal {
        fn information(&self) -> &ModuleInformation {
            &self.0
        }

        async fn get_track_info(
            &self,
            id: &str,
            _quality: Quality,
            _codec_options: CodecOptions,
            _ctx: &ExtraParams,
        ) -> Result<TrackInfo, ModuleError> {
            Err(ModuleError::NotFound(id.to_string()))
        }
    }

    #[tokio::test]
    async fn test_optional_operations_default_to_unsupported() {
        let module = Minimal(ModuleInformation {
            service_name: "min".into(),
            supported_modes: ModuleModes::empty(),
            netlocs: vec![],
        });
        let ctx = ExtraParams::new();
        assert!(matches!(
            module.get_track_lyrics("1", &ctx).await,
            Err(ModuleError::Unsupported)
        ));
        assert!(matches!(
            module.search(MediaKind::Track, "q", None, 5).await,
            Err(ModuleError::Unsupported)
        ));
    }
}
