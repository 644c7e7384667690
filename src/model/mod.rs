//! Core data models for the acquisition pipeline.
//!
//! - [`codec`]: the codec policy table and the five writable containers
//! - [`records`]: metadata records returned by source modules
//!
//! Records are plain values. The pipeline only mutates them to stamp
//! track numbering from traversal context.

pub mod codec;
pub mod records;

pub use codec::{Codec, CodecInfo, Container};
pub use records::{
    AlbumInfo, ArtistInfo, CodecOptions, CoverCompression, CoverInfo, CoverOptions, CreditsInfo,
    DownloadSource, ExtraParams, ImageFormat, LyricsInfo, MediaIdentification, MediaKind,
    PlaylistInfo, Quality, SearchResult, Tags, TrackDownload, TrackInfo,
};
