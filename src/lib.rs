//! Music Fetcher - download orchestration for pluggable music services.
//!
//! Source modules ([`module::SourceModule`]) supply metadata and media; the
//! [`download::Downloader`] turns albums, playlists and artists into tagged,
//! consistently named files on disk.

pub mod cli;
pub mod config;
pub mod convert;
pub mod download;
pub mod enrichment;
pub mod error;
pub mod model;
pub mod module;
pub mod naming;
pub mod tagging;
#[cfg(test)]
pub mod test_utils;
pub mod transport;
