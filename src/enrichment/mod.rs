//! Enrichment resolution: covers, lyrics and credits.
//!
//! # Precedence
//!
//! For each kind independently: a configured third-party module first, else
//! the primary module's native capability, else nothing. A third-party
//! module that isn't the primary is reached through a cross-catalog search on
//! `"<title> <artist>"`; the chosen result's extra parameters are threaded
//! into the follow-up call untouched.
//!
//! Third-party covers go through a verification loop: each candidate is
//! compared against the primary module's own cover ([`similarity`]) and the
//! first one under the configured RMS threshold is accepted.
//!
//! Nothing in here fails a track. Errors are logged and the enrichment
//! stays empty.

pub mod similarity;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::model::{
    CoverCompression, CoverInfo, CoverOptions, CreditsInfo, ExtraParams, ImageFormat, LyricsInfo,
    MediaKind, SearchResult, TrackInfo,
};
use crate::module::{ModuleModes, SourceModule};
use crate::transport::{Fetcher, WorkDir, append_extension, move_file};

/// Third-party modules per enrichment kind. `None` means "use the primary".
#[derive(Clone, Default)]
pub struct ThirdPartyModules {
    pub covers: Option<Arc<dyn SourceModule>>,
    pub lyrics: Option<Arc<dyn SourceModule>>,
    pub credits: Option<Arc<dyn SourceModule>>,
}

/// Where a track's cover came from.
#[derive(Debug, Clone, PartialEq)]
pub enum CoverSource {
    Primary,
    ThirdParty { module: String, distance: f64 },
}

/// Query used for cross-catalog lookups of a track.
pub fn search_query(track: &TrackInfo) -> String {
    format!("{} {}", track.name, track.primary_artist())
        .trim()
        .to_string()
}

/// Resolves enrichment for one track at a time.
pub struct Enricher<'a> {
    settings: &'a Settings,
    fetcher: &'a dyn Fetcher,
    work: &'a WorkDir,
}

impl<'a> Enricher<'a> {
    pub fn new(settings: &'a Settings, fetcher: &'a dyn Fetcher, work: &'a WorkDir) -> Self {
        Self {
            settings,
            fetcher,
            work,
        }
    }

    /// Search `module` for `track`, logging failures as gaps.
    pub async fn search(&self, module: &dyn SourceModule, track: &TrackInfo) -> Vec<SearchResult> {
        let query = search_query(track);
        match module
            .search(
                MediaKind::Track,
                &query,
                Some(track),
                self.settings.general.search_limit,
            )
            .await
        {
            Ok(results) => results,
            Err(e) => {
                warn!(module = module.name(), query = %query, "Search failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Map a track onto `module`'s catalog.
    ///
    /// The primary module answers with the original id and context.
    async fn resolve(
        &self,
        module: &dyn SourceModule,
        primary: &dyn SourceModule,
        id: &str,
        track: &TrackInfo,
        own_extra: &ExtraParams,
    ) -> Option<(String, ExtraParams)> {
        if module.name() == primary.name() {
            return Some((id.to_string(), own_extra.clone()));
        }
        match self.search(module, track).await.into_iter().next() {
            Some(result) => Some((result.result_id, result.extra)),
            None => {
                info!(module = module.name(), "No match found for {:?}", track.name);
                None
            }
        }
    }

    pub async fn lyrics(
        &self,
        primary: &dyn SourceModule,
        third_party: Option<&dyn SourceModule>,
        id: &str,
        track: &TrackInfo,
    ) -> LyricsInfo {
        let Some(module) = pick(primary, third_party, ModuleModes::LYRICS) else {
            return LyricsInfo::default();
        };
        let Some((lyrics_id, extra)) = self
            .resolve(module, primary, id, track, &track.lyrics_extra)
            .await
        else {
            return LyricsInfo::default();
        };

        match module.get_track_lyrics(&lyrics_id, &extra).await {
            Ok(lyrics) => lyrics,
            Err(e) => {
                warn!(module = module.name(), "Could not get lyrics: {}", e);
                LyricsInfo::default()
            }
        }
    }

    pub async fn credits(
        &self,
        primary: &dyn SourceModule,
        third_party: Option<&dyn SourceModule>,
        id: &str,
        track: &TrackInfo,
    ) -> Vec<CreditsInfo> {
        let Some(module) = pick(primary, third_party, ModuleModes::CREDITS) else {
            return Vec::new();
        };
        let Some((credits_id, extra)) = self
            .resolve(module, primary, id, track, &track.credits_extra)
            .await
        else {
            return Vec::new();
        };

        match module.get_track_credits(&credits_id, &extra).await {
            Ok(credits) => credits,
            Err(e) => {
                warn!(module = module.name(), "Could not get credits: {}", e);
                Vec::new()
            }
        }
    }

    /// Fetch the cover to embed into `dest`.
    ///
    /// With `external` set (a path without extension), a second copy at the
    /// external cover settings is saved there as well.
    pub async fn cover(
        &self,
        primary: &dyn SourceModule,
        third_party: Option<&dyn SourceModule>,
        id: &str,
        track: &TrackInfo,
        dest: &Path,
        external: Option<&Path>,
    ) -> Option<CoverSource> {
        match third_party.filter(|m| m.name() != primary.name()) {
            Some(module) if module.supports(ModuleModes::COVERS) => {
                self.third_party_cover(module, track, dest, external).await
            }
            Some(module) => {
                tracing::error!(module = module.name(), "Module does not support covers");
                None
            }
            None => self.primary_cover(primary, id, track, dest, external).await,
        }
    }

    async fn primary_cover(
        &self,
        primary: &dyn SourceModule,
        id: &str,
        track: &TrackInfo,
        dest: &Path,
        external: Option<&Path>,
    ) -> Option<CoverSource> {
        let Some(url) = track.cover_url.as_deref() else {
            debug!("Track has no cover");
            return None;
        };
        if let Err(e) = self.fetcher.fetch_to_file(url, &[], dest).await {
            warn!("Could not download cover: {}", e);
            return None;
        }

        if let Some(base) = external
            && primary.supports(ModuleModes::COVERS)
        {
            let options = self.settings.covers.external_options();
            match primary.get_track_cover(id, options, &track.cover_extra).await {
                Ok(info) => self.save_external(&info, base).await,
                Err(e) => warn!("Could not get external cover: {}", e),
            }
        }

        Some(CoverSource::Primary)
    }

    async fn third_party_cover(
        &self,
        module: &dyn SourceModule,
        track: &TrackInfo,
        dest: &Path,
        external: Option<&Path>,
    ) -> Option<CoverSource> {
        let Some(url) = track.cover_url.as_deref() else {
            info!("No reference cover to verify third-party covers against");
            return None;
        };
        let reference = self.work.temp_file();
        if let Err(e) = self.fetcher.fetch_to_file(url, &[], &reference).await {
            warn!("Could not download reference cover: {}", e);
            return None;
        }

        let accepted = match self.match_cover(module, track, &reference).await {
            Some((result, distance)) => {
                match self
                    .fetch_cover(module, &result, self.settings.covers.main_options(), dest)
                    .await
                {
                    Ok(()) => {
                        if let Some(base) = external {
                            let options = self.settings.covers.external_options();
                            match module
                                .get_track_cover(&result.result_id, options, &result.extra)
                                .await
                            {
                                Ok(info) => self.save_external(&info, base).await,
                                Err(e) => warn!("Could not get external cover: {}", e),
                            }
                        }
                        Some(CoverSource::ThirdParty {
                            module: module.name().to_string(),
                            distance,
                        })
                    }
                    Err(e) => {
                        warn!(module = module.name(), "Could not download matched cover: {}", e);
                        None
                    }
                }
            }
            None => {
                info!(module = module.name(), "No matching cover found, using the primary module's");
                None
            }
        };

        if accepted.is_some() {
            let _ = std::fs::remove_file(&reference);
            return accepted;
        }
        match move_file(&reference, dest) {
            Ok(()) => Some(CoverSource::Primary),
            Err(e) => {
                warn!("Could not keep reference cover: {}", e);
                None
            }
        }
    }

    /// Walk search results in order and return the first whose cover is
    /// within the variance threshold of `reference`.
    async fn match_cover(
        &self,
        module: &dyn SourceModule,
        track: &TrackInfo,
        reference: &Path,
    ) -> Option<(SearchResult, f64)> {
        let reference_image = match similarity::load(reference) {
            Ok(image) => image,
            Err(e) => {
                warn!("Reference cover is not a readable image: {}", e);
                return None;
            }
        };
        let options = CoverOptions {
            file_type: ImageFormat::Jpg,
            resolution: reference_image.width(),
            compression: CoverCompression::High,
        };
        let threshold = self.settings.advanced.cover_variance_threshold;
        let mut tested = HashSet::new();

        for result in self.search(module, track).await {
            let cover = match module
                .get_track_cover(&result.result_id, options, &result.extra)
                .await
            {
                Ok(cover) => cover,
                Err(e) => {
                    debug!(result = %result.result_id, "No cover for candidate: {}", e);
                    continue;
                }
            };
            if !tested.insert(cover.url.clone()) {
                continue;
            }

            let candidate = self.work.temp_file();
            if let Err(e) = self.fetcher.fetch_to_file(&cover.url, &[], &candidate).await {
                warn!("Could not download candidate cover: {}", e);
                continue;
            }
            let distance = similarity::load(&candidate)
                .map(|image| similarity::rms_distance(&reference_image, &image));
            let _ = std::fs::remove_file(&candidate);

            match distance {
                Ok(d) if d < threshold => {
                    info!(result = %result.result_id, distance = d, "Matched cover");
                    return Some((result, d));
                }
                Ok(d) => debug!(result = %result.result_id, distance = d, "Cover rejected"),
                Err(e) => warn!("Candidate cover is not a readable image: {}", e),
            }
        }

        None
    }

    async fn fetch_cover(
        &self,
        module: &dyn SourceModule,
        result: &SearchResult,
        options: CoverOptions,
        dest: &Path,
    ) -> crate::error::Result<()> {
        let info = module
            .get_track_cover(&result.result_id, options, &result.extra)
            .await?;
        self.fetcher.fetch_to_file(&info.url, &[], dest).await?;
        Ok(())
    }

    async fn save_external(&self, info: &CoverInfo, base: &Path) {
        let path: PathBuf = append_extension(base, info.file_type.extension());
        match crate::transport::fetch_if_missing(self.fetcher, &info.url, &path).await {
            Ok(_) => debug!("Saved external cover {:?}", path),
            Err(e) => warn!("Could not save external cover: {}", e),
        }
    }
}

/// The module to ask for `mode`: the third-party one if configured, else
/// the primary when it declares the capability.
fn pick<'m>(
    primary: &'m dyn SourceModule,
    third_party: Option<&'m dyn SourceModule>,
    mode: ModuleModes,
) -> Option<&'m dyn SourceModule> {
    match third_party {
        Some(module) if module.supports(mode) => Some(module),
        Some(module) => {
            tracing::error!(module = module.name(), "Module does not support {:?}", mode);
            None
        }
        None if primary.supports(mode) => Some(primary),
        None => None,
    }
}
