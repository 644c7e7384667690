//! Albums, playlists and artists.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::Session;
use super::m3u::{self, M3uEntry};
use super::report::{CollectionFailure, SkipReason, TrackOutcome, TrackStage};
use super::track::{Placed, TrackContext};
use crate::enrichment::Enricher;
use crate::error::{Error, Result, ResultExt};
use crate::model::{ExtraParams, ImageFormat, MediaKind};
use crate::module::{ModuleModes, SourceModule};
use crate::naming::FieldSet;
use crate::transport::fetch_if_missing;

/// Files saved once per album or playlist folder.
struct CollectionFiles<'f> {
    cover_url: Option<&'f str>,
    cover_type: ImageFormat,
    animated_cover_url: Option<&'f str>,
    booklet_url: Option<&'f str>,
    description: Option<&'f str>,
}

impl Session<'_> {
    fn collection_failed(&mut self, kind: MediaKind, id: &str, error: Error) -> Result<()> {
        warn!(kind = kind.as_str(), id, "Could not get info: {}", error);
        self.report.collections.push(CollectionFailure {
            kind,
            id: id.to_string(),
            reason: error.to_string(),
        });
        self.absorb(error)
    }

    /// Save covers, booklet and description into `dir`.
    ///
    /// Returns the main cover when there is one on disk.
    async fn save_collection_files(&self, dir: &Path, files: CollectionFiles<'_>) -> Option<PathBuf> {
        let fetcher = self.dl.fetcher.as_ref();
        let settings = self.settings();
        let mut cover = None;

        if let Some(url) = files.cover_url {
            let path = dir.join(format!("Cover.{}", files.cover_type.extension()));
            match fetch_if_missing(fetcher, url, &path).await {
                Ok(_) => cover = Some(path),
                Err(e) => warn!("Could not download cover: {}", e),
            }
        }

        if let Some(url) = files.animated_cover_url
            && settings.covers.save_animated_cover
            && let Err(e) = fetch_if_missing(fetcher, url, &dir.join("Cover.mp4")).await
        {
            warn!("Could not download animated cover: {}", e);
        }

        if let Some(url) = files.booklet_url
            && let Err(e) = fetch_if_missing(fetcher, url, &dir.join("Booklet.pdf")).await
        {
            warn!("Could not download booklet: {}", e);
        }

        if let Some(description) = files.description {
            let path = dir.join("Description.txt");
            if !path.exists()
                && let Err(e) = std::fs::write(&path, description)
            {
                warn!("Could not save description: {}", e);
            }
        }

        cover
    }

    /// Download an album. Returns the ids of tracks that are on disk afterwards.
    pub(super) async fn download_album(
        &mut self,
        service: &dyn SourceModule,
        id: &str,
        extra: &ExtraParams,
        base: &Path,
        artist: Option<&str>,
    ) -> Result<Vec<String>> {
        let settings = self.settings();
        let album = match service.get_album_info(id, extra).await {
            Ok(Some(album)) if !album.tracks.is_empty() => album,
            Ok(_) => {
                info!(id, "Album has no tracks");
                return Ok(Vec::new());
            }
            Err(e) => {
                self.collection_failed(MediaKind::Album, id, e.into())?;
                return Ok(Vec::new());
            }
        };

        if album.tracks.len() == 1 && !settings.formatting.force_album_format {
            let track_id = &album.tracks[0];
            let ctx = TrackContext {
                artist,
                ..TrackContext::single(base, &album.track_extra)
            };
            let placed = self.download_track(service, track_id, ctx).await?;
            return Ok(placed.map(|_| track_id.clone()).into_iter().collect());
        }

        let fields = FieldSet::for_album(&album, id);
        let dir = self
            .dl
            .paths
            .build(base, &settings.formatting.album_format, &fields, None)?;
        std::fs::create_dir_all(&dir).with_context(format!("creating album folder {:?}", dir))?;
        info!(id, tracks = album.tracks.len(), "Album {:?}", album.name);

        let cover = self
            .save_collection_files(
                &dir,
                CollectionFiles {
                    cover_url: album.cover_url.as_deref(),
                    cover_type: album.cover_type,
                    animated_cover_url: album.animated_cover_url.as_deref(),
                    booklet_url: album.booklet_url.as_deref(),
                    description: album.description.as_deref(),
                },
            )
            .await;

        let total = album.tracks.len();
        let mut downloaded = Vec::new();
        for (index, track_id) in album.tracks.iter().enumerate() {
            let ctx = TrackContext {
                disc_folders: true,
                album_cover: cover.as_deref(),
                artist,
                ..TrackContext::in_collection(&dir, &album.track_extra, index, total)
            };
            if self.download_track(service, track_id, ctx).await?.is_some() {
                downloaded.push(track_id.clone());
            }
        }

        info!(id, "Album done: {}/{} tracks on disk", downloaded.len(), total);
        Ok(downloaded)
    }

    pub(super) async fn download_playlist(
        &mut self,
        service: &dyn SourceModule,
        id: &str,
        extra: &ExtraParams,
        base: &Path,
    ) -> Result<()> {
        let settings = self.settings();
        let playlist = match service.get_playlist_info(id, extra).await {
            Ok(playlist) => playlist,
            Err(e) => return self.collection_failed(MediaKind::Playlist, id, e.into()),
        };

        let fields = FieldSet::for_playlist(&playlist, id);
        let dir = self
            .dl
            .paths
            .build(base, &settings.formatting.playlist_format, &fields, None)?;
        std::fs::create_dir_all(&dir)
            .with_context(format!("creating playlist folder {:?}", dir))?;
        info!(id, tracks = playlist.tracks.len(), "Playlist {:?}", playlist.name);

        self.save_collection_files(
            &dir,
            CollectionFiles {
                cover_url: playlist.cover_url.as_deref(),
                cover_type: playlist.cover_type,
                animated_cover_url: playlist.animated_cover_url.as_deref(),
                booklet_url: None,
                description: playlist.description.as_deref(),
            },
        )
        .await;

        let custom = self
            .dl
            .download_module
            .clone()
            .filter(|m| m.name() != service.name());
        let total = playlist.tracks.len();
        let mut entries = Vec::new();

        for (index, track_id) in playlist.tracks.iter().enumerate() {
            let ctx = TrackContext::in_collection(&dir, &playlist.track_extra, index, total);
            let placed = match &custom {
                Some(module) => {
                    self.download_matched(module.as_ref(), service, track_id, ctx)
                        .await?
                }
                None => self.download_track(service, track_id, ctx).await?,
            };
            if let Some(Placed { path, track }) = placed {
                entries.push(M3uEntry {
                    path,
                    duration: track.duration,
                    artist: track.primary_artist().to_string(),
                    title: track.name,
                });
            }
        }

        if settings.playlist.save_m3u && !entries.is_empty() {
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "playlist".to_string());
            let path = dir.join(format!("{}.m3u", name));
            if let Err(e) = m3u::write(&path, &entries, &settings.playlist) {
                warn!("Could not write playlist index: {}", e);
            }
        }
        Ok(())
    }

    /// Download a playlist track from another module by searching for it there.
    ///
    /// Falls back to the playlist's own module when nothing matches and that
    /// module can download.
    async fn download_matched(
        &mut self,
        module: &dyn SourceModule,
        native: &dyn SourceModule,
        track_id: &str,
        ctx: TrackContext<'_>,
    ) -> Result<Option<Placed>> {
        self.check_interrupt()?;
        let settings = self.settings();
        let track = match native
            .get_track_info(
                track_id,
                settings.general.download_quality,
                settings.codecs.options(),
                ctx.extra,
            )
            .await
        {
            Ok(track) => track,
            Err(e) => {
                warn!(id = track_id, "Track failed: {}", e);
                self.report.push(
                    track_id,
                    TrackOutcome::Failed {
                        stage: TrackStage::FetchingMetadata,
                        reason: e.to_string(),
                    },
                );
                self.absorb(e.into())?;
                return Ok(None);
            }
        };

        let matched = {
            let enricher = Enricher::new(settings, self.dl.fetcher.as_ref(), &self.work);
            enricher.search(module, &track).await.into_iter().next()
        };

        match matched {
            Some(result) => {
                info!(
                    id = track_id,
                    matched = %result.result_id,
                    module = module.name(),
                    "Matched playlist track"
                );
                let ctx = TrackContext {
                    extra: &result.extra,
                    ..ctx
                };
                self.download_track(module, &result.result_id, ctx).await
            }
            None if native.supports(ModuleModes::DOWNLOAD) => {
                info!(id = track_id, module = module.name(), "No match, using playlist module");
                self.download_track(native, track_id, ctx).await
            }
            None => {
                warn!(id = track_id, module = module.name(), "No match found");
                self.report.push(
                    track_id,
                    TrackOutcome::Failed {
                        stage: TrackStage::FetchingMetadata,
                        reason: format!("no match on {}", module.name()),
                    },
                );
                Ok(None)
            }
        }
    }

    pub(super) async fn download_artist(
        &mut self,
        service: &dyn SourceModule,
        id: &str,
        extra: &ExtraParams,
        base: &Path,
    ) -> Result<()> {
        let settings = self.settings();
        let artist = match service
            .get_artist_info(id, settings.artist_downloading.return_credited_albums, extra)
            .await
        {
            Ok(artist) => artist,
            Err(e) => return self.collection_failed(MediaKind::Artist, id, e.into()),
        };

        let fields = FieldSet::for_artist(&artist.name, id);
        let dir = self
            .dl
            .paths
            .build(base, &settings.formatting.artist_format, &fields, None)?;
        info!(
            id,
            albums = artist.albums.len(),
            tracks = artist.tracks.len(),
            "Artist {:?}",
            artist.name
        );

        let mut downloaded = HashSet::new();
        for album_id in &artist.albums {
            let ids = self
                .download_album(service, album_id, &artist.album_extra, &dir, Some(&artist.name))
                .await?;
            downloaded.extend(ids);
        }

        for track_id in &artist.tracks {
            if settings.artist_downloading.separate_tracks_skip_downloaded
                && downloaded.contains(track_id)
            {
                self.report
                    .push(track_id, TrackOutcome::Skipped(SkipReason::AlreadyDownloaded));
                continue;
            }
            let ctx = TrackContext {
                artist: Some(&artist.name),
                ..TrackContext::single(&dir, &artist.track_extra)
            };
            self.download_track(service, track_id, ctx).await?;
        }
        Ok(())
    }
}
