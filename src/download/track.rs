//! The per-track pipeline.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::Session;
use super::report::{SkipReason, TrackOutcome, TrackStage};
use crate::convert::{Converted, Decision};
use crate::enrichment::Enricher;
use crate::error::{Error, Result};
use crate::model::{Codec, DownloadSource, ExtraParams, LyricsInfo, TrackInfo};
use crate::module::{ModuleError, ModuleModes, SourceModule};
use crate::naming::FieldSet;
use crate::tagging::TagJob;
use crate::transport::move_file;

/// Where a track sits and what its parent collection already provides.
#[derive(Clone, Copy)]
pub(super) struct TrackContext<'c> {
    pub dir: &'c Path,
    pub extra: &'c ExtraParams,
    /// Name the file with `single_full_path_format`
    pub single: bool,
    /// Position and size of the parent collection
    pub numbering: Option<(u32, u32)>,
    /// Put multi-disc releases into `CD n` folders
    pub disc_folders: bool,
    /// Cover already saved for the whole collection
    pub album_cover: Option<&'c Path>,
    /// Artist being traversed, for filtering guest appearances
    pub artist: Option<&'c str>,
}

impl<'c> TrackContext<'c> {
    pub fn single(dir: &'c Path, extra: &'c ExtraParams) -> Self {
        Self {
            dir,
            extra,
            single: true,
            numbering: None,
            disc_folders: false,
            album_cover: None,
            artist: None,
        }
    }

    pub fn in_collection(dir: &'c Path, extra: &'c ExtraParams, index: usize, total: usize) -> Self {
        Self {
            single: false,
            numbering: Some((index as u32 + 1, total as u32)),
            ..Self::single(dir, extra)
        }
    }
}

/// A track file on disk after a run, fresh or pre-existing.
#[derive(Debug, Clone)]
pub(super) struct Placed {
    pub path: PathBuf,
    pub track: TrackInfo,
}

/// Codec the file ends up in once the gate has had its say.
fn final_codec(decision: Decision, delivered: Codec) -> Codec {
    match decision {
        Decision::Convert { target, .. } => target,
        _ => delivered,
    }
}

impl Session<'_> {
    /// Run one track through the pipeline and record the result.
    ///
    /// Returns where the file is when the track is on disk afterwards.
    pub(super) async fn download_track(
        &mut self,
        service: &dyn SourceModule,
        id: &str,
        ctx: TrackContext<'_>,
    ) -> Result<Option<Placed>> {
        self.check_interrupt()?;
        let mut stage = TrackStage::FetchingMetadata;
        match self.process_track(service, id, ctx, &mut stage).await {
            Ok((outcome, placed)) => {
                self.report.push(id, outcome);
                Ok(placed)
            }
            Err(e) => {
                warn!(id, %stage, "Track failed: {}", e);
                self.report.push(
                    id,
                    TrackOutcome::Failed {
                        stage,
                        reason: e.to_string(),
                    },
                );
                self.absorb(e)?;
                Ok(None)
            }
        }
    }

    async fn process_track(
        &mut self,
        service: &dyn SourceModule,
        id: &str,
        ctx: TrackContext<'_>,
        stage: &mut TrackStage,
    ) -> Result<(TrackOutcome, Option<Placed>)> {
        let settings = self.settings();

        let mut track = service
            .get_track_info(
                id,
                settings.general.download_quality,
                settings.codecs.options(),
                ctx.extra,
            )
            .await?;

        if let Some(artist) = ctx.artist
            && settings.advanced.ignore_different_artists
            && !track
                .artists
                .iter()
                .any(|a| a.to_lowercase() == artist.to_lowercase())
        {
            info!(id, artist, "Skipping track by other artists: {:?}", track.artists);
            return Ok((TrackOutcome::Skipped(SkipReason::DifferentArtist), None));
        }

        if let Some((number, total)) = ctx.numbering {
            track.tags.track_number = Some(number);
            track.tags.total_tracks = Some(total);
        }

        if let Some(error) = &track.error {
            return Err(ModuleError::General(error.clone()).into());
        }

        *stage = TrackStage::BuildingPath;
        let mut decision = self.dl.gate.decide(track.codec);
        let mut path = self.plan_path(id, &track, ctx, final_codec(decision, track.codec))?;

        if path.exists() && !settings.advanced.ignore_existing_files {
            info!(id, "Already exists: {:?}", path);
            let outcome = TrackOutcome::Skipped(SkipReason::AlreadyExists(path.clone()));
            return Ok((outcome, Some(Placed { path, track })));
        }

        *stage = TrackStage::Downloading;
        if !service.supports(ModuleModes::DOWNLOAD) {
            return Err(Error::unsupported(service.name(), ModuleModes::DOWNLOAD));
        }
        info!(id, "Downloading {} - {}", track.primary_artist(), track.name);
        let download = service.get_track_download(id, &track.download_extra).await?;

        if let Some(delivered) = download.different_codec
            && delivered != track.codec
        {
            debug!(id, "Module delivered {} instead of {}", delivered, track.codec);
            track.codec = delivered;
            decision = self.dl.gate.decide(delivered);
            path = self.plan_path(id, &track, ctx, final_codec(decision, delivered))?;
        }

        let raw = path.with_extension(track.codec.container().extension());
        if let Some(parent) = raw.parent() {
            std::fs::create_dir_all(parent)?;
        }
        match &download.source {
            DownloadSource::Url { url, headers } => {
                self.dl.fetcher.fetch_to_file(url, headers, &raw).await?
            }
            DownloadSource::TempFile { path } => move_file(path, &raw)?,
        }

        *stage = TrackStage::Converting;
        let Converted {
            path,
            original,
        } = match decision {
            Decision::Convert { target, .. } => {
                let transcoder = self.dl.transcoder.clone();
                let flags = settings.advanced.flags_for(target);
                let source = raw.clone();
                let converted =
                    tokio::task::spawn_blocking(move || transcoder.convert(&source, target, &flags))
                        .await
                        .map_err(|e| Error::Io(std::io::Error::other(e)))
                        .and_then(|result| result.map_err(Error::from));
                match converted {
                    Ok(converted) => converted,
                    Err(e) => {
                        // Nothing downstream will pick the download up again
                        if let Err(remove) = std::fs::remove_file(&raw)
                            && remove.kind() != std::io::ErrorKind::NotFound
                        {
                            warn!("Could not remove {:?}: {}", raw, remove);
                        }
                        return Err(e);
                    }
                }
            }
            _ => Converted {
                path: raw,
                original: None,
            },
        };
        let container = final_codec(decision, track.codec).container();

        *stage = TrackStage::Enriching;
        let enricher = Enricher::new(settings, self.dl.fetcher.as_ref(), &self.work);
        let third_party = &self.dl.third_party;

        let cover = match ctx.album_cover.filter(|_| third_party.covers.is_none()) {
            Some(album_cover) => Some(album_cover.to_path_buf()),
            None if settings.covers.embed_cover || settings.covers.save_external => {
                let dest = self.work.temp_file();
                let external = (settings.covers.save_external && ctx.album_cover.is_none())
                    .then(|| path.with_extension(""));
                enricher
                    .cover(
                        service,
                        third_party.covers.as_deref(),
                        id,
                        &track,
                        &dest,
                        external.as_deref(),
                    )
                    .await
                    .map(|source| {
                        debug!(id, ?source, "Cover resolved");
                        dest
                    })
            }
            None => None,
        };

        let lyrics = if settings.lyrics.embed_lyrics || settings.lyrics.save_synced_lyrics {
            enricher
                .lyrics(service, third_party.lyrics.as_deref(), id, &track)
                .await
        } else {
            LyricsInfo::default()
        };
        if settings.lyrics.save_synced_lyrics
            && let Some(synced) = &lyrics.synced
        {
            let lrc = path.with_extension("lrc");
            if !lrc.exists()
                && let Err(e) = std::fs::write(&lrc, synced)
            {
                warn!("Could not save synced lyrics to {:?}: {}", lrc, e);
            }
        }

        let credits = enricher
            .credits(service, third_party.credits.as_deref(), id, &track)
            .await;

        *stage = TrackStage::Tagging;
        let job = TagJob {
            path: path.clone(),
            cover: cover.filter(|_| settings.covers.embed_cover),
            track: track.clone(),
            credits,
            embedded_lyrics: lyrics.embedded.filter(|_| settings.lyrics.embed_lyrics),
            container,
        };
        let original_job = original.map(|original| TagJob {
            path: original,
            container: track.codec.container(),
            ..job.clone()
        });

        let tags = job.run().await?;
        if let Some(original_job) = original_job {
            let original = original_job.path.clone();
            if let Err(e) = original_job.run().await {
                warn!("Could not tag kept original {:?}: {}", original, e);
            }
        }

        info!(id, "Saved {:?}", path);
        let outcome = TrackOutcome::Downloaded {
            path: path.clone(),
            tags,
        };
        Ok((outcome, Some(Placed { path, track })))
    }

    /// Final path for a track, claimed for `id` for the rest of the run.
    fn plan_path(
        &mut self,
        id: &str,
        track: &TrackInfo,
        ctx: TrackContext<'_>,
        codec: Codec,
    ) -> Result<PathBuf> {
        let formatting = &self.settings().formatting;
        let fields = FieldSet::for_track(track, id, formatting.enable_zfill);
        let template = if ctx.single {
            &formatting.single_full_path_format
        } else {
            &formatting.track_filename_format
        };

        let mut dir = ctx.dir.to_path_buf();
        if ctx.disc_folders
            && let (Some(disc), Some(total)) = (track.tags.disc_number, track.tags.total_discs)
            && total > 1
        {
            dir.push(format!("CD {}", disc));
        }

        let path = self
            .dl
            .paths
            .build(&dir, template, &fields, Some(codec.container().extension()))?;
        Ok(self.allocator.claim(path, id))
    }
}
