//! Download orchestration.
//!
//! A [`Downloader`] takes a batch of [`DownloadJob`]s and walks each one down
//! to individual tracks, which go through a fixed sequence of stages:
//!
//! ```text
//! metadata → path → (skip if exists | download) → convert → enrich → tag
//! ```
//!
//! Tracks are processed one at a time. A failing track is recorded in the
//! [`DownloadReport`] and its siblings carry on; only configuration problems
//! (and, in debug mode, any failure) abort the run.
//!
//! # Example
//!
//! ```ignore
//! let downloader = Downloader::new(settings, &registry, fetcher, ModuleOverrides::default())?;
//! let report = downloader
//!     .run(&[DownloadJob::new("svc", MediaIdentification::new(MediaKind::Album, "123"))])
//!     .await?;
//! println!("{}", report);
//! ```

mod collection;
mod m3u;
mod report;
mod track;

pub use m3u::M3uEntry;
pub use report::{
    CollectionFailure, DownloadReport, SkipReason, TrackOutcome, TrackReport, TrackStage,
};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{DEFAULT_MODULE, Settings};
use crate::convert::{ConversionGate, Transcoder};
use crate::enrichment::ThirdPartyModules;
use crate::error::{Error, Result};
use crate::model::{MediaIdentification, MediaKind};
use crate::module::{ModuleModes, ModuleRegistry, SourceModule};
use crate::naming::{PathAllocator, PathBuilder};
use crate::transport::{Fetcher, Interrupt, TransportError, WorkDir};

/// One requested piece of media and the module to get it from.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadJob {
    pub module: String,
    pub media: MediaIdentification,
}

impl DownloadJob {
    pub fn new(module: impl Into<String>, media: MediaIdentification) -> Self {
        Self {
            module: module.into(),
            media,
        }
    }
}

/// Per-run module choices that take precedence over `module_defaults`.
#[derive(Debug, Clone, Default)]
pub struct ModuleOverrides {
    pub lyrics: Option<String>,
    pub covers: Option<String>,
    pub credits: Option<String>,
    /// Fetch playlist tracks from this module instead of the playlist's own
    pub download: Option<String>,
}

/// Runs download jobs against a fixed set of modules and settings.
pub struct Downloader {
    settings: Settings,
    registry: ModuleRegistry,
    fetcher: Arc<dyn Fetcher>,
    third_party: ThirdPartyModules,
    download_module: Option<Arc<dyn SourceModule>>,
    gate: ConversionGate,
    transcoder: Transcoder,
    paths: PathBuilder,
    interrupt: Interrupt,
}

/// Resolve a configured enrichment module. `"default"` means none.
fn third_party(
    registry: &ModuleRegistry,
    name: Option<&str>,
    mode: ModuleModes,
) -> Result<Option<Arc<dyn SourceModule>>> {
    match name {
        None => Ok(None),
        Some(name) if name.eq_ignore_ascii_case(DEFAULT_MODULE) => Ok(None),
        Some(name) => registry.require(name, mode).map(Some),
    }
}

impl Downloader {
    /// Validate settings and module choices up front.
    ///
    /// Unknown modules or modules lacking the capability they were picked
    /// for are fatal here, before anything is downloaded.
    pub fn new(
        settings: Settings,
        registry: &ModuleRegistry,
        fetcher: Arc<dyn Fetcher>,
        overrides: ModuleOverrides,
    ) -> Result<Self> {
        settings.validate()?;
        let defaults = &settings.module_defaults;

        let enrichment = ThirdPartyModules {
            covers: third_party(
                registry,
                Some(overrides.covers.as_deref().unwrap_or(defaults.covers.as_str())),
                ModuleModes::COVERS,
            )?,
            lyrics: third_party(
                registry,
                Some(overrides.lyrics.as_deref().unwrap_or(defaults.lyrics.as_str())),
                ModuleModes::LYRICS,
            )?,
            credits: third_party(
                registry,
                Some(overrides.credits.as_deref().unwrap_or(defaults.credits.as_str())),
                ModuleModes::CREDITS,
            )?,
        };
        let download_module =
            third_party(registry, overrides.download.as_deref(), ModuleModes::DOWNLOAD)?;

        Ok(Self {
            gate: ConversionGate::new(&settings.advanced)?,
            transcoder: Transcoder::new(settings.advanced.conversion_keep_original),
            paths: PathBuilder::new(settings.formatting.path_segment_limit),
            registry: registry.clone(),
            fetcher,
            third_party: enrichment,
            download_module,
            interrupt: Interrupt::default(),
            settings,
        })
    }

    /// Stop the run before the next track once `interrupt` is raised.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Use `program` instead of `ffmpeg` from the PATH.
    pub fn with_ffmpeg(mut self, program: impl Into<PathBuf>) -> Self {
        self.transcoder = self.transcoder.with_program(program);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Check that `job` can run with the configured modules.
    fn validate(&self, job: &DownloadJob) -> Result<Arc<dyn SourceModule>> {
        let kind = job.media.kind;
        if self.download_module.is_some() && kind != MediaKind::Playlist {
            return Err(Error::invalid_module(format!(
                "a separate download module only applies to playlists, not {}s",
                kind.as_str()
            )));
        }

        let service = if kind == MediaKind::Playlist {
            self.registry.require(&job.module, ModuleModes::PLAYLIST)?
        } else {
            self.registry.require(&job.module, ModuleModes::DOWNLOAD)?
        };
        if kind == MediaKind::Playlist
            && self.download_module.is_none()
            && !service.supports(ModuleModes::DOWNLOAD)
        {
            return Err(Error::unsupported(service.name(), ModuleModes::DOWNLOAD));
        }
        Ok(service)
    }

    /// Run every job in order into `general.download_path`.
    pub async fn run(&self, jobs: &[DownloadJob]) -> Result<DownloadReport> {
        let base = self.settings.general.download_path.clone();
        self.run_into(jobs, &base).await
    }

    /// Run every job in order into `base`.
    pub async fn run_into(&self, jobs: &[DownloadJob], base: &Path) -> Result<DownloadReport> {
        let services = jobs
            .iter()
            .map(|job| self.validate(job))
            .collect::<Result<Vec<_>>>()?;

        let mut session = Session::new(self)?;
        for (job, service) in jobs.iter().zip(services) {
            session.check_interrupt()?;
            let media = &job.media;
            tracing::info!(
                module = service.name(),
                kind = media.kind.as_str(),
                id = %media.id,
                "Starting download"
            );
            match media.kind {
                MediaKind::Track => {
                    let ctx = track::TrackContext::single(base, &media.extra);
                    session.download_track(service.as_ref(), &media.id, ctx).await?;
                }
                MediaKind::Album => {
                    session
                        .download_album(service.as_ref(), &media.id, &media.extra, base, None)
                        .await?;
                }
                MediaKind::Playlist => {
                    session
                        .download_playlist(service.as_ref(), &media.id, &media.extra, base)
                        .await?;
                }
                MediaKind::Artist => {
                    session
                        .download_artist(service.as_ref(), &media.id, &media.extra, base)
                        .await?;
                }
            }
        }

        let report = session.finish();
        tracing::info!("Run finished: {}", report);
        Ok(report)
    }
}

/// State for one run: scratch space, claimed paths and results so far.
struct Session<'a> {
    dl: &'a Downloader,
    work: WorkDir,
    allocator: PathAllocator,
    report: DownloadReport,
}

impl<'a> Session<'a> {
    fn new(dl: &'a Downloader) -> Result<Self> {
        Ok(Self {
            dl,
            work: WorkDir::create()?,
            allocator: PathAllocator::default(),
            report: DownloadReport::default(),
        })
    }

    fn settings(&self) -> &'a Settings {
        &self.dl.settings
    }

    /// Interrupts end the run between tracks.
    fn check_interrupt(&self) -> Result<()> {
        if self.dl.interrupt.is_set() {
            return Err(TransportError::Interrupted.into());
        }
        Ok(())
    }

    /// Record a per-entity failure, or re-raise it when it must stop the run.
    fn absorb(&self, error: Error) -> Result<()> {
        if error.is_fatal() || self.settings().advanced.debug_mode {
            return Err(error);
        }
        Ok(())
    }

    fn finish(self) -> DownloadReport {
        self.report
    }
}
