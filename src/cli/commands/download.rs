//! Download commands.

use std::sync::Arc;
use tokio::runtime::Runtime;

use crate::config::Settings;
use crate::download::{DownloadJob, DownloadReport, Downloader, ModuleOverrides, TrackOutcome};
use crate::model::{MediaIdentification, MediaKind};
use crate::module::ModuleRegistry;
use crate::transport::{HttpTransport, Interrupt};

/// Map a service URL onto a download job.
///
/// The host picks the module; the first path segment naming a media kind
/// (`track`, `album`, `playlist`, `artist`) is followed by the id.
pub fn parse_url(registry: &ModuleRegistry, raw: &str) -> anyhow::Result<DownloadJob> {
    let url = reqwest::Url::parse(raw)?;
    let host = url
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("URL has no host: {}", raw))?;
    let module = registry
        .by_netloc(host)
        .ok_or_else(|| anyhow::anyhow!("No module serves {}", host))?;

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();
    let (kind, id) = segments
        .windows(2)
        .find_map(|pair| Some((pair[0].parse::<MediaKind>().ok()?, pair[1])))
        .ok_or_else(|| anyhow::anyhow!("Could not find a media type and id in {}", raw))?;

    let id = urlencoding::decode(id)?.into_owned();
    Ok(DownloadJob::new(
        module.name(),
        MediaIdentification::new(kind, id),
    ))
}

/// Run jobs and print the summary.
pub(super) fn run_jobs(
    rt: &Runtime,
    registry: &ModuleRegistry,
    settings: Settings,
    overrides: ModuleOverrides,
    jobs: &[DownloadJob],
) -> anyhow::Result<()> {
    // One Ctrl-C listener for the whole run, shared by transfers and the track loop
    let interrupt = {
        let _guard = rt.enter();
        Interrupt::ctrl_c()
    };
    let fetcher = Arc::new(HttpTransport::new()?.with_interrupt(interrupt.clone()));
    let downloader =
        Downloader::new(settings, registry, fetcher, overrides)?.with_interrupt(interrupt);
    println!(
        "Downloading {} item(s) to {:?}",
        jobs.len(),
        downloader.settings().general.download_path
    );

    let report = rt.block_on(downloader.run(jobs))?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &DownloadReport) {
    for track in &report.tracks {
        if let TrackOutcome::Failed { stage, reason } = &track.outcome {
            eprintln!("FAILED {} while {}: {}", track.id, stage, reason);
        }
    }
    for collection in &report.collections {
        eprintln!(
            "UNAVAILABLE {} {}: {}",
            collection.kind.as_str(),
            collection.id,
            collection.reason
        );
    }
    println!("\nCompleted: {}", report);
}

/// Download ids of one kind from one module
pub fn cmd_download(
    rt: &Runtime,
    registry: &ModuleRegistry,
    settings: Settings,
    overrides: ModuleOverrides,
    module: &str,
    kind: MediaKind,
    ids: &[String],
) -> anyhow::Result<()> {
    let jobs: Vec<DownloadJob> = ids
        .iter()
        .map(|id| DownloadJob::new(module, MediaIdentification::new(kind, id.as_str())))
        .collect();
    run_jobs(rt, registry, settings, overrides, &jobs)
}

/// Download by URL
pub fn cmd_url(
    rt: &Runtime,
    registry: &ModuleRegistry,
    settings: Settings,
    overrides: ModuleOverrides,
    urls: &[String],
) -> anyhow::Result<()> {
    let jobs = urls
        .iter()
        .map(|url| parse_url(registry, url))
        .collect::<anyhow::Result<Vec<_>>>()?;
    run_jobs(rt, registry, settings, overrides, &jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleModes;
    use crate::test_utils::MockModule;

    fn registry() -> ModuleRegistry {
        let mut registry = ModuleRegistry::default();
        registry.register(Arc::new(
            MockModule::new("svc", ModuleModes::DOWNLOAD).with_netlocs(&["music.example.com"]),
        ));
        registry
    }

    #[test]
    fn test_parse_album_url() {
        let job = parse_url(&registry(), "https://www.music.example.com/us/album/123").unwrap();
        assert_eq!(job.module, "svc");
        assert_eq!(job.media.kind, MediaKind::Album);
        assert_eq!(job.media.id, "123");
    }

    #[test]
    fn test_parse_url_decodes_id() {
        let job = parse_url(&registry(), "https://music.example.com/playlist/a%20b/").unwrap();
        assert_eq!(job.media.kind, MediaKind::Playlist);
        assert_eq!(job.media.id, "a b");
    }

    #[test]
    fn test_parse_url_rejects_unknown_host() {
        assert!(parse_url(&registry(), "https://other.example.org/track/1").is_err());
    }

    #[test]
    fn test_parse_url_needs_kind_and_id() {
        assert!(parse_url(&registry(), "https://music.example.com/browse/1").is_err());
        assert!(parse_url(&registry(), "https://music.example.com/track").is_err());
        assert!(parse_url(&registry(), "not a url").is_err());
    }
}
