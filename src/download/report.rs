//! Per-track results of a run.

use std::fmt;
use std::path::PathBuf;

use crate::model::MediaKind;
use crate::tagging::TagOutcome;

/// Where a track was in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackStage {
    FetchingMetadata,
    BuildingPath,
    Downloading,
    Converting,
    Enriching,
    Tagging,
}

impl fmt::Display for TrackStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrackStage::FetchingMetadata => "fetching metadata",
            TrackStage::BuildingPath => "building path",
            TrackStage::Downloading => "downloading",
            TrackStage::Converting => "converting",
            TrackStage::Enriching => "enriching",
            TrackStage::Tagging => "tagging",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The target file is already on disk
    AlreadyExists(PathBuf),
    /// Fetched earlier in the same artist run
    AlreadyDownloaded,
    /// Not by the artist being traversed
    DifferentArtist,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackOutcome {
    Downloaded { path: PathBuf, tags: TagOutcome },
    Skipped(SkipReason),
    Failed { stage: TrackStage, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackReport {
    pub id: String,
    pub outcome: TrackOutcome,
}

/// An album, playlist or artist whose metadata could not be fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionFailure {
    pub kind: MediaKind,
    pub id: String,
    pub reason: String,
}

/// Everything that happened during one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadReport {
    pub tracks: Vec<TrackReport>,
    pub collections: Vec<CollectionFailure>,
}

impl DownloadReport {
    pub(super) fn push(&mut self, id: &str, outcome: TrackOutcome) {
        self.tracks.push(TrackReport {
            id: id.to_string(),
            outcome,
        });
    }

    pub fn downloaded(&self) -> usize {
        self.count(|o| matches!(o, TrackOutcome::Downloaded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, TrackOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, TrackOutcome::Failed { .. }))
    }

    /// Report for `id`, the last one if the track was seen more than once.
    pub fn get(&self, id: &str) -> Option<&TrackReport> {
        self.tracks.iter().rev().find(|r| r.id == id)
    }

    fn count(&self, pred: impl Fn(&TrackOutcome) -> bool) -> usize {
        self.tracks.iter().filter(|r| pred(&r.outcome)).count()
    }
}

impl fmt::Display for DownloadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} downloaded, {} skipped, {} failed",
            self.downloaded(),
            self.skipped(),
            self.failed()
        )?;
        if !self.collections.is_empty() {
            write!(f, ", {} collections unavailable", self.collections.len())?;
        }
        Ok(())
    }
}
