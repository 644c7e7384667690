//! Codec conversion.
//!
//! [`ConversionGate`] decides whether a delivered codec should be transcoded
//! according to `advanced.codec_conversions`, and [`Transcoder`] runs `ffmpeg`
//! to do it.
//!
//! Install ffmpeg:
//! - Windows: `winget install Gyan.FFmpeg`
//! - macOS: `brew install ffmpeg`
//! - Linux: `apt install ffmpeg` or equivalent
//!
//! Spatial audio is never converted. Conversions that lose quality or
//! pretend to add it (lossy → lossless, lossy → lossy) are refused unless
//! `enable_undesirable_conversions` is set.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::AdvancedSettings;
use crate::model::Codec;
use crate::transport::{append_extension, random_name};

/// Conversion failures
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Failed to run ffmpeg: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("ffmpeg failed encoding with {encoder}: {stderr}")]
    Failed { encoder: String, stderr: String },

    #[error("No encoder available for {0}")]
    NoEncoder(Codec),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a configured conversion was not performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    Spatial,
    LossyToLossless,
    LossyToLossy,
    NoEncoder,
}

impl std::fmt::Display for Refusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Refusal::Spatial => "spatial audio cannot be converted",
            Refusal::LossyToLossless => "lossy to lossless conversion is pointless",
            Refusal::LossyToLossy => "lossy to lossy conversion loses quality",
            Refusal::NoEncoder => "target codec has no encoder",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    NoConversion,
    Refused { target: Codec, reason: Refusal },
    Convert { target: Codec, undesirable: bool },
}

/// Decides conversions from the configured codec map.
#[derive(Debug, Clone)]
pub struct ConversionGate {
    conversions: BTreeMap<Codec, Codec>,
    allow_undesirable: bool,
}

impl ConversionGate {
    pub fn new(settings: &AdvancedSettings) -> crate::error::Result<Self> {
        Ok(Self {
            conversions: settings.conversions()?,
            allow_undesirable: settings.enable_undesirable_conversions,
        })
    }

    pub fn decide(&self, source: Codec) -> Decision {
        let Some(&target) = self.conversions.get(&source) else {
            return Decision::NoConversion;
        };
        if target == source {
            return Decision::NoConversion;
        }

        let refused = |reason: Refusal| {
            tracing::warn!(%source, %target, "Conversion refused: {}", reason);
            Decision::Refused { target, reason }
        };

        if source.is_spatial() || target.is_spatial() {
            return refused(Refusal::Spatial);
        }

        let undesirable = !source.is_lossless();
        if undesirable && !self.allow_undesirable {
            return if target.is_lossless() {
                refused(Refusal::LossyToLossless)
            } else {
                refused(Refusal::LossyToLossy)
            };
        }

        if target.info().encoder.is_none() {
            return refused(Refusal::NoEncoder);
        }

        if undesirable {
            tracing::warn!(%source, %target, "Performing undesirable conversion");
        }
        Decision::Convert {
            target,
            undesirable,
        }
    }
}

/// Result of a successful transcode.
#[derive(Debug, Clone, PartialEq)]
pub struct Converted {
    pub path: PathBuf,
    /// The source file, when kept
    pub original: Option<PathBuf>,
}

/// Runs ffmpeg.
#[derive(Debug, Clone)]
pub struct Transcoder {
    program: PathBuf,
    keep_original: bool,
}

impl Transcoder {
    pub fn new(keep_original: bool) -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            keep_original,
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Transcode `source` to `target` next to it.
    ///
    /// The output takes the target container's extension. It is written to a
    /// temporary file in the same directory and renamed into place.
    pub fn convert(
        &self,
        source: &Path,
        target: Codec,
        flags: &[(String, String)],
    ) -> Result<Converted, ConversionError> {
        let encoder = target
            .info()
            .encoder
            .ok_or(ConversionError::NoEncoder(target))?;
        let dest = source.with_extension(target.container().extension());
        let temp = append_extension(
            &source.with_file_name(format!(".{}", random_name())),
            target.container().extension(),
        );

        let mut result = self.run(source, &temp, encoder, flags);
        if let Err(ConversionError::Failed { stderr, .. }) = &result
            && let Some(alternative) = suggested_encoder(stderr)
        {
            tracing::info!(encoder, %alternative, "Encoder is experimental, retrying");
            result = self.run(source, &temp, &alternative, flags);
        }
        if let Err(e) = result {
            let _ = std::fs::remove_file(&temp);
            return Err(e);
        }

        std::fs::rename(&temp, &dest)?;

        let original = if dest == source {
            None
        } else if self.keep_original {
            Some(source.to_path_buf())
        } else {
            std::fs::remove_file(source)?;
            None
        };

        tracing::debug!("Converted {:?} to {}", dest, target);
        Ok(Converted {
            path: dest,
            original,
        })
    }

    fn run(
        &self,
        source: &Path,
        output: &Path,
        encoder: &str,
        flags: &[(String, String)],
    ) -> Result<(), ConversionError> {
        let mut command = Command::new(&self.program);
        command
            .args(["-hide_banner", "-y", "-i"])
            .arg(source)
            .args(["-vn", "-c:a", encoder]);
        for (key, value) in flags {
            command.arg(format!("-{}", key)).arg(value);
        }
        command.arg(output);

        let output = command.output().map_err(ConversionError::Spawn)?;
        if !output.status.success() {
            return Err(ConversionError::Failed {
                encoder: encoder.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// The encoder ffmpeg recommends when the requested one is experimental.
fn suggested_encoder(stderr: &str) -> Option<String> {
    const MARKER: &str = "use the non experimental encoder '";
    let start = stderr.find(MARKER)? + MARKER.len();
    let rest = &stderr[start..];
    let end = rest.find('\'')?;
    let name = &rest[..end];
    (!name.is_empty()).then(|| name.to_string())
}

/// Whether an ffmpeg binary is on the PATH.
pub fn is_ffmpeg_available() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn gate(pairs: &[(Codec, Codec)], allow_undesirable: bool) -> ConversionGate {
        ConversionGate {
            conversions: pairs.iter().copied().collect(),
            allow_undesirable,
        }
    }

    #[test]
    fn test_default_settings_convert_alac_to_flac() {
        let gate = ConversionGate::new(&AdvancedSettings::default()).unwrap();
        assert_eq!(
            gate.decide(Codec::Alac),
            Decision::Convert {
                target: Codec::Flac,
                undesirable: false
            }
        );
        assert_eq!(gate.decide(Codec::Flac), Decision::NoConversion);
    }

    #[test]
    fn test_gate_table() {
        let g = gate(
            &[
                (Codec::Aac, Codec::Flac),
                (Codec::Mp3, Codec::Opus),
                (Codec::Flac, Codec::Opus),
                (Codec::Eac3, Codec::Flac),
                (Codec::Flac, Codec::Mqa),
            ],
            false,
        );
        let refused = |target, reason| Decision::Refused { target, reason };

        assert_eq!(g.decide(Codec::Aac), refused(Codec::Flac, Refusal::LossyToLossless));
        assert_eq!(g.decide(Codec::Mp3), refused(Codec::Opus, Refusal::LossyToLossy));
        assert_eq!(g.decide(Codec::Eac3), refused(Codec::Flac, Refusal::Spatial));
        assert_eq!(g.decide(Codec::Vorbis), Decision::NoConversion);
    }

    #[test]
    fn test_target_without_encoder() {
        let g = gate(&[(Codec::Flac, Codec::Mqa)], false);
        assert_eq!(
            g.decide(Codec::Flac),
            Decision::Refused {
                target: Codec::Mqa,
                reason: Refusal::NoEncoder
            }
        );
    }

    #[test]
    fn test_override_allows_undesirable() {
        let g = gate(&[(Codec::Mp3, Codec::Flac), (Codec::Aac, Codec::Opus)], true);
        assert_eq!(
            g.decide(Codec::Mp3),
            Decision::Convert {
                target: Codec::Flac,
                undesirable: true
            }
        );
        assert_eq!(
            g.decide(Codec::Aac),
            Decision::Convert {
                target: Codec::Opus,
                undesirable: true
            }
        );
    }

    #[test]
    fn test_lossless_to_lossy_is_desirable() {
        let g = gate(&[(Codec::Flac, Codec::Opus)], false);
        assert_eq!(
            g.decide(Codec::Flac),
            Decision::Convert {
                target: Codec::Opus,
                undesirable: false
            }
        );
    }

    #[test]
    fn test_suggested_encoder_parsing() {
        let stderr = "[opus @ 0x5581] The encoder 'opus' is experimental but experimental \
                      codecs are not enabled, add '-strict -2' if you want to use it. \
                      Alternatively use the non experimental encoder 'libopus'.";
        assert_eq!(suggested_encoder(stderr).as_deref(), Some("libopus"));
        assert_eq!(suggested_encoder("Conversion failed!"), None);
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("song.m4a");
        std::fs::write(&src, b"not audio").unwrap();

        let transcoder = Transcoder::new(false).with_program(dir.path().join("no-such-ffmpeg"));
        let err = transcoder.convert(&src, Codec::Flac, &[]).unwrap_err();
        assert!(matches!(err, ConversionError::Spawn(_)));
        assert!(src.exists());
    }

    #[test]
    fn test_convert_with_ffmpeg() {
        if !is_ffmpeg_available() {
            eprintln!("ffmpeg not available, skipping");
            return;
        }
        let dir = tempdir().unwrap();
        let src = dir.path().join("01. Song.m4a");
        let status = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-f", "lavfi", "-i"])
            .arg("sine=frequency=440:duration=1")
            .args(["-c:a", "alac"])
            .arg(&src)
            .status()
            .unwrap();
        assert!(status.success());

        let flags = vec![("compression_level".to_string(), "5".to_string())];
        let converted = Transcoder::new(false)
            .convert(&src, Codec::Flac, &flags)
            .unwrap();

        assert_eq!(converted.path, dir.path().join("01. Song.flac"));
        assert!(converted.path.exists());
        assert!(converted.original.is_none());
        assert!(!src.exists());
        // Only the output is left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    proptest! {
        #[test]
        fn prop_spatial_never_converts(
            from in 0usize..Codec::ALL.len(),
            to in 0usize..Codec::ALL.len(),
            allow in any::<bool>(),
        ) {
            let (source, target) = (Codec::ALL[from], Codec::ALL[to]);
            let decision = gate(&[(source, target)], allow).decide(source);
            if source.is_spatial() || target.is_spatial() {
                let converts = matches!(decision, Decision::Convert { .. });
                prop_assert!(!converts);
            }
        }
    }
}
