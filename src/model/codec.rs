//! Codec policy table.
//!
//! Static mapping from [`Codec`] to its container and its lossless, spatial and
//! proprietary properties. Every conversion and gating decision reads from here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// File containers the tag multiplexer can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    Flac,
    Opus,
    Ogg,
    M4a,
    Mp3,
}

impl Container {
    pub const ALL: [Container; 5] = [
        Container::Flac,
        Container::Opus,
        Container::Ogg,
        Container::M4a,
        Container::Mp3,
    ];

    /// File extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Container::Flac => "flac",
            Container::Opus => "opus",
            Container::Ogg => "ogg",
            Container::M4a => "m4a",
            Container::Mp3 => "mp3",
        }
    }

    /// Look a container up by file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.extension().eq_ignore_ascii_case(ext))
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for Container {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| Error::config(format!("unknown container '{s}'")))
    }
}

/// Audio codecs a source module may deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    Flac,
    Alac,
    Mqa,
    Opus,
    Vorbis,
    Mp3,
    Aac,
    HeAac,
    Mha1,
    Eac3,
    Ac4,
}

/// One row of the policy table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecInfo {
    pub pretty_name: &'static str,
    pub container: Container,
    pub lossless: bool,
    pub spatial: bool,
    pub proprietary: bool,
    /// ffmpeg encoder used when converting *to* this codec
    pub encoder: Option<&'static str>,
}

const fn row(
    pretty_name: &'static str,
    container: Container,
    lossless: bool,
    spatial: bool,
    proprietary: bool,
    encoder: Option<&'static str>,
) -> CodecInfo {
    CodecInfo {
        pretty_name,
        container,
        lossless,
        spatial,
        proprietary,
        encoder,
    }
}

static FLAC: CodecInfo = row("FLAC", Container::Flac, true, false, false, Some("flac"));
static ALAC: CodecInfo = row("ALAC", Container::M4a, true, false, false, Some("alac"));
static MQA: CodecInfo = row("MQA", Container::Flac, false, false, true, None);
static OPUS: CodecInfo = row("Opus", Container::Opus, false, false, false, Some("opus"));
static VORBIS: CodecInfo = row("Vorbis", Container::Ogg, false, false, false, Some("vorbis"));
static MP3: CodecInfo = row("MP3", Container::Mp3, false, false, false, Some("libmp3lame"));
static AAC: CodecInfo = row("AAC-LC", Container::M4a, false, false, false, Some("aac"));
static HEAAC: CodecInfo = row("HE-AAC", Container::M4a, false, false, false, Some("aac"));
static MHA1: CodecInfo = row("MPEG-H 3D", Container::M4a, false, true, false, None);
static EAC3: CodecInfo = row("E-AC-3 JOC", Container::M4a, false, true, true, None);
static AC4: CodecInfo = row("AC-4 IMS", Container::M4a, false, true, true, None);

impl Codec {
    pub const ALL: [Codec; 11] = [
        Codec::Flac,
        Codec::Alac,
        Codec::Mqa,
        Codec::Opus,
        Codec::Vorbis,
        Codec::Mp3,
        Codec::Aac,
        Codec::HeAac,
        Codec::Mha1,
        Codec::Eac3,
        Codec::Ac4,
    ];

    /// Policy table entry for this codec.
    pub fn info(self) -> &'static CodecInfo {
        match self {
            Codec::Flac => &FLAC,
            Codec::Alac => &ALAC,
            Codec::Mqa => &MQA,
            Codec::Opus => &OPUS,
            Codec::Vorbis => &VORBIS,
            Codec::Mp3 => &MP3,
            Codec::Aac => &AAC,
            Codec::HeAac => &HEAAC,
            Codec::Mha1 => &MHA1,
            Codec::Eac3 => &EAC3,
            Codec::Ac4 => &AC4,
        }
    }

    pub fn container(self) -> Container {
        self.info().container
    }

    pub fn is_lossless(self) -> bool {
        self.info().lossless
    }

    pub fn is_spatial(self) -> bool {
        self.info().spatial
    }

    pub fn is_proprietary(self) -> bool {
        self.info().proprietary
    }

    /// Lowercase identifier used in settings files.
    pub fn key(self) -> &'static str {
        match self {
            Codec::Flac => "flac",
            Codec::Alac => "alac",
            Codec::Mqa => "mqa",
            Codec::Opus => "opus",
            Codec::Vorbis => "vorbis",
            Codec::Mp3 => "mp3",
            Codec::Aac => "aac",
            Codec::HeAac => "heaac",
            Codec::Mha1 => "mha1",
            Codec::Eac3 => "eac3",
            Codec::Ac4 => "ac4",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.info().pretty_name)
    }
}

impl FromStr for Codec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::config(format!("unknown codec '{s}'")))
    }
}
