//! Field sets that format templates are resolved against.
//!
//! A field set is a sanitized, formatting-only copy of a record. Building one
//! never touches the record itself.

use std::collections::BTreeMap;

use super::{pad_number, sanitize_name};
use crate::model::{AlbumInfo, PlaylistInfo, TrackInfo};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet {
    values: BTreeMap<String, String>,
}

fn opt<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

fn explicit_marker(explicit: bool) -> &'static str {
    if explicit { " [E]" } else { "" }
}

impl FieldSet {
    /// Insert a field; the value is sanitized on the way in.
    pub fn insert(&mut self, key: &str, value: impl AsRef<str>) {
        self.values
            .insert(key.to_string(), sanitize_name(value.as_ref()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Fields for track file names.
    ///
    /// With `zfill`, ordering numbers are padded to the width of their totals.
    pub fn for_track(track: &TrackInfo, id: &str, zfill: bool) -> Self {
        let tags = &track.tags;
        let mut set = Self::default();

        set.insert("id", id);
        set.insert("name", &track.name);
        set.insert("album", &track.album);
        set.insert("album_id", &track.album_id);
        set.insert("artist", track.primary_artist());
        set.insert("artists", track.artists.join(", "));
        set.insert("artist_id", &track.artist_id);
        set.insert("release_year", opt(&track.release_year));
        set.insert("explicit", explicit_marker(track.explicit));
        set.insert("codec", track.codec.info().pretty_name);
        set.insert("bit_depth", track.bit_depth.to_string());
        set.insert("sample_rate", track.sample_rate.to_string());

        set.insert(
            "track_number",
            pad_number(tags.track_number, tags.total_tracks, zfill),
        );
        set.insert(
            "total_tracks",
            pad_number(tags.total_tracks, tags.total_tracks, zfill),
        );
        set.insert(
            "disc_number",
            pad_number(tags.disc_number, tags.total_discs, zfill),
        );
        set.insert(
            "total_discs",
            pad_number(tags.total_discs, tags.total_discs, zfill),
        );

        set.insert("album_artist", opt(&tags.album_artist));
        set.insert("composer", opt(&tags.composer));
        set.insert("copyright", opt(&tags.copyright));
        set.insert("isrc", opt(&tags.isrc));
        set.insert("upc", opt(&tags.upc));
        set.insert("release_date", opt(&tags.release_date));
        set.insert("label", opt(&tags.label));
        set.insert("genre", tags.genres.first().cloned().unwrap_or_default());
        set
    }

    pub fn for_album(album: &AlbumInfo, id: &str) -> Self {
        let mut set = Self::default();
        set.insert("id", id);
        set.insert("name", &album.name);
        set.insert("artist", &album.artist);
        set.insert("artist_id", &album.artist_id);
        set.insert("release_year", opt(&album.release_year));
        set.insert("upc", opt(&album.upc));
        set.insert("explicit", explicit_marker(album.explicit));
        set.insert(
            "quality",
            album
                .quality
                .as_deref()
                .map(|q| format!(" [{q}]"))
                .unwrap_or_default(),
        );
        set
    }

    pub fn for_playlist(playlist: &PlaylistInfo, id: &str) -> Self {
        let mut set = Self::default();
        set.insert("id", id);
        set.insert("name", &playlist.name);
        set.insert("creator", &playlist.creator);
        set.insert("creator_id", &playlist.creator_id);
        set.insert("release_year", opt(&playlist.release_year));
        set.insert("explicit", explicit_marker(playlist.explicit));
        set
    }

    pub fn for_artist(name: &str, id: &str) -> Self {
        let mut set = Self::default();
        set.insert("id", id);
        set.insert("name", name);
        set
    }
}
