pub mod id3;
pub mod mp4;
pub mod registry;

pub use id3::Id3Decoder;
pub use mp4::Mp4Decoder;
pub use registry::TagReader;

use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use thiserror::Error;

/// The four fields the path planner knows how to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum TagKey {
    Artist,
    Album,
    Track,
    Title,
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TagKey::Artist => "Artist",
            TagKey::Album => "Album",
            TagKey::Track => "Track",
            TagKey::Title => "Title",
        };
        f.write_str(name)
    }
}

/// Tags recovered from one file. Every field is optional; an all-empty set is
/// never handed out by a decoder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagSet {
    pub artist: Option<String>,
    pub album: Option<String>,
    pub track: Option<u32>,
    pub title: Option<String>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_artist<S: Into<String>>(mut self, artist: S) -> Self {
        self.set_text(TagKey::Artist, artist.into());
        self
    }

    pub fn with_album<S: Into<String>>(mut self, album: S) -> Self {
        self.set_text(TagKey::Album, album.into());
        self
    }

    pub fn with_track(mut self, track: u32) -> Self {
        self.set_track(track);
        self
    }

    pub fn with_title<S: Into<String>>(mut self, title: S) -> Self {
        self.set_text(TagKey::Title, title.into());
        self
    }

    /// Stores a text field. Blank values are treated as missing.
    pub fn set_text(&mut self, key: TagKey, value: String) {
        let value = value.trim_matches(|c: char| c == '\0' || c.is_whitespace());
        if value.is_empty() {
            return;
        }

        let slot = match key {
            TagKey::Artist => &mut self.artist,
            TagKey::Album => &mut self.album,
            TagKey::Title => &mut self.title,
            TagKey::Track => {
                if let Some(track) = parse_track(value) {
                    self.track = Some(track);
                }
                return;
            }
        };
        *slot = Some(value.to_string());
    }

    /// Stores a track number. Zero is not a track position.
    pub fn set_track(&mut self, track: u32) {
        if track > 0 {
            self.track = Some(track);
        }
    }

    /// Fills fields that are still missing from `other`.
    pub fn merge_missing(&mut self, other: TagSet) {
        if self.artist.is_none() {
            self.artist = other.artist;
        }
        if self.album.is_none() {
            self.album = other.album;
        }
        if self.track.is_none() {
            self.track = other.track;
        }
        if self.title.is_none() {
            self.title = other.title;
        }
    }

    pub fn contains(&self, key: TagKey) -> bool {
        match key {
            TagKey::Artist => self.artist.is_some(),
            TagKey::Album => self.album.is_some(),
            TagKey::Track => self.track.is_some(),
            TagKey::Title => self.title.is_some(),
        }
    }

    pub fn keys(&self) -> Vec<TagKey> {
        [TagKey::Artist, TagKey::Album, TagKey::Track, TagKey::Title]
            .into_iter()
            .filter(|key| self.contains(*key))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }

    /// Converts a finished parse into the decoder result: no fields is a failure.
    pub fn into_result(self) -> Result<TagSet, DecodeError> {
        if self.is_empty() {
            Err(DecodeError::NoTags)
        } else {
            Ok(self)
        }
    }
}

/// Parses the position part of an "N" or "N/M" track string.
pub fn parse_track(value: &str) -> Option<u32> {
    value
        .split('/')
        .next()
        .and_then(|n| n.trim().parse::<u32>().ok())
        .filter(|n| *n > 0)
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("no artist, album, track or title found")]
    NoTags,

    #[error("malformed {format} data: {message}")]
    Malformed {
        format: &'static str,
        message: String,
    },

    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    pub(crate) fn malformed<S: Into<String>>(format: &'static str, message: S) -> Self {
        DecodeError::Malformed {
            format,
            message: message.into(),
        }
    }

    /// True when the container parsed cleanly but carried none of the fields.
    pub fn is_untagged(&self) -> bool {
        matches!(self, DecodeError::NoTags)
    }
}

pub trait SeekRead: Read + Seek {}

impl<T: Read + Seek> SeekRead for T {}

pub trait TagDecoder: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn decode_from(&self, reader: &mut dyn SeekRead) -> Result<TagSet, DecodeError>;

    fn decode(&self, path: &Path) -> Result<TagSet, DecodeError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        self.decode_from(&mut reader)
    }
}
