use super::{Id3Decoder, Mp4Decoder, TagDecoder, TagSet};
use crate::error::{PodExtractError, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Routes a file to the decoder registered for its extension.
///
/// The extension table is fixed once the reader is built.
#[derive(Clone)]
pub struct TagReader {
    decoders: BTreeMap<String, Arc<dyn TagDecoder>>,
}

impl TagReader {
    /// Reader with the built-in decoders: MP3 via ID3, and the MP4 family.
    pub fn new() -> Self {
        let id3: Arc<dyn TagDecoder> = Arc::new(Id3Decoder::new());
        let mp4: Arc<dyn TagDecoder> = Arc::new(Mp4Decoder::new());

        Self::builder()
            .register("mp3", id3)
            .register("m4a", mp4.clone())
            .register("m4v", mp4.clone())
            .register("m4p", mp4)
            .build()
    }

    pub fn builder() -> TagReaderBuilder {
        TagReaderBuilder {
            decoders: BTreeMap::new(),
        }
    }

    pub fn supports(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| self.decoders.contains_key(&ext))
    }

    pub fn tags_for(&self, path: &Path) -> Result<TagSet> {
        let extension = extension_of(path).unwrap_or_default();
        let decoder = self.decoders.get(&extension).ok_or_else(|| {
            PodExtractError::UnsupportedFormat {
                path: path.display().to_string(),
                extension: extension.clone(),
            }
        })?;

        debug!(path = %path.display(), decoder = decoder.name(), "reading tags");
        decoder
            .decode(path)
            .map_err(|source| PodExtractError::Decode {
                path: path.display().to_string(),
                source,
            })
    }

    /// Registered extensions, lowercase and sorted.
    pub fn extensions(&self) -> Vec<String> {
        self.decoders.keys().cloned().collect()
    }
}

impl Default for TagReader {
    fn default() -> Self {
        Self::new()
    }
}

pub struct TagReaderBuilder {
    decoders: BTreeMap<String, Arc<dyn TagDecoder>>,
}

impl TagReaderBuilder {
    pub fn register<S: AsRef<str>>(mut self, extension: S, decoder: Arc<dyn TagDecoder>) -> Self {
        let ext = extension
            .as_ref()
            .trim_start_matches('.')
            .to_lowercase();
        self.decoders.insert(ext, decoder);
        self
    }

    pub fn build(self) -> TagReader {
        TagReader {
            decoders: self.decoders,
        }
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}
