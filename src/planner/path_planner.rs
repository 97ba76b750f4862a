use crate::error::{PodExtractError, Result};
use crate::tags::TagSet;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

const UNSAFE_CHARS: [char; 9] = ['|', '?', '*', ':', '<', '>', '"', '/', '\\'];

/// Tag text that is safe to use as a single path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SanitizedText(String);

impl SanitizedText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for SanitizedText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SanitizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Replaces every filesystem-unsafe character with `_`.
pub fn sanitize(text: &str) -> SanitizedText {
    SanitizedText(
        text.chars()
            .map(|c| if UNSAFE_CHARS.contains(&c) { '_' } else { c })
            .collect(),
    )
}

/// Computes the relative destination for `original` from its tags.
///
/// Layout is `[Artist/][Album/][NN - ]Title.ext`, each part present only when the
/// tag is. When the title is missing the original file name is kept and the
/// extension appended again, e.g. `song.mp3` becomes `song.mp3.mp3`.
pub fn plan_path(original: &Path, tags: &TagSet) -> PathBuf {
    let extension = dotted_extension(original);

    match render(tags, &extension) {
        Ok(path) => path,
        Err(err) => {
            debug!(path = %original.display(), error = %err, "falling back to original name");
            fallback(original, &extension)
        }
    }
}

fn render(tags: &TagSet, extension: &OsStr) -> Result<PathBuf> {
    let title = tags.title.as_deref().ok_or_else(|| PodExtractError::Template {
        reason: "title is missing".to_string(),
    })?;

    let mut path = PathBuf::new();

    if let Some(artist) = &tags.artist {
        path.push(segment("artist", artist)?.as_str());
    }

    if let Some(album) = &tags.album {
        path.push(segment("album", album)?.as_str());
    }

    let title = segment("title", title)?;
    let mut file_name = OsString::from(match tags.track {
        Some(track) => format!("{:02} - {}", track, title),
        None => title.into_string(),
    });
    file_name.push(extension);
    path.push(file_name);

    Ok(path)
}

fn segment(field: &str, value: &str) -> Result<SanitizedText> {
    let text = sanitize(value);
    match text.as_str() {
        "" | "." | ".." => Err(PodExtractError::Template {
            reason: format!("{} {:?} is not a usable path segment", field, value),
        }),
        _ => Ok(text),
    }
}

fn fallback(original: &Path, extension: &OsStr) -> PathBuf {
    let mut file_name = original
        .file_name()
        .map(OsStr::to_os_string)
        .unwrap_or_else(|| OsString::from("untitled"));
    file_name.push(extension);
    PathBuf::from(file_name)
}

fn dotted_extension(path: &Path) -> OsString {
    match path.extension() {
        Some(ext) => {
            let mut dotted = OsString::from(".");
            dotted.push(ext);
            dotted
        }
        None => OsString::new(),
    }
}
