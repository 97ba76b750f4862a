use crate::tags::DecodeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PodExtractError {
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not read tags from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: DecodeError,
    },

    #[error("Unsupported file format: {path}")]
    UnsupportedFormat { path: String, extension: String },

    #[error("Could not render destination path: {reason}")]
    Template { reason: String },

    #[error("Failed to create directory {path}: {message}")]
    DirectoryCreate { path: String, message: String },

    #[error("Failed to copy {source_path} -> {destination}: {message}")]
    Copy {
        source_path: String,
        destination: String,
        message: String,
    },

    #[error("Path validation failed: {path}")]
    InvalidPath { path: String },

    #[error("Destination is not writable: {path}")]
    DestinationUnwritable { path: String },

    #[error("No supported media files found")]
    NoMediaFound { searched_extensions: Vec<String> },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Operation was cancelled by user")]
    Cancelled,
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for PodExtractError {
    fn user_message(&self) -> String {
        match self {
            PodExtractError::Decode { path, source } => {
                format!("Could not read tags from {}: {}", path, source)
            }
            PodExtractError::UnsupportedFormat { path, extension } => {
                if extension.is_empty() {
                    format!("File has no extension: {}", path)
                } else {
                    format!("Unsupported file type .{}: {}", extension, path)
                }
            }
            PodExtractError::InvalidPath { path } => {
                format!("Invalid source folder: {}", path)
            }
            PodExtractError::DestinationUnwritable { path } => {
                format!("Cannot write to destination folder: {}", path)
            }
            PodExtractError::NoMediaFound {
                searched_extensions,
            } => {
                format!(
                    "There are no files to extract! Looked for: {}",
                    searched_extensions.join(", ")
                )
            }
            PodExtractError::Config { message } => {
                format!("Configuration error: {}", message)
            }
            PodExtractError::Cancelled => "Operation was cancelled by user".to_string(),
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            PodExtractError::InvalidPath { .. } => Some(
                "Point the source at the mounted iPod drive or its iPod_Control/Music folder.".to_string()
            ),
            PodExtractError::DestinationUnwritable { .. } => Some(
                "Choose a destination folder you can write to, or check free space and permissions.".to_string()
            ),
            PodExtractError::NoMediaFound { .. } => Some(
                "Make sure the iPod is mounted in disk mode and hidden folders are visible to your system.".to_string()
            ),
            PodExtractError::Config { .. } => Some(
                "Check your configuration file syntax and ensure all required fields are present.".to_string()
            ),
            PodExtractError::Decode { .. } => Some(
                "The file may be corrupt or untagged; it will keep its original name.".to_string()
            ),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for PodExtractError {
    fn from(error: toml::de::Error) -> Self {
        PodExtractError::Config {
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PodExtractError>;
