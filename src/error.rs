use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::attachment::ALLOWED_EXTENSIONS;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("WebSocket connection not available. Please refresh the page.")]
    NotConnected,
    #[error("invalid origin '{origin}': {reason}")]
    InvalidOrigin { origin: String, reason: String },
    #[error("failed to encode outbound message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("clipboard unavailable: {0}")]
    Clipboard(String),
    #[error("failed to write '{}': {source}", .path.display())]
    Export { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Attachment(#[from] AttachmentError),
}

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("File size must be less than 1MB ({size} bytes)")]
    TooLarge { size: u64 },
    #[error("Please upload a text file ({})", ALLOWED_EXTENSIONS.join(", "))]
    TypeNotAllowed { name: String },
    #[error("Error reading file '{name}': {source}")]
    Read { name: String, source: io::Error },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{}': {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unknown client variant '{0}' (expected 'report' or 'transcript')")]
    UnknownVariant(String),
}
