use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use tracing::{debug, info, warn};

use crate::error::AttachmentError;

pub const MAX_ATTACHMENT_BYTES: u64 = 1024 * 1024;
pub const ALLOWED_MIME_TYPES: [&str; 5] = [
    "text/plain",
    "text/markdown",
    "application/json",
    "text/csv",
    "text/xml",
];
pub const ALLOWED_EXTENSIONS: [&str; 9] = [
    ".txt", ".md", ".json", ".csv", ".xml", ".py", ".js", ".html", ".css",
];
const PREVIEW_CHARS: usize = 500;

/// A file the user picked, before its contents are read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentCandidate {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub declared_mime: Option<String>,
}

impl AttachmentCandidate {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, AttachmentError> {
        let path = path.as_ref();
        let name = display_name(path);
        let metadata = fs::metadata(path).map_err(|source| AttachmentError::Read {
            name: name.clone(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            name,
            size: metadata.len(),
            declared_mime: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedFile {
    pub name: String,
    pub content: String,
    pub size: u64,
}

impl AttachedFile {
    pub fn size_label(&self) -> String {
        format!("{:.1} KB", self.size as f64 / 1024.0)
    }

    pub fn preview(&self) -> String {
        if self.content.chars().count() > PREVIEW_CHARS {
            let head: String = self.content.chars().take(PREVIEW_CHARS).collect();
            format!("{head}...")
        } else {
            self.content.clone()
        }
    }
}

/// Size is checked before type so an oversized file is always reported as oversized.
pub fn validate_candidate(candidate: &AttachmentCandidate) -> Result<(), AttachmentError> {
    if candidate.size > MAX_ATTACHMENT_BYTES {
        return Err(AttachmentError::TooLarge {
            size: candidate.size,
        });
    }
    if !is_allowed_type(candidate.declared_mime.as_deref(), &candidate.name) {
        return Err(AttachmentError::TypeNotAllowed {
            name: candidate.name.clone(),
        });
    }
    Ok(())
}

pub fn is_allowed_type(declared_mime: Option<&str>, name: &str) -> bool {
    let mime_allowed = declared_mime
        .map(|mime| ALLOWED_MIME_TYPES.contains(&mime.trim()))
        .unwrap_or(false);
    let lower = name.to_ascii_lowercase();
    mime_allowed || ALLOWED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

pub fn read_attachment(candidate: &AttachmentCandidate) -> Result<AttachedFile, AttachmentError> {
    let bytes = fs::read(&candidate.path).map_err(|source| AttachmentError::Read {
        name: candidate.name.clone(),
        source,
    })?;
    // The file may have grown between selection and read.
    let size = bytes.len() as u64;
    if size > MAX_ATTACHMENT_BYTES {
        return Err(AttachmentError::TooLarge { size });
    }
    Ok(AttachedFile {
        name: candidate.name.clone(),
        content: String::from_utf8_lossy(&bytes).into_owned(),
        size,
    })
}

pub fn load_attachment(path: impl AsRef<Path>) -> Result<AttachedFile, AttachmentError> {
    let candidate = AttachmentCandidate::from_path(path)?;
    validate_candidate(&candidate)?;
    read_attachment(&candidate)
}

#[derive(Debug)]
pub enum AttachmentRead {
    Loaded(AttachedFile),
    Failed(AttachmentError),
}

/// Reads validated attachments off the UI thread.
pub struct AttachmentReader {
    tx: Sender<AttachmentRead>,
    rx: Receiver<AttachmentRead>,
}

impl Default for AttachmentReader {
    fn default() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }
}

impl AttachmentReader {
    pub fn request(&self, candidate: AttachmentCandidate) {
        let tx = self.tx.clone();
        debug!(name = %candidate.name, size = candidate.size, "reading attachment");
        thread::spawn(move || {
            let outcome = match read_attachment(&candidate) {
                Ok(file) => {
                    info!(name = %file.name, size = file.size, "attachment loaded");
                    AttachmentRead::Loaded(file)
                }
                Err(error) => {
                    warn!(name = %candidate.name, error = %error, "attachment read failed");
                    AttachmentRead::Failed(error)
                }
            };
            let _ = tx.send(outcome);
        });
    }

    pub fn drain(&self) -> Vec<AttachmentRead> {
        self.rx.try_iter().collect()
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
#[path = "../tests/unit/attachment_tests.rs"]
mod tests;
