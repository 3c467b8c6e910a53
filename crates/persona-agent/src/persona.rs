use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ResumeError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to extract text from PDF {path}: {message}")]
    Pdf { path: PathBuf, message: String },

    #[error("unsupported background file type: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("no text found in {0}")]
    Empty(PathBuf),
}

/// The person the agent speaks as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    /// Resume or biography text the agent answers from
    pub background: String,
}

impl Persona {
    pub fn new(name: impl Into<String>, background: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            background: background.into(),
        }
    }

    /// Build a persona whose background comes from a resume file.
    pub fn from_file(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self, ResumeError> {
        Ok(Self::new(name, load_background(path)?))
    }
}

/// Read background text from a PDF, or from a plain text or markdown file.
pub fn load_background(path: impl AsRef<Path>) -> Result<String, ResumeError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let text = match extension.as_deref() {
        Some("pdf") => pdf_extract::extract_text(path).map_err(|e| ResumeError::Pdf {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?,
        Some("txt") | Some("md") | Some("markdown") | None => {
            std::fs::read_to_string(path).map_err(|source| ResumeError::Io {
                path: path.to_path_buf(),
                source,
            })?
        }
        Some(_) => return Err(ResumeError::UnsupportedFormat(path.to_path_buf())),
    };

    let text = text.trim();
    if text.is_empty() {
        return Err(ResumeError::Empty(path.to_path_buf()));
    }

    info!(path = %path.display(), chars = text.chars().count(), "Loaded persona background");
    Ok(text.to_string())
}
