//! Input manager for reading files and routing them to extractors

use crate::error::{ConvertError, Result};
use crate::input::file_detector::FileType;
use crate::input::text_extractor::{PdfExtractor, PlainTextExtractor, TextExtractor};
use crate::processing::document::Document;
use crate::processing::metadata::MetadataInput;
use log::info;
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Default)]
pub struct InputManager;

impl InputManager {
    pub fn new() -> Self {
        Self
    }

    /// Read a file from disk into a `Document`.
    ///
    /// Unsupported extensions are rejected before any bytes are read.
    pub async fn load(&self, path: &Path) -> Result<Document> {
        let file_type = FileType::from_path(path);
        if !file_type.is_supported() {
            return Err(ConvertError::UnsupportedFormat(format!(
                "{} (only .txt and .pdf files are accepted)",
                path.display()
            )));
        }

        if !path.exists() {
            return Err(ConvertError::InvalidInput(format!(
                "File does not exist: {}",
                path.display()
            )));
        }

        let bytes = fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Document::new(filename, file_type, bytes))
    }

    /// Extract raw text from a loaded document.
    pub fn extract(&self, document: &Document) -> Result<String> {
        match document.file_type {
            FileType::Pdf => {
                info!("Extracting text from PDF: {}", document.filename);
                PdfExtractor.extract(&document.bytes)
            }
            FileType::Text => {
                info!("Reading plain text file: {}", document.filename);
                PlainTextExtractor.extract(&document.bytes)
            }
            FileType::Unknown => Err(ConvertError::UnsupportedFormat(format!(
                "Unsupported file type for: {}",
                document.filename
            ))),
        }
    }

    /// Per-file metadata from `<stem>.meta.toml` next to the input, if present.
    pub async fn load_sidecar(&self, path: &Path) -> Result<MetadataInput> {
        let sidecar = sidecar_path(path);
        if !sidecar.exists() {
            return Ok(MetadataInput::default());
        }

        let content = fs::read_to_string(&sidecar).await?;
        let metadata = MetadataInput::from_toml(&content).map_err(|e| {
            ConvertError::InvalidInput(format!("{}: {}", sidecar.display(), e))
        })?;
        info!("Loaded metadata for {} from {}", path.display(), sidecar.display());
        Ok(metadata)
    }
}

pub fn sidecar_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!("{}.meta.toml", stem))
}
