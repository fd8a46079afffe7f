//! End-to-end conversion of documents: extract, clean, split, attach metadata

use crate::config::BatchConfig;
use crate::error::{ConversionWarning, ConvertError, Result};
use crate::input::InputManager;
use crate::processing::chapter_splitter::{ChapterSplitter, SplitOutcome};
use crate::processing::cleaner::TextCleaner;
use crate::processing::document::{Chapter, ConversionResult, Document, TextStats};
use crate::processing::metadata::{MetadataAssembler, MetadataInput};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// One file queued for conversion with its per-file metadata.
#[derive(Debug, Clone, Default)]
pub struct BatchItem {
    pub path: PathBuf,
    pub metadata: MetadataInput,
}

impl BatchItem {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            metadata: MetadataInput::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: MetadataInput) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug)]
pub enum FileStatus {
    Converted(ConversionResult),
    Failed(ConvertError),
}

#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub status: FileStatus,
}

impl FileOutcome {
    pub fn is_converted(&self) -> bool {
        matches!(self.status, FileStatus::Converted(_))
    }

    pub fn result(&self) -> Option<&ConversionResult> {
        match &self.status {
            FileStatus::Converted(result) => Some(result),
            FileStatus::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ConvertError> {
        match &self.status {
            FileStatus::Failed(err) => Some(err),
            FileStatus::Converted(_) => None,
        }
    }

    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

pub struct Pipeline {
    input: InputManager,
    cleaning_enabled: bool,
    cleaner: TextCleaner,
    /// `None` when splitting is disabled.
    splitter: Option<ChapterSplitter>,
    assembler: MetadataAssembler,
}

impl Pipeline {
    pub fn new(config: &BatchConfig) -> Self {
        Self {
            input: InputManager::new(),
            cleaning_enabled: config.cleaning.enabled,
            cleaner: TextCleaner::with_config(config.cleaning.clone()),
            splitter: config.split.clone().map(ChapterSplitter::new),
            assembler: MetadataAssembler::new(
                config.common_metadata.clone(),
                config.publication_type,
                config.infer_from_filename,
            ),
        }
    }

    /// Clean and split already extracted text, then attach metadata.
    pub fn process_text(&self, document: &Document, raw_text: &str, per_file: &MetadataInput) -> ConversionResult {
        let cleaned = if self.cleaning_enabled {
            self.cleaner.clean(raw_text)
        } else {
            self.cleaner.normalize_line_endings(raw_text)
        };
        debug!(
            "{}: {} chars extracted, {} after cleaning",
            document.filename,
            raw_text.len(),
            cleaned.len()
        );

        let (metadata, mut warnings) = self.assembler.assemble(per_file, &document.filename);

        let outcome = match &self.splitter {
            Some(splitter) => splitter.split(&cleaned, metadata.title.as_deref()),
            None => single_chapter(&cleaned),
        };
        warnings.extend(outcome.warnings);

        for warning in &warnings {
            warn!("{}: {}", document.filename, warning);
        }
        info!(
            "Converted {} into {} chapter(s)",
            document.filename,
            outcome.chapters.len()
        );

        ConversionResult {
            source: document.source_info(),
            metadata,
            chapters: outcome.chapters,
            stats: TextStats::of(&cleaned),
            warnings,
        }
    }

    pub fn process(&self, document: &Document, per_file: &MetadataInput) -> Result<ConversionResult> {
        let text = self.input.extract(document)?;
        Ok(self.process_text(document, &text, per_file))
    }

    pub async fn convert_file(&self, path: &Path, per_file: &MetadataInput) -> Result<ConversionResult> {
        let document = self.input.load(path).await?;
        self.process(&document, per_file)
    }

    /// Convert every item in order. A failing file is recorded and the batch continues.
    pub async fn convert_batch<F>(&self, items: &[BatchItem], mut on_file: F) -> Vec<FileOutcome>
    where
        F: FnMut(&FileOutcome),
    {
        let mut outcomes = Vec::with_capacity(items.len());

        for item in items {
            let status = match self.convert_file(&item.path, &item.metadata).await {
                Ok(result) => FileStatus::Converted(result),
                Err(e) => {
                    warn!("Failed to convert {}: {}", item.path.display(), e);
                    FileStatus::Failed(e)
                }
            };

            let outcome = FileOutcome {
                path: item.path.clone(),
                status,
            };
            on_file(&outcome);
            outcomes.push(outcome);
        }

        outcomes
    }
}

fn single_chapter(text: &str) -> SplitOutcome {
    if text.trim().is_empty() {
        return SplitOutcome {
            chapters: Vec::new(),
            warnings: vec![ConversionWarning::EmptyText],
        };
    }

    SplitOutcome {
        chapters: vec![Chapter::new(1, None, text.trim())],
        warnings: Vec::new(),
    }
}
