//! Document structures shared across the conversion pipeline

use crate::error::ConversionWarning;
use crate::input::file_detector::FileType;
use crate::processing::metadata::Metadata;
use serde::{Deserialize, Serialize};
use std::path::Path;
use unicode_segmentation::UnicodeSegmentation;

/// One input file, immutable once read.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub filename: String,
    pub file_type: FileType,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(filename: impl Into<String>, file_type: FileType, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            file_type,
            bytes,
        }
    }

    /// Build a document from in-memory content, detecting the type from the filename.
    pub fn from_bytes(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        let filename = filename.into();
        let file_type = FileType::from_path(Path::new(&filename));
        Self::new(filename, file_type, bytes)
    }

    pub fn file_size(&self) -> usize {
        self.bytes.len()
    }

    pub fn stem(&self) -> String {
        Path::new(&self.filename)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.filename.clone())
    }

    pub fn source_info(&self) -> SourceInfo {
        let file_format = Path::new(&self.filename)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        SourceInfo {
            filename: self.filename.clone(),
            file_format,
            file_size: self.file_size(),
            mime_type: self.file_type.mime_type().to_string(),
            local_id: self.stem(),
        }
    }
}

/// A titled, ordered segment of a document's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    /// 1-based position; 0 marks an unnumbered preamble.
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub body: String,
}

impl Chapter {
    pub fn new(index: usize, title: Option<String>, body: impl Into<String>) -> Self {
        Self {
            index,
            number: None,
            title,
            body: body.into(),
        }
    }

    pub fn with_number(mut self, number: Option<u32>) -> Self {
        self.number = number;
        self
    }

    pub fn is_preamble(&self) -> bool {
        self.index == 0
    }

    /// Title used by renderers: the heading text, or a default derived from the index.
    pub fn display_title(&self) -> String {
        match &self.title {
            Some(title) => title.clone(),
            None if self.is_preamble() => "Preamble".to_string(),
            None => format!("Chapter {}", self.index),
        }
    }

    pub fn section_id(&self) -> String {
        if self.is_preamble() {
            "preamble".to_string()
        } else {
            format!("ch-{}", self.index)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub filename: String,
    pub file_format: String,
    pub file_size: usize,
    pub mime_type: String,
    pub local_id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextStats {
    pub word_count: usize,
    pub character_count: usize,
}

impl TextStats {
    pub fn of(text: &str) -> Self {
        Self {
            word_count: text.unicode_words().count(),
            character_count: text.chars().count(),
        }
    }
}

/// Outcome of converting one document: metadata plus ordered chapters.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionResult {
    pub source: SourceInfo,
    pub metadata: Metadata,
    pub chapters: Vec<Chapter>,
    pub stats: TextStats,
    pub warnings: Vec<ConversionWarning>,
}

impl ConversionResult {
    pub fn numbered_chapters(&self) -> usize {
        self.chapters.iter().filter(|c| !c.is_preamble()).count()
    }

    pub fn full_text(&self) -> String {
        self.chapters
            .iter()
            .map(|c| c.body.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_creation() {
        let doc = Document::from_bytes("My_Book_1901.txt", b"Hello".to_vec());

        assert_eq!(doc.file_type, FileType::Text);
        assert_eq!(doc.file_size(), 5);
        assert_eq!(doc.stem(), "My_Book_1901");
    }

    #[test]
    fn test_source_info() {
        let doc = Document::from_bytes("Report.PDF", vec![0; 12]);
        let info = doc.source_info();

        assert_eq!(info.file_format, "pdf");
        assert_eq!(info.mime_type, "application/pdf");
        assert_eq!(info.file_size, 12);
        assert_eq!(info.local_id, "Report");
    }

    #[test]
    fn test_display_titles() {
        assert_eq!(Chapter::new(3, None, "x").display_title(), "Chapter 3");
        assert_eq!(Chapter::new(0, None, "x").display_title(), "Preamble");
        assert_eq!(
            Chapter::new(1, Some("Chapter I: Dawn".to_string()), "x").display_title(),
            "Chapter I: Dawn"
        );
        assert_eq!(Chapter::new(2, None, "x").section_id(), "ch-2");
    }

    #[test]
    fn test_text_stats() {
        let stats = TextStats::of("The quick brown fox, jumps.");
        assert_eq!(stats.word_count, 5);
        assert_eq!(stats.character_count, 27);
    }
}
