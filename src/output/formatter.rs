//! Export formatters: structured JSON, Markdown with front matter, plain text

use crate::config::{ExportFormat, ExportOptions};
use crate::error::{ConversionWarning, ConvertError, Result};
use crate::processing::document::{Chapter, ConversionResult, SourceInfo, TextStats};
use crate::processing::metadata::{Metadata, Year};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Front matter keys that `extra` entries may not shadow.
const RESERVED_KEYS: &[&str] = &[
    "title",
    "subtitle",
    "type",
    "language",
    "year",
    "publication_date",
    "publisher",
    "edition",
    "series",
    "journal",
    "volume",
    "issue",
    "isbn",
    "doi",
    "url",
    "license",
    "description",
    "authors",
    "editors",
    "subjects",
    "keywords",
    "local_id",
];

/// Trait for rendering one converted document
pub trait OutputFormatter {
    fn format_document(&self, result: &ConversionResult) -> Result<String>;
    fn supports_format(&self) -> ExportFormat;
}

/// Entry of the JSON table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub level: u8,
    pub title: String,
    pub section_id: String,
}

/// Shape of the JSON export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredDocument {
    pub source: SourceInfo,
    pub metadata: Metadata,
    pub stats: TextStats,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ConversionWarning>,
    pub table_of_contents: Vec<TocEntry>,
    pub chapters: Vec<Chapter>,
}

impl StructuredDocument {
    pub fn from_result(result: &ConversionResult) -> Self {
        let table_of_contents = result
            .chapters
            .iter()
            .map(|chapter| TocEntry {
                level: 1,
                title: chapter.display_title(),
                section_id: chapter.section_id(),
            })
            .collect();

        Self {
            source: result.source.clone(),
            metadata: result.metadata.clone(),
            stats: result.stats,
            warnings: result.warnings.clone(),
            table_of_contents,
            chapters: result.chapters.clone(),
        }
    }
}

pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_document(&self, result: &ConversionResult) -> Result<String> {
        let document = StructuredDocument::from_result(result);
        let json = if self.pretty {
            serde_json::to_string_pretty(&document)?
        } else {
            serde_json::to_string(&document)?
        };
        Ok(json)
    }

    fn supports_format(&self) -> ExportFormat {
        ExportFormat::Json
    }
}

/// Markdown with a YAML front matter block followed by one section per chapter.
pub struct MarkdownFormatter;

enum FrontValue {
    Text(String),
    Plain(String),
    List(Vec<String>),
}

impl MarkdownFormatter {
    pub fn new() -> Self {
        Self
    }

    fn front_matter_fields(result: &ConversionResult) -> Result<Vec<(String, FrontValue)>> {
        let meta = &result.metadata;
        let mut fields: Vec<(String, FrontValue)> = Vec::new();

        let mut text = |key: &str, value: &Option<String>| {
            if let Some(value) = value {
                fields.push((key.to_string(), FrontValue::Text(value.clone())));
            }
        };

        text("title", &meta.title);
        text("subtitle", &meta.subtitle);
        text("type", &Some(meta.publication_type.as_str().to_string()));
        text("language", &meta.language);

        match &meta.year {
            Some(Year::Numeric(year)) => fields.push(("year".to_string(), FrontValue::Plain(year.to_string()))),
            Some(Year::Raw(raw)) => fields.push(("year".to_string(), FrontValue::Text(raw.clone()))),
            None => {}
        }

        let mut optional = vec![
            ("publication_date", &meta.publication_date),
            ("publisher", &meta.publisher),
            ("edition", &meta.edition),
            ("series", &meta.series),
        ];
        if meta.publication_type.is_periodical() {
            optional.push(("journal", &meta.journal));
            optional.push(("volume", &meta.volume));
            optional.push(("issue", &meta.issue));
        }
        if meta.publication_type.is_book() {
            optional.push(("isbn", &meta.isbn));
        }
        optional.push(("doi", &meta.doi));
        optional.push(("url", &meta.url));
        optional.push(("license", &meta.license));
        optional.push(("description", &meta.description));

        for (key, value) in optional {
            if let Some(value) = value {
                fields.push((key.to_string(), FrontValue::Text(value.clone())));
            }
        }

        for (key, values) in [
            ("authors", &meta.authors),
            ("editors", &meta.editors),
            ("subjects", &meta.subjects),
            ("keywords", &meta.keywords),
        ] {
            if !values.is_empty() {
                fields.push((key.to_string(), FrontValue::List(values.clone())));
            }
        }

        for (key, value) in &meta.extra {
            validate_extra_key(key)?;
            fields.push((key.clone(), FrontValue::Text(value.clone())));
        }

        fields.push((
            "local_id".to_string(),
            FrontValue::Text(result.source.local_id.clone()),
        ));

        Ok(fields)
    }
}

impl Default for MarkdownFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFormatter for MarkdownFormatter {
    fn format_document(&self, result: &ConversionResult) -> Result<String> {
        let mut output = String::from("---\n");

        for (key, value) in Self::front_matter_fields(result)? {
            match value {
                FrontValue::Text(text) => output.push_str(&format!("{}: {}\n", key, yaml_scalar(&text))),
                FrontValue::Plain(raw) => output.push_str(&format!("{}: {}\n", key, raw)),
                FrontValue::List(items) => {
                    output.push_str(&format!("{}:\n", key));
                    for item in items {
                        output.push_str(&format!("  - {}\n", yaml_scalar(&item)));
                    }
                }
            }
        }
        output.push_str("---\n");

        let lone_untitled = result.chapters.len() == 1 && result.chapters[0].title.is_none();
        for chapter in &result.chapters {
            output.push('\n');
            if !lone_untitled {
                output.push_str(&format!("## {}\n\n", chapter.display_title()));
            }
            if !chapter.body.is_empty() {
                output.push_str(&chapter.body);
                output.push('\n');
            }
        }

        Ok(output)
    }

    fn supports_format(&self) -> ExportFormat {
        ExportFormat::Markdown
    }
}

/// Chapter bodies only, without metadata.
pub struct PlainTextFormatter {
    separator: String,
}

impl PlainTextFormatter {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }
}

impl OutputFormatter for PlainTextFormatter {
    fn format_document(&self, result: &ConversionResult) -> Result<String> {
        let bodies: Vec<&str> = result.chapters.iter().map(|c| c.body.as_str()).collect();
        if bodies.is_empty() {
            return Ok(String::new());
        }
        Ok(format!("{}\n", bodies.join(&self.separator)))
    }

    fn supports_format(&self) -> ExportFormat {
        ExportFormat::Text
    }
}

/// Quote a string as a YAML scalar: single-quoted, or double-quoted when it holds control characters.
pub fn yaml_scalar(value: &str) -> String {
    if !value.chars().any(char::is_control) {
        return format!("'{}'", value.replace('\'', "''"));
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c if c.is_control() => quoted.push_str(&format!("\\u{:04X}", c as u32)),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

fn validate_extra_key(key: &str) -> Result<()> {
    let plain = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !plain {
        return Err(ConvertError::Export(format!(
            "Metadata key '{}' is not a plain front matter key",
            key
        )));
    }
    if RESERVED_KEYS.contains(&key) {
        return Err(ConvertError::Export(format!(
            "Metadata key '{}' conflicts with a built-in field",
            key
        )));
    }
    Ok(())
}

/// One rendered export, ready to be written or archived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPayload {
    pub format: ExportFormat,
    pub filename: String,
    pub content: String,
}

#[derive(Debug)]
pub struct ExportFailure {
    pub source: String,
    pub format: ExportFormat,
    pub error: ConvertError,
}

/// Coordinates the formatters for one batch
pub struct ExportGenerator {
    formats: Vec<ExportFormat>,
    json_formatter: JsonFormatter,
    markdown_formatter: MarkdownFormatter,
    text_formatter: PlainTextFormatter,
}

impl ExportGenerator {
    pub fn new(options: &ExportOptions) -> Self {
        Self {
            formats: options.formats.clone(),
            json_formatter: JsonFormatter::new(options.pretty_json),
            markdown_formatter: MarkdownFormatter::new(),
            text_formatter: PlainTextFormatter::new(options.text_separator.clone()),
        }
    }

    pub fn formats(&self) -> &[ExportFormat] {
        &self.formats
    }

    pub fn generate(&self, result: &ConversionResult, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Json => self.json_formatter.format_document(result),
            ExportFormat::Markdown => self.markdown_formatter.format_document(result),
            ExportFormat::Text => self.text_formatter.format_document(result),
        }
    }

    /// Render every configured format for every result. Failures are collected per document and format.
    pub fn export_batch<'a, I>(&self, results: I) -> (Vec<ExportPayload>, Vec<ExportFailure>)
    where
        I: IntoIterator<Item = &'a ConversionResult>,
    {
        let mut stems = StemAllocator::default();
        let mut payloads = Vec::new();
        let mut failures = Vec::new();

        for result in results {
            let stem = stems.allocate(&result.source.local_id);
            for &format in &self.formats {
                match self.generate(result, format) {
                    Ok(content) => payloads.push(ExportPayload {
                        format,
                        filename: suggest_filename(format, &stem),
                        content,
                    }),
                    Err(error) => {
                        warn!("Export of {} as {} failed: {}", result.source.filename, format, error);
                        failures.push(ExportFailure {
                            source: result.source.filename.clone(),
                            format,
                            error,
                        });
                    }
                }
            }
        }

        debug!("Rendered {} payload(s), {} failure(s)", payloads.len(), failures.len());
        (payloads, failures)
    }
}

impl Default for ExportGenerator {
    fn default() -> Self {
        Self::new(&ExportOptions::default())
    }
}

/// Hands out unique output stems within a batch: `name`, `name-2`, `name-3`.
#[derive(Debug, Default)]
pub struct StemAllocator {
    used: HashSet<String>,
}

impl StemAllocator {
    pub fn allocate(&mut self, stem: &str) -> String {
        let base = if stem.trim().is_empty() { "document" } else { stem.trim() };
        if self.used.insert(base.to_string()) {
            return base.to_string();
        }

        let mut n = 2;
        loop {
            let candidate = format!("{}-{}", base, n);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

pub fn suggest_filename(format: ExportFormat, stem: &str) -> String {
    format!("{}.{}", stem, format.extension())
}

pub fn save_export_to_file(content: &str, file_path: &Path) -> Result<()> {
    use std::fs;
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(file_path, content)?;
    Ok(())
}

/// Write payloads as plain files into `dir`, returning the written paths.
pub fn save_payloads(dir: &Path, payloads: &[ExportPayload]) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(payloads.len());
    for payload in payloads {
        let path = dir.join(&payload.filename);
        save_export_to_file(&payload.content, &path)?;
        written.push(path);
    }
    Ok(written)
}
