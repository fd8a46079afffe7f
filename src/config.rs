//! Configuration management for the document converter

use crate::error::{ConvertError, Result};
use crate::processing::chapter_splitter::SplitOptions;
use crate::processing::metadata::{MetadataInput, PublicationType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cleaning: CleaningConfig,
    pub splitting: SplittingConfig,
    pub metadata: MetadataConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    pub enabled: bool,
    pub max_blank_lines: usize,
    pub normalize_characters: bool,
    pub fix_ocr_errors: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplittingConfig {
    pub enabled: bool,
    /// Custom heading regex; the built-in heading pattern is used when unset or blank.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    pub case_insensitive: bool,
    pub keep_heading_as_title: bool,
    pub keep_preamble: bool,
    pub fallback_to_single: bool,
    pub drop_page_furniture: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub publication_type: PublicationType,
    pub infer_from_filename: bool,
    /// Read `<stem>.meta.toml` next to each input file.
    pub sidecar_files: bool,
    pub common: MetadataInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub formats: Vec<ExportFormat>,
    pub output_dir: PathBuf,
    pub pretty_json: bool,
    pub text_separator: String,
    pub color_output: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Markdown,
    Text,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Json, ExportFormat::Markdown, ExportFormat::Text];

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Markdown => "md",
            ExportFormat::Text => "txt",
        }
    }

    /// Folder name used inside batch archives.
    pub fn folder(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Markdown => "markdown",
            ExportFormat::Text => "text",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Markdown => "text/markdown",
            ExportFormat::Text => "text/plain",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.folder())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "text" | "txt" | "plain" => Ok(ExportFormat::Text),
            _ => Err(format!(
                "Invalid output format: {}. Supported: json, markdown, text",
                s
            )),
        }
    }
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_blank_lines: 1,
            normalize_characters: true,
            fix_ocr_errors: true,
        }
    }
}

impl Default for SplittingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pattern: None,
            case_insensitive: true,
            keep_heading_as_title: true,
            keep_preamble: true,
            fallback_to_single: true,
            drop_page_furniture: false,
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            publication_type: PublicationType::Book,
            infer_from_filename: true,
            sidecar_files: true,
            common: MetadataInput::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            formats: vec![ExportFormat::Json],
            output_dir: PathBuf::from("converted"),
            pretty_json: true,
            text_separator: "\n\n".to_string(),
            color_output: true,
        }
    }
}

impl Config {
    /// Load from an explicit path, or from the default location when it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let default_path = Self::config_path();
                if default_path.exists() {
                    Self::load_from(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConvertError::Configuration(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ConvertError::Configuration(format!("Failed to parse config: {}", e)))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ConvertError::Configuration(format!("Failed to serialize config: {}", e)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
            .join("doc2json")
            .join("config.toml")
    }
}

/// Options handed to the exporters for one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    pub formats: Vec<ExportFormat>,
    pub pretty_json: bool,
    pub text_separator: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        let output = OutputConfig::default();
        Self {
            formats: output.formats,
            pretty_json: output.pretty_json,
            text_separator: output.text_separator,
        }
    }
}

/// Request-scoped settings for one conversion batch, validated before any file is read.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub cleaning: CleaningConfig,
    /// `None` disables chapter splitting; the whole text becomes one chapter.
    pub split: Option<SplitOptions>,
    pub publication_type: PublicationType,
    pub infer_from_filename: bool,
    pub common_metadata: MetadataInput,
    pub export: ExportOptions,
}

impl BatchConfig {
    pub fn from_config(config: &Config) -> Result<Self> {
        let split = if config.splitting.enabled {
            Some(SplitOptions::from_config(&config.splitting)?)
        } else {
            None
        };

        let mut formats = config.output.formats.clone();
        formats.sort();
        formats.dedup();
        if formats.is_empty() {
            return Err(ConvertError::Configuration(
                "At least one output format is required".to_string(),
            ));
        }

        Ok(Self {
            cleaning: config.cleaning.clone(),
            split,
            publication_type: config.metadata.publication_type,
            infer_from_filename: config.metadata.infer_from_filename,
            common_metadata: config.metadata.common.clone(),
            export: ExportOptions {
                formats,
                pretty_json: config.output.pretty_json,
                text_separator: config.output.text_separator.clone(),
            },
        })
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            cleaning: CleaningConfig::default(),
            split: Some(SplitOptions::default()),
            publication_type: PublicationType::default(),
            infer_from_filename: true,
            common_metadata: MetadataInput::default(),
            export: ExportOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let config = Config::default();
        let text = config.to_toml().unwrap();
        let parsed = Config::from_toml(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [splitting]
            pattern = '^Part \d+$'

            [metadata]
            publication_type = "article"

            [metadata.common]
            publisher = "Acme Press"
            "#,
        )
        .unwrap();

        assert_eq!(config.splitting.pattern.as_deref(), Some(r"^Part \d+$"));
        assert!(config.splitting.keep_heading_as_title);
        assert_eq!(config.metadata.publication_type, PublicationType::Article);
        assert_eq!(config.metadata.common.publisher.as_deref(), Some("Acme Press"));
        assert_eq!(config.cleaning, CleaningConfig::default());
    }

    #[test]
    fn test_invalid_pattern_is_rejected_up_front() {
        let mut config = Config::default();
        config.splitting.pattern = Some("(unclosed".to_string());
        assert!(matches!(
            BatchConfig::from_config(&config),
            Err(ConvertError::Configuration(_))
        ));
    }

    #[test]
    fn test_disabled_splitting_skips_pattern_validation() {
        let mut config = Config::default();
        config.splitting.enabled = false;
        config.splitting.pattern = Some("(unclosed".to_string());
        let batch = BatchConfig::from_config(&config).unwrap();
        assert!(batch.split.is_none());
    }

    #[test]
    fn test_export_formats_are_deduplicated() {
        let mut config = Config::default();
        config.output.formats = vec![ExportFormat::Text, ExportFormat::Json, ExportFormat::Text];
        let batch = BatchConfig::from_config(&config).unwrap();
        assert_eq!(batch.export.formats, vec![ExportFormat::Json, ExportFormat::Text]);

        config.output.formats.clear();
        assert!(BatchConfig::from_config(&config).is_err());
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("MD".parse::<ExportFormat>().unwrap(), ExportFormat::Markdown);
        assert_eq!("txt".parse::<ExportFormat>().unwrap(), ExportFormat::Text);
        assert!("html".parse::<ExportFormat>().is_err());
    }
}
