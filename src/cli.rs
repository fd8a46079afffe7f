//! CLI interface for the document converter

use crate::config::{Config, ExportFormat};
use crate::error::{ConvertError, Result};
use crate::processing::metadata::{is_type_key, PublicationType};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "doc2json")]
#[command(about = "Convert TXT and PDF documents into chaptered JSON, Markdown or plain text")]
#[command(long_about = "Extract text from TXT/PDF files, clean OCR artifacts, split into chapters, attach bibliographic metadata and export as JSON, Markdown with YAML front matter, or plain text")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert one or more TXT/PDF files
    Convert(ConvertArgs),

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Args, Debug, Default)]
pub struct ConvertArgs {
    /// Input files (.txt or .pdf)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Chapter heading regex (multi-line mode)
    #[arg(short, long)]
    pub pattern: Option<String>,

    /// Keep the whole text as a single chapter
    #[arg(long)]
    pub no_split: bool,

    /// Skip text cleaning (line endings are still normalized)
    #[arg(long)]
    pub no_clean: bool,

    /// Do not use heading lines as chapter titles
    #[arg(long)]
    pub no_title_from_heading: bool,

    /// Discard text before the first heading
    #[arg(long)]
    pub drop_preamble: bool,

    /// Produce no chapters when no heading matches
    #[arg(long)]
    pub no_fallback: bool,

    /// Publication type (book, article, thesis, ...)
    #[arg(short = 't', long = "type")]
    pub publication_type: Option<String>,

    /// Common metadata applied to every file, as key=value
    #[arg(short, long = "meta", value_name = "KEY=VALUE")]
    pub meta: Vec<String>,

    /// Output format: json, markdown, text (repeatable)
    #[arg(short, long = "format")]
    pub formats: Vec<String>,

    /// Directory for exported files
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Bundle all exports into this ZIP file instead of a directory
    #[arg(short, long)]
    pub archive: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Print the configuration file location
    Path,

    /// Write a default configuration file if none exists
    Init,

    /// Reset configuration to defaults
    Reset,
}

impl ConvertArgs {
    /// Apply command line overrides to a loaded configuration.
    pub fn apply_to(&self, config: &mut Config) -> Result<()> {
        if let Some(pattern) = &self.pattern {
            config.splitting.pattern = Some(pattern.clone());
        }
        if self.no_split {
            config.splitting.enabled = false;
        }
        if self.no_clean {
            config.cleaning.enabled = false;
        }
        if self.no_title_from_heading {
            config.splitting.keep_heading_as_title = false;
        }
        if self.drop_preamble {
            config.splitting.keep_preamble = false;
        }
        if self.no_fallback {
            config.splitting.fallback_to_single = false;
        }
        if let Some(kind) = &self.publication_type {
            config.metadata.publication_type = kind
                .parse::<PublicationType>()
                .map_err(ConvertError::Configuration)?;
        }
        for assignment in &self.meta {
            let (key, value) = parse_assignment(assignment).map_err(ConvertError::Configuration)?;
            if is_type_key(&key) {
                config.metadata.publication_type = value
                    .parse::<PublicationType>()
                    .map_err(ConvertError::Configuration)?;
            } else {
                config.metadata.common.set(&key, value);
            }
        }
        if !self.formats.is_empty() {
            config.output.formats = self
                .formats
                .iter()
                .map(|f| f.parse::<ExportFormat>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(ConvertError::Configuration)?;
        }
        if let Some(output) = &self.output {
            config.output.output_dir = output.clone();
        }
        Ok(())
    }
}

/// Parse a `key=value` metadata assignment
pub fn parse_assignment(assignment: &str) -> std::result::Result<(String, String), String> {
    match assignment.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!(
            "Invalid metadata assignment '{}'. Expected KEY=VALUE",
            assignment
        )),
    }
}

/// Validate file extension
pub fn validate_file_extension(path: &Path, allowed_extensions: &[&str]) -> std::result::Result<(), String> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => {
            if allowed_extensions.contains(&ext.to_lowercase().as_str()) {
                Ok(())
            } else {
                Err(format!(
                    "Unsupported file extension: .{}. Allowed: {}",
                    ext,
                    allowed_extensions.join(", ")
                ))
            }
        }
        None => Err("File has no extension".to_string()),
    }
}
