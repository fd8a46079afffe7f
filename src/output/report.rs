//! Batch summary shown after a conversion run

use crate::output::formatter::ExportFailure;
use crate::processing::pipeline::{FileOutcome, FileStatus};
use colored::{Color, Colorize};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileSummary {
    Converted {
        name: String,
        chapters: usize,
        words: usize,
        warnings: Vec<String>,
    },
    Failed {
        name: String,
        error: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub chapters_found: usize,
    pub warnings: usize,
    pub files: Vec<FileSummary>,
    /// `"<file> (<format>): <error>"` for every export that could not be rendered.
    pub export_failures: Vec<String>,
}

impl BatchReport {
    pub fn from_outcomes(outcomes: &[FileOutcome], export_failures: &[ExportFailure]) -> Self {
        let mut report = BatchReport {
            total_files: outcomes.len(),
            ..BatchReport::default()
        };

        for outcome in outcomes {
            let name = outcome.display_name();
            match &outcome.status {
                FileStatus::Converted(result) => {
                    report.successful += 1;
                    report.chapters_found += result.numbered_chapters();
                    report.warnings += result.warnings.len();
                    report.files.push(FileSummary::Converted {
                        name,
                        chapters: result.chapters.len(),
                        words: result.stats.word_count,
                        warnings: result.warnings.iter().map(|w| w.to_string()).collect(),
                    });
                }
                FileStatus::Failed(err) => {
                    report.failed += 1;
                    report.files.push(FileSummary::Failed {
                        name,
                        error: err.to_string(),
                    });
                }
            }
        }

        report.export_failures = export_failures
            .iter()
            .map(|f| format!("{} ({}): {}", f.source, f.format, f.error))
            .collect();

        report
    }

    /// True when files were given and none converted.
    pub fn all_failed(&self) -> bool {
        self.total_files > 0 && self.successful == 0
    }

    pub fn render(&self, use_colors: bool) -> String {
        let paint = |text: &str, color: Color| {
            if use_colors {
                text.color(color).bold().to_string()
            } else {
                text.to_string()
            }
        };

        let mut output = String::new();
        output.push_str(&paint("Conversion summary", Color::Blue));
        output.push('\n');

        for file in &self.files {
            match file {
                FileSummary::Converted {
                    name,
                    chapters,
                    words,
                    warnings,
                } => {
                    output.push_str(&format!(
                        "  {} {} ({} chapter(s), {} words)\n",
                        paint("OK  ", Color::Green),
                        name,
                        chapters,
                        words
                    ));
                    for warning in warnings {
                        output.push_str(&format!("       {} {}\n", paint("warning:", Color::Yellow), warning));
                    }
                }
                FileSummary::Failed { name, error } => {
                    output.push_str(&format!("  {} {}: {}\n", paint("FAIL", Color::Red), name, error));
                }
            }
        }

        for failure in &self.export_failures {
            output.push_str(&format!("  {} {}\n", paint("export failed:", Color::Red), failure));
        }

        output.push_str(&format!(
            "\nTotal: {} | Successful: {} | Failed: {} | Chapters: {} | Warnings: {}\n",
            self.total_files, self.successful, self.failed, self.chapters_found, self.warnings
        ));
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConversionWarning, ConvertError};
    use crate::processing::document::{Chapter, ConversionResult, Document, TextStats};
    use crate::processing::metadata::Metadata;
    use std::path::PathBuf;

    fn converted(name: &str) -> FileOutcome {
        let document = Document::from_bytes(name, Vec::new());
        FileOutcome {
            path: PathBuf::from("input").join(name),
            status: FileStatus::Converted(ConversionResult {
                source: document.source_info(),
                metadata: Metadata::default(),
                chapters: vec![
                    Chapter::new(0, None, "Intro"),
                    Chapter::new(1, Some("Chapter 1".to_string()), "Hello world"),
                ],
                stats: TextStats::of("Intro Chapter 1 Hello world"),
                warnings: vec![ConversionWarning::YearNotNumeric("c. 1900".to_string())],
            }),
        }
    }

    fn failed(name: &str) -> FileOutcome {
        FileOutcome {
            path: PathBuf::from(name),
            status: FileStatus::Failed(ConvertError::Extraction("bad xref table".to_string())),
        }
    }

    #[test]
    fn test_report_counts() {
        let report = BatchReport::from_outcomes(&[converted("a.txt"), failed("b.pdf")], &[]);

        assert_eq!(report.total_files, 2);
        assert_eq!(report.successful, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.chapters_found, 1);
        assert_eq!(report.warnings, 1);
        assert!(!report.all_failed());
    }

    #[test]
    fn test_all_failed() {
        assert!(BatchReport::from_outcomes(&[failed("b.pdf")], &[]).all_failed());
        assert!(!BatchReport::default().all_failed());
    }

    #[test]
    fn test_render_plain() {
        let report = BatchReport::from_outcomes(&[converted("a.txt"), failed("b.pdf")], &[]);
        let text = report.render(false);

        assert!(text.contains("OK   a.txt (2 chapter(s), 5 words)"));
        assert!(text.contains("warning: year 'c. 1900' is not numeric"));
        assert!(text.contains("FAIL b.pdf: Text extraction error: bad xref table"));
        assert!(text.contains("Total: 2 | Successful: 1 | Failed: 1"));
    }
}
