//! Chapter detection and splitting

use crate::config::SplittingConfig;
use crate::error::{ConversionWarning, ConvertError, Result};
use crate::processing::document::Chapter;
use log::debug;
use regex::{Regex, RegexBuilder};

/// Built-in heading pattern: a line such as `Chapter 12`, `CHAPTER IV: The Storm` or `Chap. 3 - Dawn`.
pub const DEFAULT_CHAPTER_PATTERN: &str =
    r"^[ \t]*(?:chapter|chap\.?)[ \t]+([ivxlcdm]+|\d+)\b(?:[ \t:.\-]+[^\n]*)?$";

/// Similarity above which a line is treated as a running header repeating the book title.
const RUNNING_HEADER_SIMILARITY: f64 = 0.85;

#[derive(Debug, Clone)]
pub struct SplitOptions {
    pub pattern: Regex,
    pub keep_heading_as_title: bool,
    pub keep_preamble: bool,
    pub fallback_to_single: bool,
    pub drop_page_furniture: bool,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self::from_config(&SplittingConfig::default()).expect("Invalid default chapter pattern")
    }
}

impl SplitOptions {
    pub fn from_config(config: &SplittingConfig) -> Result<Self> {
        Ok(Self {
            pattern: compile_pattern(config.pattern.as_deref(), config.case_insensitive)?,
            keep_heading_as_title: config.keep_heading_as_title,
            keep_preamble: config.keep_preamble,
            fallback_to_single: config.fallback_to_single,
            drop_page_furniture: config.drop_page_furniture,
        })
    }
}

/// Compile a heading pattern in multi-line mode, falling back to the built-in one when blank.
///
/// Patterns that can match the empty string are rejected: every position would start a chapter.
pub fn compile_pattern(pattern: Option<&str>, case_insensitive: bool) -> Result<Regex> {
    let source = pattern
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_CHAPTER_PATTERN);

    let regex = RegexBuilder::new(source)
        .multi_line(true)
        .case_insensitive(case_insensitive)
        .build()?;

    if regex.is_match("") {
        return Err(ConvertError::Configuration(format!(
            "Chapter pattern '{}' matches empty text",
            source
        )));
    }

    Ok(regex)
}

/// Parse an arabic or roman chapter number.
pub fn parse_chapter_number(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.chars().all(|c| c.is_ascii_digit()) {
        return raw.parse().ok();
    }
    roman_to_int(raw)
}

pub fn roman_to_int(raw: &str) -> Option<u32> {
    let mut total: u32 = 0;
    let mut prev = 0;

    for ch in raw.chars().rev() {
        let value = match ch.to_ascii_uppercase() {
            'I' => 1,
            'V' => 5,
            'X' => 10,
            'L' => 50,
            'C' => 100,
            'D' => 500,
            'M' => 1000,
            _ => return None,
        };
        if value < prev {
            total = total.saturating_sub(value);
        } else {
            total += value;
            prev = value;
        }
    }

    (total > 0).then_some(total)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitOutcome {
    pub chapters: Vec<Chapter>,
    pub warnings: Vec<ConversionWarning>,
}

struct Heading {
    start: usize,
    end: usize,
    title: String,
    number: Option<u32>,
}

pub struct ChapterSplitter {
    options: SplitOptions,
    page_number: Regex,
}

impl ChapterSplitter {
    pub fn new(options: SplitOptions) -> Self {
        let page_number = Regex::new(r"(?i)^(?:page[ \t]+)?[-–]?[ \t]*\d{1,4}[ \t]*[-–]?$")
            .expect("Invalid page number regex");
        Self {
            options,
            page_number,
        }
    }

    pub fn options(&self) -> &SplitOptions {
        &self.options
    }

    /// Partition cleaned text into chapters at each heading match.
    ///
    /// `book_title` is only consulted when page furniture removal is enabled.
    pub fn split(&self, text: &str, book_title: Option<&str>) -> SplitOutcome {
        if text.trim().is_empty() {
            return SplitOutcome {
                chapters: Vec::new(),
                warnings: vec![ConversionWarning::EmptyText],
            };
        }

        let headings = self.find_headings(text, book_title);
        debug!("Found {} chapter heading(s)", headings.len());

        if headings.is_empty() {
            if self.options.fallback_to_single {
                let body = self.body_text(text, book_title);
                return SplitOutcome {
                    chapters: vec![Chapter::new(1, None, body)],
                    warnings: Vec::new(),
                };
            }
            return SplitOutcome {
                chapters: Vec::new(),
                warnings: vec![ConversionWarning::NoChapterMatches],
            };
        }

        let mut chapters = Vec::with_capacity(headings.len() + 1);

        if self.options.keep_preamble {
            let preamble = self.body_text(&text[..headings[0].start], book_title);
            if !preamble.is_empty() {
                chapters.push(Chapter::new(0, None, preamble));
            }
        }

        for (i, heading) in headings.iter().enumerate() {
            let body_end = headings.get(i + 1).map(|next| next.start).unwrap_or(text.len());
            let body = self.body_text(&text[heading.end..body_end], book_title);
            let title = if self.options.keep_heading_as_title && !heading.title.is_empty() {
                Some(heading.title.clone())
            } else {
                None
            };

            chapters.push(Chapter::new(i + 1, title, body).with_number(heading.number));
        }

        SplitOutcome {
            chapters,
            warnings: Vec::new(),
        }
    }

    fn find_headings(&self, text: &str, book_title: Option<&str>) -> Vec<Heading> {
        let mut headings = Vec::new();

        for caps in self.options.pattern.captures_iter(text) {
            let Some(m) = caps.get(0) else { continue };
            if m.start() == m.end() {
                debug!("Skipping zero-length chapter match at byte {}", m.start());
                continue;
            }
            if self.options.drop_page_furniture && self.is_page_furniture(m.as_str(), book_title) {
                continue;
            }

            headings.push(Heading {
                start: m.start(),
                end: m.end(),
                // Patterns may span lines; titles stay on one
                title: m.as_str().split_whitespace().collect::<Vec<_>>().join(" "),
                number: caps.get(1).and_then(|g| parse_chapter_number(g.as_str())),
            });
        }

        headings
    }

    fn body_text(&self, slice: &str, book_title: Option<&str>) -> String {
        if !self.options.drop_page_furniture {
            return slice.trim().to_string();
        }

        slice
            .lines()
            .filter(|line| !self.is_page_furniture(line, book_title))
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }

    /// Page numbers and running headers repeating the book title.
    fn is_page_furniture(&self, line: &str, book_title: Option<&str>) -> bool {
        let line = line.trim();
        if line.is_empty() {
            return false;
        }
        if self.page_number.is_match(line) {
            return true;
        }

        match book_title.map(str::trim).filter(|t| !t.is_empty()) {
            Some(title) => {
                if line.eq_ignore_ascii_case(title) || line.to_uppercase() == title.to_uppercase() {
                    return true;
                }
                let is_caps = line.chars().any(|c| c.is_alphabetic())
                    && line.chars().all(|c| !c.is_lowercase());
                is_caps
                    && line.chars().count() > 5
                    && strsim::normalized_levenshtein(&line.to_lowercase(), &title.to_lowercase())
                        >= RUNNING_HEADER_SIMILARITY
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn splitter() -> ChapterSplitter {
        ChapterSplitter::new(SplitOptions::default())
    }

    fn splitter_with(config: SplittingConfig) -> ChapterSplitter {
        ChapterSplitter::new(SplitOptions::from_config(&config).unwrap())
    }

    fn normalize_ws(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_default_pattern_scenario() {
        let outcome = splitter().split("Chapter 1\nHello\nChapter 2\nWorld", None);

        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.chapters.len(), 2);
        assert_eq!(outcome.chapters[0].title.as_deref(), Some("Chapter 1"));
        assert_eq!(outcome.chapters[0].body, "Hello");
        assert_eq!(outcome.chapters[0].number, Some(1));
        assert_eq!(outcome.chapters[1].title.as_deref(), Some("Chapter 2"));
        assert_eq!(outcome.chapters[1].body, "World");
        assert_eq!(outcome.chapters[1].index, 2);
    }

    #[test]
    fn test_roman_numerals_and_subtitles() {
        let text = "CHAPTER IV: The Storm\nRain fell.\n\nChap. V\nSun.";
        let outcome = splitter().split(text, None);

        assert_eq!(outcome.chapters.len(), 2);
        assert_eq!(outcome.chapters[0].title.as_deref(), Some("CHAPTER IV: The Storm"));
        assert_eq!(outcome.chapters[0].number, Some(4));
        assert_eq!(outcome.chapters[0].body, "Rain fell.");
        assert_eq!(outcome.chapters[1].title.as_deref(), Some("Chap. V"));
        assert_eq!(outcome.chapters[1].number, Some(5));
    }

    #[test]
    fn test_inline_mentions_are_not_headings() {
        let outcome = splitter().split("We read chapter 5 yesterday.\nChapter 1\nBody", None);
        let titles: Vec<_> = outcome.chapters.iter().map(|c| c.display_title()).collect();
        assert_eq!(titles, vec!["Preamble", "Chapter 1"]);
    }

    #[test]
    fn test_preamble_kept_or_discarded() {
        let text = "Title page\nChapter 1\nA";

        let kept = splitter().split(text, None);
        assert_eq!(kept.chapters.len(), 2);
        assert!(kept.chapters[0].is_preamble());
        assert_eq!(kept.chapters[0].body, "Title page");

        let dropped = splitter_with(SplittingConfig {
            keep_preamble: false,
            ..SplittingConfig::default()
        })
        .split(text, None);
        assert_eq!(dropped.chapters.len(), 1);
        assert_eq!(dropped.chapters[0].index, 1);
    }

    #[test]
    fn test_fallback_single_chapter() {
        let text = "Just some text\nwith no headings";
        let outcome = splitter().split(text, None);

        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.chapters, vec![Chapter::new(1, None, text)]);
    }

    #[test]
    fn test_no_matches_without_fallback_warns() {
        let outcome = splitter_with(SplittingConfig {
            fallback_to_single: false,
            ..SplittingConfig::default()
        })
        .split("Nothing to see here", None);

        assert!(outcome.chapters.is_empty());
        assert_eq!(outcome.warnings, vec![ConversionWarning::NoChapterMatches]);
    }

    #[test]
    fn test_empty_text() {
        let outcome = splitter().split("  \n ", None);
        assert!(outcome.chapters.is_empty());
        assert_eq!(outcome.warnings, vec![ConversionWarning::EmptyText]);
    }

    #[test]
    fn test_custom_pattern() {
        let text = "Part 1\nx\nPart 2\ny";

        let plain = splitter_with(SplittingConfig {
            pattern: Some(r"^Part \d+$".to_string()),
            ..SplittingConfig::default()
        })
        .split(text, None);
        assert_eq!(plain.chapters.len(), 2);
        assert_eq!(plain.chapters[1].number, None);
        assert_eq!(plain.chapters[1].body, "y");

        let numbered = splitter_with(SplittingConfig {
            pattern: Some(r"^part (\d+)$".to_string()),
            ..SplittingConfig::default()
        })
        .split(text, None);
        assert_eq!(numbered.chapters[1].number, Some(2));
    }

    #[test]
    fn test_multi_line_heading_title_is_collapsed() {
        let outcome = splitter_with(SplittingConfig {
            pattern: Some(r"^Part \d+\n[^\n]+$".to_string()),
            ..SplittingConfig::default()
        })
        .split("Part 1\nThe Title\nBody text.", None);

        assert_eq!(outcome.chapters.len(), 1);
        assert_eq!(outcome.chapters[0].title.as_deref(), Some("Part 1 The Title"));
        assert_eq!(outcome.chapters[0].body, "Body text.");
    }

    #[test]
    fn test_pattern_validation() {
        assert!(matches!(compile_pattern(Some("^"), true), Err(ConvertError::Configuration(_))));
        assert!(matches!(compile_pattern(Some("a*"), true), Err(ConvertError::Configuration(_))));
        assert!(matches!(compile_pattern(Some("(unclosed"), true), Err(ConvertError::Configuration(_))));
        assert_eq!(compile_pattern(Some("   "), true).unwrap().as_str(), DEFAULT_CHAPTER_PATTERN);
    }

    #[test]
    fn test_zero_length_matches_are_skipped() {
        let options = SplitOptions {
            pattern: Regex::new(r"\b").unwrap(),
            ..SplitOptions::default()
        };
        let outcome = ChapterSplitter::new(options).split("abc def", None);

        assert_eq!(outcome.chapters, vec![Chapter::new(1, None, "abc def")]);
    }

    #[test]
    fn test_titles_can_be_dropped() {
        let outcome = splitter_with(SplittingConfig {
            keep_heading_as_title: false,
            ..SplittingConfig::default()
        })
        .split("Chapter 7\nBody", None);

        assert_eq!(outcome.chapters[0].title, None);
        assert_eq!(outcome.chapters[0].number, Some(7));
        assert_eq!(outcome.chapters[0].display_title(), "Chapter 1");
    }

    #[test]
    fn test_bodies_reconstruct_text_without_headings() {
        let text = "Opening words.\n\nChapter 1: Start\nFirst body\nmore first.\n\nChapter II\n\nSecond body.\nChapter 3\nThird.";
        let outcome = splitter().split(text, None);

        let joined = outcome
            .chapters
            .iter()
            .map(|c| c.body.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let without_headings = text
            .replace("Chapter 1: Start", "")
            .replace("Chapter II", "")
            .replace("Chapter 3", "");

        assert_eq!(outcome.chapters.len(), 4);
        assert_eq!(normalize_ws(&joined), normalize_ws(&without_headings));
    }

    #[test]
    fn test_page_furniture_removal() {
        let text = "Chapter 1\nLine one\n12\nTHE BOOK\nLine two\n- 13 -";
        let outcome = splitter_with(SplittingConfig {
            drop_page_furniture: true,
            ..SplittingConfig::default()
        })
        .split(text, Some("The Book"));

        assert_eq!(outcome.chapters.len(), 1);
        assert_eq!(outcome.chapters[0].body, "Line one\nLine two");
    }

    #[test]
    fn test_roman_parsing() {
        assert_eq!(parse_chapter_number("iv"), Some(4));
        assert_eq!(parse_chapter_number("XLII"), Some(42));
        assert_eq!(parse_chapter_number("12"), Some(12));
        assert_eq!(parse_chapter_number("12a"), None);
        assert_eq!(parse_chapter_number(""), None);
    }
}
