//! Text cleaning and normalization

use crate::config::CleaningConfig;
use aho_corasick::AhoCorasick;
use log::debug;
use regex::{Captures, Regex};

/// Upper bound on repeated passes while waiting for the text to settle.
const MAX_PASSES: usize = 16;

struct Rule {
    label: &'static str,
    pattern: Regex,
    replacement: &'static str,
}

impl Rule {
    fn new(label: &'static str, pattern: &str, replacement: &'static str) -> Self {
        let pattern = Regex::new(pattern).unwrap_or_else(|e| panic!("Invalid {} regex: {}", label, e));
        Self {
            label,
            pattern,
            replacement,
        }
    }

    fn apply(&self, text: &str) -> String {
        self.pattern.replace_all(text, self.replacement).into_owned()
    }

    /// Like `apply`, but leaves matches alone when they start on a line `keep` accepts.
    fn apply_unless_line(&self, text: &str, keep: &Regex) -> String {
        self.pattern
            .replace_all(text, |caps: &Captures| {
                let start = caps.get(0).map_or(0, |m| m.start());
                let line_start = text[..start].rfind('\n').map_or(0, |i| i + 1);
                let line_end = text[start..].find('\n').map_or(text.len(), |i| start + i);

                if keep.is_match(&text[line_start..line_end]) {
                    caps[0].to_string()
                } else {
                    let mut replaced = String::new();
                    caps.expand(self.replacement, &mut replaced);
                    replaced
                }
            })
            .into_owned()
    }
}

fn apply_rules(text: String, rules: &[Rule]) -> String {
    rules.iter().fold(text, |acc, rule| {
        let next = rule.apply(&acc);
        if next != acc {
            debug!("cleaning rule '{}' applied", rule.label);
        }
        next
    })
}

/// Typographic literals replaced verbatim.
const CHARACTER_MAP: &[(&str, &str)] = &[
    ("\u{2018}", "'"),
    ("\u{2019}", "'"),
    ("\u{201A}", "'"),
    ("\u{201B}", "'"),
    ("\u{2039}", "'"),
    ("\u{203A}", "'"),
    ("\u{201C}", "\""),
    ("\u{201D}", "\""),
    ("\u{201E}", "\""),
    ("\u{201F}", "\""),
    ("\u{00AB}", "\""),
    ("\u{00BB}", "\""),
    ("\u{00A0}", " "),
    ("\u{1680}", " "),
    ("\u{2000}", " "),
    ("\u{2001}", " "),
    ("\u{2002}", " "),
    ("\u{2003}", " "),
    ("\u{2004}", " "),
    ("\u{2005}", " "),
    ("\u{2006}", " "),
    ("\u{2007}", " "),
    ("\u{2008}", " "),
    ("\u{2009}", " "),
    ("\u{200A}", " "),
    ("\u{200B}", " "),
    ("\u{202F}", " "),
    ("\u{205F}", " "),
    ("\u{3000}", " "),
    ("\u{2026}", "..."),
    ("\u{00BC}", "1/4"),
    ("\u{00BD}", "1/2"),
    ("\u{00BE}", "3/4"),
];

pub struct TextCleaner {
    config: CleaningConfig,
    line_endings: Regex,
    characters: AhoCorasick,
    character_replacements: Vec<&'static str>,
    primes: Rule,
    ocr_rules: Vec<Rule>,
    wrap_rules: Vec<Rule>,
    heading_line: Regex,
    spacing_rules: Vec<Rule>,
    blank_lines: Regex,
    blank_lines_replacement: String,
}

impl Default for TextCleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl TextCleaner {
    pub fn new() -> Self {
        Self::with_config(CleaningConfig::default())
    }

    pub fn with_config(config: CleaningConfig) -> Self {
        let line_endings = Regex::new(r"\r\n?").expect("Invalid line ending regex");

        let characters = AhoCorasick::new(CHARACTER_MAP.iter().map(|(from, _)| *from))
            .expect("Invalid character normalization table");
        let character_replacements = CHARACTER_MAP.iter().map(|(_, to)| *to).collect();

        let primes = Rule::new("primes as apostrophes", r"([A-Za-z])[`´′]([A-Za-z])", "${1}'${2}");

        let ocr_rules = vec![
            // Misread letter pairs
            Rule::new("tbe", r"(?i)\btbe\b", "the"),
            Rule::new("tbis", r"(?i)\btbis\b", "this"),
            Rule::new("tbat", r"(?i)\btbat\b", "that"),
            Rule::new("wbat", r"(?i)\bwbat\b", "what"),
            Rule::new("wbich", r"(?i)\bwbich\b", "which"),
            Rule::new("wbo", r"(?i)\bwbo\b", "who"),
            // Contractions that lost their apostrophe
            Rule::new("cant", r"(?i)\bcant\b", "can't"),
            Rule::new("wont", r"(?i)\bwont\b", "won't"),
            Rule::new("dont", r"(?i)\bdont\b", "don't"),
            Rule::new("Ill", r"\bIll\b", "I'll"),
            Rule::new("I m", r"\bI m\b", "I'm"),
            Rule::new("Ive", r"\bIve\b", "I've"),
            Rule::new("youre", r"(?i)\byoure\b", "you're"),
            Rule::new("theyre", r"(?i)\btheyre\b", "they're"),
            // Glyph confusions
            Rule::new("rnake", r"(?i)\brnake\b", "make"),
            Rule::new("rnany", r"(?i)\brnany\b", "many"),
            Rule::new("0f", r"\b0f\b", "of"),
            Rule::new("t0", r"\bt0\b", "to"),
            Rule::new("0r", r"\b0r\b", "or"),
            // Words run together
            Rule::new("ofthe", r"(?i)\bofthe\b", "of the"),
            Rule::new("andthe", r"(?i)\bandthe\b", "and the"),
            Rule::new("inthe", r"(?i)\binthe\b", "in the"),
        ];

        let wrap_rules = vec![
            Rule::new("soft hyphen", "\u{00AD}", ""),
            Rule::new("dash normalize", "[\u{2014}\u{2013}]", " - "),
            Rule::new("EOL hyphen", r"([a-z])-[ \t]*\n[ \t]*([a-z])", "${1}${2}"),
            Rule::new("join simple wraps", r"([a-z,;])[ \t]*\n([a-z])", "${1} ${2}"),
            Rule::new("inword hyphen", r"\b([A-Za-z]+)-[ \t]+([A-Za-z]+)\b", "${1}${2}"),
        ];

        // Lines never joined onto: chapter headings must stay on their own line
        let heading_line = Regex::new(r"(?i)^[ \t]*(?:chapter|chap\.)")
            .expect("Invalid heading line regex");

        let spacing_rules = vec![
            Rule::new("collapse 3+ spaces", r"[ \t]{3,}", " "),
            Rule::new("no space before punct", r"[ \t]+([,.;:!?])", "${1}"),
            Rule::new("space after sentence", r"([.?!])([A-Z])", "${1} ${2}"),
            Rule::new("collapse 4+ periods", r"\.{4,}", "..."),
        ];

        let blank_lines = Regex::new(&format!(r"\n(?:[ \t]*\n){{{},}}", config.max_blank_lines + 1))
            .expect("Invalid blank line regex");
        let blank_lines_replacement = "\n".repeat(config.max_blank_lines + 1);

        Self {
            config,
            line_endings,
            characters,
            character_replacements,
            primes,
            ocr_rules,
            wrap_rules,
            heading_line,
            spacing_rules,
            blank_lines,
            blank_lines_replacement,
        }
    }

    pub fn config(&self) -> &CleaningConfig {
        &self.config
    }

    /// Clean text until it stops changing, so that cleaning is idempotent.
    pub fn clean(&self, text: &str) -> String {
        let mut current = self.pass(text);

        for _ in 1..MAX_PASSES {
            let next = self.pass(&current);
            if next == current {
                return current;
            }
            current = next;
        }

        debug!("Text cleaning did not settle after {} passes", MAX_PASSES);
        current
    }

    /// Convert `\r\n` and lone `\r` to `\n`.
    pub fn normalize_line_endings(&self, text: &str) -> String {
        self.line_endings.replace_all(text, "\n").into_owned()
    }

    fn pass(&self, text: &str) -> String {
        // (a) line endings
        let mut cleaned = self.normalize_line_endings(text);

        // (b) OCR and typography artifacts
        if self.config.normalize_characters {
            cleaned = self
                .characters
                .replace_all(&cleaned, self.character_replacements.as_slice());
            cleaned = self.primes.apply(&cleaned);
        }
        if self.config.fix_ocr_errors {
            cleaned = apply_rules(cleaned, &self.ocr_rules);
        }
        for rule in &self.wrap_rules {
            let next = rule.apply_unless_line(&cleaned, &self.heading_line);
            if next != cleaned {
                debug!("cleaning rule '{}' applied", rule.label);
            }
            cleaned = next;
        }
        cleaned = apply_rules(cleaned, &self.spacing_rules);

        // (c) blank line runs
        cleaned = self
            .blank_lines
            .replace_all(&cleaned, self.blank_lines_replacement.as_str())
            .into_owned();

        // (d) per-line trimming
        cleaned
            .lines()
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(text: &str) -> String {
        TextCleaner::new().clean(text)
    }

    #[test]
    fn test_line_endings() {
        let cleaner = TextCleaner::new();
        assert_eq!(cleaner.normalize_line_endings("a\r\nb\rc\n"), "a\nb\nc\n");
    }

    #[test]
    fn test_hyphenation_repair() {
        assert_eq!(clean("an extra-\nordinary day"), "an extraordinary day");
        assert_eq!(clean("the quick brown\nfox jumps"), "the quick brown fox jumps");
    }

    #[test]
    fn test_blank_line_collapse() {
        assert_eq!(clean("Para one.\n\n\n\n\nPara two."), "Para one.\n\nPara two.");

        let strict = TextCleaner::with_config(CleaningConfig {
            max_blank_lines: 0,
            ..CleaningConfig::default()
        });
        assert_eq!(strict.clean("Para one.\n\n \n\nPara two."), "Para one.\nPara two.");
    }

    #[test]
    fn test_line_trimming() {
        assert_eq!(
            clean("  Indented line.  \n\tTabbed line.\n\n"),
            "Indented line.\nTabbed line."
        );
    }

    #[test]
    fn test_ocr_corrections() {
        assert_eq!(clean("tbe cat and tbis dog"), "the cat and this dog");
        assert_eq!(clean("I dont know, I m sure"), "I don't know, I'm sure");
        assert_eq!(clean("0f t0 0r"), "of to or");
        assert_eq!(clean("most ofthe time"), "most of the time");
    }

    #[test]
    fn test_ocr_corrections_can_be_disabled() {
        let cleaner = TextCleaner::with_config(CleaningConfig {
            fix_ocr_errors: false,
            ..CleaningConfig::default()
        });
        assert_eq!(cleaner.clean("tbe cat"), "tbe cat");
    }

    #[test]
    fn test_character_normalization() {
        assert_eq!(clean("\u{201C}Hi,\u{201D} she said\u{2026}"), "\"Hi,\" she said...");
        assert_eq!(clean("\u{00BD} cup"), "1/2 cup");
        assert_eq!(clean("don\u{2032}t"), "don't");
        assert_eq!(clean("yes\u{2014}no"), "yes - no");
    }

    #[test]
    fn test_punctuation_spacing() {
        assert_eq!(clean("Wait , what ?Yes"), "Wait, what? Yes");
        assert_eq!(clean("Hmm......"), "Hmm...");
    }

    #[test]
    fn test_headings_survive_cleaning() {
        let text = "Chapter 1\nHello\nChapter 2\nWorld";
        assert_eq!(clean(text), text);
    }

    #[test]
    fn test_heading_lines_are_not_joined() {
        assert_eq!(clean("Chapter 1: The storm\nit was dark"), "Chapter 1: The storm\nit was dark");
        assert_eq!(clean("chap. 2 the sea-\nfaring\nlife"), "chap. 2 the sea-\nfaring life");
        assert_eq!(clean("the storm\nit was dark"), "the storm it was dark");
    }

    #[test]
    fn test_idempotence() {
        let samples = [
            "  The  tbe  cat\u{2019}s hat\u{2026}\r\n\r\n\r\n\r\nIt was a well-\nknown fact , that   I m  here.Then\u{2014}gone....\n\n\n",
            "a-\nb-\nc-\nd and e\nf\ng\nh",
            "CHAPTER IV\n\n\n  the end-\n  of it ;\n  all .\n\n\n\nFin",
            "\u{00AD}soft\u{00AD}hyphen  word- word   x.Y.Z",
            "",
            "\n\n   \n",
        ];

        for sample in samples {
            let once = clean(sample);
            let twice = clean(&once);
            assert_eq!(once, twice, "cleaning not idempotent for {:?}", sample);
        }
    }
}
