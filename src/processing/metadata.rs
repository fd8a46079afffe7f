//! Bibliographic metadata: raw user input, the merged record, and the assembler

use crate::error::{ConversionWarning, ConvertError, Result};
use chrono::{Datelike, NaiveDate};
use log::warn;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicationType {
    #[default]
    Book,
    Article,
    Serial,
    Magazine,
    Journal,
    Newspaper,
    Thesis,
    Report,
    ConferencePaper,
    Chapter,
    Preprint,
    Other,
}

impl PublicationType {
    pub const ALL: [PublicationType; 12] = [
        PublicationType::Book,
        PublicationType::Article,
        PublicationType::Serial,
        PublicationType::Magazine,
        PublicationType::Journal,
        PublicationType::Newspaper,
        PublicationType::Thesis,
        PublicationType::Report,
        PublicationType::ConferencePaper,
        PublicationType::Chapter,
        PublicationType::Preprint,
        PublicationType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationType::Book => "book",
            PublicationType::Article => "article",
            PublicationType::Serial => "serial",
            PublicationType::Magazine => "magazine",
            PublicationType::Journal => "journal",
            PublicationType::Newspaper => "newspaper",
            PublicationType::Thesis => "thesis",
            PublicationType::Report => "report",
            PublicationType::ConferencePaper => "conference_paper",
            PublicationType::Chapter => "chapter",
            PublicationType::Preprint => "preprint",
            PublicationType::Other => "other",
        }
    }

    /// Types that carry journal title, volume and issue.
    pub fn is_periodical(&self) -> bool {
        matches!(
            self,
            PublicationType::Article | PublicationType::Journal | PublicationType::Magazine
        )
    }

    pub fn is_book(&self) -> bool {
        matches!(self, PublicationType::Book)
    }
}

impl fmt::Display for PublicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PublicationType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|t| t.as_str()).collect();
                format!("Unknown publication type: {}. Supported: {}", s, known.join(", "))
            })
    }
}

/// Scalar or list value as written in a TOML metadata table.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    List(Vec<String>),
}

impl RawValue {
    fn into_string(self) -> String {
        match self {
            RawValue::Text(s) => s,
            RawValue::Integer(i) => i.to_string(),
            RawValue::Float(f) => f.to_string(),
            RawValue::Bool(b) => b.to_string(),
            RawValue::List(items) => items.join(", "),
        }
    }
}

fn lenient_option<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawValue>::deserialize(deserializer)?.map(RawValue::into_string))
}

fn lenient_map<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, RawValue>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|(k, v)| (k, v.into_string())).collect())
}

/// Metadata exactly as entered by the user, before merging and coercion.
///
/// List-valued fields (authors, editors, subjects, keywords) are comma separated.
/// Unrecognized keys are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataInput {
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_option")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_option")]
    pub subtitle: Option<String>,
    #[serde(alias = "author", skip_serializing_if = "Option::is_none", deserialize_with = "lenient_option")]
    pub authors: Option<String>,
    #[serde(alias = "editor", skip_serializing_if = "Option::is_none", deserialize_with = "lenient_option")]
    pub editors: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_option")]
    pub publisher: Option<String>,
    #[serde(alias = "date", skip_serializing_if = "Option::is_none", deserialize_with = "lenient_option")]
    pub publication_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_option")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_option")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_option")]
    pub edition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_option")]
    pub series: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_option")]
    pub journal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_option")]
    pub volume: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_option")]
    pub issue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_option")]
    pub isbn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_option")]
    pub doi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_option")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_option")]
    pub subjects: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_option")]
    pub keywords: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_option")]
    pub license: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_option")]
    pub description: Option<String>,
    #[serde(flatten, deserialize_with = "lenient_map")]
    pub extra: BTreeMap<String, String>,
}

/// Keep `value` unless it is missing or blank, in which case use `fallback`.
fn pick(value: &Option<String>, fallback: &Option<String>) -> Option<String> {
    non_blank(value).or_else(|| non_blank(fallback))
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase().replace('-', "_")
}

/// Whether `key` names the publication type, which is chosen per batch rather than per document.
pub fn is_type_key(key: &str) -> bool {
    matches!(normalize_key(key).as_str(), "type" | "publication_type")
}

impl MetadataInput {
    /// Read a metadata table from TOML (the `<stem>.meta.toml` sidecar format).
    pub fn from_toml(content: &str) -> Result<Self> {
        let input: MetadataInput = toml::from_str(content)
            .map_err(|e| ConvertError::InvalidInput(format!("Invalid metadata file: {}", e)))?;

        if let Some(key) = input.extra.keys().find(|key| is_type_key(key)) {
            return Err(ConvertError::InvalidInput(format!(
                "Invalid metadata file: '{}' cannot be set per document, use --type",
                key
            )));
        }
        Ok(input)
    }

    /// Set a field by key, routing unrecognized keys into `extra`. Blank values are ignored.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value: String = value.into();
        if value.trim().is_empty() {
            return;
        }
        let value = Some(value);
        match normalize_key(key).as_str() {
            "title" => self.title = value,
            "subtitle" => self.subtitle = value,
            "author" | "authors" => self.authors = value,
            "editor" | "editors" => self.editors = value,
            "publisher" => self.publisher = value,
            "date" | "publication_date" => self.publication_date = value,
            "year" => self.year = value,
            "language" | "lang" => self.language = value,
            "edition" => self.edition = value,
            "series" | "series_title" => self.series = value,
            "journal" | "journal_title" => self.journal = value,
            "volume" => self.volume = value,
            "issue" => self.issue = value,
            "isbn" => self.isbn = value,
            "doi" => self.doi = value,
            "url" => self.url = value,
            "subject" | "subjects" => self.subjects = value,
            "keywords" | "tags" => self.keywords = value,
            "license" => self.license = value,
            "description" | "abstract" => self.description = value,
            "type" | "publication_type" => {
                warn!("Ignoring metadata key '{}': the publication type is set per batch", key);
            }
            _ => {
                if let Some(v) = value {
                    self.extra.insert(key.trim().to_string(), v);
                }
            }
        }
    }

    /// Shallow override: fields set (non-blank) here win, everything else comes from `fallback`.
    pub fn merged_over(&self, fallback: &MetadataInput) -> MetadataInput {
        let mut extra = BTreeMap::new();
        for (key, value) in fallback.extra.iter().chain(&self.extra) {
            if !value.trim().is_empty() {
                extra.insert(key.clone(), value.clone());
            }
        }

        MetadataInput {
            title: pick(&self.title, &fallback.title),
            subtitle: pick(&self.subtitle, &fallback.subtitle),
            authors: pick(&self.authors, &fallback.authors),
            editors: pick(&self.editors, &fallback.editors),
            publisher: pick(&self.publisher, &fallback.publisher),
            publication_date: pick(&self.publication_date, &fallback.publication_date),
            year: pick(&self.year, &fallback.year),
            language: pick(&self.language, &fallback.language),
            edition: pick(&self.edition, &fallback.edition),
            series: pick(&self.series, &fallback.series),
            journal: pick(&self.journal, &fallback.journal),
            volume: pick(&self.volume, &fallback.volume),
            issue: pick(&self.issue, &fallback.issue),
            isbn: pick(&self.isbn, &fallback.isbn),
            doi: pick(&self.doi, &fallback.doi),
            url: pick(&self.url, &fallback.url),
            subjects: pick(&self.subjects, &fallback.subjects),
            keywords: pick(&self.keywords, &fallback.keywords),
            license: pick(&self.license, &fallback.license),
            description: pick(&self.description, &fallback.description),
            extra,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == MetadataInput::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Year {
    Numeric(i32),
    Raw(String),
}

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Year::Numeric(year) => write!(f, "{}", year),
            Year::Raw(raw) => f.write_str(raw),
        }
    }
}

/// Merged, typed metadata for one document. Unset fields are omitted when serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub publication_type: PublicationType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<Year>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub editors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// Split a comma separated field into trimmed, non-empty items.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Merges per-file metadata over the batch-wide common record.
pub struct MetadataAssembler {
    common: MetadataInput,
    publication_type: PublicationType,
    infer_from_filename: bool,
    year_in_name: Regex,
    underscores: Regex,
    spaces: Regex,
}

impl MetadataAssembler {
    pub fn new(common: MetadataInput, publication_type: PublicationType, infer_from_filename: bool) -> Self {
        Self {
            common,
            publication_type,
            infer_from_filename,
            year_in_name: Regex::new(r"1[6-9]\d{2}|20\d{2}").expect("Invalid year regex"),
            underscores: Regex::new(r"_+").expect("Invalid underscore regex"),
            spaces: Regex::new(r"\s{2,}").expect("Invalid whitespace regex"),
        }
    }

    pub fn common(&self) -> &MetadataInput {
        &self.common
    }

    /// Title guessed from a filename: the stem with underscores turned into spaces.
    pub fn guess_title(&self, filename: &str) -> Option<String> {
        let stem = Path::new(filename).file_stem()?.to_string_lossy();
        let title = self.underscores.replace_all(stem.trim(), " ");
        let title = self.spaces.replace_all(&title, " ").trim().to_string();
        (!title.is_empty()).then_some(title)
    }

    /// The last plausible publication year (1600-2099) embedded in a filename.
    pub fn guess_year(&self, filename: &str) -> Option<i32> {
        self.year_in_name
            .find_iter(filename)
            .last()
            .and_then(|m| m.as_str().parse().ok())
    }

    pub fn assemble(&self, per_file: &MetadataInput, filename: &str) -> (Metadata, Vec<ConversionWarning>) {
        let merged = per_file.merged_over(&self.common);
        let mut warnings = Vec::new();

        let title = merged.title.clone().or_else(|| {
            if self.infer_from_filename {
                self.guess_title(filename)
            } else {
                None
            }
        });

        let year = match merged.year.as_deref() {
            Some(raw) => match raw.parse::<i32>() {
                Ok(year) => Some(Year::Numeric(year)),
                Err(_) => {
                    warnings.push(ConversionWarning::YearNotNumeric(raw.to_string()));
                    Some(Year::Raw(raw.to_string()))
                }
            },
            None => merged
                .publication_date
                .as_deref()
                .and_then(|date| NaiveDate::parse_from_str(date, "%Y-%m-%d").ok())
                .map(|date| Year::Numeric(date.year()))
                .or_else(|| {
                    if self.infer_from_filename {
                        self.guess_year(filename).map(Year::Numeric)
                    } else {
                        None
                    }
                }),
        };

        let subjects = merged.subjects.as_deref().map(split_list).unwrap_or_default();
        let keywords = match merged.keywords.as_deref() {
            Some(keywords) => split_list(keywords),
            None => subjects.clone(),
        };

        let metadata = Metadata {
            title,
            subtitle: merged.subtitle,
            publication_type: self.publication_type,
            language: merged.language,
            year,
            publication_date: merged.publication_date,
            authors: merged.authors.as_deref().map(split_list).unwrap_or_default(),
            editors: merged.editors.as_deref().map(split_list).unwrap_or_default(),
            publisher: merged.publisher,
            edition: merged.edition,
            series: merged.series,
            journal: merged.journal,
            volume: merged.volume,
            issue: merged.issue,
            isbn: merged.isbn,
            doi: merged.doi,
            url: merged.url,
            subjects,
            keywords,
            license: merged.license,
            description: merged.description,
            extra: merged.extra,
        };

        (metadata, warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(pairs: &[(&str, &str)]) -> MetadataInput {
        let mut input = MetadataInput::default();
        for (key, value) in pairs {
            input.set(key, *value);
        }
        input
    }

    #[test]
    fn test_per_file_value_wins() {
        let common = input(&[("publisher", "Common House"), ("author", "A. Common")]);
        let assembler = MetadataAssembler::new(common, PublicationType::Book, false);

        let (metadata, _) = assembler.assemble(&input(&[("publisher", "File House")]), "a.txt");

        assert_eq!(metadata.publisher.as_deref(), Some("File House"));
        assert_eq!(metadata.authors, vec!["A. Common"]);
    }

    #[test]
    fn test_common_only_fields_reach_every_document() {
        let common = input(&[("series", "Classics"), ("license", "CC-BY")]);
        let assembler = MetadataAssembler::new(common, PublicationType::Book, false);

        for (name, per_file) in [
            ("one.txt", MetadataInput::default()),
            ("two.pdf", input(&[("title", "Two")])),
        ] {
            let (metadata, _) = assembler.assemble(&per_file, name);
            assert_eq!(metadata.series.as_deref(), Some("Classics"));
            assert_eq!(metadata.license.as_deref(), Some("CC-BY"));
        }
    }

    #[test]
    fn test_blank_per_file_value_falls_through() {
        let common = input(&[("title", "Common Title")]);
        let assembler = MetadataAssembler::new(common, PublicationType::Book, true);

        let (metadata, _) = assembler.assemble(&input(&[("title", "   ")]), "File_Name.txt");
        assert_eq!(metadata.title.as_deref(), Some("Common Title"));
    }

    #[test]
    fn test_unset_fields_are_omitted() {
        let assembler = MetadataAssembler::new(MetadataInput::default(), PublicationType::Report, false);
        let (metadata, warnings) = assembler.assemble(&MetadataInput::default(), "x.txt");

        assert!(warnings.is_empty());
        assert_eq!(
            metadata,
            Metadata {
                publication_type: PublicationType::Report,
                ..Metadata::default()
            }
        );
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json, serde_json::json!({ "publication_type": "report" }));
    }

    #[test]
    fn test_year_coercion() {
        let assembler = MetadataAssembler::new(MetadataInput::default(), PublicationType::Book, false);

        let (metadata, warnings) = assembler.assemble(&input(&[("year", " 1901 ")]), "x.txt");
        assert_eq!(metadata.year, Some(Year::Numeric(1901)));
        assert!(warnings.is_empty());

        let (metadata, warnings) = assembler.assemble(&input(&[("year", "c. 1850")]), "x.txt");
        assert_eq!(metadata.year, Some(Year::Raw("c. 1850".to_string())));
        assert_eq!(warnings, vec![ConversionWarning::YearNotNumeric("c. 1850".to_string())]);
    }

    #[test]
    fn test_year_from_publication_date() {
        let assembler = MetadataAssembler::new(MetadataInput::default(), PublicationType::Book, true);
        let (metadata, _) = assembler.assemble(&input(&[("date", "1999-04-01")]), "Book_2001.txt");
        assert_eq!(metadata.year, Some(Year::Numeric(1999)));
        assert_eq!(metadata.publication_date.as_deref(), Some("1999-04-01"));
    }

    #[test]
    fn test_filename_inference() {
        let assembler = MetadataAssembler::new(MetadataInput::default(), PublicationType::Book, true);

        assert_eq!(assembler.guess_title("The__Time_Machine_1895.txt").as_deref(), Some("The Time Machine 1895"));
        assert_eq!(assembler.guess_year("scan_1895_rev2020.pdf"), Some(2020));
        assert_eq!(assembler.guess_year("notes.txt"), None);

        let (metadata, _) = assembler.assemble(&MetadataInput::default(), "The_Time_Machine_1895.txt");
        assert_eq!(metadata.title.as_deref(), Some("The Time Machine 1895"));
        assert_eq!(metadata.year, Some(Year::Numeric(1895)));
    }

    #[test]
    fn test_lists_and_keyword_default() {
        let assembler = MetadataAssembler::new(MetadataInput::default(), PublicationType::Book, false);
        let (metadata, _) = assembler.assemble(
            &input(&[("authors", "John Doe, , Jane Smith"), ("subjects", "history, science")]),
            "x.txt",
        );

        assert_eq!(metadata.authors, vec!["John Doe", "Jane Smith"]);
        assert_eq!(metadata.subjects, vec!["history", "science"]);
        assert_eq!(metadata.keywords, metadata.subjects);
    }

    #[test]
    fn test_extra_fields_merge_by_key() {
        let common = input(&[("shelfmark", "A-1"), ("collection", "Main")]);
        let assembler = MetadataAssembler::new(common, PublicationType::Book, false);
        let (metadata, _) = assembler.assemble(&input(&[("shelfmark", "B-7")]), "x.txt");

        assert_eq!(metadata.extra.get("shelfmark").map(String::as_str), Some("B-7"));
        assert_eq!(metadata.extra.get("collection").map(String::as_str), Some("Main"));
    }

    #[test]
    fn test_blank_values_are_omitted() {
        let mut common = MetadataInput::default();
        common.set("shelfmark", "");
        common.set("publisher", "  ");
        common.extra.insert("collection".to_string(), " ".to_string());
        let assembler = MetadataAssembler::new(common, PublicationType::Book, false);

        let (metadata, _) = assembler.assemble(&MetadataInput::default(), "x.txt");
        assert!(metadata.extra.is_empty());
        assert_eq!(metadata.publisher, None);
    }

    #[test]
    fn test_type_keys_stay_out_of_extra() {
        let mut common = MetadataInput::default();
        common.set("type", "article");
        common.set("publication-type", "thesis");
        assert!(common.is_empty());

        assert!(is_type_key(" Publication_Type "));
        assert!(!is_type_key("typeface"));

        let sidecar = MetadataInput::from_toml("title = \"X\"\ntype = \"article\"\n");
        assert!(matches!(sidecar, Err(ConvertError::InvalidInput(_))));
    }

    #[test]
    fn test_lenient_toml_values() {
        let parsed = MetadataInput::from_toml(
            r#"
            author = ["Mary Shelley", "Percy Shelley"]
            year = 1818
            shelfmark = "PR5397"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.authors.as_deref(), Some("Mary Shelley, Percy Shelley"));
        assert_eq!(parsed.year.as_deref(), Some("1818"));
        assert_eq!(parsed.extra.get("shelfmark").map(String::as_str), Some("PR5397"));
    }

    #[test]
    fn test_publication_type_parsing() {
        assert_eq!("Conference Paper".parse::<PublicationType>().unwrap(), PublicationType::ConferencePaper);
        assert!("pamphlet".parse::<PublicationType>().is_err());
        assert!(PublicationType::Magazine.is_periodical());
        assert!(!PublicationType::Thesis.is_periodical());
    }
}
