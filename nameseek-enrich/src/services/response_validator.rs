//! Response cleaning and validation
//!
//! Model output is cleaned first (markdown emphasis, quotes, whitespace,
//! stray symbols, name capitalisation) and then checked against the closed
//! category sets and field constraints. A response with several bad
//! fields yields one `ValidationError` naming all of them.

use crate::error::ProviderError;
use crate::models::{ClassificationResult, Difficulty, NameKey, OriginCategory, RawClassification};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use thiserror::Error;

/// Upper bound on description length
pub const MAX_DESCRIPTION_WORDS: usize = 150;

static BOLD_STARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("valid pattern"));
static ITALIC_STAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*([^*]+)\*").expect("valid pattern"));
static BOLD_UNDERSCORES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"__([^_]+)__").expect("valid pattern"));
static ITALIC_UNDERSCORE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_([^_]+)_").expect("valid pattern"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid pattern"));
static DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s\.,;:!\?\(\)\-']").expect("valid pattern"));

/// One offending field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: &'static str,
    pub reason: String,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.field, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    pub fn fields(&self) -> Vec<&'static str> {
        self.violations.iter().map(|v| v.field).collect()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.violations.iter().map(|v| v.to_string()).collect();
        write!(f, "invalid fields: {}", parts.join("; "))
    }
}

impl From<ValidationError> for ProviderError {
    fn from(err: ValidationError) -> Self {
        ProviderError::InvalidResponse(err.to_string())
    }
}

/// Normalise free text produced by a model
pub fn clean_text(text: &str, name: &str) -> String {
    let mut text = BOLD_STARS.replace_all(text, "$1").into_owned();
    text = ITALIC_STAR.replace_all(&text, "$1").into_owned();
    text = BOLD_UNDERSCORES.replace_all(&text, "$1").into_owned();
    text = ITALIC_UNDERSCORE.replace_all(&text, "$1").into_owned();

    for part in name.split_whitespace() {
        let pattern = format!(r"(?i)\b{}\b", regex::escape(part));
        if let Ok(re) = Regex::new(&pattern) {
            let capitalised = title_case(part);
            text = re.replace_all(&text, regex::NoExpand(&capitalised)).into_owned();
        }
    }

    let text = text.replace('"', "'");
    let text = WHITESPACE.replace_all(&text, " ");
    let text = DISALLOWED.replace_all(&text, "");
    text.trim().to_string()
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Clean and validate a raw adapter response for `key`
pub fn validate(
    raw: &RawClassification,
    key: &NameKey,
) -> Result<ClassificationResult, ValidationError> {
    let mut violations = Vec::new();

    let origin = OriginCategory::parse(&raw.origin);
    if origin.is_none() {
        violations.push(FieldViolation {
            field: "origin_category",
            reason: format!("'{}' is not a known category", raw.origin.trim()),
        });
    }

    let description = clean_text(&raw.description, &key.name);
    let words = description.split_whitespace().count();
    if words == 0 {
        violations.push(FieldViolation {
            field: "description",
            reason: "empty".to_string(),
        });
    } else if words > MAX_DESCRIPTION_WORDS {
        violations.push(FieldViolation {
            field: "description",
            reason: format!("{} words, at most {} allowed", words, MAX_DESCRIPTION_WORDS),
        });
    }

    let native =
        parse_difficulty("pronunciation_native", &raw.pronunciation_native, &mut violations);
    let foreign =
        parse_difficulty("pronunciation_foreign", &raw.pronunciation_foreign, &mut violations);

    let explanation = clean_text(&raw.pronunciation_explanation, &key.name);
    if explanation.is_empty() {
        violations.push(FieldViolation {
            field: "pronunciation_explanation",
            reason: "empty".to_string(),
        });
    }

    match (origin, native, foreign) {
        (Some(origin_category), Some(pronunciation_native), Some(pronunciation_foreign))
            if violations.is_empty() =>
        {
            Ok(ClassificationResult {
                origin_category,
                description,
                pronunciation_native,
                pronunciation_foreign,
                pronunciation_explanation: explanation,
            })
        }
        _ => Err(ValidationError { violations }),
    }
}

fn parse_difficulty(
    field: &'static str,
    raw: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<Difficulty> {
    let parsed = Difficulty::parse(raw);
    if parsed.is_none() {
        violations.push(FieldViolation {
            field,
            reason: format!("'{}' is not a difficulty level", raw.trim()),
        });
    }
    parsed
}
