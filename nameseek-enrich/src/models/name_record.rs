//! Name identity types
//!
//! A `NameKey` (name + gender) is the join key between the base dataset,
//! the checkpoint and the enriched output.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Gender column value
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Gender {
    M,
    F,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl Gender {
    /// Parse a dataset gender cell
    ///
    /// Accepts the SSA (`M`/`F`) and INE (`H`ombre/`M`ujer spelled out)
    /// conventions plus English words. Anything else is `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "m" | "male" | "h" | "hombre" | "hombres" | "varon" | "varón" => Gender::M,
            "f" | "female" | "mujer" | "mujeres" => Gender::F,
            _ => Gender::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::M => "M",
            Gender::F => "F",
            Gender::Unknown => "unknown",
        }
    }
}

/// Join key: `(name, gender)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NameKey {
    pub name: String,
    pub gender: Gender,
}

impl NameKey {
    /// Create a key; surrounding whitespace in the name is not significant
    pub fn new(name: impl AsRef<str>, gender: Gender) -> Self {
        Self {
            name: name.as_ref().trim().to_string(),
            gender,
        }
    }

    /// Key without gender information
    pub fn ungendered(name: impl AsRef<str>) -> Self {
        Self::new(name, Gender::Unknown)
    }

    /// Empty names cannot be classified or joined
    pub fn is_blank(&self) -> bool {
        self.name.is_empty()
    }
}

impl fmt::Display for NameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.gender {
            Gender::Unknown => write!(f, "{}", self.name),
            gender => write!(f, "{} ({})", self.name, gender.as_str()),
        }
    }
}

/// A unit of work selected from the base dataset
///
/// Duplicated keys in the dataset collapse into one record; `row` is the
/// index of the first base row carrying the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameRecord {
    pub key: NameKey,
    pub row: usize,
}

impl NameRecord {
    pub fn new(key: NameKey, row: usize) -> Self {
        Self { key, row }
    }
}
