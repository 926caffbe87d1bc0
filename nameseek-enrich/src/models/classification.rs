//! Classification payloads
//!
//! `RawClassification` is what a provider adapter hands back: free-form
//! strings straight out of the model response. `ClassificationResult` is
//! the validated, closed-set form that gets checkpointed and merged.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Etymological origin category (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OriginCategory {
    Africano,
    Aleman,
    Anglosajon,
    Arameo,
    Armenio,
    Catalan,
    Chino,
    Contemporaneo,
    Coreano,
    Desconocido,
    Egipcio,
    Escandinavo,
    Eslavo,
    Espanol,
    Frances,
    Gallego,
    Georgiano,
    Griego,
    Guanche,
    Hawaiano,
    Hungaro,
    Indonesio,
    Italiano,
    Japones,
    Latinoamericano,
    Lituano,
    NativoAmericano,
    Persa,
    Portugues,
    Rumano,
    Sanscrito,
    Turco,
    Vasco,
    Arabe,
    Otro,
}

impl OriginCategory {
    pub const ALL: [OriginCategory; 35] = [
        OriginCategory::Africano,
        OriginCategory::Aleman,
        OriginCategory::Anglosajon,
        OriginCategory::Arameo,
        OriginCategory::Armenio,
        OriginCategory::Catalan,
        OriginCategory::Chino,
        OriginCategory::Contemporaneo,
        OriginCategory::Coreano,
        OriginCategory::Desconocido,
        OriginCategory::Egipcio,
        OriginCategory::Escandinavo,
        OriginCategory::Eslavo,
        OriginCategory::Espanol,
        OriginCategory::Frances,
        OriginCategory::Gallego,
        OriginCategory::Georgiano,
        OriginCategory::Griego,
        OriginCategory::Guanche,
        OriginCategory::Hawaiano,
        OriginCategory::Hungaro,
        OriginCategory::Indonesio,
        OriginCategory::Italiano,
        OriginCategory::Japones,
        OriginCategory::Latinoamericano,
        OriginCategory::Lituano,
        OriginCategory::NativoAmericano,
        OriginCategory::Persa,
        OriginCategory::Portugues,
        OriginCategory::Rumano,
        OriginCategory::Sanscrito,
        OriginCategory::Turco,
        OriginCategory::Vasco,
        OriginCategory::Arabe,
        OriginCategory::Otro,
    ];

    /// Label as written to the output table and requested from providers
    pub fn label(&self) -> &'static str {
        match self {
            OriginCategory::Africano => "Africano",
            OriginCategory::Aleman => "Alemán",
            OriginCategory::Anglosajon => "Anglosajón",
            OriginCategory::Arameo => "Arameo",
            OriginCategory::Armenio => "Armenio",
            OriginCategory::Catalan => "Catalán",
            OriginCategory::Chino => "Chino",
            OriginCategory::Contemporaneo => "Contemporáneo",
            OriginCategory::Coreano => "Coreano",
            OriginCategory::Desconocido => "Desconocido",
            OriginCategory::Egipcio => "Egipcio",
            OriginCategory::Escandinavo => "Escandinavo",
            OriginCategory::Eslavo => "Eslavo",
            OriginCategory::Espanol => "Español",
            OriginCategory::Frances => "Francés",
            OriginCategory::Gallego => "Gallego",
            OriginCategory::Georgiano => "Georgiano",
            OriginCategory::Griego => "Griego",
            OriginCategory::Guanche => "Guanche",
            OriginCategory::Hawaiano => "Hawaiano",
            OriginCategory::Hungaro => "Húngaro",
            OriginCategory::Indonesio => "Indonesio",
            OriginCategory::Italiano => "Italiano",
            OriginCategory::Japones => "Japonés",
            OriginCategory::Latinoamericano => "Latinoamericano",
            OriginCategory::Lituano => "Lituano",
            OriginCategory::NativoAmericano => "Nativo Americano",
            OriginCategory::Persa => "Persa",
            OriginCategory::Portugues => "Portugués",
            OriginCategory::Rumano => "Rumano",
            OriginCategory::Sanscrito => "Sánscrito",
            OriginCategory::Turco => "Turco",
            OriginCategory::Vasco => "Vasco",
            OriginCategory::Arabe => "Árabe",
            OriginCategory::Otro => "Otro",
        }
    }

    /// Match a model-produced label against the closed set
    ///
    /// Case, accents and surrounding whitespace/quotes are not significant.
    pub fn parse(raw: &str) -> Option<Self> {
        let wanted = fold_label(raw);
        if wanted.is_empty() {
            return None;
        }
        Self::ALL
            .iter()
            .copied()
            .find(|category| fold_label(category.label()) == wanted)
    }
}

impl fmt::Display for OriginCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl TryFrom<String> for OriginCategory {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("unknown origin category '{}'", value))
    }
}

impl From<OriginCategory> for String {
    fn from(value: OriginCategory) -> Self {
        value.label().to_string()
    }
}

/// Pronunciation difficulty scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Difficulty {
    VeryEasy,
    Easy,
    Hard,
    VeryHard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::VeryEasy,
        Difficulty::Easy,
        Difficulty::Hard,
        Difficulty::VeryHard,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::VeryEasy => "muy fácil",
            Difficulty::Easy => "fácil",
            Difficulty::Hard => "difícil",
            Difficulty::VeryHard => "muy difícil",
        }
    }

    /// Accepts the Spanish labels (accents optional) and the English
    /// identifiers `very_easy`, `easy`, `hard`, `very_hard`.
    pub fn parse(raw: &str) -> Option<Self> {
        let folded = fold_label(raw).replace(['_', '-'], " ");
        match folded.as_str() {
            "muy facil" | "very easy" => Some(Difficulty::VeryEasy),
            "facil" | "easy" => Some(Difficulty::Easy),
            "dificil" | "hard" => Some(Difficulty::Hard),
            "muy dificil" | "very hard" => Some(Difficulty::VeryHard),
            _ => None,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl TryFrom<String> for Difficulty {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("unknown difficulty '{}'", value))
    }
}

impl From<Difficulty> for String {
    fn from(value: Difficulty) -> Self {
        value.label().to_string()
    }
}

/// Validated classification of one name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub origin_category: OriginCategory,
    /// Plain text, at most 150 words
    pub description: String,
    /// Difficulty for native (Spanish) speakers
    pub pronunciation_native: Difficulty,
    /// Difficulty for foreign (mainly English) speakers
    pub pronunciation_foreign: Difficulty,
    pub pronunciation_explanation: String,
}

/// Unvalidated adapter output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawClassification {
    pub origin: String,
    pub description: String,
    pub pronunciation_native: String,
    pub pronunciation_foreign: String,
    pub pronunciation_explanation: String,
}

/// Lowercase, strip accents and surrounding quotes/punctuation
fn fold_label(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '.' || c.is_whitespace())
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
