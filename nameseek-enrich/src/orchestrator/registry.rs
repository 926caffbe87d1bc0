//! Enrichment field registry
//!
//! Each output column is a named pure function of a classification
//! result. The merger asks the registry for column names and values, so a
//! new column is one `register` call.

use crate::models::ClassificationResult;
use std::fmt;

type Extractor = Box<dyn Fn(&ClassificationResult) -> String + Send + Sync>;

struct EnrichmentField {
    column: String,
    extract: Extractor,
}

pub struct EnrichmentRegistry {
    fields: Vec<EnrichmentField>,
}

impl EnrichmentRegistry {
    /// Registry without any column
    pub fn empty() -> Self {
        Self { fields: Vec::new() }
    }

    /// Add (or replace) a column
    pub fn register<F>(&mut self, column: impl Into<String>, extract: F) -> &mut Self
    where
        F: Fn(&ClassificationResult) -> String + Send + Sync + 'static,
    {
        let column = column.into();
        let extract: Extractor = Box::new(extract);
        match self.fields.iter_mut().find(|field| field.column == column) {
            Some(field) => field.extract = extract,
            None => self.fields.push(EnrichmentField { column, extract }),
        }
        self
    }

    /// Column names in registration order
    pub fn columns(&self) -> Vec<&str> {
        self.fields.iter().map(|field| field.column.as_str()).collect()
    }

    /// Values for `result`, aligned with `columns()`
    pub fn values(&self, result: &ClassificationResult) -> Vec<String> {
        self.fields.iter().map(|field| (field.extract)(result)).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Default for EnrichmentRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register("Family_Origin", |r| r.origin_category.label().to_string())
            .register("Name_Description", |r| r.description.clone())
            .register("Pronunciation_Spanish", |r| {
                r.pronunciation_native.label().to_string()
            })
            .register("Pronunciation_Foreign", |r| {
                r.pronunciation_foreign.label().to_string()
            })
            .register("Pronunciation_Explanation", |r| {
                r.pronunciation_explanation.clone()
            });
        registry
    }
}

impl fmt::Debug for EnrichmentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnrichmentRegistry")
            .field("columns", &self.columns())
            .finish()
    }
}
