//! Base dataset IO
//!
//! The base dataset is a CSV table with a name column, an optional gender
//! column and any number of passthrough columns. Cells are kept as text
//! and written back untouched.

use crate::error::{EnrichError, EnrichResult};
use crate::models::{Gender, NameKey, NameRecord};
use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Header names recognised as gender columns when none is configured
const GENDER_HEADERS: &[&str] = &["gender", "sexo", "sex"];

/// In-memory base table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseDataset {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    name_idx: usize,
    gender_idx: Option<usize>,
}

impl BaseDataset {
    /// Build from already parsed cells
    pub fn new(
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
        name_column: &str,
        gender_column: Option<&str>,
    ) -> EnrichResult<Self> {
        let name_idx = find_column(&headers, name_column).ok_or_else(|| {
            EnrichError::Configuration(format!(
                "name column '{}' not found (columns: {})",
                name_column,
                headers.join(", ")
            ))
        })?;

        let gender_idx = match gender_column {
            Some(column) => Some(find_column(&headers, column).ok_or_else(|| {
                EnrichError::Configuration(format!(
                    "gender column '{}' not found (columns: {})",
                    column,
                    headers.join(", ")
                ))
            })?),
            None => GENDER_HEADERS
                .iter()
                .find_map(|candidate| find_column(&headers, candidate)),
        };

        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();

        Ok(Self {
            headers,
            rows,
            name_idx,
            gender_idx,
        })
    }

    /// Parse CSV from any reader
    pub fn from_reader<R: Read>(
        reader: R,
        name_column: &str,
        gender_column: Option<&str>,
    ) -> EnrichResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Self::new(headers, rows, name_column, gender_column)
    }

    /// Load the CSV file at `path`
    pub fn load(
        path: &Path,
        name_column: &str,
        gender_column: Option<&str>,
    ) -> EnrichResult<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            EnrichError::Dataset(format!("cannot open {}: {}", path.display(), e))
        })?;
        let dataset = Self::from_reader(file, name_column, gender_column)?;
        info!(
            path = %path.display(),
            rows = dataset.len(),
            columns = dataset.headers.len(),
            gender_column = dataset.gender_column().unwrap_or("-"),
            "Base dataset loaded"
        );
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn gender_column(&self) -> Option<&str> {
        self.gender_idx.map(|idx| self.headers[idx].as_str())
    }

    /// Join key of base row `row`
    pub fn key_at(&self, row: usize) -> NameKey {
        let cells = &self.rows[row];
        let gender = self
            .gender_idx
            .map(|idx| Gender::parse(&cells[idx]))
            .unwrap_or_default();
        NameKey::new(&cells[self.name_idx], gender)
    }

    /// Join keys of every row, in row order
    pub fn keys(&self) -> Vec<NameKey> {
        (0..self.rows.len()).map(|row| self.key_at(row)).collect()
    }

    /// One record per distinct non-blank key, in first-appearance order
    pub fn distinct_records(&self) -> Vec<NameRecord> {
        let mut seen = HashSet::new();
        let mut records = Vec::new();
        let mut blank = 0usize;

        for (row, key) in self.keys().into_iter().enumerate() {
            if key.is_blank() {
                blank += 1;
                continue;
            }
            if seen.insert(key.clone()) {
                records.push(NameRecord::new(key, row));
            }
        }

        debug!(
            rows = self.rows.len(),
            distinct = records.len(),
            blank,
            "Distinct name keys collected"
        );
        records
    }
}

fn find_column(headers: &[String], wanted: &str) -> Option<usize> {
    let wanted = wanted.trim();
    headers
        .iter()
        .position(|h| h == wanted)
        .or_else(|| headers.iter().position(|h| h.eq_ignore_ascii_case(wanted)))
}

/// Write a table as CSV
pub fn write_csv<W: Write>(writer: W, headers: &[String], rows: &[Vec<String>]) -> EnrichResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(headers)?;
    for row in rows {
        csv_writer.write_record(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write a table to `path` via a sibling temp file and rename
///
/// Readers never observe a half-written output file.
pub fn write_csv_atomic(path: &Path, headers: &[String], rows: &[Vec<String>]) -> EnrichResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = temp_path_for(path);
    let file = std::fs::File::create(&tmp_path).map_err(|e| {
        EnrichError::Dataset(format!("cannot create {}: {}", tmp_path.display(), e))
    })?;
    let mut writer = std::io::BufWriter::new(file);
    write_csv(&mut writer, headers, rows)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    drop(writer);

    std::fs::rename(&tmp_path, path).map_err(|e| {
        EnrichError::Dataset(format!(
            "cannot move {} to {}: {}",
            tmp_path.display(),
            path.display(),
            e
        ))
    })?;

    info!(path = %path.display(), rows = rows.len(), "Output written");
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CSV: &str = "Nombre,Frecuencia,Sexo\nAna,100,Mujer\nLuis,80,Hombre\nAna,100,Mujer\n,5,Mujer\n";

    #[test]
    fn test_gender_column_detected() {
        let dataset = BaseDataset::from_reader(CSV.as_bytes(), "Nombre", None).unwrap();
        assert_eq!(dataset.gender_column(), Some("Sexo"));
        assert_eq!(dataset.key_at(0), NameKey::new("Ana", Gender::F));
        assert_eq!(dataset.key_at(1), NameKey::new("Luis", Gender::M));
    }

    #[test]
    fn test_distinct_records_skip_duplicates_and_blanks() {
        let dataset = BaseDataset::from_reader(CSV.as_bytes(), "Nombre", None).unwrap();
        let records = dataset.distinct_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].key.name, "Ana");
        assert_eq!(records[0].row, 0);
        assert_eq!(records[1].key.name, "Luis");
    }

    #[test]
    fn test_name_column_case_insensitive() {
        let dataset = BaseDataset::from_reader(CSV.as_bytes(), "nombre", None).unwrap();
        assert_eq!(dataset.len(), 4);
    }

    #[test]
    fn test_missing_columns_are_configuration_errors() {
        let err = BaseDataset::from_reader(CSV.as_bytes(), "name", None).unwrap_err();
        assert!(matches!(err, EnrichError::Configuration(_)));

        let err = BaseDataset::from_reader(CSV.as_bytes(), "Nombre", Some("gender")).unwrap_err();
        assert!(matches!(err, EnrichError::Configuration(_)));
    }

    #[test]
    fn test_short_rows_are_padded() {
        let dataset =
            BaseDataset::from_reader("name,extra\nAna\nLuis,x\n".as_bytes(), "name", None).unwrap();
        assert_eq!(dataset.rows[0], vec!["Ana".to_string(), String::new()]);
        assert_eq!(dataset.key_at(0).gender, Gender::Unknown);
    }

    #[test]
    fn test_atomic_write_replaces_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/enriched.csv");
        let headers = vec!["name".to_string(), "note".to_string()];

        write_csv_atomic(&path, &headers, &[vec!["Ana".into(), "a, b".into()]]).unwrap();
        write_csv_atomic(&path, &headers, &[vec!["Luis".into(), "c".into()]]).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "name,note\nLuis,c\n");
        assert!(!temp_path_for(&path).exists());
    }
}
