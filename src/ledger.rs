//! CSV ledgers of stale and fresh locations
//!
//! Ledgers grow across runs. Appending to an existing file never repeats
//! the header; a new file always starts with it, even with no rows.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{FreshnessError, Result};
use crate::fetcher::FreshnessRow;

/// Column order shared by both ledgers
pub const LEDGER_HEADER: [&str; 6] = ["name", "last_update", "location", "url", "active", "locationId"];

/// One persisted ledger line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub name: String,
    pub last_update: String,
    pub location: String,
    pub url: String,
    #[serde(serialize_with = "serialize_flag", deserialize_with = "deserialize_flag")]
    pub active: bool,
    #[serde(rename = "locationId")]
    pub location_id: String,
}

// Existing ledgers were written with capitalised booleans; keep them uniform.
fn serialize_flag<S: Serializer>(value: &bool, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(if *value { "True" } else { "False" })
}

fn deserialize_flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" | "" => Ok(false),
        other => Err(serde::de::Error::custom(format!("invalid active flag: {}", other))),
    }
}

impl TryFrom<&FreshnessRow> for LedgerRow {
    type Error = FreshnessError;

    fn try_from(row: &FreshnessRow) -> Result<Self> {
        if row.adapter.name.trim().is_empty() {
            return Err(FreshnessError::InvalidRow("adapter name is empty".to_string()));
        }

        if !row.last_update.is_empty() && !is_iso_date(&row.last_update) {
            return Err(FreshnessError::InvalidRow(format!(
                "{}: last_update {:?} is not YYYY-MM-DD",
                row.adapter.name, row.last_update
            )));
        }

        Ok(Self {
            name: row.adapter.name.clone(),
            last_update: row.last_update.clone(),
            location: row.location.clone(),
            url: row.adapter.url.clone(),
            active: row.adapter.active,
            location_id: row.location_id.clone(),
        })
    }
}

/// Zero-padded `YYYY-MM-DD`
pub(crate) fn is_iso_date(value: &str) -> bool {
    value.len() == 10 && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

/// Converts freshness rows, dropping invalid ones with a warning
pub fn to_ledger_rows(rows: &[FreshnessRow]) -> Vec<LedgerRow> {
    rows.iter()
        .filter_map(|row| match LedgerRow::try_from(row) {
            Ok(converted) => Some(converted),
            Err(e) => {
                warn!(
                    adapter = %row.adapter.name,
                    location_id = %row.location_id,
                    error = %e,
                    "Dropping row that cannot be written to a ledger"
                );
                None
            }
        })
        .collect()
}

/// A ledger file on disk
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends rows, creating the file with a header if it does not exist
    pub fn append(&self, rows: &[LedgerRow]) -> Result<usize> {
        let exists = self.path.exists();
        if !exists {
            ensure_parent(&self.path)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);

        if !exists {
            writer.write_record(LEDGER_HEADER)?;
        }
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;

        debug!(
            ledger = %self.path.display(),
            rows = rows.len(),
            created = !exists,
            "Ledger rows appended"
        );
        Ok(rows.len())
    }

    /// Reads every row; a missing file is an error
    pub fn read_all(&self) -> Result<Vec<LedgerRow>> {
        if !self.path.exists() {
            return Err(FreshnessError::MissingFile(self.path.clone()));
        }

        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut rows = Vec::new();
        for record in reader.deserialize::<LedgerRow>() {
            rows.push(record?);
        }
        Ok(rows)
    }

    /// Replaces the whole file with a header and `rows`
    pub fn replace(&self, rows: &[LedgerRow]) -> Result<()> {
        ensure_parent(&self.path)?;

        let partial = self.path.with_extension("csv.partial");
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_path(&partial)?;
            writer.write_record(LEDGER_HEADER)?;
            for row in rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        fs::rename(&partial, &self.path)?;

        info!(ledger = %self.path.display(), rows = rows.len(), "Ledger rewritten");
        Ok(())
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent)?;
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Adapter;
    use tempfile::tempdir;

    fn ledger_row(name: &str, location: &str) -> LedgerRow {
        LedgerRow {
            name: name.to_string(),
            last_update: "2024-06-01".to_string(),
            location: location.to_string(),
            url: "https://example.org".to_string(),
            active: true,
            location_id: "7".to_string(),
        }
    }

    #[test]
    fn test_new_file_gets_header_then_append_does_not() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("data").join("adapters_update.csv"));

        ledger.append(&[ledger_row("Chile", "Santiago")]).unwrap();
        ledger.append(&[ledger_row("Peru", "Lima")]).unwrap();

        let content = std::fs::read_to_string(ledger.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "name,last_update,location,url,active,locationId");
        assert_eq!(lines[1], "Chile,2024-06-01,Santiago,https://example.org,True,7");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_empty_batch_still_creates_file_with_header() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("adapters_outdate-tmp.csv"));

        ledger.append(&[]).unwrap();

        assert!(ledger.read_all().unwrap().is_empty());
        let content = std::fs::read_to_string(ledger.path()).unwrap();
        assert_eq!(content.trim_end(), LEDGER_HEADER.join(","));
    }

    #[test]
    fn test_rerun_appends_duplicates() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("update.csv"));
        let rows = vec![ledger_row("Chile", "Santiago")];

        ledger.append(&rows).unwrap();
        ledger.append(&rows).unwrap();

        assert_eq!(ledger.read_all().unwrap().len(), 2);
    }

    #[test]
    fn test_reads_ledgers_with_lowercase_or_empty_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("outdate.csv");
        std::fs::write(
            &path,
            "name,last_update,location,url,active,locationId\n\
             Chile,,,https://sinca.example,true,\n\
             Peru,2020-01-01,\"Lima, Centro\",https://peru.example,False,12\n",
        )
        .unwrap();

        let rows = Ledger::new(&path).read_all().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].active);
        assert_eq!(rows[0].last_update, "");
        assert_eq!(rows[1].location, "Lima, Centro");
        assert!(!rows[1].active);
    }

    #[test]
    fn test_replace_overwrites() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("outdate.csv"));
        ledger
            .append(&[ledger_row("A", "a"), ledger_row("B", "b")])
            .unwrap();

        ledger.replace(&[ledger_row("B", "b")]).unwrap();

        assert_eq!(ledger.read_all().unwrap(), vec![ledger_row("B", "b")]);
        assert!(!dir.path().join("outdate.csv.partial").exists());
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempdir().unwrap();
        let err = Ledger::new(dir.path().join("missing.csv")).read_all().unwrap_err();
        assert!(matches!(err, FreshnessError::MissingFile(_)));
    }

    #[test]
    fn test_conversion_validates_rows() {
        let adapter = Adapter::new("Chile", "https://sinca.example", true);

        let ok = FreshnessRow::new(adapter.clone(), "1", "Santiago", "2024-06-01");
        let converted = LedgerRow::try_from(&ok).unwrap();
        assert_eq!(converted.name, "Chile");
        assert_eq!(converted.url, "https://sinca.example");

        assert!(LedgerRow::try_from(&FreshnessRow::empty(adapter.clone())).is_ok());

        let bad_date = FreshnessRow::new(adapter.clone(), "1", "Santiago", "2024-6-1");
        assert!(matches!(
            LedgerRow::try_from(&bad_date),
            Err(FreshnessError::InvalidRow(_))
        ));

    }

    #[test]
    fn test_invalid_rows_are_dropped_not_fatal() {
        let adapter = Adapter::new("Chile", "https://sinca.example", true);
        let rows = vec![
            FreshnessRow::new(adapter.clone(), "1", "Santiago", "2024-06-01"),
            FreshnessRow::new(adapter.clone(), "2", "Temuco", "2024-06-09 10:00:00"),
            FreshnessRow::empty(Adapter::new("", "u", true)),
            FreshnessRow::empty(adapter),
        ];

        let converted = to_ledger_rows(&rows);

        let ids: Vec<&str> = converted.iter().map(|r| r.location_id.as_str()).collect();
        assert_eq!(ids, vec!["1", ""]);
    }
}
