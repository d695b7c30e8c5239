//! Adapters excluded from checking and from the stale ledger

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

use crate::config::Config;
use crate::error::{FreshnessError, Result};

#[derive(Debug, Deserialize)]
struct ReviewedResource {
    adapter_id: String,
}

/// Set of adapter names that are retired or already reviewed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipList {
    names: HashSet<String>,
}

impl SkipList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Inline `skip_adapters` plus the reviewed-resources file, if configured
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut skip = Self::new(config.skip_adapters.iter().cloned());
        if let Some(path) = &config.reviewed_resources_file {
            skip.extend_from_reviewed(path)?;
        }
        Ok(skip)
    }

    /// Adds every `adapter_id` from a reviewed-resources CSV
    pub fn extend_from_reviewed(&mut self, path: &Path) -> Result<usize> {
        if !path.exists() {
            return Err(FreshnessError::MissingFile(path.to_path_buf()));
        }

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;

        let before = self.names.len();
        for record in reader.deserialize::<ReviewedResource>() {
            self.names.insert(record?.adapter_id);
        }

        let added = self.names.len() - before;
        info!(file = %path.display(), added, "Reviewed resources loaded");
        Ok(added)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_inline_names() {
        let skip = SkipList::new(["RetiredAdapter"]);
        assert!(skip.contains("RetiredAdapter"));
        assert!(!skip.contains("Other"));
    }

    #[test]
    fn test_extend_from_reviewed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reviewed_resources.csv");
        std::fs::write(&path, "adapter_id,reviewer\nChile,ana\nPeru,li\nChile,li\n").unwrap();

        let mut skip = SkipList::new(["RetiredAdapter"]);
        let added = skip.extend_from_reviewed(&path).unwrap();

        assert_eq!(added, 2);
        assert_eq!(skip.len(), 3);
        assert!(skip.contains("Peru"));
    }

    #[test]
    fn test_from_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reviewed_resources.csv");
        std::fs::write(&path, "adapter_id\nChile\n").unwrap();

        let config = Config {
            skip_adapters: vec!["RetiredAdapter".to_string()],
            reviewed_resources_file: Some(path),
            ..Default::default()
        };
        let skip = SkipList::from_config(&config).unwrap();

        let mut names: Vec<&str> = skip.names().collect();
        names.sort();
        assert_eq!(names, vec!["Chile", "RetiredAdapter"]);
    }

    #[test]
    fn test_missing_reviewed_file() {
        let dir = tempdir().unwrap();
        let mut skip = SkipList::default();
        assert!(skip.extend_from_reviewed(&dir.path().join("nope.csv")).is_err());
    }
}
