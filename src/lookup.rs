//! Location lookup table
//!
//! Maps adapter names to the numeric location ids known for them, loaded
//! from a CSV extract with `source_name` and `sensor_nodes_id` columns.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::error::{FreshnessError, Result};

/// One row of the lookup extract
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LocationRef {
    #[serde(rename = "source_name")]
    pub adapter_name: String,
    #[serde(rename = "sensor_nodes_id")]
    pub location_id: i64,
}

/// Read-only adapter name → location ids table
#[derive(Debug, Clone, Default)]
pub struct LocationLookup {
    by_adapter: HashMap<String, Vec<i64>>,
}

impl LocationLookup {
    /// Loads the lookup table from a CSV file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FreshnessError::MissingFile(path.to_path_buf()));
        }

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;

        let mut refs = Vec::new();
        for record in reader.deserialize::<LocationRef>() {
            refs.push(record?);
        }

        let lookup = Self::from_refs(refs);
        info!(
            file = %path.display(),
            adapters = lookup.by_adapter.len(),
            locations = lookup.len(),
            "Location lookup loaded"
        );
        Ok(lookup)
    }

    pub fn from_refs(refs: impl IntoIterator<Item = LocationRef>) -> Self {
        let mut by_adapter: HashMap<String, Vec<i64>> = HashMap::new();
        for r in refs {
            by_adapter.entry(r.adapter_name).or_default().push(r.location_id);
        }
        Self { by_adapter }
    }

    /// Location ids for an adapter, in extract order. Empty if unknown.
    pub fn locations_for(&self, adapter_name: &str) -> &[i64] {
        self.by_adapter
            .get(adapter_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Total number of location ids
    pub fn len(&self) -> usize {
        self.by_adapter.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
