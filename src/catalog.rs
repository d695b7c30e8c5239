//! Adapter catalog
//!
//! Adapter definitions live in a directory of JSON files, each holding an
//! array of adapter objects. Only active adapters are returned.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::error::{FreshnessError, Result};

/// A data-source integration as declared in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adapter {
    pub name: String,
    pub url: String,
    pub active: bool,
    /// Any other metadata carried by the definition
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Adapter {
    pub fn new(name: impl Into<String>, url: impl Into<String>, active: bool) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            active,
            extra: serde_json::Map::new(),
        }
    }
}

/// Loads every active adapter from `*.json` files in `dir`.
///
/// Files are read in name order and each file's adapters are placed in
/// front of those already loaded. Adapters sharing a name are all kept.
/// Any unreadable or malformed file fails the whole load.
pub async fn load_adapters(dir: &Path) -> Result<Vec<Adapter>> {
    let files = catalog_files(dir).await?;
    let mut adapters: Vec<Adapter> = Vec::new();

    for path in &files {
        let content = fs::read_to_string(path).await.map_err(|e| FreshnessError::CatalogError {
            path: path.clone(),
            message: e.to_string(),
        })?;

        let parsed: Vec<Adapter> =
            serde_json::from_str(&content).map_err(|e| FreshnessError::CatalogError {
                path: path.clone(),
                message: e.to_string(),
            })?;

        let mut active: Vec<Adapter> = parsed.into_iter().filter(|a| a.active).collect();
        debug!(file = %path.display(), active = active.len(), "Loaded catalog file");

        active.append(&mut adapters);
        adapters = active;
    }

    info!(
        dir = %dir.display(),
        files = files.len(),
        adapters = adapters.len(),
        "Adapter catalog loaded"
    );

    Ok(adapters)
}

async fn catalog_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir).await.map_err(|e| FreshnessError::CatalogError {
        path: dir.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
