//! Freshness fetcher
//!
//! Looks up the latest measurement for one location of one adapter. A
//! location that cannot be checked yields a row with empty freshness
//! fields instead of an error, so one bad location never stops a run.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::catalog::Adapter;
use crate::config::ID_PLACEHOLDER;
use crate::error::Result;
use crate::http_client::ResilientHttpClient;
use crate::ledger::is_iso_date;

/// Keys set by the fetcher; they replace same-named adapter metadata.
const FRESHNESS_KEYS: [&str; 3] = ["locationId", "location", "last_update"];

/// Adapter fields plus the freshness of one of its locations.
///
/// Empty strings mean the lookup failed or returned nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct FreshnessRow {
    pub adapter: Adapter,
    pub location_id: String,
    pub location: String,
    /// `YYYY-MM-DD`
    pub last_update: String,
}

impl FreshnessRow {
    pub fn new(
        mut adapter: Adapter,
        location_id: impl Into<String>,
        location: impl Into<String>,
        last_update: impl Into<String>,
    ) -> Self {
        for key in FRESHNESS_KEYS {
            adapter.extra.remove(key);
        }
        Self {
            adapter,
            location_id: location_id.into(),
            location: location.into(),
            last_update: last_update.into(),
        }
    }

    /// Row for a location whose lookup failed or returned no results
    pub fn empty(adapter: Adapter) -> Self {
        Self::new(adapter, "", "", "")
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter.name
    }
}

/// Source of per-location freshness rows
#[async_trait]
pub trait FreshnessProbe: Send + Sync {
    /// Never fails: problems are logged and produce an empty row
    async fn probe(&self, adapter: &Adapter, location_id: i64) -> FreshnessRow;
}

#[derive(Debug, Deserialize)]
struct MeasurementsResponse {
    #[serde(default)]
    results: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Measurement {
    location_id: serde_json::Value,
    location: String,
    date: MeasurementDate,
}

#[derive(Debug, Deserialize)]
struct MeasurementDate {
    utc: String,
}

/// Latest measurement details for a location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestMeasurement {
    pub location_id: String,
    pub location: String,
    pub last_update: String,
}

impl Measurement {
    /// A `utc` whose date part is not `YYYY-MM-DD` leaves `last_update`
    /// empty, so the location is classified stale.
    fn into_latest(self) -> LatestMeasurement {
        let location_id = match self.location_id {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        };
        let date_part = self.date.utc.split('T').next().unwrap_or_default();
        let last_update = if is_iso_date(date_part) {
            date_part.to_string()
        } else {
            warn!(
                location_id = %location_id,
                utc = %self.date.utc,
                "Unrecognised measurement date, treating location as stale"
            );
            String::new()
        };

        LatestMeasurement {
            location_id,
            location: self.location,
            last_update,
        }
    }
}

/// Measurements API client for freshness lookups
pub struct FreshnessFetcher {
    client: Arc<ResilientHttpClient>,
    api_url: String,
}

impl FreshnessFetcher {
    /// `api_url` must contain the `{id}` placeholder
    pub fn new(client: Arc<ResilientHttpClient>, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }

    pub fn request_url(&self, location_id: i64) -> String {
        self.api_url.replace(ID_PLACEHOLDER, &location_id.to_string())
    }

    /// Fetches the newest measurement, `None` when the API has none.
    pub async fn fetch_latest(&self, location_id: i64) -> Result<Option<LatestMeasurement>> {
        let url = self.request_url(location_id);
        let response = self.client.get(&url).await?;

        if response.status() != StatusCode::OK {
            debug!(url = %url, status = %response.status(), "Unexpected status, ignoring body");
            return Ok(None);
        }

        let body: MeasurementsResponse = response.json().await?;
        match body.results.into_iter().next() {
            Some(first) => {
                let measurement: Measurement = serde_json::from_value(first)?;
                Ok(Some(measurement.into_latest()))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl FreshnessProbe for FreshnessFetcher {
    async fn probe(&self, adapter: &Adapter, location_id: i64) -> FreshnessRow {
        match self.fetch_latest(location_id).await {
            Ok(Some(latest)) => FreshnessRow::new(
                adapter.clone(),
                latest.location_id,
                latest.location,
                latest.last_update,
            ),
            Ok(None) => {
                debug!(adapter = %adapter.name, location_id, "No measurements returned");
                FreshnessRow::empty(adapter.clone())
            }
            Err(e) => {
                warn!(
                    adapter = %adapter.name,
                    location_id,
                    error = %e,
                    "Freshness lookup failed"
                );
                FreshnessRow::empty(adapter.clone())
            }
        }
    }
}
