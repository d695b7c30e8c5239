//! Fan-out of freshness lookups across an adapter's locations
//!
//! Every location becomes a tokio task. A semaphore admits at most
//! `max_concurrent` of them at a time. Rows come back in completion order.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::catalog::Adapter;
use crate::fetcher::{FreshnessProbe, FreshnessRow};

pub struct FanOutCoordinator {
    probe: Arc<dyn FreshnessProbe>,
    max_concurrent: usize,
}

impl FanOutCoordinator {
    pub fn new(probe: Arc<dyn FreshnessProbe>, max_concurrent: usize) -> Self {
        Self {
            probe,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Probes every location id of `adapter`, one row per id.
    pub async fn check_adapter(&self, adapter: &Adapter, location_ids: &[i64]) -> Vec<FreshnessRow> {
        info!(
            adapter = %adapter.name,
            locations = location_ids.len(),
            max_concurrent = self.max_concurrent,
            "Checking last updates"
        );

        let adapter = Arc::new(adapter.clone());
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();

        for &location_id in location_ids {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!(adapter = %adapter.name, "Fan-out semaphore closed");
                    break;
                }
            };

            let probe = self.probe.clone();
            let adapter = adapter.clone();
            tasks.spawn(async move {
                let _permit = permit;
                probe.probe(&adapter, location_id).await
            });
        }

        let mut rows = Vec::with_capacity(location_ids.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(row) => rows.push(row),
                Err(e) => error!(adapter = %adapter.name, error = %e, "Freshness task failed"),
            }
        }

        let empty = rows.iter().filter(|r| r.last_update.is_empty()).count();
        info!(
            adapter = %adapter.name,
            rows = rows.len(),
            without_data = empty,
            "Last updates collected"
        );

        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Answers even ids with a date and odd ids with an empty row.
    struct FakeProbe {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl FakeProbe {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl FreshnessProbe for FakeProbe {
        async fn probe(&self, adapter: &Adapter, location_id: i64) -> FreshnessRow {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if location_id % 2 == 0 {
                FreshnessRow::new(
                    adapter.clone(),
                    location_id.to_string(),
                    format!("Site{}", location_id),
                    "2024-06-01",
                )
            } else {
                FreshnessRow::empty(adapter.clone())
            }
        }
    }

    #[tokio::test]
    async fn test_every_location_yields_a_row() {
        let probe = Arc::new(FakeProbe::new());
        let coordinator = FanOutCoordinator::new(probe, 4);
        let adapter = Adapter::new("Chile", "https://sinca.example", true);

        let ids: Vec<i64> = (1..=9).collect();
        let rows = coordinator.check_adapter(&adapter, &ids).await;

        assert_eq!(rows.len(), 9);
        assert_eq!(rows.iter().filter(|r| r.last_update.is_empty()).count(), 5);

        let mut ids_seen: Vec<String> = rows
            .iter()
            .filter(|r| !r.location_id.is_empty())
            .map(|r| r.location_id.clone())
            .collect();
        ids_seen.sort();
        assert_eq!(ids_seen, vec!["2", "4", "6", "8"]);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let probe = Arc::new(FakeProbe::new());
        let coordinator = FanOutCoordinator::new(probe.clone(), 3);
        let adapter = Adapter::new("Chile", "https://sinca.example", true);

        let ids: Vec<i64> = (0..30).collect();
        let rows = coordinator.check_adapter(&adapter, &ids).await;

        assert_eq!(rows.len(), 30);
        assert!(probe.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_no_locations() {
        let coordinator = FanOutCoordinator::new(Arc::new(FakeProbe::new()), 2);
        let adapter = Adapter::new("Chile", "https://sinca.example", true);

        assert!(coordinator.check_adapter(&adapter, &[]).await.is_empty());
    }
}
