//! Freshness check orchestration
//!
//! One run:
//! - loads the adapter catalog, location lookup and skip list
//! - checks adapters one after another, fanning out per location
//! - appends each adapter's stale and fresh rows to the ledgers
//! - reconciles the accumulated stale rows into the stale ledger

use chrono::{Local, NaiveDate};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::catalog::{load_adapters, Adapter};
use crate::classifier::apply_rules;
use crate::config::Config;
use crate::error::Result;
use crate::fanout::FanOutCoordinator;
use crate::fetcher::{FreshnessFetcher, FreshnessProbe};
use crate::http_client::{HttpClientConfig, ResilientHttpClient};
use crate::ledger::{to_ledger_rows, Ledger};
use crate::lookup::LocationLookup;
use crate::reconcile::{reconcile, ReconcileReport};
use crate::skiplist::SkipList;

/// Totals for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub adapters_checked: usize,
    pub adapters_skipped: usize,
    pub adapters_without_locations: usize,
    pub locations_checked: usize,
    pub stale_rows: usize,
    pub fresh_rows: usize,
    pub reconcile: ReconcileReport,
}

/// The three ledgers a run touches
#[derive(Debug, Clone)]
pub struct LedgerSet {
    /// Stale rows from every run, before reconciliation
    pub stale_accumulator: Ledger,
    /// Reconciled stale ledger
    pub stale: Ledger,
    pub fresh: Ledger,
}

impl LedgerSet {
    pub fn from_config(config: &Config) -> Self {
        Self {
            stale_accumulator: Ledger::new(config.outdate_accumulator_file()),
            stale: Ledger::new(&config.outdate_file),
            fresh: Ledger::new(&config.update_file),
        }
    }
}

/// Keeps adapters matching `only_source` (when given) that are not skipped.
///
/// Returns the selection and how many adapters the skip list removed.
pub fn select_adapters(
    adapters: Vec<Adapter>,
    only_source: Option<&str>,
    skip: &SkipList,
) -> (Vec<Adapter>, usize) {
    let mut skipped = 0;
    let selected = adapters
        .into_iter()
        .filter(|a| only_source.map_or(true, |name| a.name == name))
        .filter(|a| {
            if skip.contains(&a.name) {
                debug!(adapter = %a.name, "Adapter on skip list");
                skipped += 1;
                false
            } else {
                true
            }
        })
        .collect();
    (selected, skipped)
}

pub struct FreshnessChecker {
    config: Config,
    run_id: String,
    fanout: FanOutCoordinator,
    skip: SkipList,
    ledgers: LedgerSet,
}

impl FreshnessChecker {
    /// Builds a checker that queries the configured measurements API
    #[instrument(skip(config), fields(run_id = %run_id))]
    pub fn new(config: Config, run_id: String) -> Result<Self> {
        let http_client = Arc::new(ResilientHttpClient::new(HttpClientConfig::from_config(&config)?)?);
        let fetcher: Arc<dyn FreshnessProbe> =
            Arc::new(FreshnessFetcher::new(http_client, config.api_url.clone()));
        let skip = SkipList::from_config(&config)?;

        info!(
            api_url = %config.api_url,
            max_concurrent = config.max_concurrent_requests,
            skipped_adapters = skip.len(),
            "Freshness checker initialized"
        );

        Ok(Self::with_probe(config, run_id, fetcher, skip))
    }

    /// Builds a checker around any probe
    pub fn with_probe(
        config: Config,
        run_id: String,
        probe: Arc<dyn FreshnessProbe>,
        skip: SkipList,
    ) -> Self {
        let fanout = FanOutCoordinator::new(probe, config.max_concurrent_requests);
        let ledgers = LedgerSet::from_config(&config);
        Self {
            config,
            run_id,
            fanout,
            skip,
            ledgers,
        }
    }

    pub fn ledgers(&self) -> &LedgerSet {
        &self.ledgers
    }

    /// Runs a full check against today's local date
    pub async fn run(&self, only_source: Option<&str>) -> Result<RunSummary> {
        self.run_on(Local::now().date_naive(), only_source).await
    }

    /// Runs a full check with `today` as the reference date
    #[instrument(skip(self), fields(run_id = %self.run_id))]
    pub async fn run_on(&self, today: NaiveDate, only_source: Option<&str>) -> Result<RunSummary> {
        let lookup = LocationLookup::load(&self.config.adapters_ids_file)?;
        let adapters = load_adapters(&self.config.source_folder).await?;

        let (adapters, skipped) = select_adapters(adapters, only_source, &self.skip);
        if let Some(name) = only_source {
            if adapters.is_empty() {
                warn!(source = %name, "No active, unskipped adapter with this name");
            }
        }

        let mut summary = RunSummary {
            adapters_skipped: skipped,
            ..Default::default()
        };

        info!(
            adapters = adapters.len(),
            skipped,
            days_ago = self.config.days_ago,
            today = %today,
            "Starting freshness check"
        );

        // Both ledgers must exist for reconciliation even if nothing is checked.
        self.ledgers.stale_accumulator.append(&[])?;
        self.ledgers.fresh.append(&[])?;

        for adapter in &adapters {
            let location_ids = lookup.locations_for(&adapter.name);
            let rows = self.fanout.check_adapter(adapter, location_ids).await;
            if rows.is_empty() {
                debug!(adapter = %adapter.name, "No locations to check");
                summary.adapters_without_locations += 1;
                continue;
            }

            summary.adapters_checked += 1;
            summary.locations_checked += rows.len();

            let classified = apply_rules(self.config.days_ago, rows, today);
            let stale = to_ledger_rows(&classified.stale);
            let fresh = to_ledger_rows(&classified.fresh);

            summary.stale_rows += self.ledgers.stale_accumulator.append(&stale)?;
            summary.fresh_rows += self.ledgers.fresh.append(&fresh)?;

            info!(
                adapter = %adapter.name,
                stale = stale.len(),
                fresh = fresh.len(),
                "Adapter classified"
            );
        }

        summary.reconcile = self.reconcile()?;

        info!(
            adapters_checked = summary.adapters_checked,
            adapters_skipped = summary.adapters_skipped,
            locations_checked = summary.locations_checked,
            stale_rows = summary.stale_rows,
            fresh_rows = summary.fresh_rows,
            stale_ledger_rows = summary.reconcile.rows_kept,
            "Freshness check completed"
        );

        Ok(summary)
    }

    /// Reconciles the accumulated stale rows into the stale ledger
    pub fn reconcile(&self) -> Result<ReconcileReport> {
        reconcile(
            &self.ledgers.stale_accumulator,
            &self.ledgers.stale,
            &self.ledgers.fresh,
            &self.skip,
        )
    }
}
