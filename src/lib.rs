//! Adapter freshness checker
//!
//! Checks every active adapter's locations against the measurements API,
//! classifies them as fresh or stale and keeps CSV ledgers of both.
//!
//! Features:
//! - Adapter catalog loading from JSON definition files
//! - Bounded concurrent lookups per adapter
//! - Stale/fresh classification with same-site reconciliation
//! - Append-only ledgers with a reconciliation pass
//! - Skip list of retired or already reviewed adapters

pub mod catalog;
pub mod checker;
pub mod classifier;
pub mod config;
pub mod error;
pub mod fanout;
pub mod fetcher;
pub mod http_client;
pub mod ledger;
pub mod lookup;
pub mod reconcile;
pub mod skiplist;

pub use checker::{FreshnessChecker, RunSummary};
pub use config::Config;
pub use error::{FreshnessError, Result};
