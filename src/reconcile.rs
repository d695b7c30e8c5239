//! Reconciliation of the stale ledger
//!
//! An adapter that was fresh in any recorded run, or that is on the skip
//! list, no longer belongs in the stale ledger.

use std::collections::HashSet;
use tracing::info;

use crate::error::Result;
use crate::ledger::{Ledger, LedgerRow};
use crate::skiplist::SkipList;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub rows_read: usize,
    pub rows_kept: usize,
    pub rows_removed: usize,
}

/// Keeps stale rows whose adapter is neither in `fresh_rows` nor skipped
pub fn filter_stale(stale_rows: Vec<LedgerRow>, fresh_rows: &[LedgerRow], skip: &SkipList) -> Vec<LedgerRow> {
    let fresh_adapters: HashSet<&str> = fresh_rows.iter().map(|r| r.name.as_str()).collect();

    stale_rows
        .into_iter()
        .filter(|row| !fresh_adapters.contains(row.name.as_str()) && !skip.contains(&row.name))
        .collect()
}

/// Reads `stale_input` and `fresh` in full and writes the filtered stale
/// rows to `stale_output`, replacing it. Input and output may be the same
/// ledger. Both inputs must exist.
pub fn reconcile(
    stale_input: &Ledger,
    stale_output: &Ledger,
    fresh: &Ledger,
    skip: &SkipList,
) -> Result<ReconcileReport> {
    let stale_rows = stale_input.read_all()?;
    let fresh_rows = fresh.read_all()?;
    let rows_read = stale_rows.len();

    let kept = filter_stale(stale_rows, &fresh_rows, skip);
    stale_output.replace(&kept)?;

    let report = ReconcileReport {
        rows_read,
        rows_kept: kept.len(),
        rows_removed: rows_read - kept.len(),
    };

    info!(
        stale_input = %stale_input.path().display(),
        stale_output = %stale_output.path().display(),
        fresh = %fresh.path().display(),
        skipped_adapters = skip.len(),
        rows_read = report.rows_read,
        rows_kept = report.rows_kept,
        rows_removed = report.rows_removed,
        "Stale ledger reconciled"
    );

    Ok(report)
}
