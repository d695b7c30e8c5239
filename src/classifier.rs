//! Stale / fresh classification of one adapter's rows

use chrono::{Days, NaiveDate};
use std::collections::HashSet;
use tracing::debug;

use crate::fetcher::FreshnessRow;

/// Outcome of classifying one adapter run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub stale: Vec<FreshnessRow>,
    pub fresh: Vec<FreshnessRow>,
}

/// `today - days_ago` as `YYYY-MM-DD`, clamped to the earliest
/// representable date.
pub fn date_limit(today: NaiveDate, days_ago: u32) -> String {
    today
        .checked_sub_days(Days::new(u64::from(days_ago)))
        .unwrap_or(NaiveDate::MIN)
        .format("%Y-%m-%d")
        .to_string()
}

/// Splits rows into stale and fresh against `today - days_ago`.
///
/// Dates are compared as plain `YYYY-MM-DD` strings, so the limit date
/// itself is fresh and an empty `last_update` is always stale. A stale row
/// is dropped when a fresh row of the same run shares its location name.
pub fn apply_rules(days_ago: u32, rows: Vec<FreshnessRow>, today: NaiveDate) -> Classification {
    let limit = date_limit(today, days_ago);

    let (fresh, stale): (Vec<_>, Vec<_>) = rows
        .into_iter()
        .partition(|row| row.last_update.as_str() >= limit.as_str());

    let fresh_locations: HashSet<&str> = fresh.iter().map(|r| r.location.as_str()).collect();
    let before = stale.len();
    let stale: Vec<FreshnessRow> = stale
        .into_iter()
        .filter(|row| !fresh_locations.contains(row.location.as_str()))
        .collect();

    debug!(
        date_limit = %limit,
        fresh = fresh.len(),
        stale = stale.len(),
        covered_by_fresh = before - stale.len(),
        "Rows classified"
    );

    Classification { stale, fresh }
}
