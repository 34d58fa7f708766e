//! SQLx-backed repositories.
//!
//! Responsible only for persistence and row mapping. List queries skip rows
//! that fail to map instead of failing the whole read.

mod alerts;
mod rules;
mod symbols;
mod users;
mod watchlist;

pub use alerts::SqlxAlertHistoryRepository;
pub use rules::SqlxRuleRepository;
pub use symbols::SqlxSymbolRepository;
pub use users::SqlxUserRepository;
pub use watchlist::SqlxWatchlistRepository;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;

/* =========================
Conversions
========================= */

pub(crate) fn ms_to_utc(ms: i64) -> anyhow::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| anyhow!("timestamp out of range: {ms}"))
}

pub(crate) fn duration_ms(d: std::time::Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

/// Maps every row, logging and dropping the ones that fail.
pub(crate) fn map_rows<T>(
    rows: Vec<SqliteRow>,
    what: &'static str,
    f: impl Fn(&SqliteRow) -> anyhow::Result<T>,
) -> Vec<T> {
    let mut out = Vec::with_capacity(rows.len());
    for r in &rows {
        match f(r) {
            Ok(v) => out.push(v),
            Err(e) => {
                tracing::warn!(error = %e, table = what, "skipping malformed row");
            }
        }
    }
    out
}
