//! The `FactStore` trait and supporting query types.
//!
//! The trait is the fact repository contract, implemented by storage backends
//! (e.g. `tagbook-store-sqlite`). Higher layers (`tagbook-api`) depend on this
//! abstraction, not on any concrete backend.

use std::{collections::BTreeSet, future::Future};

use chrono::{DateTime, Days, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Warning,
  fact::{Fact, FactId, FactPatch, FormEntry, Reading, start_of_day},
};

// ─── Time windows ────────────────────────────────────────────────────────────

/// A half-open interval `[start, end)` of timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
  pub start: DateTime<Utc>,
  pub end:   DateTime<Utc>,
}

impl TimeWindow {
  pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self { Self { start, end } }

  /// Whole calendar days from `start` through `end`, both inclusive.
  pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Self {
    let after_end = end.checked_add_days(Days::new(1)).unwrap_or(end);
    Self { start: start_of_day(start), end: start_of_day(after_end) }
  }

  /// The two disjoint windows compared by the day-over-day calculation:
  /// `recent = [now - 1d, now)` and `prior = [now - 2d, now - 1d)`.
  pub fn day_over_day(now: DateTime<Utc>) -> (Self, Self) {
    let day = TimeDelta::days(1);
    let yesterday = now - day;
    let two_days_ago = yesterday - day;
    (Self::new(yesterday, now), Self::new(two_days_ago, yesterday))
  }

  pub fn contains(&self, at: DateTime<Utc>) -> bool {
    self.start <= at && at < self.end
  }
}

// ─── Write results ───────────────────────────────────────────────────────────

/// The result of [`FactStore::insert_facts`]: what was written, plus the
/// values that were dropped before the write.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InsertOutcome {
  pub facts:    Vec<Fact>,
  pub warnings: Vec<Warning>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a tagbook fact store backend.
///
/// Every method is one unit of work: a write either commits its whole batch or
/// none of it. There is no transactional scope across calls, and concurrent
/// writers to the same `id` resolve as last-write-wins.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait FactStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Classify `entries` by value kind and insert them as one batch, all
  /// stamped with `at`.
  ///
  /// Unsupported values are dropped and reported in
  /// [`InsertOutcome::warnings`]; this is the only partial-success path. If
  /// nothing is left after classification the store is not contacted.
  fn insert_facts(
    &self,
    entries: Vec<FormEntry>,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<InsertOutcome, Self::Error>> + Send + '_;

  /// Every stored fact, most recent first.
  fn list_facts(
    &self,
  ) -> impl Future<Output = Result<Vec<Fact>, Self::Error>> + Send + '_;

  /// Numeric facts for `tags` with timestamps inside `window`, oldest first.
  ///
  /// Facts without a `num_value` are excluded. An empty `tags` set returns
  /// nothing without issuing a query.
  fn query_range<'a>(
    &'a self,
    tags: &'a BTreeSet<String>,
    window: TimeWindow,
  ) -> impl Future<Output = Result<Vec<Reading>, Self::Error>> + Send + 'a;

  /// Distinct tag names not containing any of the `exclude` substrings,
  /// sorted ascending.
  fn list_distinct_tags<'a>(
    &'a self,
    exclude: &'a [String],
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'a;

  /// Apply `patches` as one batch and return the number of rows changed.
  /// Patches for ids that do not exist change nothing.
  fn update_facts(
    &self,
    patches: Vec<FactPatch>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Delete every fact whose id is in `ids` and return the number removed.
  /// Unknown ids are ignored.
  fn delete_facts(
    &self,
    ids: BTreeSet<FactId>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn from_dates_covers_the_whole_end_day() {
    let d = |day| NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
    let window = TimeWindow::from_dates(d(1), d(2));

    assert!(window.contains(start_of_day(d(1))));
    assert!(window.contains(start_of_day(d(2)) + TimeDelta::hours(23)));
    assert!(!window.contains(start_of_day(d(3))));
  }

  #[test]
  fn day_over_day_windows_are_disjoint() {
    let now = start_of_day(NaiveDate::from_ymd_opt(2024, 3, 3).unwrap());
    let (recent, prior) = TimeWindow::day_over_day(now);

    assert_eq!(recent.start, prior.end);
    assert!(!prior.contains(recent.start));
    assert!(recent.contains(recent.start));
    assert_eq!(prior.start, now - TimeDelta::days(2));
  }
}
