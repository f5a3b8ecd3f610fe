//! The read-side report: pivot table plus per-tag extremes and means.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
  Warning,
  fact::Reading,
  pivot::{Aggregate, Occurrence, PivotTable},
  store::{FactStore, TimeWindow},
};

/// Everything shown for one tag/date selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
  pub pivot:    PivotTable,
  pub min:      Vec<Occurrence>,
  pub max:      Vec<Occurrence>,
  pub mean:     BTreeMap<String, f64>,
  pub warnings: Vec<Warning>,
}

impl Report {
  /// Derive a report from already-fetched readings. `tags` fixes the order
  /// of the min/max listings.
  pub fn from_readings(readings: &[Reading], tags: &[String]) -> Self {
    if readings.is_empty() {
      return Self { warnings: vec![Warning::NoData], ..Self::default() };
    }
    let pivot = PivotTable::from_readings(readings);
    Self {
      min: pivot.aggregate_occurrences(tags, Aggregate::Min),
      max: pivot.aggregate_occurrences(tags, Aggregate::Max),
      mean: pivot.column_means(),
      pivot,
      warnings: Vec::new(),
    }
  }

  /// Query `store` for `tags` within `window` and build the report. An empty
  /// tag selection short-circuits without contacting the store.
  pub async fn load<S: FactStore>(
    store: &S,
    tags: &BTreeSet<String>,
    window: TimeWindow,
  ) -> Result<Self, S::Error> {
    if tags.is_empty() {
      return Ok(Self {
        warnings: vec![Warning::EmptySelection { what: "tag selection".into() }],
        ..Self::default()
      });
    }
    let readings = store.query_range(tags, window).await?;
    let order: Vec<String> = tags.iter().cloned().collect();
    Ok(Self::from_readings(&readings, &order))
  }
}
