//! Pivot/aggregate engine.
//!
//! Reshapes long `(timestamp, tag_name, num_value)` readings into a wide table
//! with one row per calendar date and one column per tag, then derives per-tag
//! extremes and means from it.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::fact::Reading;

/// Name of the date column in the wide record form.
pub const TIMESTAMP_COLUMN: &str = "timestamp";

// ─── Table ───────────────────────────────────────────────────────────────────

/// One pivot row: a date and one cell per tag column (`None` = no data).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotRow {
  pub timestamp: NaiveDate,
  pub cells:     Vec<Option<i64>>,
}

/// Readings reshaped to one row per date and one column per tag.
///
/// Rows are sorted by date and columns by tag name, so the table does not
/// depend on the order of its input. Serialises as `{"columns": [...],
/// "rows": [...]}` where every row is a flat record keyed by
/// [`TIMESTAMP_COLUMN`] and the tag names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WideTable", try_from = "WideTable")]
pub struct PivotTable {
  tags: Vec<String>,
  rows: Vec<PivotRow>,
}

impl PivotTable {
  /// Pivot `readings`, truncating timestamps to the date. Several readings
  /// for the same tag on the same date are summed.
  pub fn from_readings(readings: &[Reading]) -> Self {
    let mut grid: BTreeMap<NaiveDate, BTreeMap<&str, i64>> = BTreeMap::new();
    let mut tags: BTreeSet<&str> = BTreeSet::new();

    for reading in readings {
      tags.insert(&reading.tag_name);
      let cell = grid
        .entry(reading.timestamp.date_naive())
        .or_default()
        .entry(&reading.tag_name)
        .or_insert(0);
      *cell = cell.saturating_add(reading.num_value);
    }

    let rows = grid
      .into_iter()
      .map(|(timestamp, by_tag)| PivotRow {
        timestamp,
        cells: tags.iter().map(|t| by_tag.get(t).copied()).collect(),
      })
      .collect();

    Self { tags: tags.into_iter().map(str::to_owned).collect(), rows }
  }

  pub fn is_empty(&self) -> bool { self.rows.is_empty() }

  /// Tag columns, sorted ascending (the date column is not included).
  pub fn tags(&self) -> &[String] { &self.tags }

  pub fn rows(&self) -> &[PivotRow] { &self.rows }

  /// All column names, date column first.
  pub fn columns(&self) -> Vec<String> {
    std::iter::once(TIMESTAMP_COLUMN.to_owned())
      .chain(self.tags.iter().cloned())
      .collect()
  }

  /// `(date, cell)` pairs of one tag column, or `None` if the tag is not a
  /// column of this table.
  pub fn column(
    &self,
    tag: &str,
  ) -> Option<impl Iterator<Item = (NaiveDate, Option<i64>)> + '_> {
    let idx = self.tags.iter().position(|t| t == tag)?;
    Some(self.rows.iter().map(move |r| (r.timestamp, r.cells[idx])))
  }

  /// For each tag in `tags`, every row whose value equals the column's
  /// minimum or maximum. Ties are all returned; tags that are not columns
  /// are skipped.
  pub fn aggregate_occurrences(
    &self,
    tags: &[String],
    aggregate: Aggregate,
  ) -> Vec<Occurrence> {
    let mut out = Vec::new();
    for tag in tags {
      let Some(column) = self.column(tag) else { continue };
      let values: Vec<(NaiveDate, i64)> =
        column.filter_map(|(d, v)| v.map(|v| (d, v))).collect();

      let extreme = match aggregate {
        Aggregate::Min => values.iter().map(|(_, v)| *v).min(),
        Aggregate::Max => values.iter().map(|(_, v)| *v).max(),
      };
      let Some(extreme) = extreme else { continue };

      out.extend(values.into_iter().filter(|(_, v)| *v == extreme).map(
        |(timestamp, value)| Occurrence { timestamp, tag_name: tag.clone(), value },
      ));
    }
    out
  }

  /// Arithmetic mean of the non-empty cells of every column.
  pub fn column_means(&self) -> BTreeMap<String, f64> {
    self
      .tags
      .iter()
      .enumerate()
      .filter_map(|(idx, tag)| {
        let values: Vec<i64> = self.rows.iter().filter_map(|r| r.cells[idx]).collect();
        if values.is_empty() {
          return None;
        }
        let sum: f64 = values.iter().map(|v| *v as f64).sum();
        Some((tag.clone(), sum / values.len() as f64))
      })
      .collect()
  }

  /// The table as flat records, the date under [`TIMESTAMP_COLUMN`].
  /// Chart renderers address columns by name in this form.
  pub fn records(&self) -> Vec<Map<String, Value>> {
    self
      .rows
      .iter()
      .map(|row| {
        let mut record = Map::new();
        record.insert(TIMESTAMP_COLUMN.into(), Value::String(row.timestamp.to_string()));
        for (tag, cell) in self.tags.iter().zip(&row.cells) {
          record.insert(tag.clone(), cell.map_or(Value::Null, Value::from));
        }
        record
      })
      .collect()
  }
}

// ─── Aggregates ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
  Min,
  Max,
}

/// A date at which a tag column reached its aggregate value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
  pub timestamp: NaiveDate,
  pub tag_name:  String,
  pub value:     i64,
}

// ─── Wire form ───────────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct WideTable {
  columns: Vec<String>,
  rows:    Vec<Map<String, Value>>,
}

impl From<PivotTable> for WideTable {
  fn from(table: PivotTable) -> Self {
    Self { columns: table.columns(), rows: table.records() }
  }
}

impl TryFrom<WideTable> for PivotTable {
  type Error = String;

  fn try_from(wide: WideTable) -> Result<Self, Self::Error> {
    let tags: Vec<String> = wide
      .columns
      .into_iter()
      .filter(|c| c != TIMESTAMP_COLUMN)
      .collect();

    let rows = wide
      .rows
      .into_iter()
      .map(|record| {
        let timestamp = record
          .get(TIMESTAMP_COLUMN)
          .and_then(Value::as_str)
          .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
          .ok_or_else(|| format!("row without a valid {TIMESTAMP_COLUMN:?} column"))?;
        let cells = tags
          .iter()
          .map(|t| record.get(t).and_then(Value::as_i64))
          .collect();
        Ok(PivotRow { timestamp, cells })
      })
      .collect::<Result<_, String>>()?;

    Ok(Self { tags, rows })
  }
}

#[cfg(test)]
mod tests {
  use chrono::{DateTime, TimeDelta, Utc};

  use super::*;
  use crate::fact::start_of_day;

  fn day(d: u32) -> DateTime<Utc> {
    start_of_day(NaiveDate::from_ymd_opt(2024, 3, d).unwrap())
  }

  fn date(d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(2024, 3, d).unwrap() }

  fn sample() -> Vec<Reading> {
    vec![
      Reading::new(day(1), "E1", 10),
      Reading::new(day(1), "E2", 4),
      Reading::new(day(2), "E1", 7),
      Reading::new(day(3), "E1", 10),
      Reading::new(day(3) + TimeDelta::hours(9), "E2", 6),
    ]
  }

  #[test]
  fn pivot_groups_by_date_and_tag() {
    let table = PivotTable::from_readings(&sample());

    assert_eq!(table.tags(), ["E1", "E2"]);
    assert_eq!(table.rows().len(), 3);
    assert_eq!(table.rows()[1], PivotRow { timestamp: date(2), cells: vec![Some(7), None] });
    assert_eq!(table.rows()[2].cells, vec![Some(10), Some(6)]);
  }

  #[test]
  fn pivot_sums_duplicate_tag_and_date() {
    let table = PivotTable::from_readings(&[
      Reading::new(day(1), "E1", 3),
      Reading::new(day(1) + TimeDelta::hours(5), "E1", 4),
    ]);
    assert_eq!(table.rows()[0].cells, vec![Some(7)]);
  }

  #[test]
  fn pivot_ignores_input_order() {
    let mut shuffled = sample();
    shuffled.reverse();
    shuffled.swap(0, 3);
    assert_eq!(PivotTable::from_readings(&sample()), PivotTable::from_readings(&shuffled));
  }

  #[test]
  fn empty_readings_give_empty_table() {
    let table = PivotTable::from_readings(&[]);
    assert!(table.is_empty());
    assert!(table.column_means().is_empty());
    assert_eq!(table.columns(), ["timestamp"]);
  }

  #[test]
  fn min_and_max_keep_every_tie() {
    let table = PivotTable::from_readings(&sample());
    let tags = vec!["E1".to_owned(), "E2".to_owned()];

    let max = table.aggregate_occurrences(&tags, Aggregate::Max);
    assert_eq!(max, vec![
      Occurrence { timestamp: date(1), tag_name: "E1".into(), value: 10 },
      Occurrence { timestamp: date(3), tag_name: "E1".into(), value: 10 },
      Occurrence { timestamp: date(3), tag_name: "E2".into(), value: 6 },
    ]);

    let min = table.aggregate_occurrences(&tags, Aggregate::Min);
    assert_eq!(min.len(), 2);
    assert_eq!(min[0].value, 7);
    assert_eq!(min[1], Occurrence { timestamp: date(1), tag_name: "E2".into(), value: 4 });
  }

  #[test]
  fn aggregate_skips_unknown_tags() {
    let table = PivotTable::from_readings(&sample());
    assert!(table.aggregate_occurrences(&["E9".to_owned()], Aggregate::Min).is_empty());
  }

  #[test]
  fn means_ignore_empty_cells() {
    let means = PivotTable::from_readings(&sample()).column_means();
    assert_eq!(means["E1"], 9.0);
    assert_eq!(means["E2"], 5.0);
  }

  #[test]
  fn wide_form_exposes_timestamp_as_a_column() {
    let table = PivotTable::from_readings(&sample());
    let json = serde_json::to_value(&table).unwrap();

    assert_eq!(json["columns"], serde_json::json!(["timestamp", "E1", "E2"]));
    assert_eq!(json["rows"][1], serde_json::json!({ "timestamp": "2024-03-02", "E1": 7, "E2": null }));

    let back: PivotTable = serde_json::from_value(json).unwrap();
    assert_eq!(back, table);
  }
}
