//! Encoding and decoding helpers between tagbook domain types and the plain
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings with microsecond
//! precision, so lexical order in SQL matches chronological order.

use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use rusqlite::types::Value;
use tagbook_core::fact::{
  Fact, FactId, FactPatch, FieldUpdate, Reading, STORABLE_YEARS, is_storable,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// Encoded bounds of the storable span, used to clamp query windows.
const FIRST_STORABLE: &str = "0000-01-01T00:00:00.000000Z";
const LAST_STORABLE: &str = "9999-12-31T23:59:59.999999Z";

fn format_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Encode a timestamp for writing. Years outside `0000..=9999` are refused
/// because they would not decode again.
pub fn encode_dt(dt: DateTime<Utc>) -> Result<String> {
  if !is_storable(dt) {
    return Err(Error::TimestampOutOfRange(dt));
  }
  Ok(format_dt(dt))
}

/// Encode a query bound, clamped to the storable span.
pub fn encode_bound(dt: DateTime<Utc>) -> String {
  match dt.year() {
    y if y < *STORABLE_YEARS.start() => FIRST_STORABLE.to_owned(),
    y if y > *STORABLE_YEARS.end() => LAST_STORABLE.to_owned(),
    _ => format_dt(dt),
  }
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Patches ─────────────────────────────────────────────────────────────────

fn text_value(update: &FieldUpdate<String>) -> Option<Value> {
  match update {
    FieldUpdate::Unchanged => None,
    FieldUpdate::Null => Some(Value::Null),
    FieldUpdate::Set(s) => Some(Value::Text(s.clone())),
  }
}

fn integer_value(update: &FieldUpdate<i64>) -> Option<Value> {
  match update {
    FieldUpdate::Unchanged => None,
    FieldUpdate::Null => Some(Value::Null),
    FieldUpdate::Set(n) => Some(Value::Integer(*n)),
  }
}

/// The `SET` assignments of a patch as `(column, value)` pairs.
pub fn encode_patch(patch: &FactPatch) -> Result<(FactId, Vec<(&'static str, Value)>)> {
  let mut sets = Vec::with_capacity(4);
  if let Some(v) = text_value(&patch.tag_name) {
    sets.push(("tag_name", v));
  }
  if let Some(v) = integer_value(&patch.num_value) {
    sets.push(("num_value", v));
  }
  if let Some(v) = text_value(&patch.str_value) {
    sets.push(("str_value", v));
  }
  if let Some(ts) = patch.timestamp {
    sets.push(("timestamp", Value::Text(encode_dt(ts)?)));
  }
  Ok((patch.id, sets))
}

/// `?, ?, ...` with `n` placeholders.
pub fn placeholders(n: usize) -> String { vec!["?"; n].join(", ") }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `facts` row.
pub struct RawFact {
  pub id:        i64,
  pub tag_name:  String,
  pub num_value: Option<i64>,
  pub str_value: Option<String>,
  pub timestamp: String,
}

impl RawFact {
  pub fn into_fact(self) -> Result<Fact> {
    Ok(Fact {
      id:        self.id,
      tag_name:  self.tag_name,
      num_value: self.num_value,
      str_value: self.str_value,
      timestamp: decode_dt(&self.timestamp)?,
    })
  }
}

/// Raw values of a `(timestamp, tag_name, num_value)` projection.
pub struct RawReading {
  pub timestamp: String,
  pub tag_name:  String,
  pub num_value: i64,
}

impl RawReading {
  pub fn into_reading(self) -> Result<Reading> {
    Ok(Reading {
      timestamp: decode_dt(&self.timestamp)?,
      tag_name:  self.tag_name,
      num_value: self.num_value,
    })
  }
}
