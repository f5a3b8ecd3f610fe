//! Fact types, the fundamental unit of the tagbook store.
//!
//! A fact is one timestamped observation of a tag. Its payload lives in one of
//! two nullable columns (`num_value` or `str_value`), chosen at insertion from
//! the kind of the submitted value. The store does not enforce that exactly
//! one column is populated, so readers treat an absent column as "no data".

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::Warning;

/// Store-assigned surrogate key.
pub type FactId = i64;

/// Maximum length, in characters, of `tag_name` and `str_value`.
pub const MAX_TEXT_LEN: usize = 40;

// ─── Fact ────────────────────────────────────────────────────────────────────

/// A stored fact, as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
  pub id:        FactId,
  pub tag_name:  String,
  pub num_value: Option<i64>,
  pub str_value: Option<String>,
  pub timestamp: DateTime<Utc>,
}

/// A numeric fact projected to `(timestamp, tag_name, num_value)`; the row
/// shape returned by range queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
  pub timestamp: DateTime<Utc>,
  pub tag_name:  String,
  pub num_value: i64,
}

impl Reading {
  pub fn new(
    timestamp: DateTime<Utc>,
    tag_name: impl Into<String>,
    num_value: i64,
  ) -> Self {
    Self { timestamp, tag_name: tag_name.into(), num_value }
  }
}

// ─── Submitted values ────────────────────────────────────────────────────────

/// A value delivered by the form layer, tagged by kind.
///
/// JSON input maps integers, booleans and strings onto the matching variant;
/// everything else (floats, lists, maps, null) becomes [`Unsupported`] and
/// carries the name of the offending kind.
///
/// [`Unsupported`]: FieldValue::Unsupported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum FieldValue {
  Int(i64),
  Bool(bool),
  Text(String),
  Unsupported(String),
}

impl FieldValue {
  /// Short name of the value kind, used in warnings.
  pub fn kind(&self) -> &str {
    match self {
      Self::Int(_) => "integer",
      Self::Bool(_) => "boolean",
      Self::Text(_) => "string",
      Self::Unsupported(kind) => kind,
    }
  }
}

impl From<Value> for FieldValue {
  fn from(value: Value) -> Self {
    match value {
      Value::Bool(b) => Self::Bool(b),
      Value::Number(n) => match n.as_i64() {
        Some(i) => Self::Int(i),
        None => Self::Unsupported("float".into()),
      },
      Value::String(s) => Self::Text(s),
      Value::Null => Self::Unsupported("null".into()),
      Value::Array(_) => Self::Unsupported("list".into()),
      Value::Object(_) => Self::Unsupported("map".into()),
    }
  }
}

impl From<FieldValue> for Value {
  fn from(value: FieldValue) -> Self {
    match value {
      FieldValue::Int(i) => Value::from(i),
      FieldValue::Bool(b) => Value::Bool(b),
      FieldValue::Text(s) => Value::String(s),
      FieldValue::Unsupported(_) => Value::Null,
    }
  }
}

/// One `tag_name → value` pair from a form submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormEntry {
  pub tag_name: String,
  pub value:    FieldValue,
}

impl FormEntry {
  pub fn new(tag_name: impl Into<String>, value: FieldValue) -> Self {
    Self { tag_name: tag_name.into(), value }
  }
}

// ─── NewFact ─────────────────────────────────────────────────────────────────

/// The storage column a classified value is written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
  Num(i64),
  Str(String),
}

/// A classified entry ready for insertion. The `id` is assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFact {
  pub tag_name:  String,
  pub payload:   Payload,
  pub timestamp: DateTime<Utc>,
}

impl NewFact {
  pub fn num_value(&self) -> Option<i64> {
    match self.payload {
      Payload::Num(n) => Some(n),
      Payload::Str(_) => None,
    }
  }

  pub fn str_value(&self) -> Option<&str> {
    match &self.payload {
      Payload::Num(_) => None,
      Payload::Str(s) => Some(s),
    }
  }

  /// The stored form of this fact once the store has assigned `id`.
  pub fn into_fact(self, id: FactId) -> Fact {
    let num_value = self.num_value();
    let str_value = match self.payload {
      Payload::Str(s) => Some(s),
      Payload::Num(_) => None,
    };
    Fact { id, tag_name: self.tag_name, num_value, str_value, timestamp: self.timestamp }
  }
}

/// Sort submitted entries into storage columns, all sharing `at`.
///
/// Integers and booleans go to `num_value` (booleans as 0/1), text goes to
/// `str_value`. Unsupported values are dropped and reported as
/// [`Warning::MalformedValue`]; the rest of the batch is kept.
pub fn classify(
  entries: Vec<FormEntry>,
  at: DateTime<Utc>,
) -> (Vec<NewFact>, Vec<Warning>) {
  let mut facts = Vec::with_capacity(entries.len());
  let mut warnings = Vec::new();

  for FormEntry { tag_name, value } in entries {
    let payload = match value {
      FieldValue::Int(i) => Payload::Num(i),
      FieldValue::Bool(b) => Payload::Num(i64::from(b)),
      FieldValue::Text(s) => Payload::Str(s),
      FieldValue::Unsupported(kind) => {
        warnings.push(Warning::MalformedValue { tag_name, value_kind: kind });
        continue;
      }
    };
    facts.push(NewFact { tag_name, payload, timestamp: at });
  }

  (facts, warnings)
}

// ─── Updates ─────────────────────────────────────────────────────────────────

/// How a single column changes in an update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldUpdate<T> {
  #[default]
  Unchanged,
  /// Write an explicit NULL.
  Null,
  Set(T),
}

impl<T> FieldUpdate<T> {
  pub fn is_unchanged(&self) -> bool { matches!(self, Self::Unchanged) }
}

impl<T: Serialize> Serialize for FieldUpdate<T> {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      Self::Set(v) => v.serialize(serializer),
      Self::Unchanged | Self::Null => serializer.serialize_none(),
    }
  }
}

/// A partial fact keyed by `id`. Serialises to the columns it touches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FactPatch {
  pub id:        FactId,
  #[serde(skip_serializing_if = "FieldUpdate::is_unchanged")]
  pub tag_name:  FieldUpdate<String>,
  #[serde(skip_serializing_if = "FieldUpdate::is_unchanged")]
  pub num_value: FieldUpdate<i64>,
  #[serde(skip_serializing_if = "FieldUpdate::is_unchanged")]
  pub str_value: FieldUpdate<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timestamp: Option<DateTime<Utc>>,
}

impl FactPatch {
  pub fn new(id: FactId) -> Self {
    Self {
      id,
      tag_name: FieldUpdate::Unchanged,
      num_value: FieldUpdate::Unchanged,
      str_value: FieldUpdate::Unchanged,
      timestamp: None,
    }
  }

  /// `true` if applying the patch would not touch any column.
  pub fn is_empty(&self) -> bool {
    self.tag_name.is_unchanged()
      && self.num_value.is_unchanged()
      && self.str_value.is_unchanged()
      && self.timestamp.is_none()
  }
}

// ─── Timestamps ──────────────────────────────────────────────────────────────

/// Midnight UTC at the start of `date`.
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
  date.and_time(NaiveTime::default()).and_utc()
}

/// Coerce a loosely formatted timestamp to UTC.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.f][±HH:MM]`, naive date-times
/// (taken as UTC), and bare dates (midnight UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
  let s = s.trim();

  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(dt.with_timezone(&Utc));
  }
  for fmt in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%#z"] {
    if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
      return Some(dt.with_timezone(&Utc));
    }
  }
  for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
      return Some(naive.and_utc());
    }
  }
  NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(start_of_day)
}

/// Years the store can hold. Outside them RFC 3339 needs a signed, wider
/// year and the timestamp column loses its fixed width.
pub const STORABLE_YEARS: std::ops::RangeInclusive<i32> = 0..=9999;

/// `true` if `at` falls inside [`STORABLE_YEARS`].
pub fn is_storable(at: DateTime<Utc>) -> bool { STORABLE_YEARS.contains(&at.year()) }

/// Milliseconds since the Unix epoch, the usual encoding of datetimes in
/// tabular JSON exports.
pub fn timestamp_from_millis(ms: i64) -> Option<DateTime<Utc>> {
  Utc.timestamp_millis_opt(ms).single()
}
