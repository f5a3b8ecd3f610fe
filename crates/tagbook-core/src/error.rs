//! Error and warning types for `tagbook-core`.
//!
//! Errors abort the operation that raised them. Warnings are returned next to
//! a successful result so the caller can surface them to the operator.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A reconciliation difference reached the scaling step without a
  /// configured modifier.
  #[error("no modifier configured for {0:?}")]
  MissingModifier(String),

  #[error("invalid value for {field}: {reason}")]
  InvalidField {
    field:  &'static str,
    reason: String,
  },

  #[error("both the E form and the P form must be submitted first")]
  IncompleteForms,

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Warnings ────────────────────────────────────────────────────────────────

/// A non-fatal condition encountered while carrying out an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
  /// No tags, rows, or values were selected; the store was not contacted.
  EmptySelection { what: String },
  /// A submitted value was neither an integer, a boolean, nor text and was
  /// dropped from the insert batch.
  MalformedValue {
    tag_name:   String,
    value_kind: String,
  },
  /// An edited row carried no `id` and was skipped.
  MissingId { row: usize },
  /// An edited row could not be normalised and was skipped.
  MalformedRow { row: usize, reason: String },
  /// A query matched no facts.
  NoData,
}

impl fmt::Display for Warning {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::EmptySelection { what } => write!(f, "{what} is empty"),
      Self::MalformedValue { tag_name, value_kind } => {
        write!(f, "dropped {tag_name}: unsupported value kind {value_kind}")
      }
      Self::MissingId { row } => write!(f, "row {row} has no id; skipped"),
      Self::MalformedRow { row, reason } => {
        write!(f, "row {row} skipped: {reason}")
      }
      Self::NoData => f.write_str("no data for the selected tags and dates"),
    }
  }
}
