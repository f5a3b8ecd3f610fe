//! Row edit/delete workflow.
//!
//! An [`EditSession`] walks a loaded fact listing through
//! `Viewing → Selected → Editing → Updated | Deleted`. Edited rows arrive as
//! loose JSON records (as produced by a table editor) and are normalised into
//! [`FactPatch`]es before anything is written: missing/NaN cells become
//! explicit nulls and the timestamp column is coerced to a UTC datetime.
//!
//! Committing does not refresh the loaded rows; callers reload the listing to
//! see the result.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
  Warning,
  fact::{
    Fact, FactId, FactPatch, FieldUpdate, STORABLE_YEARS, is_storable, parse_timestamp,
    timestamp_from_millis,
  },
  store::FactStore,
};

/// A row as edited in a table view: column name → cell.
pub type RawRow = Map<String, Value>;

// ─── Normalisation ───────────────────────────────────────────────────────────

/// Cell spellings that mean "no value".
const MISSING_TOKENS: [&str; 5] = ["nan", "nat", "none", "null", "<na>"];

fn is_missing(value: &Value) -> bool {
  match value {
    Value::Null => true,
    Value::String(s) => {
      let s = s.trim();
      s.is_empty() || MISSING_TOKENS.iter().any(|t| s.eq_ignore_ascii_case(t))
    }
    _ => false,
  }
}

fn as_integer(value: &Value) -> Option<i64> {
  match value {
    Value::Number(n) => n.as_i64().or_else(|| {
      // Integer columns that held a missing cell come back as floats.
      n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)
    }),
    Value::Bool(b) => Some(i64::from(*b)),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }
}

fn as_text(value: &Value) -> Option<String> {
  match value {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    _ => None,
  }
}

fn integer_update(value: &Value) -> Result<FieldUpdate<i64>, String> {
  if is_missing(value) {
    return Ok(FieldUpdate::Null);
  }
  as_integer(value)
    .map(FieldUpdate::Set)
    .ok_or_else(|| format!("{value} is not an integer"))
}

fn text_update(value: &Value) -> Result<FieldUpdate<String>, String> {
  if is_missing(value) {
    return Ok(FieldUpdate::Null);
  }
  as_text(value)
    .map(FieldUpdate::Set)
    .ok_or_else(|| format!("{value} is not text"))
}

/// Turn one edited row into a patch keyed by its `id`.
///
/// `row` is the position of the record in its batch and is only used for
/// the warning. Columns other than the fact columns are ignored.
pub fn normalize_row(row: usize, record: &RawRow) -> Result<FactPatch, Warning> {
  let malformed = |reason: String| Warning::MalformedRow { row, reason };

  let id = match record.get("id") {
    None => return Err(Warning::MissingId { row }),
    Some(v) if is_missing(v) => return Err(Warning::MissingId { row }),
    Some(v) => as_integer(v).ok_or_else(|| malformed(format!("id {v} is not an integer")))?,
  };

  let mut patch = FactPatch::new(id);
  for (column, value) in record {
    match column.as_str() {
      "tag_name" => patch.tag_name = text_update(value).map_err(&malformed)?,
      "num_value" => patch.num_value = integer_update(value).map_err(&malformed)?,
      "str_value" => patch.str_value = text_update(value).map_err(&malformed)?,
      "timestamp" => {
        let coerced = match value {
          Value::String(s) if !is_missing(value) => parse_timestamp(s),
          Value::Number(n) => n.as_i64().and_then(timestamp_from_millis),
          _ => None,
        };
        let at = coerced.ok_or_else(|| malformed(format!("timestamp {value} is not a datetime")))?;
        if !is_storable(at) {
          return Err(malformed(format!(
            "timestamp {value} is outside years {:04}..={}",
            STORABLE_YEARS.start(),
            STORABLE_YEARS.end()
          )));
        }
        patch.timestamp = Some(at);
      }
      _ => {}
    }
  }
  Ok(patch)
}

/// Normalised edits ready for [`FactStore::update_facts`], plus the rows that
/// were skipped.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdatePlan {
  pub patches:  Vec<FactPatch>,
  pub warnings: Vec<Warning>,
}

/// Normalise a batch of edited rows. Rows without an `id` or with malformed
/// cells are skipped with a warning; the rest of the batch is kept.
pub fn plan_update(records: &[RawRow]) -> UpdatePlan {
  let mut plan = UpdatePlan::default();
  for (row, record) in records.iter().enumerate() {
    match normalize_row(row, record) {
      Ok(patch) if patch.is_empty() => {}
      Ok(patch) => plan.patches.push(patch),
      Err(warning) => plan.warnings.push(warning),
    }
  }
  if plan.patches.is_empty() && plan.warnings.is_empty() {
    plan.warnings.push(Warning::EmptySelection { what: "update batch".into() });
  }
  plan
}

/// The record form of a stored fact, as shown in an editable table.
pub fn to_raw_row(fact: &Fact) -> RawRow {
  match serde_json::to_value(fact) {
    Ok(Value::Object(map)) => map,
    _ => RawRow::new(),
  }
}

// ─── Session ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
  Viewing,
  Selected,
  Editing,
  Updated,
  Deleted,
}

impl Stage {
  pub fn is_terminal(self) -> bool { matches!(self, Self::Updated | Self::Deleted) }
}

/// What a commit did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommitOutcome {
  /// Nothing to write; the store was not contacted.
  Noop { warnings: Vec<Warning> },
  Updated {
    rows:     usize,
    patches:  Vec<FactPatch>,
    warnings: Vec<Warning>,
  },
  Deleted { ids: BTreeSet<FactId>, rows: usize },
}

/// Human-in-the-loop selection over a loaded fact listing.
#[derive(Debug, Clone)]
pub struct EditSession {
  rows:     Vec<Fact>,
  selected: BTreeSet<FactId>,
  edits:    Vec<RawRow>,
  stage:    Stage,
}

impl EditSession {
  pub fn new(rows: Vec<Fact>) -> Self {
    Self { rows, selected: BTreeSet::new(), edits: Vec::new(), stage: Stage::Viewing }
  }

  pub fn stage(&self) -> Stage { self.stage }

  pub fn rows(&self) -> &[Fact] { &self.rows }

  pub fn selected(&self) -> &BTreeSet<FactId> { &self.selected }

  /// Mark rows by id. Ids that are not in the listing are returned and not
  /// selected. Selecting again while editing discards the pending edits.
  pub fn select(&mut self, ids: impl IntoIterator<Item = FactId>) -> Vec<FactId> {
    if self.stage.is_terminal() {
      return ids.into_iter().collect();
    }
    let mut unknown = Vec::new();
    for id in ids {
      if self.rows.iter().any(|r| r.id == id) {
        self.selected.insert(id);
      } else {
        unknown.push(id);
      }
    }
    self.edits.clear();
    self.stage = if self.selected.is_empty() { Stage::Viewing } else { Stage::Selected };
    unknown
  }

  /// Return to `Viewing` with nothing selected.
  pub fn cancel(&mut self) {
    if !self.stage.is_terminal() {
      self.selected.clear();
      self.edits.clear();
      self.stage = Stage::Viewing;
    }
  }

  pub fn selected_rows(&self) -> impl Iterator<Item = &Fact> {
    self.rows.iter().filter(|r| self.selected.contains(&r.id))
  }

  /// Make the selected rows editable. Returns `false` unless rows are
  /// selected.
  pub fn begin_edit(&mut self) -> bool {
    match self.stage {
      Stage::Selected => {
        self.edits = self.selected_rows().map(to_raw_row).collect();
        self.stage = Stage::Editing;
        true
      }
      Stage::Editing => true,
      _ => false,
    }
  }

  /// The editable records while in `Editing`.
  pub fn edits_mut(&mut self) -> &mut [RawRow] {
    if self.stage == Stage::Editing { self.edits.as_mut_slice() } else { &mut [] }
  }

  /// Set one cell of the editable record for `id`. Returns `false` if the
  /// session is not editing or `id` is not selected.
  pub fn set_cell(&mut self, id: FactId, column: &str, value: Value) -> bool {
    let target = Value::from(id);
    match self.edits_mut().iter_mut().find(|r| r.get("id") == Some(&target)) {
      Some(record) => {
        record.insert(column.to_owned(), value);
        true
      }
      None => false,
    }
  }

  /// The normalised edits. Empty unless the session is editing.
  pub fn plan_update(&self) -> UpdatePlan {
    if self.stage != Stage::Editing {
      return UpdatePlan {
        patches:  Vec::new(),
        warnings: vec![Warning::EmptySelection { what: "row selection".into() }],
      };
    }
    plan_update(&self.edits)
  }

  /// Ids to delete, or `None` when nothing is selected.
  pub fn plan_delete(&self) -> Option<BTreeSet<FactId>> {
    match self.stage {
      Stage::Selected | Stage::Editing if !self.selected.is_empty() => {
        Some(self.selected.clone())
      }
      _ => None,
    }
  }

  /// Record that a commit carried out elsewhere (e.g. over HTTP) succeeded.
  pub fn mark_committed(&mut self, outcome: &CommitOutcome) {
    self.stage = match outcome {
      CommitOutcome::Noop { .. } => Stage::Viewing,
      CommitOutcome::Updated { .. } => Stage::Updated,
      CommitOutcome::Deleted { .. } => Stage::Deleted,
    };
    self.selected.clear();
    self.edits.clear();
  }

  /// Write the pending edits through `store`.
  pub async fn commit_update<S: FactStore>(
    &mut self,
    store: &S,
  ) -> Result<CommitOutcome, S::Error> {
    let UpdatePlan { patches, warnings } = self.plan_update();
    let outcome = if patches.is_empty() {
      CommitOutcome::Noop { warnings }
    } else {
      let rows = store.update_facts(patches.clone()).await?;
      CommitOutcome::Updated { rows, patches, warnings }
    };
    self.mark_committed(&outcome);
    Ok(outcome)
  }

  /// Delete the selected rows through `store`.
  pub async fn commit_delete<S: FactStore>(
    &mut self,
    store: &S,
  ) -> Result<CommitOutcome, S::Error> {
    let outcome = match self.plan_delete() {
      None => CommitOutcome::Noop {
        warnings: vec![Warning::EmptySelection { what: "row selection".into() }],
      },
      Some(ids) => {
        let rows = store.delete_facts(ids.clone()).await?;
        CommitOutcome::Deleted { ids, rows }
      }
    };
    self.mark_committed(&outcome);
    Ok(outcome)
  }
}
