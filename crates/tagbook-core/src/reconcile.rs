//! Reconciliation engine: day-over-day differences between two time windows.
//!
//! Each window is reduced to the most recent reading per tag. Tags present in
//! both windows yield `recent - prior` under the derived name `<tag>_index`,
//! which is then scaled by a configured modifier.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{Error, Result, fact::Reading};

/// Appended to a base tag name to form the derived difference name.
pub const INDEX_SUFFIX: &str = "_index";

pub fn index_name(tag: &str) -> String { format!("{tag}{INDEX_SUFFIX}") }

// ─── Reduction ───────────────────────────────────────────────────────────────

/// Keep one reading per tag: the one with the latest timestamp. On equal
/// timestamps the earliest reading in `rows` wins.
pub fn find_most_recent(rows: &[Reading]) -> BTreeMap<String, Reading> {
  let mut latest: BTreeMap<String, Reading> = BTreeMap::new();
  for row in rows {
    match latest.get(&row.tag_name) {
      Some(kept) if kept.timestamp >= row.timestamp => {}
      _ => {
        latest.insert(row.tag_name.clone(), row.clone());
      }
    }
  }
  latest
}

// ─── Differences ─────────────────────────────────────────────────────────────

/// An unscaled difference for one tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Difference {
  pub tag_name:   String,
  pub difference: i64,
}

/// A difference after its modifier has been applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaledDifference {
  pub tag_name:   String,
  pub difference: f64,
}

/// `recent - prior` for every tag present in both reduced windows, ordered by
/// base tag name. Tags missing from either window produce nothing.
pub fn differences(
  recent: &BTreeMap<String, Reading>,
  prior: &BTreeMap<String, Reading>,
) -> Vec<Difference> {
  let union: BTreeSet<&String> = recent.keys().chain(prior.keys()).collect();
  union
    .into_iter()
    .filter_map(|tag| {
      let (r, p) = (recent.get(tag)?, prior.get(tag)?);
      Some(Difference {
        tag_name:   index_name(tag),
        difference: r.num_value.saturating_sub(p.num_value),
      })
    })
    .collect()
}

// ─── Modifiers ───────────────────────────────────────────────────────────────

/// Scale factors keyed by derived tag name (`E1_index`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Modifiers(BTreeMap<String, f64>);

impl Default for Modifiers {
  fn default() -> Self {
    Self(BTreeMap::from([
      (index_name("E1"), 1.225),
      (index_name("E2"), 2f64.sqrt() * 3.0),
    ]))
  }
}

impl Modifiers {
  pub fn new(map: BTreeMap<String, f64>) -> Self { Self(map) }

  /// Look up the modifier for a derived name. Falls back to a
  /// case-insensitive match, since layered configuration may lowercase keys.
  pub fn get(&self, derived: &str) -> Option<f64> {
    self
      .0
      .get(derived)
      .or_else(|| {
        self
          .0
          .iter()
          .find(|(k, _)| k.eq_ignore_ascii_case(derived))
          .map(|(_, v)| v)
      })
      .copied()
  }

  /// Fail unless every base tag in `tags` has a modifier for its derived name.
  pub fn ensure_covers<'a>(&self, tags: impl IntoIterator<Item = &'a String>) -> Result<()> {
    for tag in tags {
      let derived = index_name(tag);
      if self.get(&derived).is_none() {
        return Err(Error::MissingModifier(derived));
      }
    }
    Ok(())
  }

  /// Multiply each difference by its modifier. A difference without a
  /// modifier fails the whole calculation.
  pub fn apply(&self, diffs: &[Difference]) -> Result<Vec<ScaledDifference>> {
    diffs
      .iter()
      .map(|d| {
        let factor = self
          .get(&d.tag_name)
          .ok_or_else(|| Error::MissingModifier(d.tag_name.clone()))?;
        Ok(ScaledDifference {
          tag_name:   d.tag_name.clone(),
          difference: d.difference as f64 * factor,
        })
      })
      .collect()
  }
}

/// Which tags are compared and how their differences are scaled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileConfig {
  #[serde(default = "default_tags")]
  pub tags:      BTreeSet<String>,
  #[serde(default)]
  pub modifiers: Modifiers,
}

fn default_tags() -> BTreeSet<String> { ["E1", "E2"].map(String::from).into() }

impl Default for ReconcileConfig {
  fn default() -> Self { Self { tags: default_tags(), modifiers: Modifiers::default() } }
}

impl ReconcileConfig {
  /// Check that the modifier mapping is exhaustive over `tags`.
  pub fn validate(&self) -> Result<()> { self.modifiers.ensure_covers(&self.tags) }
}

// ─── Result ──────────────────────────────────────────────────────────────────

/// A complete day-over-day calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
  /// Most recent reading per tag in the recent window.
  pub recent:      Vec<Reading>,
  /// Most recent reading per tag in the prior window.
  pub prior:       Vec<Reading>,
  pub differences: Vec<Difference>,
  pub scaled:      Vec<ScaledDifference>,
}

impl Reconciliation {
  pub fn compute(
    recent_rows: &[Reading],
    prior_rows: &[Reading],
    modifiers: &Modifiers,
  ) -> Result<Self> {
    let recent = find_most_recent(recent_rows);
    let prior = find_most_recent(prior_rows);
    let differences = differences(&recent, &prior);
    let scaled = modifiers.apply(&differences)?;

    Ok(Self {
      recent: recent.into_values().collect(),
      prior: prior.into_values().collect(),
      differences,
      scaled,
    })
  }
}
