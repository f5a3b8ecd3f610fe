//! [`SqliteStore`], the SQLite implementation of [`FactStore`].

use std::{collections::BTreeSet, path::Path};

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use tagbook_core::{
  Warning,
  fact::{Fact, FactId, FactPatch, FormEntry, Reading, classify},
  store::{FactStore, InsertOutcome, TimeWindow},
};

use crate::{
  Result,
  encode::{RawFact, RawReading, encode_bound, encode_dt, encode_patch, placeholders},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A tagbook fact store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── FactStore impl ──────────────────────────────────────────────────────────

impl FactStore for SqliteStore {
  type Error = crate::Error;

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn insert_facts(
    &self,
    entries: Vec<FormEntry>,
    at: DateTime<Utc>,
  ) -> Result<InsertOutcome> {
    let (new_facts, mut warnings) = classify(entries, at);
    for w in &warnings {
      tracing::warn!(%w, "value dropped from insert batch");
    }

    if new_facts.is_empty() {
      tracing::warn!("insert batch is empty; nothing written");
      warnings.push(Warning::EmptySelection { what: "insert batch".into() });
      return Ok(InsertOutcome { facts: Vec::new(), warnings });
    }

    let at_str = encode_dt(at)?;
    let rows: Vec<(String, Option<i64>, Option<String>)> = new_facts
      .iter()
      .map(|f| (f.tag_name.clone(), f.num_value(), f.str_value().map(str::to_owned)))
      .collect();

    let ids: Vec<FactId> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut ids = Vec::with_capacity(rows.len());
        {
          let mut stmt = tx.prepare(
            "INSERT INTO facts (tag_name, num_value, str_value, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
          )?;
          for (tag_name, num_value, str_value) in &rows {
            ids.push(stmt.insert(rusqlite::params![tag_name, num_value, str_value, at_str])?);
          }
        }
        tx.commit()?;
        Ok(ids)
      })
      .await?;

    tracing::debug!(count = ids.len(), %at, "inserted facts");

    let facts = new_facts
      .into_iter()
      .zip(ids)
      .map(|(f, id)| f.into_fact(id))
      .collect();
    Ok(InsertOutcome { facts, warnings })
  }

  async fn update_facts(&self, patches: Vec<FactPatch>) -> Result<usize> {
    let updates: Vec<_> = patches
      .iter()
      .map(encode_patch)
      .collect::<Result<Vec<_>>>()?
      .into_iter()
      .filter(|(_, sets)| !sets.is_empty())
      .collect();

    if updates.is_empty() {
      tracing::warn!("update batch is empty; nothing written");
      return Ok(0);
    }

    let batch = updates.len();
    let changed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut changed = 0;
        for (id, sets) in updates {
          let assignments = sets
            .iter()
            .map(|(column, _)| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
          let sql = format!("UPDATE facts SET {assignments} WHERE id = ?");
          let params = sets
            .into_iter()
            .map(|(_, value)| value)
            .chain(std::iter::once(Value::Integer(id)));
          changed += tx.execute(&sql, rusqlite::params_from_iter(params))?;
        }
        tx.commit()?;
        Ok(changed)
      })
      .await?;

    tracing::debug!(batch, changed, "updated facts");
    Ok(changed)
  }

  async fn delete_facts(&self, ids: BTreeSet<FactId>) -> Result<usize> {
    if ids.is_empty() {
      tracing::warn!("delete selection is empty; nothing removed");
      return Ok(0);
    }

    let requested = ids.len();
    let removed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let sql = format!("DELETE FROM facts WHERE id IN ({})", placeholders(ids.len()));
        let removed = tx.execute(&sql, rusqlite::params_from_iter(ids))?;
        tx.commit()?;
        Ok(removed)
      })
      .await?;

    tracing::debug!(requested, removed, "deleted facts");
    Ok(removed)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn list_facts(&self) -> Result<Vec<Fact>> {
    let raws: Vec<RawFact> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT id, tag_name, num_value, str_value, timestamp
           FROM facts
           ORDER BY timestamp DESC, id DESC",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawFact {
              id:        row.get(0)?,
              tag_name:  row.get(1)?,
              num_value: row.get(2)?,
              str_value: row.get(3)?,
              timestamp: row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawFact::into_fact).collect()
  }

  async fn query_range(
    &self,
    tags: &BTreeSet<String>,
    window: TimeWindow,
  ) -> Result<Vec<Reading>> {
    if tags.is_empty() {
      tracing::warn!("tag selection is empty; no query issued");
      return Ok(Vec::new());
    }

    let sql = format!(
      "SELECT timestamp, tag_name, num_value
       FROM facts
       WHERE tag_name IN ({})
         AND num_value IS NOT NULL
         AND timestamp >= ? AND timestamp < ?
       ORDER BY timestamp ASC, id ASC",
      placeholders(tags.len())
    );
    let params: Vec<String> = tags
      .iter()
      .cloned()
      .chain([encode_bound(window.start), encode_bound(window.end)])
      .collect();

    let raws: Vec<RawReading> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), |row| {
            Ok(RawReading {
              timestamp: row.get(0)?,
              tag_name:  row.get(1)?,
              num_value: row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawReading::into_reading).collect()
  }

  async fn list_distinct_tags(&self, exclude: &[String]) -> Result<Vec<String>> {
    let patterns = exclude.to_vec();

    self
      .conn
      .call(move |conn| {
        // instr() keeps the match case-sensitive and free of LIKE wildcards.
        let filters: String = patterns
          .iter()
          .map(|_| " AND instr(tag_name, ?) = 0")
          .collect();
        let sql = format!(
          "SELECT DISTINCT tag_name FROM facts WHERE 1 = 1{filters} ORDER BY tag_name ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let tags = stmt
          .query_map(rusqlite::params_from_iter(patterns.iter()), |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(tags)
      })
      .await
      .map_err(Into::into)
  }
}
