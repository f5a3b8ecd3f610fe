//! Integration tests for `SqliteStore` against an in-memory database.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde_json::json;
use tagbook_core::{
  Warning,
  edit::{CommitOutcome, EditSession, Stage, plan_update},
  fact::{Fact, FactId, FactPatch, FieldUpdate, FieldValue, FormEntry, Reading, start_of_day},
  form::{EForm, FormContext, PForm},
  report::Report,
  store::{FactStore, InsertOutcome, TimeWindow},
};
use tokio::sync::Notify;

use crate::{CacheTtl, CachedStore, Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn date(day: u32) -> NaiveDate { NaiveDate::from_ymd_opt(2024, 3, day).unwrap() }

fn day(d: u32) -> DateTime<Utc> { start_of_day(date(d)) }

fn tags(names: &[&str]) -> BTreeSet<String> {
  names.iter().map(|s| s.to_string()).collect()
}

fn entries(pairs: &[(&str, i64)]) -> Vec<FormEntry> {
  pairs
    .iter()
    .map(|(tag, v)| FormEntry::new(*tag, FieldValue::Int(*v)))
    .collect()
}

// ─── Insert ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn inserted_numeric_facts_are_queryable() {
  let s = store().await;
  let outcome = s
    .insert_facts(entries(&[("E1", 12), ("E2", 5)]), day(1))
    .await
    .unwrap();
  assert_eq!(outcome.facts.len(), 2);
  assert!(outcome.facts.iter().all(|f| f.timestamp == day(1)));

  let readings = s
    .query_range(&tags(&["E1", "E2"]), TimeWindow::from_dates(date(1), date(1)))
    .await
    .unwrap();

  assert_eq!(readings.len(), 2);
  assert!(readings.iter().any(|r| r.tag_name == "E1" && r.num_value == 12));
  assert!(readings.iter().any(|r| r.tag_name == "E2" && r.num_value == 5));
}

#[tokio::test]
async fn full_form_context_round_trips() {
  let s = store().await;
  let ctx = FormContext::from_forms(EForm::new(10, 4), PForm::default()).unwrap();

  let outcome = s.insert_facts(ctx.entries().unwrap(), day(2)).await.unwrap();

  // Category (unset) and reason list are dropped; everything else lands.
  assert_eq!(outcome.facts.len(), 10);
  assert_eq!(outcome.warnings.len(), 2);
  assert!(outcome.warnings.iter().all(|w| matches!(w, Warning::MalformedValue { .. })));

  let stored = s.list_facts().await.unwrap();
  let comment = stored.iter().find(|f| f.tag_name == "E_comment").unwrap();
  assert_eq!(comment.str_value.as_deref(), Some("no comment"));
  assert_eq!(comment.num_value, None);

  let state = stored.iter().find(|f| f.tag_name == "E4_state").unwrap();
  assert_eq!(state.num_value, Some(0));

  let sum = stored.iter().find(|f| f.tag_name == "E_sum").unwrap();
  assert_eq!(sum.num_value, Some(14));
}

#[tokio::test]
async fn failed_batch_writes_nothing() {
  let s = store().await;
  let batch = vec![
    FormEntry::new("E1", FieldValue::Int(1)),
    FormEntry::new("P_comment", FieldValue::Text("x".repeat(41))),
  ];

  let err = s.insert_facts(batch, day(1)).await;
  assert!(matches!(err, Err(crate::Error::Database(_))));
  assert!(s.list_facts().await.unwrap().is_empty());
}

#[tokio::test]
async fn batch_of_only_unsupported_values_is_not_written() {
  let s = store().await;
  let batch = vec![FormEntry::new("P_stop_reason", FieldValue::Unsupported("list".into()))];

  let outcome = s.insert_facts(batch, day(1)).await.unwrap();
  assert!(outcome.facts.is_empty());
  assert!(outcome.warnings.contains(&Warning::EmptySelection { what: "insert batch".into() }));
  assert!(s.list_facts().await.unwrap().is_empty());
}

// ─── Reads ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn timestamps_past_year_9999_are_refused() {
  let s = store().await;
  let far = start_of_day(NaiveDate::from_ymd_opt(10000, 1, 1).unwrap());

  let err = s.insert_facts(entries(&[("E1", 1)]), far).await.unwrap_err();
  assert!(matches!(err, Error::TimestampOutOfRange(_)));

  let fact = s.insert_facts(entries(&[("E1", 2)]), day(1)).await.unwrap().facts[0].clone();
  let mut moved = FactPatch::new(fact.id);
  moved.num_value = FieldUpdate::Set(3);
  moved.timestamp = Some(far);
  assert!(matches!(
    s.update_facts(vec![moved]).await,
    Err(Error::TimestampOutOfRange(_))
  ));

  let stored = s.list_facts().await.unwrap();
  assert_eq!(stored.len(), 1);
  assert_eq!((stored[0].num_value, stored[0].timestamp), (Some(2), day(1)));

  // Query bounds beyond the storable years are clamped, not refused.
  let everything = TimeWindow::new(day(1) - TimeDelta::days(1_000_000), far);
  assert_eq!(s.query_range(&tags(&["E1"]), everything).await.unwrap().len(), 1);
}

#[tokio::test]
async fn readers_tolerate_facts_with_both_or_neither_value() {
  let s = store().await;
  let facts = s.insert_facts(entries(&[("E1", 5), ("E2", 6)]), day(1)).await.unwrap().facts;

  let mut both = FactPatch::new(facts[0].id);
  both.str_value = FieldUpdate::Set("both".into());
  let mut neither = FactPatch::new(facts[1].id);
  neither.num_value = FieldUpdate::Null;
  assert_eq!(s.update_facts(vec![both, neither]).await.unwrap(), 2);

  let stored = s.list_facts().await.unwrap();
  assert_eq!(stored.len(), 2);
  let e1 = stored.iter().find(|f| f.tag_name == "E1").unwrap();
  assert_eq!((e1.num_value, e1.str_value.as_deref()), (Some(5), Some("both")));
  let e2 = stored.iter().find(|f| f.tag_name == "E2").unwrap();
  assert_eq!((e2.num_value, e2.str_value.as_deref()), (None, None));

  let window = TimeWindow::from_dates(date(1), date(1));
  let readings = s.query_range(&tags(&["E1", "E2"]), window).await.unwrap();
  assert_eq!(readings.len(), 1);
  assert_eq!((readings[0].tag_name.as_str(), readings[0].num_value), ("E1", 5));

  let report = Report::load(&s, &tags(&["E1", "E2"]), window).await.unwrap();
  assert!(report.warnings.is_empty());
  assert_eq!(report.pivot.columns(), ["timestamp", "E1"]);
  assert_eq!(report.pivot.rows()[0].cells, vec![Some(5)]);
}

#[tokio::test]
async fn query_range_excludes_text_facts_and_other_dates() {
  let s = store().await;
  s.insert_facts(entries(&[("E1", 1)]), day(1)).await.unwrap();
  s.insert_facts(entries(&[("E1", 2)]), day(3)).await.unwrap();
  s.insert_facts(vec![FormEntry::new("E1", FieldValue::Text("oops".into()))], day(1))
    .await
    .unwrap();

  let readings = s
    .query_range(&tags(&["E1"]), TimeWindow::from_dates(date(1), date(2)))
    .await
    .unwrap();

  assert_eq!(readings.len(), 1);
  assert_eq!(readings[0].num_value, 1);
}

#[tokio::test]
async fn empty_tag_selection_returns_nothing() {
  let s = store().await;
  s.insert_facts(entries(&[("E1", 1)]), day(1)).await.unwrap();

  let readings = s
    .query_range(&BTreeSet::new(), TimeWindow::from_dates(date(1), date(1)))
    .await
    .unwrap();
  assert!(readings.is_empty());

  let report = Report::load(&s, &BTreeSet::new(), TimeWindow::from_dates(date(1), date(1)))
    .await
    .unwrap();
  assert_eq!(report.warnings, vec![Warning::EmptySelection { what: "tag selection".into() }]);
}

#[tokio::test]
async fn distinct_tags_skip_bookkeeping_and_sort() {
  let s = store().await;
  let batch = vec![
    FormEntry::new("FIQ", FieldValue::Int(100)),
    FormEntry::new("E1", FieldValue::Int(1)),
    FormEntry::new("P_comment", FieldValue::Text("c".into())),
    FormEntry::new("P_stop_category", FieldValue::Text("Category1".into())),
    FormEntry::new("E1", FieldValue::Int(2)),
  ];
  s.insert_facts(batch, day(1)).await.unwrap();

  let exclude = vec!["comment".to_owned(), "category".to_owned()];
  let listed = s.list_distinct_tags(&exclude).await.unwrap();
  assert_eq!(listed, ["E1", "FIQ"]);

  let all = s.list_distinct_tags(&[]).await.unwrap();
  assert_eq!(all.len(), 4);
}

#[tokio::test]
async fn list_facts_is_most_recent_first() {
  let s = store().await;
  s.insert_facts(entries(&[("E1", 1)]), day(1)).await.unwrap();
  s.insert_facts(entries(&[("E1", 3)]), day(3)).await.unwrap();
  s.insert_facts(entries(&[("E1", 2)]), day(2)).await.unwrap();

  let values: Vec<_> = s
    .list_facts()
    .await
    .unwrap()
    .into_iter()
    .map(|f| f.num_value.unwrap())
    .collect();
  assert_eq!(values, [3, 2, 1]);
}

#[tokio::test]
async fn report_sums_duplicates_on_the_same_date() {
  let s = store().await;
  s.insert_facts(entries(&[("E1", 4)]), day(1)).await.unwrap();
  s.insert_facts(entries(&[("E1", 6)]), day(1) + TimeDelta::hours(8)).await.unwrap();
  s.insert_facts(entries(&[("E1", 3)]), day(2)).await.unwrap();

  let report = Report::load(&s, &tags(&["E1"]), TimeWindow::from_dates(date(1), date(2)))
    .await
    .unwrap();

  assert_eq!(report.pivot.rows()[0].cells, vec![Some(10)]);
  assert_eq!(report.max[0].value, 10);
  assert_eq!(report.min[0].timestamp, date(2));
}

// ─── Update ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn update_writes_null_for_nan_cells() {
  let s = store().await;
  let fact = s.insert_facts(entries(&[("E1", 7)]), day(1)).await.unwrap().facts[0].clone();

  let rows = vec![match json!({ "id": fact.id, "num_value": "NaN", "str_value": "fixed" }) {
    serde_json::Value::Object(map) => map,
    _ => unreachable!(),
  }];
  let plan = plan_update(&rows);
  let changed = s.update_facts(plan.patches).await.unwrap();
  assert_eq!(changed, 1);

  let stored = s.list_facts().await.unwrap();
  assert_eq!(stored[0].num_value, None);
  assert_eq!(stored[0].str_value.as_deref(), Some("fixed"));
}

#[tokio::test]
async fn update_moves_timestamp() {
  let s = store().await;
  let fact = s.insert_facts(entries(&[("E1", 7)]), day(1)).await.unwrap().facts[0].clone();

  let mut patch = FactPatch::new(fact.id);
  patch.timestamp = Some(day(4));
  patch.num_value = FieldUpdate::Set(8);
  s.update_facts(vec![patch]).await.unwrap();

  let readings = s
    .query_range(&tags(&["E1"]), TimeWindow::from_dates(date(4), date(4)))
    .await
    .unwrap();
  assert_eq!(readings.len(), 1);
  assert_eq!(readings[0].num_value, 8);
}

#[tokio::test]
async fn update_is_all_or_nothing() {
  let s = store().await;
  let facts = s.insert_facts(entries(&[("E1", 1), ("E2", 2)]), day(1)).await.unwrap().facts;

  let mut good = FactPatch::new(facts[0].id);
  good.num_value = FieldUpdate::Set(100);
  let mut bad = FactPatch::new(facts[1].id);
  bad.tag_name = FieldUpdate::Null;

  assert!(s.update_facts(vec![good, bad]).await.is_err());

  let stored = s.list_facts().await.unwrap();
  assert!(stored.iter().all(|f| f.num_value != Some(100)));
}

#[tokio::test]
async fn update_of_unknown_id_changes_nothing() {
  let s = store().await;
  let mut patch = FactPatch::new(4242);
  patch.num_value = FieldUpdate::Set(1);
  assert_eq!(s.update_facts(vec![patch]).await.unwrap(), 0);
}

// ─── Delete ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_of_unknown_id_is_a_noop() {
  let s = store().await;
  s.insert_facts(entries(&[("E1", 1), ("E2", 2)]), day(1)).await.unwrap();
  let before = s.list_facts().await.unwrap();

  let removed = s.delete_facts(BTreeSet::from([9999])).await.unwrap();

  assert_eq!(removed, 0);
  assert_eq!(s.list_facts().await.unwrap(), before);
}

#[tokio::test]
async fn delete_removes_selected_ids() {
  let s = store().await;
  let facts = s
    .insert_facts(entries(&[("E1", 1), ("E2", 2), ("E3", 3)]), day(1))
    .await
    .unwrap()
    .facts;

  let removed = s
    .delete_facts(BTreeSet::from([facts[0].id, facts[2].id]))
    .await
    .unwrap();
  assert_eq!(removed, 2);

  let left = s.list_facts().await.unwrap();
  assert_eq!(left.len(), 1);
  assert_eq!(left[0].tag_name, "E2");
}

// ─── Edit workflow ───────────────────────────────────────────────────────────

#[tokio::test]
async fn edit_session_commits_an_update() {
  let s = store().await;
  s.insert_facts(entries(&[("E1", 1), ("E2", 2)]), day(1)).await.unwrap();

  let mut session = EditSession::new(s.list_facts().await.unwrap());
  let target = session.rows().iter().find(|f| f.tag_name == "E2").unwrap().id;
  session.select([target]);
  assert!(session.begin_edit());
  session.set_cell(target, "num_value", json!(20));

  let outcome = session.commit_update(&s).await.unwrap();
  assert!(matches!(outcome, CommitOutcome::Updated { rows: 1, .. }));
  assert_eq!(session.stage(), Stage::Updated);

  let stored = s.list_facts().await.unwrap();
  let e2 = stored.iter().find(|f| f.id == target).unwrap();
  assert_eq!(e2.num_value, Some(20));
}

#[tokio::test]
async fn edit_session_deletes_selection_and_skips_empty() {
  let s = store().await;
  s.insert_facts(entries(&[("E1", 1), ("E2", 2)]), day(1)).await.unwrap();

  let mut empty = EditSession::new(s.list_facts().await.unwrap());
  let outcome = empty.commit_delete(&s).await.unwrap();
  assert!(matches!(outcome, CommitOutcome::Noop { .. }));
  assert_eq!(s.list_facts().await.unwrap().len(), 2);

  let mut session = EditSession::new(s.list_facts().await.unwrap());
  let ids: Vec<_> = session.rows().iter().map(|f| f.id).collect();
  session.select(ids);
  let outcome = session.commit_delete(&s).await.unwrap();
  assert!(matches!(outcome, CommitOutcome::Deleted { rows: 2, .. }));
  assert!(s.list_facts().await.unwrap().is_empty());
}

// ─── Cache ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn cached_reads_are_served_until_a_write() {
  let raw = store().await;
  let cached = CachedStore::new(raw.clone(), CacheTtl::default());

  cached.insert_facts(entries(&[("E1", 1)]), day(1)).await.unwrap();
  assert_eq!(cached.list_facts().await.unwrap().len(), 1);

  // Written behind the cache's back: not visible until the entry expires.
  raw.insert_facts(entries(&[("E2", 2)]), day(1)).await.unwrap();
  assert_eq!(cached.list_facts().await.unwrap().len(), 1);

  // Writing through the cache drops every entry.
  cached.insert_facts(entries(&[("E3", 3)]), day(1)).await.unwrap();
  assert_eq!(cached.list_facts().await.unwrap().len(), 3);
}

#[tokio::test]
async fn expired_entries_are_refetched() {
  let raw = store().await;
  let ttl = CacheTtl { facts: Duration::ZERO, tags: Duration::ZERO, range: Duration::ZERO };
  let cached = CachedStore::new(raw.clone(), ttl);

  assert!(cached.list_distinct_tags(&[]).await.unwrap().is_empty());
  raw.insert_facts(entries(&[("E1", 1)]), day(1)).await.unwrap();
  assert_eq!(cached.list_distinct_tags(&[]).await.unwrap(), ["E1"]);
}

#[tokio::test]
async fn expired_range_entries_are_evicted() {
  let ttl = CacheTtl { range: Duration::ZERO, ..CacheTtl::default() };
  let cached = CachedStore::new(store().await, ttl);

  for minute in 0..100 {
    let (recent, prior) = TimeWindow::day_over_day(day(10) + TimeDelta::minutes(minute));
    cached.query_range(&tags(&["E1"]), recent).await.unwrap();
    cached.query_range(&tags(&["E1"]), prior).await.unwrap();
  }
  assert_eq!(cached.cached_ranges(), 1);
}

/// Pauses `list_distinct_tags` between reading the database and returning,
/// so a write can land while the read is in flight.
#[derive(Clone)]
struct PausedTags {
  inner:   SqliteStore,
  fetched: Arc<Notify>,
  resume:  Arc<Notify>,
}

impl FactStore for PausedTags {
  type Error = crate::Error;

  async fn insert_facts(
    &self,
    entries: Vec<FormEntry>,
    at: DateTime<Utc>,
  ) -> Result<InsertOutcome, Error> {
    self.inner.insert_facts(entries, at).await
  }

  async fn list_facts(&self) -> Result<Vec<Fact>, Error> { self.inner.list_facts().await }

  async fn query_range(
    &self,
    tags: &BTreeSet<String>,
    window: TimeWindow,
  ) -> Result<Vec<Reading>, Error> {
    self.inner.query_range(tags, window).await
  }

  async fn list_distinct_tags(&self, exclude: &[String]) -> Result<Vec<String>, Error> {
    let tags = self.inner.list_distinct_tags(exclude).await?;
    self.fetched.notify_one();
    self.resume.notified().await;
    Ok(tags)
  }

  async fn update_facts(&self, patches: Vec<FactPatch>) -> Result<usize, Error> {
    self.inner.update_facts(patches).await
  }

  async fn delete_facts(&self, ids: BTreeSet<FactId>) -> Result<usize, Error> {
    self.inner.delete_facts(ids).await
  }
}

#[tokio::test]
async fn reads_overtaken_by_a_write_are_not_cached() {
  let paused = PausedTags { inner: store().await, fetched: Arc::default(), resume: Arc::default() };
  let cached = CachedStore::new(paused.clone(), CacheTtl::default());
  cached.insert_facts(entries(&[("E1", 1)]), day(1)).await.unwrap();

  let reader = tokio::spawn({
    let cached = cached.clone();
    async move { cached.list_distinct_tags(&[]).await }
  });
  paused.fetched.notified().await;
  cached.insert_facts(entries(&[("E2", 2)]), day(1)).await.unwrap();
  paused.resume.notify_one();
  assert_eq!(reader.await.unwrap().unwrap(), ["E1"]);

  paused.resume.notify_one();
  assert_eq!(cached.list_distinct_tags(&[]).await.unwrap(), ["E1", "E2"]);
}
