//! Time-to-live read cache over any [`FactStore`].
//!
//! Reads are served from memory while younger than their TTL. Every
//! successful write drops all cached reads, and expired entries are evicted
//! whenever a new one is stored.

use std::{
  collections::{BTreeSet, HashMap},
  sync::{Arc, Mutex, MutexGuard, PoisonError},
  time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use tagbook_core::{
  fact::{Fact, FactId, FactPatch, FormEntry, Reading},
  store::{FactStore, InsertOutcome, TimeWindow},
};

/// How long each kind of read stays fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtl {
  /// [`FactStore::list_facts`].
  pub facts: Duration,
  /// [`FactStore::list_distinct_tags`].
  pub tags:  Duration,
  /// [`FactStore::query_range`].
  pub range: Duration,
}

impl Default for CacheTtl {
  fn default() -> Self {
    Self {
      facts: Duration::from_secs(5),
      tags:  Duration::from_secs(10 * 60),
      range: Duration::from_secs(60),
    }
  }
}

struct Cached<T> {
  at:    Instant,
  value: T,
}

impl<T: Clone> Cached<T> {
  fn new(value: T) -> Self { Self { at: Instant::now(), value } }

  fn is_fresh(&self, ttl: Duration) -> bool { self.at.elapsed() < ttl }

  fn fresh(&self, ttl: Duration) -> Option<T> {
    self.is_fresh(ttl).then(|| self.value.clone())
  }
}

type RangeKey = (BTreeSet<String>, TimeWindow);

/// Cached reads plus the write generation they were fetched under. A fill
/// that started before the latest write is discarded.
#[derive(Default)]
struct Entries {
  generation: u64,
  facts:      Option<Cached<Vec<Fact>>>,
  tags:       HashMap<Vec<String>, Cached<Vec<String>>>,
  range:      HashMap<RangeKey, Cached<Vec<Reading>>>,
}

/// A [`FactStore`] that caches the reads of `S`.
///
/// Cloning is cheap and clones share one cache.
#[derive(Clone)]
pub struct CachedStore<S> {
  inner:   S,
  ttl:     CacheTtl,
  entries: Arc<Mutex<Entries>>,
}

impl<S> CachedStore<S> {
  pub fn new(inner: S, ttl: CacheTtl) -> Self {
    Self { inner, ttl, entries: Arc::default() }
  }

  pub fn inner(&self) -> &S { &self.inner }

  /// Drop every cached read and refuse fills that were already in flight.
  pub fn invalidate(&self) {
    let mut entries = self.lock();
    let generation = entries.generation.wrapping_add(1);
    *entries = Entries { generation, ..Entries::default() };
  }

  fn lock(&self) -> MutexGuard<'_, Entries> {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Store a fetched value unless a write happened since `generation`.
  fn fill(&self, generation: u64, store: impl FnOnce(&mut Entries)) {
    let mut entries = self.lock();
    if entries.generation == generation {
      store(&mut *entries);
    }
  }

  #[cfg(test)]
  pub(crate) fn cached_ranges(&self) -> usize { self.lock().range.len() }
}

impl<S: FactStore> FactStore for CachedStore<S> {
  type Error = S::Error;

  async fn insert_facts(
    &self,
    entries: Vec<FormEntry>,
    at: DateTime<Utc>,
  ) -> Result<InsertOutcome, S::Error> {
    let outcome = self.inner.insert_facts(entries, at).await?;
    if !outcome.facts.is_empty() {
      self.invalidate();
    }
    Ok(outcome)
  }

  async fn update_facts(&self, patches: Vec<FactPatch>) -> Result<usize, S::Error> {
    let changed = self.inner.update_facts(patches).await?;
    self.invalidate();
    Ok(changed)
  }

  async fn delete_facts(&self, ids: BTreeSet<FactId>) -> Result<usize, S::Error> {
    let removed = self.inner.delete_facts(ids).await?;
    self.invalidate();
    Ok(removed)
  }

  async fn list_facts(&self) -> Result<Vec<Fact>, S::Error> {
    let generation = {
      let entries = self.lock();
      if let Some(facts) = entries.facts.as_ref().and_then(|c| c.fresh(self.ttl.facts)) {
        return Ok(facts);
      }
      entries.generation
    };
    let facts = self.inner.list_facts().await?;
    self.fill(generation, |e| e.facts = Some(Cached::new(facts.clone())));
    Ok(facts)
  }

  async fn query_range(
    &self,
    tags: &BTreeSet<String>,
    window: TimeWindow,
  ) -> Result<Vec<Reading>, S::Error> {
    let key = (tags.clone(), window);
    let generation = {
      let entries = self.lock();
      if let Some(readings) = entries.range.get(&key).and_then(|c| c.fresh(self.ttl.range)) {
        return Ok(readings);
      }
      entries.generation
    };
    let readings = self.inner.query_range(tags, window).await?;
    let ttl = self.ttl.range;
    self.fill(generation, |e| {
      e.range.retain(|_, c| c.is_fresh(ttl));
      e.range.insert(key, Cached::new(readings.clone()));
    });
    Ok(readings)
  }

  async fn list_distinct_tags(&self, exclude: &[String]) -> Result<Vec<String>, S::Error> {
    let key = exclude.to_vec();
    let generation = {
      let entries = self.lock();
      if let Some(tags) = entries.tags.get(&key).and_then(|c| c.fresh(self.ttl.tags)) {
        return Ok(tags);
      }
      entries.generation
    };
    let tags = self.inner.list_distinct_tags(exclude).await?;
    let ttl = self.ttl.tags;
    self.fill(generation, |e| {
      e.tags.retain(|_, c| c.is_fresh(ttl));
      e.tags.insert(key, Cached::new(tags.clone()));
    });
    Ok(tags)
  }
}
