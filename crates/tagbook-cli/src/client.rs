//! Async HTTP client wrapping the tagbook JSON API.

use std::{collections::BTreeSet, time::Duration};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, Response};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use tagbook_core::{
  Warning,
  edit::RawRow,
  fact::{Fact, FactId},
  form::FormContext,
  reconcile::Reconciliation,
  report::Report,
  store::InsertOutcome,
};

/// Connection settings for the tagbook API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
}

/// The server's answer to an edit or delete commit.
#[derive(Debug, Clone, Deserialize)]
pub struct Committed {
  /// `noop`, `updated` or `deleted`.
  pub outcome:  String,
  #[serde(default)]
  pub rows:     usize,
  #[serde(default)]
  pub warnings: Vec<Warning>,
}

/// Async HTTP client for the tagbook JSON REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
  }

  // ── Facts ─────────────────────────────────────────────────────────────────

  /// `POST /api/facts` with the forms of `ctx`. The server re-validates
  /// them and recomputes the derived values.
  pub async fn submit_forms(
    &self,
    ctx: &FormContext,
    date: Option<NaiveDate>,
  ) -> Result<InsertOutcome> {
    let body = json!({ "date": date, "forms": { "e": ctx.e, "p": ctx.p } });
    let resp = self
      .client
      .post(self.url("/facts"))
      .json(&body)
      .send()
      .await
      .context("POST /facts failed")?;
    decode(resp, "POST /facts").await
  }

  /// `GET /api/facts`
  pub async fn list_facts(&self) -> Result<Vec<Fact>> {
    let resp = self
      .client
      .get(self.url("/facts"))
      .send()
      .await
      .context("GET /facts failed")?;
    decode(resp, "GET /facts").await
  }

  /// `PATCH /api/facts`
  pub async fn update_rows(&self, rows: &[RawRow]) -> Result<Committed> {
    let resp = self
      .client
      .patch(self.url("/facts"))
      .json(rows)
      .send()
      .await
      .context("PATCH /facts failed")?;
    decode(resp, "PATCH /facts").await
  }

  /// `DELETE /api/facts`
  pub async fn delete_ids(&self, ids: &BTreeSet<FactId>) -> Result<Committed> {
    let resp = self
      .client
      .delete(self.url("/facts"))
      .json(&json!({ "ids": ids }))
      .send()
      .await
      .context("DELETE /facts failed")?;
    decode(resp, "DELETE /facts").await
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  /// `GET /api/tags`
  pub async fn list_tags(&self) -> Result<Vec<String>> {
    let resp = self
      .client
      .get(self.url("/tags"))
      .send()
      .await
      .context("GET /tags failed")?;
    decode(resp, "GET /tags").await
  }

  /// `GET /api/report?tags=..&start=..&end=..`
  pub async fn report(&self, tags: &[String], start: NaiveDate, end: NaiveDate) -> Result<Report> {
    let resp = self
      .client
      .get(self.url("/report"))
      .query(&[
        ("tags", tags.join(",")),
        ("start", start.to_string()),
        ("end", end.to_string()),
      ])
      .send()
      .await
      .context("GET /report failed")?;
    decode(resp, "GET /report").await
  }

  /// `GET /api/reconcile[?at=..]`
  pub async fn reconcile(&self, at: Option<DateTime<Utc>>) -> Result<Reconciliation> {
    let mut req = self.client.get(self.url("/reconcile"));
    if let Some(at) = at {
      req = req.query(&[("at", at.to_rfc3339())]);
    }
    let resp = req.send().await.context("GET /reconcile failed")?;
    decode(resp, "GET /reconcile").await
  }
}

/// Deserialize a success body, or surface the server's `{"error": ...}`.
async fn decode<T: DeserializeOwned>(resp: Response, what: &str) -> Result<T> {
  let status = resp.status();
  if !status.is_success() {
    let message = resp
      .json::<serde_json::Value>()
      .await
      .ok()
      .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_owned))
      .unwrap_or_default();
    return Err(anyhow!("{what} → {status} {message}"));
  }
  resp.json().await.with_context(|| format!("deserialising {what} response"))
}
