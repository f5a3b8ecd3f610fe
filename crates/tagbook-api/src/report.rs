//! Handler for `GET /report`.
//!
//! `tags` is accepted as a comma-separated string. `start` and `end` are
//! calendar dates, both inclusive, and default to today.

use std::collections::BTreeSet;

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tagbook_core::{
  report::Report,
  store::{FactStore, TimeWindow},
};

use crate::{AppState, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct ReportParams {
  /// Comma-separated tag names, e.g. `E1,FIQ`.
  pub tags:  Option<String>,
  pub start: Option<NaiveDate>,
  pub end:   Option<NaiveDate>,
}

impl ReportParams {
  fn tag_set(&self) -> BTreeSet<String> {
    self
      .tags
      .as_deref()
      .unwrap_or_default()
      .split(',')
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .map(str::to_owned)
      .collect()
  }
}

/// `GET /report?tags=a,b[&start=YYYY-MM-DD][&end=YYYY-MM-DD]`
pub async fn handler<S: FactStore>(
  State(state): State<AppState<S>>,
  Query(params): Query<ReportParams>,
) -> Result<Json<Report>, ApiError> {
  let today = Utc::now().date_naive();
  let start = params.start.unwrap_or(today);
  let end = params.end.unwrap_or(today);
  if start > end {
    return Err(ApiError::BadRequest(format!("start {start} is after end {end}")));
  }

  let tags = params.tag_set();
  let report = Report::load(state.store.as_ref(), &tags, TimeWindow::from_dates(start, end))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(report))
}
