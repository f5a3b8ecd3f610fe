//! Handler for `GET /reconcile`: the day-over-day calculation over the
//! configured tags.

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tagbook_core::{
  reconcile::Reconciliation,
  store::{FactStore, TimeWindow},
};

use crate::{AppState, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct ReconcileParams {
  /// End of the recent window. Defaults to now.
  pub at: Option<DateTime<Utc>>,
}

/// `GET /reconcile[?at=...]`
///
/// Returns 422 if a difference has no configured modifier.
pub async fn handler<S: FactStore>(
  State(state): State<AppState<S>>,
  Query(params): Query<ReconcileParams>,
) -> Result<Json<Reconciliation>, ApiError> {
  let config = &state.settings.reconcile;
  let (recent, prior) = TimeWindow::day_over_day(params.at.unwrap_or_else(Utc::now));

  let recent_rows = state
    .store
    .query_range(&config.tags, recent)
    .await
    .map_err(ApiError::store)?;
  let prior_rows = state
    .store
    .query_range(&config.tags, prior)
    .await
    .map_err(ApiError::store)?;

  let reconciliation = Reconciliation::compute(&recent_rows, &prior_rows, &config.modifiers)
    .inspect_err(|e| tracing::warn!(error = %e, "reconciliation refused"))?;
  Ok(Json(reconciliation))
}
