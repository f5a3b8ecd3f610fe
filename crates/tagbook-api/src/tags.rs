//! Handler for `GET /tags`.

use axum::{Json, extract::State};
use tagbook_core::store::FactStore;

use crate::{AppState, error::ApiError};

/// `GET /tags`: distinct tag names, minus the configured bookkeeping tags.
pub async fn list<S: FactStore>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<String>>, ApiError> {
  let tags = state
    .store
    .list_distinct_tags(&state.settings.tag_exclusions)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(tags))
}
