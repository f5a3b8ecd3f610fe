//! Handlers for `/facts` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/facts` | Every stored fact, most recent first |
//! | `POST`   | `/facts` | Body: [`InsertBody`]; returns 201 + [`InsertOutcome`] |
//! | `PATCH`  | `/facts` | Body: list of edited rows; returns [`CommitOutcome`] |
//! | `DELETE` | `/facts` | Body: `{"ids":[...]}`; returns [`CommitOutcome`] |

use std::collections::BTreeSet;

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tagbook_core::{
  Warning,
  edit::{CommitOutcome, RawRow, plan_update},
  fact::{Fact, FactId, FormEntry, STORABLE_YEARS, is_storable, start_of_day},
  form::{EForm, FormContext, PForm},
  store::{FactStore, InsertOutcome},
};

use crate::{AppState, error::ApiError};

// ─── List ────────────────────────────────────────────────────────────────────

/// `GET /facts`
pub async fn list<S: FactStore>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Fact>>, ApiError> {
  let facts = state.store.list_facts().await.map_err(ApiError::store)?;
  Ok(Json(facts))
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// The two operator forms. Either may be missing, in which case the insert is
/// refused.
#[derive(Debug, Default, Deserialize)]
pub struct FormsBody {
  pub e: Option<EForm>,
  pub p: Option<PForm>,
}

/// JSON body accepted by `POST /facts`.
///
/// Exactly one of `forms` and `entries` must be given. The batch timestamp is
/// `at` if set, otherwise midnight UTC of `date`, otherwise now.
#[derive(Debug, Deserialize)]
pub struct InsertBody {
  pub at:      Option<DateTime<Utc>>,
  pub date:    Option<NaiveDate>,
  pub forms:   Option<FormsBody>,
  pub entries: Option<Vec<FormEntry>>,
}

impl InsertBody {
  fn timestamp(&self) -> Result<DateTime<Utc>, ApiError> {
    let at = self.at.or_else(|| self.date.map(start_of_day)).unwrap_or_else(Utc::now);
    if !is_storable(at) {
      return Err(ApiError::BadRequest(format!(
        "timestamp {at} is outside years {:04}..={}",
        STORABLE_YEARS.start(),
        STORABLE_YEARS.end()
      )));
    }
    Ok(at)
  }
}

fn form_entries(forms: FormsBody) -> Result<Vec<FormEntry>, ApiError> {
  let mut ctx = FormContext::default();
  if let Some(e) = forms.e {
    ctx.submit_e(e)?;
  }
  if let Some(p) = forms.p {
    ctx.submit_p(p)?;
  }
  Ok(ctx.entries()?)
}

/// `POST /facts`: returns 201 + the written facts and any dropped values.
pub async fn create<S: FactStore>(
  State(state): State<AppState<S>>,
  Json(body): Json<InsertBody>,
) -> Result<impl IntoResponse, ApiError> {
  let at = body.timestamp()?;
  let entries = match (body.forms, body.entries) {
    (Some(forms), None) => form_entries(forms)?,
    (None, Some(entries)) => entries,
    (Some(_), Some(_)) => {
      return Err(ApiError::BadRequest("give either forms or entries, not both".into()));
    }
    (None, None) => return Err(ApiError::BadRequest("forms or entries are required".into())),
  };

  let outcome: InsertOutcome = state
    .store
    .insert_facts(entries, at)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(
    written = outcome.facts.len(),
    dropped = outcome.warnings.len(),
    %at,
    "facts inserted"
  );
  Ok((StatusCode::CREATED, Json(outcome)))
}

// ─── Update ──────────────────────────────────────────────────────────────────

/// `PATCH /facts`: body is the list of edited rows as shown in the table
/// editor. Rows that cannot be normalised are skipped and reported; the rest
/// are written as one batch.
pub async fn update<S: FactStore>(
  State(state): State<AppState<S>>,
  Json(rows): Json<Vec<RawRow>>,
) -> Result<Json<CommitOutcome>, ApiError> {
  let plan = plan_update(&rows);
  if plan.patches.is_empty() {
    return Ok(Json(CommitOutcome::Noop { warnings: plan.warnings }));
  }

  let changed = state
    .store
    .update_facts(plan.patches.clone())
    .await
    .map_err(ApiError::store)?;
  tracing::info!(submitted = rows.len(), changed, "facts updated");
  Ok(Json(CommitOutcome::Updated {
    rows:     changed,
    patches:  plan.patches,
    warnings: plan.warnings,
  }))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DeleteBody {
  #[serde(default)]
  pub ids: BTreeSet<FactId>,
}

/// `DELETE /facts` with body `{"ids":[1,2]}`. An empty selection is a no-op.
pub async fn remove<S: FactStore>(
  State(state): State<AppState<S>>,
  Json(body): Json<DeleteBody>,
) -> Result<Json<CommitOutcome>, ApiError> {
  if body.ids.is_empty() {
    return Ok(Json(CommitOutcome::Noop {
      warnings: vec![Warning::EmptySelection { what: "row selection".into() }],
    }));
  }

  let removed = state
    .store
    .delete_facts(body.ids.clone())
    .await
    .map_err(ApiError::store)?;
  tracing::info!(requested = body.ids.len(), removed, "facts deleted");
  Ok(Json(CommitOutcome::Deleted { ids: body.ids, rows: removed }))
}
