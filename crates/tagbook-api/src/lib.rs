//! JSON REST API for tagbook.
//!
//! Exposes an axum [`Router`] backed by any [`tagbook_core::store::FactStore`].
//! Logging layers, TLS, and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", tagbook_api::api_router(store.clone(), settings))
//! ```

pub mod error;
pub mod facts;
pub mod reconcile;
pub mod report;
pub mod tags;

use std::sync::Arc;

use axum::{Router, routing::get};
use tagbook_core::{reconcile::ReconcileConfig, store::FactStore};

pub use error::ApiError;

// ─── Settings ────────────────────────────────────────────────────────────────

/// Server-side knobs the handlers need.
#[derive(Debug, Clone)]
pub struct ApiSettings {
  /// Substrings that hide bookkeeping tags from `GET /tags`.
  pub tag_exclusions: Vec<String>,
  pub reconcile:      ReconcileConfig,
}

impl Default for ApiSettings {
  fn default() -> Self {
    Self {
      tag_exclusions: vec!["comment".into(), "category".into()],
      reconcile:      ReconcileConfig::default(),
    }
  }
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S> {
  pub store:    Arc<S>,
  pub settings: Arc<ApiSettings>,
}

// Manual impl: `#[derive(Clone)]` would demand `S: Clone`.
impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), settings: Arc::clone(&self.settings) }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>, settings: ApiSettings) -> Router<()>
where
  S: FactStore + 'static,
{
  let state = AppState { store, settings: Arc::new(settings) };
  Router::new()
    .route(
      "/facts",
      get(facts::list::<S>)
        .post(facts::create::<S>)
        .patch(facts::update::<S>)
        .delete(facts::remove::<S>),
    )
    .route("/tags", get(tags::list::<S>))
    .route("/report", get(report::handler::<S>))
    .route("/reconcile", get(reconcile::handler::<S>))
    .with_state(state)
}
