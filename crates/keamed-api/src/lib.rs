//! JSON REST API for KeaMed.
//!
//! Exposes axum [`Router`]s backed by any [`keamed_core::store::Store`]. Auth,
//! TLS, and transport concerns are the caller's responsibility; the admin
//! router in particular must be mounted behind authentication.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let state = Arc::new(ApiState::new(store, limits, quiz_settings, cases));
//! Router::new()
//!   .nest("/api", keamed_api::api_router(state.clone()))
//!   .nest("/api/admin", keamed_api::admin_router(state).layer(auth))
//! ```

pub mod admin;
pub mod cases;
pub mod error;
pub mod limits;
pub mod quizzes;
pub mod simulations;

use std::sync::Arc;

use axum::{
  Router,
  body::Bytes,
  routing::{get, post, put},
};
use keamed_core::{
  account::UserAccount,
  limits::{LimitsHandle, RateLimiter},
  quiz::{QuizGenerator, QuizSettings},
  store::Store,
};
use serde::de::DeserializeOwned;

pub use cases::{CaseGenerator, LlmSettings};
pub use error::ApiError;

/// Shared handler state: the store plus the services built on it.
pub struct ApiState<S> {
  pub store:   Arc<S>,
  pub quizzes: QuizGenerator<S>,
  pub limiter: RateLimiter<S>,
  pub cases:   CaseGenerator,
}

impl<S: Store> ApiState<S> {
  pub fn new(
    store: Arc<S>,
    limits: LimitsHandle,
    quiz_settings: QuizSettings,
    cases: CaseGenerator,
  ) -> Self {
    Self {
      quizzes: QuizGenerator::new(Arc::clone(&store), quiz_settings),
      limiter: RateLimiter::new(Arc::clone(&store), limits),
      store,
      cases,
    }
  }
}

/// Build the user-facing API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: Arc<ApiState<S>>) -> Router<()>
where
  S: Store + 'static,
{
  Router::new()
    // Quizzes
    .route("/users/{user_id}/quizzes", post(quizzes::generate::<S>))
    .route("/users/{user_id}/gap-profile", get(quizzes::gap_profile::<S>))
    .route("/quizzes/{exam_id}", get(quizzes::get_one::<S>))
    // Limits and usage
    .route("/users/{user_id}/limits/{resource}", get(limits::check::<S>))
    .route("/users/{user_id}/usage", post(limits::record::<S>))
    .route("/users/{user_id}/decisions", get(limits::decisions::<S>))
    // Metered case generation
    .route("/users/{user_id}/simulations", post(simulations::simulation::<S>))
    .route("/users/{user_id}/procedures", post(simulations::procedure::<S>))
    .with_state(state)
}

/// Build the admin router. Mount it behind authentication.
pub fn admin_router<S>(state: Arc<ApiState<S>>) -> Router<()>
where
  S: Store + 'static,
{
  Router::new()
    .route("/usage/{date}", get(admin::daily_summary::<S>))
    .route("/usage/{date}/users", get(admin::usage_rows::<S>))
    .route("/limits", get(admin::get_limits::<S>).put(admin::put_limits::<S>))
    .route("/users/{user_id}/reset-usage", post(admin::reset_usage::<S>))
    .route("/users/{user_id}", put(admin::upsert_user::<S>))
    .route("/exams", post(admin::import_exam::<S>))
    .route("/questions/auto-label", post(admin::auto_label::<S>))
    .with_state(state)
}

// ─── Shared extractors ───────────────────────────────────────────────────────

/// Look up a user in the directory, failing with
/// [`keamed_core::Error::UserNotFound`].
async fn load_account<S: Store>(store: &S, user_id: &str) -> Result<UserAccount, ApiError> {
  store
    .get_user(user_id.to_owned())
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::store(keamed_core::Error::UserNotFound(user_id.to_owned())))
}

/// Decode an optional JSON body; an empty body yields the default.
fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
  if body.iter().all(u8::is_ascii_whitespace) {
    return Ok(T::default());
  }
  serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid body: {e}")))
}
