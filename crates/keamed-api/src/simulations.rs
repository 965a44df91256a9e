//! Metered AI case generation.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/users/:user_id/simulations` | Optional body `{"specialty":"..","difficulty":".."}` |
//! | `POST` | `/users/:user_id/procedures` | Same body; 429 with the decision when denied |

use std::sync::Arc;

use axum::{
  Json,
  body::Bytes,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use keamed_core::{limits::UsageReceipt, store::Store};
use serde::Serialize;

use crate::{
  ApiState,
  cases::{CaseKind, CaseRequest, GeneratedCase},
  error::ApiError,
  load_account, optional_json,
};

#[derive(Debug, Serialize)]
pub struct MeteredCase {
  pub case:  GeneratedCase,
  pub usage: UsageReceipt,
}

/// `POST /users/:user_id/simulations`
pub async fn simulation<S: Store>(
  State(state): State<Arc<ApiState<S>>>,
  Path(user_id): Path<String>,
  body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
  metered(&state, &user_id, CaseKind::Simulation, &body).await
}

/// `POST /users/:user_id/procedures`
pub async fn procedure<S: Store>(
  State(state): State<Arc<ApiState<S>>>,
  Path(user_id): Path<String>,
  body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
  metered(&state, &user_id, CaseKind::Procedure, &body).await
}

/// Check, generate, then record one unit of the case's resource.
async fn metered<S: Store>(
  state: &ApiState<S>,
  user_id: &str,
  kind: CaseKind,
  body: &Bytes,
) -> Result<(StatusCode, Json<MeteredCase>), ApiError> {
  let request: CaseRequest = optional_json(body)?;
  let account = load_account(&*state.store, user_id).await?;

  let outcome = state
    .limiter
    .check_account(&account, kind.resource())
    .await
    .map_err(ApiError::store)?;
  let Some(reservation) = outcome.reservation else {
    tracing::info!(user_id, kind = ?kind, "case generation denied by daily limit");
    return Err(ApiError::LimitExceeded(outcome.decision));
  };

  let case = state.cases.generate(kind, &request).await;
  let usage = state
    .limiter
    .record_usage(reservation, 1)
    .await
    .map_err(ApiError::store)?;

  Ok((StatusCode::CREATED, Json(MeteredCase { case, usage })))
}
