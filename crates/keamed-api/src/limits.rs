//! Handlers for rate-limit checks, usage recording and the decision audit
//! trail.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/users/:user_id/limits/:resource` | `simulation`, `procedure` or `quiz_question`; always 200 |
//! | `POST` | `/users/:user_id/usage` | Body: `{"reservation":{..},"amount":1}`; 409 if the reservation is forged or spent |
//! | `GET`  | `/users/:user_id/decisions` | Optional `?date=YYYY-MM-DD` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::NaiveDate;
use keamed_core::{
  limits::{CheckOutcome, DecisionRecord, Reservation, UsageReceipt},
  store::Store,
  usage::ResourceType,
};
use serde::Deserialize;

use crate::{ApiState, error::ApiError, load_account};

// ─── Check ───────────────────────────────────────────────────────────────────

/// `GET /users/:user_id/limits/:resource`
///
/// The outcome carries a reservation only when the check was allowed.
pub async fn check<S: Store>(
  State(state): State<Arc<ApiState<S>>>,
  Path((user_id, resource)): Path<(String, String)>,
) -> Result<Json<CheckOutcome>, ApiError> {
  let resource = ResourceType::parse(&resource).map_err(ApiError::store)?;
  let account = load_account(&*state.store, &user_id).await?;
  let outcome = state
    .limiter
    .check_account(&account, resource)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(outcome))
}

// ─── Record ──────────────────────────────────────────────────────────────────

fn default_amount() -> u32 { 1 }

#[derive(Debug, Deserialize)]
pub struct RecordBody {
  pub reservation: Reservation,
  #[serde(default = "default_amount")]
  pub amount:      u32,
}

/// `POST /users/:user_id/usage`
pub async fn record<S: Store>(
  State(state): State<Arc<ApiState<S>>>,
  Path(user_id): Path<String>,
  Json(body): Json<RecordBody>,
) -> Result<Json<UsageReceipt>, ApiError> {
  if body.reservation.user_id != user_id {
    return Err(ApiError::BadRequest(format!(
      "reservation belongs to {:?}, not {user_id:?}",
      body.reservation.user_id
    )));
  }
  let receipt = state
    .limiter
    .record_usage(body.reservation, body.amount)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(receipt))
}

// ─── Decisions ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DecisionParams {
  pub date: Option<NaiveDate>,
}

/// `GET /users/:user_id/decisions[?date=YYYY-MM-DD]`, newest first.
pub async fn decisions<S: Store>(
  State(state): State<Arc<ApiState<S>>>,
  Path(user_id): Path<String>,
  Query(params): Query<DecisionParams>,
) -> Result<Json<Vec<DecisionRecord>>, ApiError> {
  let records = state
    .store
    .list_decisions(user_id, params.date)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(records))
}
