//! Admin handlers. Mount behind authentication.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/usage/:date` | Totals for one day |
//! | `GET`  | `/usage/:date/users` | Every ledger row for the day |
//! | `GET`  | `/limits` | Current tier limits |
//! | `PUT`  | `/limits` | Replace tier limits; applies to the next check |
//! | `POST` | `/users/:user_id/reset-usage` | Optional `?date=`, defaults to today (UTC) |
//! | `PUT`  | `/users/:user_id` | Body: `{"discipline":"..","premium":{..}}` |
//! | `POST` | `/exams` | Body: [`NewExam`]; untagged questions are auto-labeled |
//! | `POST` | `/questions/auto-label` | Label every untagged question |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{NaiveDate, Utc};
use keamed_core::{
  account::{PremiumFeatures, UserAccount},
  exam::{ExamSource, NewExam},
  labeling::{self, LabelReport},
  limits::LimitsConfig,
  store::Store,
  usage::{DailySummary, UsageRow},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

// ─── Usage ───────────────────────────────────────────────────────────────────

/// `GET /usage/:date`
pub async fn daily_summary<S: Store>(
  State(state): State<Arc<ApiState<S>>>,
  Path(date): Path<NaiveDate>,
) -> Result<Json<DailySummary>, ApiError> {
  let summary = state
    .limiter
    .daily_summary(date)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(summary))
}

/// `GET /usage/:date/users`
pub async fn usage_rows<S: Store>(
  State(state): State<Arc<ApiState<S>>>,
  Path(date): Path<NaiveDate>,
) -> Result<Json<Vec<UsageRow>>, ApiError> {
  let rows = state
    .store
    .rows_for_date(date)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct ResetParams {
  pub date: Option<NaiveDate>,
}

/// `POST /users/:user_id/reset-usage[?date=YYYY-MM-DD]`
pub async fn reset_usage<S: Store>(
  State(state): State<Arc<ApiState<S>>>,
  Path(user_id): Path<String>,
  Query(params): Query<ResetParams>,
) -> Result<Json<UsageRow>, ApiError> {
  let date = params.date.unwrap_or_else(|| Utc::now().date_naive());
  let row = state
    .limiter
    .reset_usage(&user_id, date)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("no usage for {user_id} on {date}")))?;
  Ok(Json(row))
}

// ─── Limits ──────────────────────────────────────────────────────────────────

/// `GET /limits`
pub async fn get_limits<S: Store>(State(state): State<Arc<ApiState<S>>>) -> Json<LimitsConfig> {
  Json(state.limiter.limits().snapshot())
}

/// `PUT /limits`
pub async fn put_limits<S: Store>(
  State(state): State<Arc<ApiState<S>>>,
  Json(config): Json<LimitsConfig>,
) -> Json<LimitsConfig> {
  state.limiter.limits().set(config);
  tracing::warn!(?config, "tier limits replaced");
  Json(config)
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UserBody {
  pub discipline: String,
  #[serde(default)]
  pub premium:    PremiumFeatures,
}

/// `PUT /users/:user_id`
///
/// Custom limits without an audit stamp are stamped with the current time.
pub async fn upsert_user<S: Store>(
  State(state): State<Arc<ApiState<S>>>,
  Path(user_id): Path<String>,
  Json(body): Json<UserBody>,
) -> Result<Json<UserAccount>, ApiError> {
  let mut premium = body.premium;
  if let Some(custom) = premium.custom_limits.as_mut() {
    custom.updated_at.get_or_insert_with(|| Utc::now().to_rfc3339());
    custom.updated_by.get_or_insert_with(|| "admin".to_owned());
  }
  let account = state
    .store
    .upsert_user(UserAccount { user_id, discipline: body.discipline, premium })
    .await
    .map_err(ApiError::store)?;
  Ok(Json(account))
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ImportReport {
  pub exam_id:        Uuid,
  pub question_count: usize,
  pub auto_labeled:   usize,
}

/// `POST /exams`
pub async fn import_exam<S: Store>(
  State(state): State<Arc<ApiState<S>>>,
  Json(mut exam): Json<NewExam>,
) -> Result<impl IntoResponse, ApiError> {
  if exam.source == ExamSource::Intelligent {
    return Err(ApiError::BadRequest(
      "intelligent exams are generated, not imported".into(),
    ));
  }
  if let Some(bad) = exam
    .questions
    .iter()
    .position(|q| q.correct_index >= q.options.len())
  {
    return Err(ApiError::BadRequest(format!(
      "question {bad}: correct_index is outside its options"
    )));
  }

  let auto_labeled = exam
    .questions
    .iter_mut()
    .map(labeling::label_new_question)
    .filter(|labeled| *labeled)
    .count();

  let quiz = state
    .store
    .create_exam(exam)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(
    exam_id = %quiz.exam.exam_id,
    questions = quiz.question_count,
    auto_labeled,
    "exam imported"
  );

  Ok((
    StatusCode::CREATED,
    Json(ImportReport {
      exam_id: quiz.exam.exam_id,
      question_count: quiz.question_count,
      auto_labeled,
    }),
  ))
}

/// `POST /questions/auto-label`
pub async fn auto_label<S: Store>(
  State(state): State<Arc<ApiState<S>>>,
) -> Result<Json<LabelReport>, ApiError> {
  let report = labeling::auto_label(&*state.store)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(report))
}
