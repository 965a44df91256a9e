//! Handlers for Smart Quiz endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/users/:user_id/quizzes` | Optional body `{"count":15,"discipline":"nursing"}`; metered as `quiz_question`, length capped at the remaining quota |
//! | `GET`  | `/users/:user_id/gap-profile` | Current gap profile |
//! | `GET`  | `/quizzes/:exam_id` | 404 if not found |

use std::sync::Arc;

use axum::{
  Json,
  body::Bytes,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use keamed_core::{
  exam::Quiz,
  gap::GapProfile,
  limits::UsageReceipt,
  store::Store,
  usage::ResourceType,
};
use rand::{SeedableRng as _, rngs::StdRng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ApiState, error::ApiError, load_account, optional_json};

// ─── Generate ────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct GenerateBody {
  pub count:      Option<usize>,
  /// Overrides the discipline stored in the user directory.
  pub discipline: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GeneratedQuiz {
  #[serde(flatten)]
  pub quiz:  Quiz,
  pub usage: UsageReceipt,
}

/// `POST /users/:user_id/quizzes`
pub async fn generate<S: Store>(
  State(state): State<Arc<ApiState<S>>>,
  Path(user_id): Path<String>,
  body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
  let body: GenerateBody = optional_json(&body)?;
  let account = load_account(&*state.store, &user_id).await?;

  let outcome = state
    .limiter
    .check_account(&account, ResourceType::QuizQuestion)
    .await
    .map_err(ApiError::store)?;
  let Some(reservation) = outcome.reservation else {
    return Err(ApiError::LimitExceeded(outcome.decision));
  };

  let mut count = state.quizzes.settings().target_count(body.count);
  if let Some(remaining) = outcome.decision.remaining() {
    count = count.min(usize::try_from(remaining).unwrap_or(usize::MAX));
  }

  let discipline = body.discipline.unwrap_or(account.discipline);
  let mut rng = StdRng::from_entropy();
  let quiz = state
    .quizzes
    .generate(&user_id, &discipline, Some(count), &mut rng)
    .await
    .map_err(ApiError::store)?;

  let amount = u32::try_from(quiz.question_count).unwrap_or(u32::MAX);
  let usage = state
    .limiter
    .record_usage(reservation, amount)
    .await
    .map_err(ApiError::store)?;

  Ok((StatusCode::CREATED, Json(GeneratedQuiz { quiz, usage })))
}

// ─── Gap profile ─────────────────────────────────────────────────────────────

/// `GET /users/:user_id/gap-profile`
pub async fn gap_profile<S: Store>(
  State(state): State<Arc<ApiState<S>>>,
  Path(user_id): Path<String>,
) -> Result<Json<GapProfile>, ApiError> {
  let profile = state
    .quizzes
    .gap_profile(&user_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(profile))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /quizzes/:exam_id`
pub async fn get_one<S: Store>(
  State(state): State<Arc<ApiState<S>>>,
  Path(exam_id): Path<Uuid>,
) -> Result<Json<Quiz>, ApiError> {
  let quiz = state
    .store
    .get_quiz(exam_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("quiz {exam_id} not found")))?;
  Ok(Json(quiz))
}
