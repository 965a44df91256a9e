//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use keamed_core::limits::Decision;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// A metered request was denied; the decision is returned to the caller.
  #[error("daily limit reached")]
  LimitExceeded(Decision),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

/// Find a domain error anywhere in the source chain.
fn core_error<'a>(
  err: &'a (dyn std::error::Error + 'static),
) -> Option<&'a keamed_core::Error> {
  let mut current = Some(err);
  while let Some(e) = current {
    if let Some(core) = e.downcast_ref::<keamed_core::Error>() {
      return Some(core);
    }
    current = e.source();
  }
  None
}

fn store_status(err: &(dyn std::error::Error + 'static)) -> StatusCode {
  use keamed_core::Error as E;
  match core_error(err) {
    Some(E::NoEligibleQuestions(_)) => StatusCode::UNPROCESSABLE_ENTITY,
    Some(E::UnknownResourceType(_) | E::InvalidAmount(_)) => StatusCode::BAD_REQUEST,
    Some(E::NoLedgerRow { .. } | E::ReservationRejected(_)) => StatusCode::CONFLICT,
    Some(E::UserNotFound(_)) => StatusCode::NOT_FOUND,
    Some(E::Serialization(_)) | None => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, body) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, json!({ "error": m })),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, json!({ "error": m })),
      ApiError::LimitExceeded(decision) => (
        StatusCode::TOO_MANY_REQUESTS,
        json!({ "error": self.to_string(), "decision": decision }),
      ),
      ApiError::Store(e) => {
        let status = store_status(&**e);
        if status.is_server_error() {
          tracing::error!(error = %e, "request failed");
        }
        let message = core_error(&**e).map_or_else(|| e.to_string(), ToString::to_string);
        (status, json!({ "error": message }))
      }
    };
    (status, Json(body)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug, Error)]
  enum Wrapper {
    #[error("backend: {0}")]
    Core(#[from] keamed_core::Error),
  }

  #[test]
  fn wrapped_domain_errors_map_to_client_statuses() {
    let err = ApiError::store(Wrapper::from(keamed_core::Error::InvalidAmount(0)));
    assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);

    let err = ApiError::store(Wrapper::from(keamed_core::Error::NoEligibleQuestions(
      "nursing".into(),
    )));
    assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);

    let err = ApiError::store(Wrapper::from(keamed_core::Error::ReservationRejected(
      uuid::Uuid::nil(),
    )));
    assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
  }

  #[test]
  fn unknown_errors_are_internal() {
    let err = ApiError::store(std::io::Error::other("disk on fire"));
    assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
  }
}
