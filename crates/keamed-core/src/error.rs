//! Error types for `keamed-core`.

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("no eligible questions available for discipline {0:?}")]
  NoEligibleQuestions(String),

  #[error("unknown resource type: {0:?}")]
  UnknownResourceType(String),

  /// Usage was recorded before any check created the day's ledger row.
  #[error("no usage ledger row for user {user_id} on {date}")]
  NoLedgerRow { user_id: String, date: NaiveDate },

  /// The reservation does not name an allowed, unredeemed check for this
  /// user, resource and day.
  #[error("reservation {0} is not redeemable")]
  ReservationRejected(Uuid),

  #[error("usage amount must be at least 1, got {0}")]
  InvalidAmount(u32),

  #[error("user not found: {0}")]
  UserNotFound(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
