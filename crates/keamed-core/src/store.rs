//! Storage traits and their shared error plumbing.
//!
//! The traits are implemented by storage backends (e.g.
//! `keamed-store-sqlite`). The services in this crate and the HTTP layer
//! depend on these abstractions, not on any concrete backend.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
  account::UserAccount,
  exam::{ExamSource, NewExam, Quiz},
  limits::DecisionRecord,
  question::{Difficulty, Question},
  usage::{DailySummary, LedgerEntry, ResourceType, UsageRow},
};

/// Common base for every storage trait so they share one error type.
///
/// Backends must be able to carry [`crate::Error`] so services can surface
/// domain failures (e.g. [`crate::Error::NoEligibleQuestions`]) through the
/// backend's error.
pub trait Backend: Send + Sync {
  type Error: std::error::Error + From<crate::Error> + Send + Sync + 'static;
}

// ─── Question catalog ────────────────────────────────────────────────────────

pub trait QuestionCatalog: Backend {
  /// Distinct non-empty topics across all questions, in catalog order
  /// (alphabetical).
  fn list_topics(
    &self,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  /// Topic-labeled questions whose exam belongs to `discipline`. An empty
  /// `sources` slice means any source.
  fn list_eligible<'a>(
    &'a self,
    discipline: &'a str,
    sources: &'a [ExamSource],
  ) -> impl Future<Output = Result<Vec<Question>, Self::Error>> + Send + 'a;

  /// Persist an exam and its questions. Question ids are assigned here, so
  /// copying questions into a generated quiz always yields fresh ids.
  fn create_exam(
    &self,
    exam: NewExam,
  ) -> impl Future<Output = Result<Quiz, Self::Error>> + Send + '_;

  /// Retrieve an exam with its questions. Returns `None` if not found.
  fn get_quiz(
    &self,
    exam_id: Uuid,
  ) -> impl Future<Output = Result<Option<Quiz>, Self::Error>> + Send + '_;

  /// Questions with no topic, outside generated quizzes.
  fn list_unlabeled(
    &self,
  ) -> impl Future<Output = Result<Vec<Question>, Self::Error>> + Send + '_;

  /// Set topic and difficulty on a question that still has no topic.
  /// Returns `false` if the question is missing or already labeled.
  fn apply_label(
    &self,
    question_id: Uuid,
    topic: String,
    difficulty: Difficulty,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}

// ─── Usage ledger ────────────────────────────────────────────────────────────

/// The daily usage ledger and the decision audit log.
///
/// Counters are advisory quotas: no capacity is held at check time, and
/// increments saturate at `u32::MAX` instead of failing.
pub trait UsageLedger: Backend {
  /// Fetch the (user, date) row, creating it with zero counters on first
  /// access. A differing `is_premium` is written back without touching the
  /// counters.
  fn get_or_create(
    &self,
    user_id: String,
    date: NaiveDate,
    is_premium: bool,
  ) -> impl Future<Output = Result<LedgerEntry, Self::Error>> + Send + '_;

  /// Add `amount` to one counter, saturating at `u32::MAX`. Fails with
  /// [`crate::Error::NoLedgerRow`] if the row has not been created yet.
  fn increment(
    &self,
    user_id: String,
    date: NaiveDate,
    resource: ResourceType,
    amount: u32,
  ) -> impl Future<Output = Result<UsageRow, Self::Error>> + Send + '_;

  /// Zero every counter on the row. Returns `None` if there is no row.
  fn reset(
    &self,
    user_id: String,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Option<UsageRow>, Self::Error>> + Send + '_;

  fn rows_for_date(
    &self,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Vec<UsageRow>, Self::Error>> + Send + '_;

  fn daily_summary(
    &self,
    date: NaiveDate,
  ) -> impl Future<Output = Result<DailySummary, Self::Error>> + Send + '_;

  /// Append one decision to the audit log.
  fn record_decision(
    &self,
    record: DecisionRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Mark an allowed decision as spent. Fails with
  /// [`crate::Error::ReservationRejected`] unless the decision exists, was
  /// allowed, matches `user_id`, `resource` and `date`, and has not been
  /// redeemed before.
  fn redeem_decision(
    &self,
    decision_id: Uuid,
    user_id: String,
    resource: ResourceType,
    date: NaiveDate,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Decisions for a user, newest first, optionally restricted to one date.
  fn list_decisions(
    &self,
    user_id: String,
    date: Option<NaiveDate>,
  ) -> impl Future<Output = Result<Vec<DecisionRecord>, Self::Error>> + Send + '_;
}

// ─── User directory ──────────────────────────────────────────────────────────

pub trait UserDirectory: Backend {
  fn get_user(
    &self,
    user_id: String,
  ) -> impl Future<Output = Result<Option<UserAccount>, Self::Error>> + Send + '_;

  /// Insert or replace a user's discipline and entitlements.
  fn upsert_user(
    &self,
    account: UserAccount,
  ) -> impl Future<Output = Result<UserAccount, Self::Error>> + Send + '_;
}

/// Everything the HTTP layer needs from a single backend.
pub trait Store: QuestionCatalog + UsageLedger + UserDirectory {}

impl<T: QuestionCatalog + UsageLedger + UserDirectory> Store for T {}
