//! Rate-limit decisions for metered AI resources.
//!
//! A check resolves the applicable limit (custom override, then tier
//! default), compares it with the day's ledger count and appends one
//! decision record. Checks are advisory: nothing is reserved in the ledger,
//! so concurrent checks may both be allowed before either records usage.
//!
//! An allowed check hands out a [`Reservation`] naming its audit record.
//! It is the only way to record usage through [`RateLimiter::record_usage`]
//! and can be redeemed once.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error,
  account::{CustomLimits, UserAccount},
  store::UsageLedger,
  usage::{DailySummary, ResourceType, UsageRow},
};

// ─── Tier configuration ──────────────────────────────────────────────────────

/// Daily limits for one tier. `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLimits {
  pub simulation:    Option<u32>,
  pub procedure:     Option<u32>,
  pub quiz_question: Option<u32>,
}

impl TierLimits {
  pub fn get(&self, resource: ResourceType) -> Option<u32> {
    match resource {
      ResourceType::Simulation => self.simulation,
      ResourceType::Procedure => self.procedure,
      ResourceType::QuizQuestion => self.quiz_question,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
  pub premium: TierLimits,
  pub basic:   TierLimits,
}

impl Default for LimitsConfig {
  fn default() -> Self {
    Self {
      premium: TierLimits {
        simulation:    Some(5),
        procedure:     Some(5),
        quiz_question: Some(75),
      },
      basic:   TierLimits {
        simulation:    Some(1),
        procedure:     Some(1),
        quiz_question: Some(15),
      },
    }
  }
}

/// Shared, replaceable tier configuration.
///
/// Cloning is cheap; every clone sees updates made through [`Self::set`].
#[derive(Debug, Clone, Default)]
pub struct LimitsHandle(Arc<RwLock<LimitsConfig>>);

impl LimitsHandle {
  pub fn new(config: LimitsConfig) -> Self { Self(Arc::new(RwLock::new(config))) }

  pub fn snapshot(&self) -> LimitsConfig {
    *self.0.read().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn set(&self, config: LimitsConfig) {
    *self.0.write().unwrap_or_else(PoisonError::into_inner) = config;
  }
}

// ─── Decisions ───────────────────────────────────────────────────────────────

/// Which rule supplied the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitType {
  Custom,
  Premium,
  Basic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
  WithinLimit,
  LimitExceeded,
  NoLimitDefined,
}

impl DecisionReason {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::WithinLimit => "within_limit",
      Self::LimitExceeded => "limit_exceeded",
      Self::NoLimitDefined => "no_limit_defined",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
  pub allowed:    bool,
  pub reason:     DecisionReason,
  pub current:    u32,
  /// `None` means unlimited.
  pub limit:      Option<u32>,
  pub limit_type: LimitType,
}

impl Decision {
  pub fn evaluate(current: u32, limit: Option<u32>, limit_type: LimitType) -> Self {
    let (allowed, reason) = match limit {
      None => (true, DecisionReason::NoLimitDefined),
      Some(l) if current < l => (true, DecisionReason::WithinLimit),
      Some(_) => (false, DecisionReason::LimitExceeded),
    };
    Self { allowed, reason, current, limit, limit_type }
  }

  /// Units left before the limit is reached; `None` when unlimited.
  pub fn remaining(&self) -> Option<u32> {
    self.limit.map(|l| l.saturating_sub(self.current))
  }
}

/// Resolve the limit for `resource`: a custom override wins over the tier
/// default. A custom value of `0` means unlimited.
pub fn resolve_limit(
  resource: ResourceType,
  is_premium: bool,
  custom: Option<&CustomLimits>,
  config: &LimitsConfig,
) -> (Option<u32>, LimitType) {
  if let Some(value) = custom.and_then(|c| c.for_resource(resource)) {
    return ((value != 0).then_some(value), LimitType::Custom);
  }
  if is_premium {
    (config.premium.get(resource), LimitType::Premium)
  } else {
    (config.basic.get(resource), LimitType::Basic)
  }
}

/// Immutable audit entry, one per check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
  pub decision_id:   Uuid,
  pub user_id:       String,
  pub resource:      ResourceType,
  pub decided_at:    DateTime<Utc>,
  pub allowed:       bool,
  pub reason:        DecisionReason,
  pub current_count: u32,
  pub limit_value:   Option<u32>,
}

/// Proof of an allowed check; consumed when usage is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
  /// The audit record of the check that issued this reservation.
  pub decision_id: Uuid,
  pub user_id:     String,
  pub resource:    ResourceType,
  pub usage_date:  NaiveDate,
  pub checked_at:  DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckOutcome {
  #[serde(flatten)]
  pub decision:    Decision,
  /// Present only when the check was allowed.
  pub reservation: Option<Reservation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReceipt {
  pub user_id:    String,
  pub resource:   ResourceType,
  pub usage_date: NaiveDate,
  pub new_count:  u32,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// The decision engine. Cloning is cheap.
pub struct RateLimiter<S> {
  store:  Arc<S>,
  limits: LimitsHandle,
}

impl<S> Clone for RateLimiter<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), limits: self.limits.clone() }
  }
}

impl<S: UsageLedger> RateLimiter<S> {
  pub fn new(store: Arc<S>, limits: LimitsHandle) -> Self { Self { store, limits } }

  pub fn limits(&self) -> &LimitsHandle { &self.limits }

  /// Check a user from the directory against today's ledger.
  pub async fn check_account(
    &self,
    account: &UserAccount,
    resource: ResourceType,
  ) -> Result<CheckOutcome, S::Error> {
    self
      .check(
        &account.user_id,
        resource,
        account.premium.is_premium(),
        account.premium.custom_limits.as_ref(),
      )
      .await
  }

  pub async fn check(
    &self,
    user_id: &str,
    resource: ResourceType,
    is_premium: bool,
    custom: Option<&CustomLimits>,
  ) -> Result<CheckOutcome, S::Error> {
    self.check_at(Utc::now(), user_id, resource, is_premium, custom).await
  }

  /// [`Self::check`] with an explicit clock; the ledger day is `now`'s UTC
  /// date.
  pub async fn check_at(
    &self,
    now: DateTime<Utc>,
    user_id: &str,
    resource: ResourceType,
    is_premium: bool,
    custom: Option<&CustomLimits>,
  ) -> Result<CheckOutcome, S::Error> {
    let today = now.date_naive();
    let entry = self
      .store
      .get_or_create(user_id.to_owned(), today, is_premium)
      .await?;

    if entry.premium_corrected {
      tracing::info!(
        user_id,
        %today,
        is_premium,
        "premium status changed mid-day; ledger flag corrected"
      );
    }

    let current = entry.row.count(resource);
    let (limit, limit_type) =
      resolve_limit(resource, is_premium, custom, &self.limits.snapshot());
    let decision = Decision::evaluate(current, limit, limit_type);
    let decision_id = Uuid::new_v4();

    self
      .store
      .record_decision(DecisionRecord {
        decision_id,
        user_id:       user_id.to_owned(),
        resource,
        decided_at:    now,
        allowed:       decision.allowed,
        reason:        decision.reason,
        current_count: current,
        limit_value:   limit,
      })
      .await?;

    tracing::debug!(
      user_id,
      resource = resource.as_str(),
      current,
      ?limit,
      reason = decision.reason.as_str(),
      "rate limit checked"
    );

    let reservation = decision.allowed.then(|| Reservation {
      decision_id,
      user_id: user_id.to_owned(),
      resource,
      usage_date: today,
      checked_at: now,
    });

    Ok(CheckOutcome { decision, reservation })
  }

  /// Record usage against the day and resource the reservation was issued
  /// for. A reservation that was forged, denied or already redeemed fails
  /// with [`Error::ReservationRejected`].
  pub async fn record_usage(
    &self,
    reservation: Reservation,
    amount: u32,
  ) -> Result<UsageReceipt, S::Error> {
    if amount == 0 {
      return Err(Error::InvalidAmount(amount).into());
    }
    let Reservation { decision_id, user_id, resource, usage_date, .. } = reservation;
    self
      .store
      .redeem_decision(decision_id, user_id.clone(), resource, usage_date)
      .await?;
    let row = self
      .store
      .increment(user_id.clone(), usage_date, resource, amount)
      .await?;

    tracing::info!(
      user_id = %user_id,
      resource = resource.as_str(),
      amount,
      new_count = row.count(resource),
      "usage recorded"
    );

    Ok(UsageReceipt { user_id, resource, usage_date, new_count: row.count(resource) })
  }

  /// Admin path: zero the user's counters for `date`. Decision records are
  /// kept.
  pub async fn reset_usage(
    &self,
    user_id: &str,
    date: NaiveDate,
  ) -> Result<Option<UsageRow>, S::Error> {
    let row = self.store.reset(user_id.to_owned(), date).await?;
    tracing::warn!(user_id, %date, found = row.is_some(), "usage reset by admin");
    Ok(row)
  }

  pub async fn daily_summary(&self, date: NaiveDate) -> Result<DailySummary, S::Error> {
    self.store.daily_summary(date).await
  }
}
