//! Daily usage ledger types.
//!
//! One row per (user, calendar day). Counters only grow during the day; the
//! admin reset path is the single exception.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{Error, Result};

// ─── Resource type ───────────────────────────────────────────────────────────

/// A metered resource. The snake_case name is the wire and database form.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumIter,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResourceType {
  Simulation,
  Procedure,
  QuizQuestion,
}

impl ResourceType {
  pub fn as_str(self) -> &'static str { self.into() }

  /// Parse a wire name, failing with [`Error::UnknownResourceType`].
  pub fn parse(s: &str) -> Result<Self> {
    Self::from_str(s).map_err(|_| Error::UnknownResourceType(s.to_owned()))
  }
}

// ─── Ledger row ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRow {
  pub user_id:                 String,
  pub usage_date:              NaiveDate,
  pub simulation_count:        u32,
  pub procedure_count:         u32,
  pub ai_quiz_questions_count: u32,
  /// Entitlement cached at first access; corrected in place if it changes.
  pub is_premium:              bool,
  pub created_at:              DateTime<Utc>,
  pub updated_at:              DateTime<Utc>,
}

impl UsageRow {
  pub fn count(&self, resource: ResourceType) -> u32 {
    match resource {
      ResourceType::Simulation => self.simulation_count,
      ResourceType::Procedure => self.procedure_count,
      ResourceType::QuizQuestion => self.ai_quiz_questions_count,
    }
  }
}

/// Result of [`crate::store::UsageLedger::get_or_create`].
#[derive(Debug, Clone)]
pub struct LedgerEntry {
  pub row:               UsageRow,
  /// The row did not exist before this call.
  pub created:           bool,
  /// The cached premium flag disagreed with the caller's and was rewritten.
  pub premium_corrected: bool,
}

/// Totals over every ledger row for one date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySummary {
  pub date:                 NaiveDate,
  pub total_users:          u32,
  pub premium_users:        u32,
  pub basic_users:          u32,
  pub total_simulations:    u64,
  pub total_procedures:     u64,
  pub total_quiz_questions: u64,
  /// Checks on this date that were denied.
  pub denied_checks:        u64,
}
