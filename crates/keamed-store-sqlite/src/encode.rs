//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, calendar dates are `YYYY-MM-DD`, UUIDs
//! are hyphenated lowercase strings. Options and entitlements are compact
//! JSON.

use chrono::{DateTime, NaiveDate, Utc};
use keamed_core::{
  account::{PremiumFeatures, UserAccount},
  exam::{Exam, ExamSource},
  limits::{DecisionReason, DecisionRecord},
  question::{Difficulty, Question},
  usage::{ResourceType, UsageRow},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

/// Counters are stored as SQLite INTEGER (i64).
pub fn decode_count(v: i64) -> Result<u32> {
  u32::try_from(v).map_err(|_| Error::Decode(format!("counter out of range: {v}")))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_source(s: &str) -> Result<ExamSource> {
  match s {
    "exam" => Ok(ExamSource::Exam),
    "quiz" => Ok(ExamSource::Quiz),
    "intelligent" => Ok(ExamSource::Intelligent),
    other => Err(Error::Decode(format!("unknown exam source: {other:?}"))),
  }
}

pub fn decode_difficulty(s: &str) -> Result<Difficulty> {
  match s {
    "basic" => Ok(Difficulty::Basic),
    "intermediate" => Ok(Difficulty::Intermediate),
    "advanced" => Ok(Difficulty::Advanced),
    other => Err(Error::Decode(format!("unknown difficulty: {other:?}"))),
  }
}

pub fn decode_reason(s: &str) -> Result<DecisionReason> {
  match s {
    "within_limit" => Ok(DecisionReason::WithinLimit),
    "limit_exceeded" => Ok(DecisionReason::LimitExceeded),
    "no_limit_defined" => Ok(DecisionReason::NoLimitDefined),
    other => Err(Error::Decode(format!("unknown decision reason: {other:?}"))),
  }
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_options(options: &[String]) -> Result<String> {
  Ok(serde_json::to_string(options)?)
}

pub fn encode_premium(p: &PremiumFeatures) -> Result<String> { Ok(serde_json::to_string(p)?) }

pub fn decode_premium(s: &str) -> Result<PremiumFeatures> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawQuestion::from_row`]; expects alias `q`.
pub const QUESTION_COLUMNS: &str = "q.question_id, q.exam_id, q.text, q.options_json, \
   q.correct_index, q.rationale, q.topic, q.subtopic, q.difficulty";

/// Raw values read directly from a `questions` row.
pub struct RawQuestion {
  pub question_id:   String,
  pub exam_id:       String,
  pub text:          String,
  pub options_json:  String,
  pub correct_index: i64,
  pub rationale:     Option<String>,
  pub topic:         Option<String>,
  pub subtopic:      Option<String>,
  pub difficulty:    Option<String>,
}

impl RawQuestion {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      question_id:   row.get(0)?,
      exam_id:       row.get(1)?,
      text:          row.get(2)?,
      options_json:  row.get(3)?,
      correct_index: row.get(4)?,
      rationale:     row.get(5)?,
      topic:         row.get(6)?,
      subtopic:      row.get(7)?,
      difficulty:    row.get(8)?,
    })
  }

  pub fn into_question(self) -> Result<Question> {
    Ok(Question {
      question_id:   decode_uuid(&self.question_id)?,
      exam_id:       decode_uuid(&self.exam_id)?,
      text:          self.text,
      options:       serde_json::from_str(&self.options_json)?,
      correct_index: usize::try_from(self.correct_index)
        .map_err(|_| Error::Decode(format!("negative correct index: {}", self.correct_index)))?,
      rationale:     self.rationale,
      topic:         self.topic,
      subtopic:      self.subtopic,
      difficulty:    self.difficulty.as_deref().map(decode_difficulty).transpose()?,
    })
  }
}

pub const EXAM_COLUMNS: &str =
  "exam_id, title, discipline, source, time_limit_minutes, created_by, created_at";

pub struct RawExam {
  pub exam_id:            String,
  pub title:              String,
  pub discipline:         String,
  pub source:             String,
  pub time_limit_minutes: i64,
  pub created_by:         Option<String>,
  pub created_at:         String,
}

impl RawExam {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      exam_id:            row.get(0)?,
      title:              row.get(1)?,
      discipline:         row.get(2)?,
      source:             row.get(3)?,
      time_limit_minutes: row.get(4)?,
      created_by:         row.get(5)?,
      created_at:         row.get(6)?,
    })
  }

  pub fn into_exam(self) -> Result<Exam> {
    Ok(Exam {
      exam_id:            decode_uuid(&self.exam_id)?,
      title:              self.title,
      discipline:         self.discipline,
      source:             decode_source(&self.source)?,
      time_limit_minutes: decode_count(self.time_limit_minutes)?,
      created_by:         self.created_by,
      created_at:         decode_dt(&self.created_at)?,
    })
  }
}

pub const USAGE_COLUMNS: &str = "user_id, usage_date, simulation_count, procedure_count, \
   ai_quiz_questions_count, is_premium, created_at, updated_at";

/// Raw values read directly from a `daily_usage` row.
pub struct RawUsageRow {
  pub user_id:                 String,
  pub usage_date:              String,
  pub simulation_count:        i64,
  pub procedure_count:         i64,
  pub ai_quiz_questions_count: i64,
  pub is_premium:              bool,
  pub created_at:              String,
  pub updated_at:              String,
}

impl RawUsageRow {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:                 row.get(0)?,
      usage_date:              row.get(1)?,
      simulation_count:        row.get(2)?,
      procedure_count:         row.get(3)?,
      ai_quiz_questions_count: row.get(4)?,
      is_premium:              row.get(5)?,
      created_at:              row.get(6)?,
      updated_at:              row.get(7)?,
    })
  }

  pub fn into_row(self) -> Result<UsageRow> {
    Ok(UsageRow {
      user_id:                 self.user_id,
      usage_date:              decode_date(&self.usage_date)?,
      simulation_count:        decode_count(self.simulation_count)?,
      procedure_count:         decode_count(self.procedure_count)?,
      ai_quiz_questions_count: decode_count(self.ai_quiz_questions_count)?,
      is_premium:              self.is_premium,
      created_at:              decode_dt(&self.created_at)?,
      updated_at:              decode_dt(&self.updated_at)?,
    })
  }
}

pub const DECISION_COLUMNS: &str = "decision_id, user_id, resource_type, decided_at, allowed, \
   reason, current_count, limit_value";

pub struct RawDecision {
  pub decision_id:   String,
  pub user_id:       String,
  pub resource_type: String,
  pub decided_at:    String,
  pub allowed:       bool,
  pub reason:        String,
  pub current_count: i64,
  pub limit_value:   Option<i64>,
}

impl RawDecision {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      decision_id:   row.get(0)?,
      user_id:       row.get(1)?,
      resource_type: row.get(2)?,
      decided_at:    row.get(3)?,
      allowed:       row.get(4)?,
      reason:        row.get(5)?,
      current_count: row.get(6)?,
      limit_value:   row.get(7)?,
    })
  }

  pub fn into_record(self) -> Result<DecisionRecord> {
    Ok(DecisionRecord {
      decision_id:   decode_uuid(&self.decision_id)?,
      user_id:       self.user_id,
      resource:      ResourceType::parse(&self.resource_type)?,
      decided_at:    decode_dt(&self.decided_at)?,
      allowed:       self.allowed,
      reason:        decode_reason(&self.reason)?,
      current_count: decode_count(self.current_count)?,
      limit_value:   self.limit_value.map(decode_count).transpose()?,
    })
  }
}

pub struct RawUser {
  pub user_id:          String,
  pub discipline:       String,
  pub premium_features: String,
}

impl RawUser {
  /// Entitlements written by older tooling may be malformed; those fall back
  /// to the basic tier rather than failing the request.
  pub fn into_account(self) -> UserAccount {
    let premium = decode_premium(&self.premium_features).unwrap_or_else(|error| {
      tracing::warn!(
        user_id = %self.user_id,
        %error,
        "malformed premium_features; treating user as basic tier"
      );
      PremiumFeatures::default()
    });
    UserAccount { user_id: self.user_id, discipline: self.discipline, premium }
  }
}
