//! SQL schema for the KeaMed SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id          TEXT PRIMARY KEY,
    discipline       TEXT NOT NULL,
    premium_features TEXT NOT NULL DEFAULT '{}',   -- JSON PremiumFeatures
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS exams (
    exam_id            TEXT PRIMARY KEY,
    title              TEXT NOT NULL,
    discipline         TEXT NOT NULL,
    source             TEXT NOT NULL,   -- 'exam' | 'quiz' | 'intelligent'
    time_limit_minutes INTEGER NOT NULL,
    created_by         TEXT,
    created_at         TEXT NOT NULL
);

-- Questions of an 'intelligent' exam are snapshots and never updated.
CREATE TABLE IF NOT EXISTS questions (
    question_id   TEXT PRIMARY KEY,
    exam_id       TEXT NOT NULL REFERENCES exams(exam_id),
    position      INTEGER NOT NULL,
    text          TEXT NOT NULL,
    options_json  TEXT NOT NULL,
    correct_index INTEGER NOT NULL,
    rationale     TEXT,
    topic         TEXT,
    subtopic      TEXT,
    difficulty    TEXT              -- 'basic' | 'intermediate' | 'advanced'
);

-- One row per user per calendar day.
CREATE TABLE IF NOT EXISTS daily_usage (
    user_id                 TEXT NOT NULL,
    usage_date              TEXT NOT NULL,   -- YYYY-MM-DD (UTC)
    simulation_count        INTEGER NOT NULL DEFAULT 0,
    procedure_count         INTEGER NOT NULL DEFAULT 0,
    ai_quiz_questions_count INTEGER NOT NULL DEFAULT 0,
    is_premium              INTEGER NOT NULL,
    created_at              TEXT NOT NULL,
    updated_at              TEXT NOT NULL,
    UNIQUE (user_id, usage_date)
);

-- Append-only audit log; one row per rate-limit check.
CREATE TABLE IF NOT EXISTS rate_limit_decisions (
    decision_id   TEXT PRIMARY KEY,
    user_id       TEXT NOT NULL,
    resource_type TEXT NOT NULL,
    decided_at    TEXT NOT NULL,
    decision_date TEXT NOT NULL,
    allowed       INTEGER NOT NULL,
    reason        TEXT NOT NULL,
    current_count INTEGER NOT NULL,
    limit_value   INTEGER            -- NULL = unlimited
);

-- Allowed decisions whose reservation has been spent on recorded usage.
CREATE TABLE IF NOT EXISTS redeemed_decisions (
    decision_id TEXT PRIMARY KEY REFERENCES rate_limit_decisions(decision_id),
    redeemed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS exams_discipline_idx   ON exams(discipline);
CREATE INDEX IF NOT EXISTS questions_exam_idx     ON questions(exam_id);
CREATE INDEX IF NOT EXISTS questions_topic_idx    ON questions(topic);
CREATE INDEX IF NOT EXISTS usage_date_idx         ON daily_usage(usage_date);
CREATE INDEX IF NOT EXISTS decisions_user_idx     ON rate_limit_decisions(user_id, decision_date);

PRAGMA user_version = 1;
";
