//! [`SqliteStore`], the SQLite implementation of the KeaMed storage traits.

use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use keamed_core::{
  account::UserAccount,
  exam::{ExamSource, NewExam, Quiz},
  limits::DecisionRecord,
  question::{Difficulty, Question},
  store::{Backend, QuestionCatalog, UsageLedger, UserDirectory},
  usage::{DailySummary, LedgerEntry, ResourceType, UsageRow},
};

use crate::{
  encode::{
    decode_count, encode_date, encode_dt, encode_options, encode_premium, encode_uuid,
    RawDecision, RawExam, RawQuestion, RawUsageRow, RawUser, DECISION_COLUMNS, EXAM_COLUMNS,
    QUESTION_COLUMNS, USAGE_COLUMNS,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// The KeaMed catalog, ledger and directory backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, used by tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn fetch_usage_row(&self, user_id: String, date: NaiveDate) -> Result<Option<UsageRow>> {
    let date_str = encode_date(date);
    let raw: Option<RawUsageRow> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {USAGE_COLUMNS} FROM daily_usage WHERE user_id = ?1 AND usage_date = ?2"
              ),
              rusqlite::params![user_id, date_str],
              RawUsageRow::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawUsageRow::into_row).transpose()
  }
}

/// The counter column a resource is metered in.
fn counter_column(resource: ResourceType) -> &'static str {
  match resource {
    ResourceType::Simulation => "simulation_count",
    ResourceType::Procedure => "procedure_count",
    ResourceType::QuizQuestion => "ai_quiz_questions_count",
  }
}

impl Backend for SqliteStore {
  type Error = Error;
}

// ─── Question catalog ────────────────────────────────────────────────────────

impl QuestionCatalog for SqliteStore {
  async fn list_topics(&self) -> Result<Vec<String>> {
    let topics = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT DISTINCT TRIM(topic) AS t FROM questions
           WHERE topic IS NOT NULL AND TRIM(topic) <> ''
           ORDER BY t",
        )?;
        let rows = stmt
          .query_map([], |row| row.get::<_, String>(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(topics)
  }

  async fn list_eligible<'a>(
    &'a self,
    discipline: &'a str,
    sources: &'a [ExamSource],
  ) -> Result<Vec<Question>> {
    let mut params: Vec<String> = vec![discipline.to_owned()];
    let mut sql = format!(
      "SELECT {QUESTION_COLUMNS} FROM questions q
       JOIN exams e ON e.exam_id = q.exam_id
       WHERE e.discipline = ?1 AND q.topic IS NOT NULL AND TRIM(q.topic) <> ''"
    );
    if !sources.is_empty() {
      let placeholders = (0..sources.len())
        .map(|i| format!("?{}", i + 2))
        .collect::<Vec<_>>()
        .join(", ");
      sql.push_str(&format!(" AND e.source IN ({placeholders})"));
      params.extend(sources.iter().map(|s| s.as_str().to_owned()));
    }
    sql.push_str(" ORDER BY e.created_at, q.position");

    let raws: Vec<RawQuestion> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawQuestion::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawQuestion::into_question).collect()
  }

  async fn create_exam(&self, input: NewExam) -> Result<Quiz> {
    let exam_id = Uuid::new_v4();
    let created_at = Utc::now();

    let exam_row = (
      encode_uuid(exam_id),
      input.title,
      input.discipline,
      input.source.as_str().to_owned(),
      input.time_limit_minutes,
      input.created_by,
      encode_dt(created_at),
    );

    let mut question_rows = Vec::with_capacity(input.questions.len());
    for q in input.questions {
      question_rows.push((
        encode_uuid(Uuid::new_v4()),
        q.text,
        encode_options(&q.options)?,
        i64::try_from(q.correct_index)
          .map_err(|_| Error::Decode(format!("correct index too large: {}", q.correct_index)))?,
        q.rationale,
        q.topic,
        q.subtopic,
        q.difficulty.map(|d| d.as_str().to_owned()),
      ));
    }

    let exam_id_str = exam_row.0.clone();
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO exams
             (exam_id, title, discipline, source, time_limit_minutes, created_by, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            exam_row.0, exam_row.1, exam_row.2, exam_row.3, exam_row.4, exam_row.5, exam_row.6
          ],
        )?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO questions
               (question_id, exam_id, position, text, options_json, correct_index,
                rationale, topic, subtopic, difficulty)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          )?;
          for (position, q) in question_rows.into_iter().enumerate() {
            stmt.execute(rusqlite::params![
              q.0,
              exam_id_str,
              position as i64,
              q.1,
              q.2,
              q.3,
              q.4,
              q.5,
              q.6,
              q.7
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    self
      .get_quiz(exam_id)
      .await?
      .ok_or_else(|| Error::Decode(format!("exam {exam_id} missing after insert")))
  }

  async fn get_quiz(&self, exam_id: Uuid) -> Result<Option<Quiz>> {
    let id_str = encode_uuid(exam_id);

    let found: Option<(RawExam, Vec<RawQuestion>)> = self
      .conn
      .call(move |conn| {
        let exam = conn
          .query_row(
            &format!("SELECT {EXAM_COLUMNS} FROM exams WHERE exam_id = ?1"),
            rusqlite::params![id_str],
            RawExam::from_row,
          )
          .optional()?;
        let Some(exam) = exam else {
          return Ok(None);
        };
        let mut stmt = conn.prepare(&format!(
          "SELECT {QUESTION_COLUMNS} FROM questions q WHERE q.exam_id = ?1 ORDER BY q.position"
        ))?;
        let questions = stmt
          .query_map(rusqlite::params![id_str], RawQuestion::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some((exam, questions)))
      })
      .await?;

    let Some((exam, questions)) = found else {
      return Ok(None);
    };
    let exam = exam.into_exam()?;
    let questions = questions
      .into_iter()
      .map(RawQuestion::into_question)
      .collect::<Result<Vec<_>>>()?;
    Ok(Some(Quiz::new(exam, questions)))
  }

  async fn list_unlabeled(&self) -> Result<Vec<Question>> {
    let raws: Vec<RawQuestion> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {QUESTION_COLUMNS} FROM questions q
           JOIN exams e ON e.exam_id = q.exam_id
           WHERE (q.topic IS NULL OR TRIM(q.topic) = '') AND e.source <> 'intelligent'
           ORDER BY e.created_at, q.position"
        ))?;
        let rows = stmt
          .query_map([], RawQuestion::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawQuestion::into_question).collect()
  }

  async fn apply_label(
    &self,
    question_id: Uuid,
    topic: String,
    difficulty: Difficulty,
  ) -> Result<bool> {
    let id_str = encode_uuid(question_id);
    let difficulty_str = difficulty.as_str().to_owned();

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE questions
           SET topic = ?2, difficulty = COALESCE(difficulty, ?3)
           WHERE question_id = ?1 AND (topic IS NULL OR TRIM(topic) = '')",
          rusqlite::params![id_str, topic, difficulty_str],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }
}

// ─── Usage ledger ────────────────────────────────────────────────────────────

impl UsageLedger for SqliteStore {
  async fn get_or_create(
    &self,
    user_id: String,
    date: NaiveDate,
    is_premium: bool,
  ) -> Result<LedgerEntry> {
    let date_str = encode_date(date);
    let now_str = encode_dt(Utc::now());

    let (raw, created, premium_corrected): (RawUsageRow, bool, bool) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let inserted = tx.execute(
          "INSERT INTO daily_usage (user_id, usage_date, is_premium, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?4)
           ON CONFLICT (user_id, usage_date) DO NOTHING",
          rusqlite::params![user_id, date_str, is_premium, now_str],
        )?;
        let corrected = tx.execute(
          "UPDATE daily_usage SET is_premium = ?3, updated_at = ?4
           WHERE user_id = ?1 AND usage_date = ?2 AND is_premium <> ?3",
          rusqlite::params![user_id, date_str, is_premium, now_str],
        )?;
        let raw = tx.query_row(
          &format!(
            "SELECT {USAGE_COLUMNS} FROM daily_usage WHERE user_id = ?1 AND usage_date = ?2"
          ),
          rusqlite::params![user_id, date_str],
          RawUsageRow::from_row,
        )?;
        tx.commit()?;
        Ok((raw, inserted > 0, corrected > 0))
      })
      .await?;

    Ok(LedgerEntry { row: raw.into_row()?, created, premium_corrected })
  }

  async fn increment(
    &self,
    user_id: String,
    date: NaiveDate,
    resource: ResourceType,
    amount: u32,
  ) -> Result<UsageRow> {
    let column = counter_column(resource);
    let date_str = encode_date(date);
    let now_str = encode_dt(Utc::now());
    let uid = user_id.clone();

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          &format!(
            "UPDATE daily_usage SET {column} = MIN({column} + ?3, ?5), updated_at = ?4
             WHERE user_id = ?1 AND usage_date = ?2"
          ),
          rusqlite::params![uid, date_str, amount, now_str, u32::MAX],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(keamed_core::Error::NoLedgerRow { user_id, date }.into());
    }

    self
      .fetch_usage_row(user_id.clone(), date)
      .await?
      .ok_or_else(|| keamed_core::Error::NoLedgerRow { user_id, date }.into())
  }

  async fn reset(&self, user_id: String, date: NaiveDate) -> Result<Option<UsageRow>> {
    let date_str = encode_date(date);
    let now_str = encode_dt(Utc::now());
    let uid = user_id.clone();

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE daily_usage
           SET simulation_count = 0, procedure_count = 0, ai_quiz_questions_count = 0,
               updated_at = ?3
           WHERE user_id = ?1 AND usage_date = ?2",
          rusqlite::params![uid, date_str, now_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    self.fetch_usage_row(user_id, date).await
  }

  async fn rows_for_date(&self, date: NaiveDate) -> Result<Vec<UsageRow>> {
    let date_str = encode_date(date);

    let raws: Vec<RawUsageRow> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {USAGE_COLUMNS} FROM daily_usage WHERE usage_date = ?1 ORDER BY user_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![date_str], RawUsageRow::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUsageRow::into_row).collect()
  }

  async fn daily_summary(&self, date: NaiveDate) -> Result<DailySummary> {
    let date_str = encode_date(date);

    let (totals, denied): ([i64; 6], i64) = self
      .conn
      .call(move |conn| {
        let totals = conn.query_row(
          "SELECT COUNT(*),
                  COALESCE(SUM(is_premium), 0),
                  COALESCE(SUM(1 - is_premium), 0),
                  COALESCE(SUM(simulation_count), 0),
                  COALESCE(SUM(procedure_count), 0),
                  COALESCE(SUM(ai_quiz_questions_count), 0)
           FROM daily_usage WHERE usage_date = ?1",
          rusqlite::params![date_str],
          |r| Ok([r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?]),
        )?;
        let denied = conn.query_row(
          "SELECT COUNT(*) FROM rate_limit_decisions
           WHERE decision_date = ?1 AND allowed = 0",
          rusqlite::params![date_str],
          |r| r.get(0),
        )?;
        Ok((totals, denied))
      })
      .await?;

    let wide = |v: i64| u64::try_from(v).map_err(|_| Error::Decode(format!("negative total: {v}")));
    Ok(DailySummary {
      date,
      total_users: decode_count(totals[0])?,
      premium_users: decode_count(totals[1])?,
      basic_users: decode_count(totals[2])?,
      total_simulations: wide(totals[3])?,
      total_procedures: wide(totals[4])?,
      total_quiz_questions: wide(totals[5])?,
      denied_checks: wide(denied)?,
    })
  }

  async fn record_decision(&self, record: DecisionRecord) -> Result<()> {
    let id_str = encode_uuid(record.decision_id);
    let at_str = encode_dt(record.decided_at);
    let date_str = encode_date(record.decided_at.date_naive());
    let resource = record.resource.as_str();
    let reason = record.reason.as_str();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO rate_limit_decisions
             (decision_id, user_id, resource_type, decided_at, decision_date,
              allowed, reason, current_count, limit_value)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            id_str,
            record.user_id,
            resource,
            at_str,
            date_str,
            record.allowed,
            reason,
            record.current_count,
            record.limit_value
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn redeem_decision(
    &self,
    decision_id: Uuid,
    user_id: String,
    resource: ResourceType,
    date: NaiveDate,
  ) -> Result<()> {
    let id_str = encode_uuid(decision_id);
    let date_str = encode_date(date);
    let resource = resource.as_str();
    let now_str = encode_dt(Utc::now());

    let redeemed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT OR IGNORE INTO redeemed_decisions (decision_id, redeemed_at)
           SELECT decision_id, ?5 FROM rate_limit_decisions
           WHERE decision_id = ?1 AND user_id = ?2 AND resource_type = ?3
             AND decision_date = ?4 AND allowed = 1",
          rusqlite::params![id_str, user_id, resource, date_str, now_str],
        )?)
      })
      .await?;

    if redeemed == 0 {
      return Err(keamed_core::Error::ReservationRejected(decision_id).into());
    }
    Ok(())
  }

  async fn list_decisions(
    &self,
    user_id: String,
    date: Option<NaiveDate>,
  ) -> Result<Vec<DecisionRecord>> {
    let date_str = date.map(encode_date);

    let raws: Vec<RawDecision> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {DECISION_COLUMNS} FROM rate_limit_decisions
           WHERE user_id = ?1 AND (?2 IS NULL OR decision_date = ?2)
           ORDER BY decided_at DESC, rowid DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![user_id, date_str], RawDecision::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDecision::into_record).collect()
  }
}

// ─── User directory ──────────────────────────────────────────────────────────

impl UserDirectory for SqliteStore {
  async fn get_user(&self, user_id: String) -> Result<Option<UserAccount>> {
    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT user_id, discipline, premium_features FROM users WHERE user_id = ?1",
              rusqlite::params![user_id],
              |row| {
                Ok(RawUser {
                  user_id:          row.get(0)?,
                  discipline:       row.get(1)?,
                  premium_features: row.get(2)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    Ok(raw.map(RawUser::into_account))
  }

  async fn upsert_user(&self, account: UserAccount) -> Result<UserAccount> {
    let premium = encode_premium(&account.premium)?;
    let now_str = encode_dt(Utc::now());
    let user_id = account.user_id.clone();
    let discipline = account.discipline.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_id, discipline, premium_features, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?4)
           ON CONFLICT (user_id) DO UPDATE SET
             discipline = excluded.discipline,
             premium_features = excluded.premium_features,
             updated_at = excluded.updated_at",
          rusqlite::params![user_id, discipline, premium, now_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(account)
  }
}
