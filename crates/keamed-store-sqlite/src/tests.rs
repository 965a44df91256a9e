//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{NaiveDate, TimeZone as _, Utc};
use keamed_core::{
  account::{CustomLimits, PremiumFeatures, UserAccount},
  exam::{ExamSource, NewExam},
  labeling,
  limits::{DecisionReason, LimitsHandle, RateLimiter},
  question::{Difficulty, NewQuestion},
  quiz::{QuizGenerator, QuizSettings},
  store::{QuestionCatalog, UsageLedger, UserDirectory},
  usage::ResourceType,
};
use rand::{rngs::StdRng, SeedableRng as _};
use std::sync::Arc;
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn day(d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(2025, 3, d).unwrap() }

fn options() -> Vec<String> { vec!["A".into(), "B".into(), "C".into(), "D".into()] }

fn exam(discipline: &str, source: ExamSource, topics: &[&str]) -> NewExam {
  NewExam {
    title: format!("{discipline} bank"),
    discipline: discipline.into(),
    source,
    time_limit_minutes: 30,
    created_by: None,
    questions: topics
      .iter()
      .enumerate()
      .map(|(i, t)| NewQuestion::new(format!("Question {i} about {t}"), options(), 1).with_topic(*t))
      .collect(),
  }
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_exam_keeps_question_order() {
  let s = store().await;
  let quiz = s
    .create_exam(exam("nursing", ExamSource::Exam, &["anatomy", "pharmacology", "ethics"]))
    .await
    .unwrap();
  assert_eq!(quiz.question_count, 3);

  let fetched = s.get_quiz(quiz.exam.exam_id).await.unwrap().unwrap();
  assert_eq!(fetched.exam.title, "nursing bank");
  assert_eq!(fetched.exam.source, ExamSource::Exam);
  let topics: Vec<_> = fetched.questions.iter().filter_map(|q| q.topic()).collect();
  assert_eq!(topics, ["anatomy", "pharmacology", "ethics"]);
  assert_eq!(fetched.questions[0].options, options());
  assert_eq!(fetched.questions[0].correct_index, 1);
}

#[tokio::test]
async fn get_quiz_missing_returns_none() {
  let s = store().await;
  assert!(s.get_quiz(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn list_topics_is_distinct_and_sorted() {
  let s = store().await;
  s.create_exam(exam("nursing", ExamSource::Exam, &["pharmacology", "anatomy", "pharmacology"]))
    .await
    .unwrap();
  let mut untagged = exam("nursing", ExamSource::Quiz, &[]);
  untagged.questions.push(NewQuestion::new("No topic here", options(), 0));
  s.create_exam(untagged).await.unwrap();

  assert_eq!(s.list_topics().await.unwrap(), ["anatomy", "pharmacology"]);
}

#[tokio::test]
async fn list_eligible_filters_discipline_source_and_topic() {
  let s = store().await;
  s.create_exam(exam("nursing", ExamSource::Exam, &["anatomy", "physiology"]))
    .await
    .unwrap();
  s.create_exam(exam("nursing", ExamSource::Intelligent, &["anatomy"]))
    .await
    .unwrap();
  s.create_exam(exam("medicine", ExamSource::Quiz, &["anatomy"]))
    .await
    .unwrap();
  let mut mixed = exam("nursing", ExamSource::Quiz, &["ethics"]);
  mixed.questions.push(NewQuestion::new("Untagged", options(), 0));
  s.create_exam(mixed).await.unwrap();

  let pool = s
    .list_eligible("nursing", &[ExamSource::Exam, ExamSource::Quiz])
    .await
    .unwrap();
  assert_eq!(pool.len(), 3);
  assert!(pool.iter().all(|q| q.is_eligible()));

  let any_source = s.list_eligible("nursing", &[]).await.unwrap();
  assert_eq!(any_source.len(), 4);
}

#[tokio::test]
async fn apply_label_only_touches_unlabeled_questions() {
  let s = store().await;
  let mut bank = exam("nursing", ExamSource::Exam, &["anatomy"]);
  let mut hard = NewQuestion::new("Untagged", options(), 0);
  hard.difficulty = Some(Difficulty::Advanced);
  bank.questions.push(hard);
  let quiz = s.create_exam(bank).await.unwrap();

  let unlabeled = s.list_unlabeled().await.unwrap();
  assert_eq!(unlabeled.len(), 1);
  let target = unlabeled[0].question_id;

  assert!(s.apply_label(target, "pharmacology".into(), Difficulty::Basic).await.unwrap());
  assert!(!s.apply_label(target, "anatomy".into(), Difficulty::Basic).await.unwrap());
  assert!(
    !s.apply_label(quiz.questions[0].question_id, "ethics".into(), Difficulty::Basic)
      .await
      .unwrap()
  );

  let fetched = s.get_quiz(quiz.exam.exam_id).await.unwrap().unwrap();
  let labeled = fetched.questions.iter().find(|q| q.question_id == target).unwrap();
  assert_eq!(labeled.topic(), Some("pharmacology"));
  // An imported difficulty survives labeling.
  assert_eq!(labeled.difficulty, Some(Difficulty::Advanced));
  assert!(s.list_unlabeled().await.unwrap().is_empty());
}

#[tokio::test]
async fn auto_label_pass_skips_generated_quizzes() {
  let s = store().await;
  let mut bank = exam("nursing", ExamSource::Quiz, &[]);
  bank.questions.push(NewQuestion::new(
    "What is the correct dosage of this medication for renal patients?",
    options(),
    0,
  ));
  s.create_exam(bank).await.unwrap();
  let mut snapshot = exam("nursing", ExamSource::Intelligent, &[]);
  snapshot.questions.push(NewQuestion::new("Snapshot question", options(), 0));
  s.create_exam(snapshot).await.unwrap();

  let report = labeling::auto_label(&s).await.unwrap();
  assert_eq!(report.scanned, 1);
  assert_eq!(report.labeled, 1);
  assert_eq!(report.by_topic.get("pharmacology"), Some(&1));
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn get_or_create_is_idempotent() {
  let s = store().await;
  let first = s.get_or_create("u1".into(), day(1), false).await.unwrap();
  assert!(first.created);
  assert_eq!(first.row.simulation_count, 0);

  let second = s.get_or_create("u1".into(), day(1), false).await.unwrap();
  assert!(!second.created);
  assert!(!second.premium_corrected);
  assert_eq!(s.rows_for_date(day(1)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn premium_flag_is_corrected_without_touching_counters() {
  let s = store().await;
  s.get_or_create("u1".into(), day(1), false).await.unwrap();
  s.increment("u1".into(), day(1), ResourceType::Simulation, 1)
    .await
    .unwrap();

  let entry = s.get_or_create("u1".into(), day(1), true).await.unwrap();
  assert!(entry.premium_corrected);
  assert!(entry.row.is_premium);
  assert_eq!(entry.row.simulation_count, 1);
}

#[tokio::test]
async fn increment_adds_to_one_counter() {
  let s = store().await;
  s.get_or_create("u1".into(), day(1), true).await.unwrap();
  s.increment("u1".into(), day(1), ResourceType::QuizQuestion, 15)
    .await
    .unwrap();
  let row = s
    .increment("u1".into(), day(1), ResourceType::QuizQuestion, 10)
    .await
    .unwrap();
  assert_eq!(row.ai_quiz_questions_count, 25);
  assert_eq!(row.simulation_count, 0);
  assert_eq!(row.procedure_count, 0);
}

#[tokio::test]
async fn increment_saturates_instead_of_poisoning_the_row() {
  let s = store().await;
  s.get_or_create("u1".into(), day(1), false).await.unwrap();
  for _ in 0..2 {
    let row = s
      .increment("u1".into(), day(1), ResourceType::Procedure, u32::MAX)
      .await
      .unwrap();
    assert_eq!(row.procedure_count, u32::MAX);
  }

  // The row still decodes for every later access that day.
  let entry = s.get_or_create("u1".into(), day(1), false).await.unwrap();
  assert_eq!(entry.row.procedure_count, u32::MAX);
  assert_eq!(entry.row.simulation_count, 0);
  assert_eq!(s.daily_summary(day(1)).await.unwrap().total_procedures, u64::from(u32::MAX));
}

#[tokio::test]
async fn increment_without_row_fails() {
  let s = store().await;
  let err = s
    .increment("ghost".into(), day(1), ResourceType::Procedure, 1)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(keamed_core::Error::NoLedgerRow { ref user_id, .. }) if user_id == "ghost"
  ));
}

#[tokio::test]
async fn days_are_independent() {
  let s = store().await;
  s.get_or_create("u1".into(), day(1), false).await.unwrap();
  s.increment("u1".into(), day(1), ResourceType::Simulation, 1)
    .await
    .unwrap();
  let next = s.get_or_create("u1".into(), day(2), false).await.unwrap();
  assert!(next.created);
  assert_eq!(next.row.simulation_count, 0);
}

#[tokio::test]
async fn reset_zeroes_counters() {
  let s = store().await;
  assert!(s.reset("u1".into(), day(1)).await.unwrap().is_none());

  s.get_or_create("u1".into(), day(1), false).await.unwrap();
  s.increment("u1".into(), day(1), ResourceType::Procedure, 3)
    .await
    .unwrap();
  let row = s.reset("u1".into(), day(1)).await.unwrap().unwrap();
  assert_eq!(row.procedure_count, 0);
}

#[tokio::test]
async fn daily_summary_splits_tiers_and_counts_denials() {
  let s = store().await;
  let limiter = RateLimiter::new(Arc::new(s.clone()), LimitsHandle::default());
  let now = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();

  for (user, premium) in [("a", true), ("b", false), ("c", false)] {
    let outcome = limiter
      .check_at(now, user, ResourceType::Simulation, premium, None)
      .await
      .unwrap();
    limiter
      .record_usage(outcome.reservation.unwrap(), 1)
      .await
      .unwrap();
  }
  // Basic user "b" has used the single daily simulation.
  let denied = limiter
    .check_at(now, "b", ResourceType::Simulation, false, None)
    .await
    .unwrap();
  assert!(!denied.decision.allowed);

  let summary = s.daily_summary(day(1)).await.unwrap();
  assert_eq!(summary.total_users, 3);
  assert_eq!(summary.premium_users, 1);
  assert_eq!(summary.basic_users, 2);
  assert_eq!(summary.total_simulations, 3);
  assert_eq!(summary.total_procedures, 0);
  assert_eq!(summary.denied_checks, 1);

  let empty = s.daily_summary(day(2)).await.unwrap();
  assert_eq!(empty.total_users, 0);
}

#[tokio::test]
async fn decisions_are_listed_newest_first_and_survive_reset() {
  let s = store().await;
  let limiter = RateLimiter::new(Arc::new(s.clone()), LimitsHandle::default());
  let morning = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
  let evening = Utc.with_ymd_and_hms(2025, 3, 1, 20, 0, 0).unwrap();
  let next_day = Utc.with_ymd_and_hms(2025, 3, 2, 8, 0, 0).unwrap();

  limiter
    .check_at(morning, "u1", ResourceType::Procedure, false, None)
    .await
    .unwrap();
  limiter
    .check_at(evening, "u1", ResourceType::Simulation, false, None)
    .await
    .unwrap();
  limiter
    .check_at(next_day, "u1", ResourceType::Procedure, false, None)
    .await
    .unwrap();

  let all = s.list_decisions("u1".into(), None).await.unwrap();
  assert_eq!(all.len(), 3);
  assert_eq!(all[0].decided_at, next_day);
  assert_eq!(all[2].decided_at, morning);

  limiter.reset_usage("u1", day(1)).await.unwrap();
  let first_day = s.list_decisions("u1".into(), Some(day(1))).await.unwrap();
  assert_eq!(first_day.len(), 2);
  assert_eq!(first_day[0].resource, ResourceType::Simulation);
  assert_eq!(first_day[0].reason, DecisionReason::WithinLimit);
  assert_eq!(first_day[0].limit_value, Some(1));
}

#[tokio::test]
async fn reservations_redeem_once_against_their_decision() {
  let s = store().await;
  let limiter = RateLimiter::new(Arc::new(s.clone()), LimitsHandle::default());
  let now = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();

  let outcome = limiter
    .check_at(now, "u1", ResourceType::Simulation, true, None)
    .await
    .unwrap();
  let reservation = outcome.reservation.unwrap();
  let id = reservation.decision_id;

  // Wrong resource or day does not spend the reservation.
  for (resource, date) in [(ResourceType::Procedure, day(1)), (ResourceType::Simulation, day(2))] {
    let err = s
      .redeem_decision(id, "u1".into(), resource, date)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Core(keamed_core::Error::ReservationRejected(_))));
  }

  let receipt = limiter.record_usage(reservation.clone(), 1).await.unwrap();
  assert_eq!(receipt.new_count, 1);

  let err = limiter.record_usage(reservation, 1).await.unwrap_err();
  assert!(matches!(err, Error::Core(keamed_core::Error::ReservationRejected(r)) if r == id));
  let rows = s.rows_for_date(day(1)).await.unwrap();
  assert_eq!(rows[0].simulation_count, 1);
}

#[tokio::test]
async fn denied_or_unknown_decisions_are_not_redeemable() {
  let s = store().await;
  let limiter = RateLimiter::new(Arc::new(s.clone()), LimitsHandle::default());
  let now = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();

  let first = limiter
    .check_at(now, "u1", ResourceType::Procedure, false, None)
    .await
    .unwrap();
  limiter.record_usage(first.reservation.unwrap(), 1).await.unwrap();
  limiter
    .check_at(now, "u1", ResourceType::Procedure, false, None)
    .await
    .unwrap();

  let denied = s.list_decisions("u1".into(), None).await.unwrap();
  assert!(!denied[0].allowed);
  let err = s
    .redeem_decision(denied[0].decision_id, "u1".into(), ResourceType::Procedure, day(1))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(keamed_core::Error::ReservationRejected(_))));

  let err = s
    .redeem_decision(Uuid::new_v4(), "u1".into(), ResourceType::Procedure, day(1))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(keamed_core::Error::ReservationRejected(_))));
}

#[tokio::test]
async fn unlimited_custom_limit_is_stored_as_null() {
  let s = store().await;
  let limiter = RateLimiter::new(Arc::new(s.clone()), LimitsHandle::default());
  let custom = CustomLimits { simulations_per_day: Some(0), ..Default::default() };
  let outcome = limiter
    .check("u1", ResourceType::Simulation, false, Some(&custom))
    .await
    .unwrap();
  assert!(outcome.decision.allowed);
  assert_eq!(outcome.decision.limit, None);

  let records = s.list_decisions("u1".into(), None).await.unwrap();
  assert_eq!(records[0].limit_value, None);
  assert_eq!(records[0].reason, DecisionReason::NoLimitDefined);
}

// ─── Directory ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_and_get_user() {
  let s = store().await;
  assert!(s.get_user("u1".into()).await.unwrap().is_none());

  let mut account = UserAccount {
    user_id:    "u1".into(),
    discipline: "nursing".into(),
    premium:    PremiumFeatures::default(),
  };
  s.upsert_user(account.clone()).await.unwrap();
  assert_eq!(s.get_user("u1".into()).await.unwrap(), Some(account.clone()));

  account.premium.ai_simulation = true;
  account.premium.custom_limits =
    Some(CustomLimits { procedures_per_day: Some(9), ..Default::default() });
  s.upsert_user(account.clone()).await.unwrap();
  let fetched = s.get_user("u1".into()).await.unwrap().unwrap();
  assert!(fetched.premium.is_premium());
  assert_eq!(fetched.premium.custom_limits.unwrap().procedures_per_day, Some(9));
}

// ─── Quiz generation ─────────────────────────────────────────────────────────

#[tokio::test]
async fn generated_quiz_is_a_persisted_snapshot() {
  let s = Arc::new(store().await);
  let topics = [
    "anatomy",
    "clinical_skills",
    "medical_ethics",
    "patient_care",
    "pharmacology",
    "physiology",
  ];
  let bank: Vec<&str> = topics.iter().flat_map(|t| [*t; 4]).collect();
  s.create_exam(exam("nursing", ExamSource::Exam, &bank)).await.unwrap();

  let generator = QuizGenerator::new(Arc::clone(&s), QuizSettings::default());
  let mut rng = StdRng::seed_from_u64(7);
  let quiz = generator
    .generate("u1", "nursing", Some(10), &mut rng)
    .await
    .unwrap();

  assert_eq!(quiz.question_count, 10);
  assert_eq!(quiz.exam.source, ExamSource::Intelligent);
  assert_eq!(quiz.exam.created_by.as_deref(), Some("u1"));
  assert_eq!(quiz.exam.time_limit_minutes, 10);

  let stored = s.get_quiz(quiz.exam.exam_id).await.unwrap().unwrap();
  assert_eq!(stored.question_count, 10);

  // Snapshots never feed back into the pool.
  let pool = s
    .list_eligible("nursing", &QuizSettings::default().pool_sources)
    .await
    .unwrap();
  assert_eq!(pool.len(), 24);
}

#[tokio::test]
async fn generation_without_pool_fails() {
  let s = Arc::new(store().await);
  let generator = QuizGenerator::new(s, QuizSettings::default());
  let mut rng = StdRng::seed_from_u64(1);
  let err = generator
    .generate("u1", "dentistry", None, &mut rng)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(keamed_core::Error::NoEligibleQuestions(_))));
}
