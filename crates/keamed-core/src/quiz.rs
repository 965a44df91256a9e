//! Smart Quiz generation: gap profile → selection → persisted snapshot.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
  Error,
  exam::{ExamSource, NewExam, Quiz},
  gap::GapProfile,
  question::NewQuestion,
  selector::{self, DEFAULT_TARGET},
  store::QuestionCatalog,
};

/// Tunables for quiz generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizSettings {
  pub default_count: usize,
  pub max_count:     usize,
  /// Exam sources whose questions form the candidate pool.
  pub pool_sources:  Vec<ExamSource>,
}

impl Default for QuizSettings {
  fn default() -> Self {
    Self {
      default_count: DEFAULT_TARGET,
      max_count:     50,
      pool_sources:  vec![ExamSource::Exam, ExamSource::Quiz],
    }
  }
}

impl QuizSettings {
  /// Requested length, defaulted and clamped to `1..=max_count`.
  pub fn target_count(&self, requested: Option<usize>) -> usize {
    requested
      .unwrap_or(self.default_count)
      .clamp(1, self.max_count.max(1))
  }
}

/// Builds intelligent quizzes from a [`QuestionCatalog`]. Cloning is cheap.
pub struct QuizGenerator<S> {
  store:    Arc<S>,
  settings: QuizSettings,
}

impl<S> Clone for QuizGenerator<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), settings: self.settings.clone() }
  }
}

impl<S: QuestionCatalog> QuizGenerator<S> {
  pub fn new(store: Arc<S>, settings: QuizSettings) -> Self { Self { store, settings } }

  pub fn settings(&self) -> &QuizSettings { &self.settings }

  /// The user's gap profile. `user_id` does not influence the current
  /// heuristic.
  pub async fn gap_profile(&self, user_id: &str) -> Result<GapProfile, S::Error> {
    let topics = self.store.list_topics().await?;
    tracing::trace!(user_id, topics = topics.len(), "building gap profile from catalog");
    Ok(GapProfile::from_catalog(&topics))
  }

  /// Generate and persist a quiz for `user_id`.
  ///
  /// Best effort: a pool smaller than the requested length yields a shorter
  /// quiz. An empty pool fails with [`Error::NoEligibleQuestions`].
  pub async fn generate<R: Rng + Send>(
    &self,
    user_id: &str,
    discipline: &str,
    requested: Option<usize>,
    rng: &mut R,
  ) -> Result<Quiz, S::Error> {
    let target = self.settings.target_count(requested);
    let profile = self.gap_profile(user_id).await?;
    let pool = self
      .store
      .list_eligible(discipline, &self.settings.pool_sources)
      .await?;

    if pool.is_empty() {
      return Err(Error::NoEligibleQuestions(discipline.to_owned()).into());
    }

    let pool_size = pool.len();
    let selected = selector::select(&profile, pool, target, rng);
    if selected.len() < target {
      tracing::warn!(
        discipline,
        target,
        available = selected.len(),
        "eligible pool smaller than requested quiz length"
      );
    }

    let today = Utc::now().date_naive();
    let exam = NewExam {
      title:              format!("Smart Quiz: {discipline} {today}"),
      discipline:         discipline.to_owned(),
      source:             ExamSource::Intelligent,
      time_limit_minutes: u32::try_from(selected.len()).unwrap_or(u32::MAX),
      created_by:         Some(user_id.to_owned()),
      questions:          selected.iter().map(NewQuestion::from).collect(),
    };

    let quiz = self.store.create_exam(exam).await?;
    tracing::info!(
      user_id,
      discipline,
      exam_id = %quiz.exam.exam_id,
      questions = quiz.question_count,
      pool_size,
      "smart quiz generated"
    );
    Ok(quiz)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn target_count_defaults_and_clamps() {
    let settings = QuizSettings::default();
    assert_eq!(settings.target_count(None), 15);
    assert_eq!(settings.target_count(Some(0)), 1);
    assert_eq!(settings.target_count(Some(9)), 9);
    assert_eq!(settings.target_count(Some(500)), 50);
  }
}
