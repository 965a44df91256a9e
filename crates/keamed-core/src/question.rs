//! Questions, the unit the selector draws from.
//!
//! A question belongs to exactly one exam. Questions copied into a generated
//! quiz are snapshots with fresh ids; the originals are never shared.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Difficulty label, either imported or assigned by the auto-labeler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
  Basic,
  Intermediate,
  Advanced,
}

impl Difficulty {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Basic => "basic",
      Self::Intermediate => "intermediate",
      Self::Advanced => "advanced",
    }
  }
}

/// A multiple-choice question as stored in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
  pub question_id:   Uuid,
  pub exam_id:       Uuid,
  pub text:          String,
  pub options:       Vec<String>,
  /// Index into `options` of the correct answer.
  pub correct_index: usize,
  pub rationale:     Option<String>,
  pub topic:         Option<String>,
  pub subtopic:      Option<String>,
  pub difficulty:    Option<Difficulty>,
}

impl Question {
  /// The topic label, if present and non-blank.
  pub fn topic(&self) -> Option<&str> {
    self.topic.as_deref().map(str::trim).filter(|t| !t.is_empty())
  }

  /// Only topic-labeled questions take part in intelligent selection.
  pub fn is_eligible(&self) -> bool { self.topic().is_some() }
}

/// Input for importing a question; ids are assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuestion {
  pub text:          String,
  pub options:       Vec<String>,
  pub correct_index: usize,
  #[serde(default)]
  pub rationale:     Option<String>,
  #[serde(default)]
  pub topic:         Option<String>,
  #[serde(default)]
  pub subtopic:      Option<String>,
  #[serde(default)]
  pub difficulty:    Option<Difficulty>,
}

impl NewQuestion {
  /// Convenience constructor with no labels or rationale.
  pub fn new(text: impl Into<String>, options: Vec<String>, correct_index: usize) -> Self {
    Self {
      text: text.into(),
      options,
      correct_index,
      rationale: None,
      topic: None,
      subtopic: None,
      difficulty: None,
    }
  }

  pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
    self.topic = Some(topic.into());
    self
  }
}

impl From<&Question> for NewQuestion {
  fn from(q: &Question) -> Self {
    Self {
      text:          q.text.clone(),
      options:       q.options.clone(),
      correct_index: q.correct_index,
      rationale:     q.rationale.clone(),
      topic:         q.topic.clone(),
      subtopic:      q.subtopic.clone(),
      difficulty:    q.difficulty,
    }
  }
}
