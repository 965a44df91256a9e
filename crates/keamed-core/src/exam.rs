//! Exams and generated quizzes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::question::{NewQuestion, Question};

/// Where an exam's questions came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamSource {
  /// A fixed exam uploaded by staff.
  Exam,
  /// A question bank uploaded for quiz practice.
  Quiz,
  /// A snapshot produced by intelligent quiz generation.
  Intelligent,
}

impl ExamSource {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Exam => "exam",
      Self::Quiz => "quiz",
      Self::Intelligent => "intelligent",
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exam {
  pub exam_id:            Uuid,
  pub title:              String,
  pub discipline:         String,
  pub source:             ExamSource,
  pub time_limit_minutes: u32,
  /// The user a generated quiz was built for; `None` for imported exams.
  pub created_by:         Option<String>,
  pub created_at:         DateTime<Utc>,
}

/// Input for creating an exam together with its questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExam {
  pub title:              String,
  pub discipline:         String,
  pub source:             ExamSource,
  pub time_limit_minutes: u32,
  #[serde(default)]
  pub created_by:         Option<String>,
  pub questions:          Vec<NewQuestion>,
}

/// An exam with all of its questions, in stored order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
  pub exam:           Exam,
  pub question_count: usize,
  pub questions:      Vec<Question>,
}

impl Quiz {
  pub fn new(exam: Exam, questions: Vec<Question>) -> Self {
    Self { exam, question_count: questions.len(), questions }
  }
}
