//! Topic and difficulty classifier for untagged questions.
//!
//! The keyword table is the single source of truth for both the admin
//! auto-label pass and import-time labeling.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
  question::{Difficulty, NewQuestion},
  store::QuestionCatalog,
};

/// Assigned when no keyword matches.
pub const FALLBACK_TOPIC: &str = "general";

/// Topic → keywords. Table order breaks ties between equally-scored topics.
pub const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
  ("pharmacology", &[
    "medication", "drug", "dose", "prescription", "side effect",
    "contraindication", "antibiotic", "analgesic", "therapeutic",
    "interaction", "overdose", "administration", "dosage", "adverse",
    "toxicity", "pharmacology", "pharmacokinetic", "warfarin", "insulin",
  ]),
  ("anatomy", &[
    "anatomy", "organ", "bone", "muscle", "nerve", "artery", "vein", "heart",
    "lung", "liver", "kidney", "brain", "spinal", "joint", "tissue",
    "structure",
  ]),
  ("physiology", &[
    "physiology", "function", "metabolism", "hormone", "system", "process",
    "mechanism", "homeostasis", "regulation", "secretion", "absorption",
    "circulation", "respiration",
  ]),
  ("clinical_skills", &[
    "assess", "examine", "procedure", "technique", "skill", "examination",
    "assessment", "diagnostic", "evaluate", "monitor", "observe", "palpate",
    "auscultate",
  ]),
  ("patient_care", &[
    "care", "nursing", "patient", "comfort", "hygiene", "support",
    "education", "teaching", "communication", "counseling", "recovery",
    "rehabilitation", "discharge",
  ]),
  ("medical_ethics", &[
    "ethics", "consent", "confidential", "rights", "legal", "ethical",
    "privacy", "autonomy", "beneficence", "non-maleficence", "justice",
    "dilemma", "decision",
  ]),
  ("emergency_care", &[
    "emergency", "critical", "urgent", "resuscitation", "triage", "crisis",
    "acute", "life-threatening", "cardiac arrest", "shock", "trauma",
  ]),
  ("diagnosis", &[
    "diagnosis", "diagnose", "test", "result", "interpret", "finding",
    "symptom", "sign", "laboratory", "imaging", "x-ray", "blood test",
    "diagnostic",
  ]),
];

/// Pick the topic whose keywords occur most often in `text`.
pub fn classify_topic(text: &str) -> &'static str {
  let lower = text.to_lowercase();
  let mut best = (FALLBACK_TOPIC, 0usize);
  for (topic, keywords) in TOPIC_KEYWORDS {
    let hits: usize = keywords.iter().map(|k| lower.matches(k).count()).sum();
    // Strictly greater keeps the earlier topic on ties.
    if hits > best.1 {
      best = (topic, hits);
    }
  }
  best.0
}

/// Difficulty from question length.
pub fn classify_difficulty(text: &str) -> Difficulty {
  let chars = text.chars().count();
  let words = text.split_whitespace().count();
  if words < 15 || chars < 100 {
    Difficulty::Basic
  } else if words < 30 || chars < 200 {
    Difficulty::Intermediate
  } else {
    Difficulty::Advanced
  }
}

/// Labels produced for a single question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
  pub topic:      String,
  pub difficulty: Difficulty,
}

/// Classify `text`, keeping an already-known difficulty.
pub fn label(text: &str, difficulty: Option<Difficulty>) -> Label {
  Label {
    topic:      classify_topic(text).to_owned(),
    difficulty: difficulty.unwrap_or_else(|| classify_difficulty(text)),
  }
}

/// Fill in missing topic and difficulty on a question about to be imported.
/// Returns `true` if the topic was assigned here.
pub fn label_new_question(q: &mut NewQuestion) -> bool {
  let untagged = q.topic.as_deref().is_none_or(|t| t.trim().is_empty());
  if untagged {
    let l = label(&q.text, q.difficulty);
    q.topic = Some(l.topic);
    q.difficulty = Some(l.difficulty);
  }
  untagged
}

/// Outcome of an auto-label pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LabelReport {
  pub scanned:  usize,
  pub labeled:  usize,
  pub by_topic: BTreeMap<String, usize>,
}

/// Scan every question without a topic and assign one.
pub async fn auto_label<S: QuestionCatalog>(store: &S) -> Result<LabelReport, S::Error> {
  let untagged = store.list_unlabeled().await?;
  let mut report = LabelReport { scanned: untagged.len(), ..Default::default() };

  for q in untagged {
    let l = label(&q.text, q.difficulty);
    if store.apply_label(q.question_id, l.topic.clone(), l.difficulty).await? {
      report.labeled += 1;
      *report.by_topic.entry(l.topic).or_default() += 1;
    }
  }

  tracing::info!(
    scanned = report.scanned,
    labeled = report.labeled,
    "auto-label pass finished"
  );
  Ok(report)
}
