//! Gap profiles: which topics a learner should practise.
//!
//! The current policy is a catalog heuristic, not learner analytics: topics
//! are bucketed by catalog order, independent of the user.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Used when the catalog has fewer than [`MIN_CATALOG_TOPICS`] topics.
pub const DEFAULT_TOPICS: [&str; 6] = [
  "pharmacology",
  "anatomy",
  "physiology",
  "patient_care",
  "clinical_skills",
  "medical_ethics",
];

pub const MIN_CATALOG_TOPICS: usize = 6;

const BUCKET: usize = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapProfile {
  pub critical_gaps:   BTreeSet<String>,
  pub moderate_gaps:   BTreeSet<String>,
  pub strong_areas:    BTreeSet<String>,
  pub priority_topics: BTreeSet<String>,
}

impl GapProfile {
  /// Bucket the catalog topics (in catalog order) into a profile.
  ///
  /// Critical, moderate and strong take two topics each. Priority takes the
  /// seventh and eighth topics when the catalog has them and otherwise
  /// mirrors the critical bucket.
  pub fn from_catalog(topics: &[String]) -> Self {
    let mut distinct: Vec<&str> = Vec::with_capacity(topics.len());
    for t in topics.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
      if !distinct.contains(&t) {
        distinct.push(t);
      }
    }

    let vocab: Vec<&str> = if distinct.len() >= MIN_CATALOG_TOPICS {
      distinct
    } else {
      DEFAULT_TOPICS.to_vec()
    };

    let bucket = |i: usize| -> BTreeSet<String> {
      vocab
        .iter()
        .skip(i * BUCKET)
        .take(BUCKET)
        .map(|t| (*t).to_owned())
        .collect()
    };

    let critical_gaps = bucket(0);
    let priority = bucket(3);
    Self {
      priority_topics: if priority.is_empty() { critical_gaps.clone() } else { priority },
      moderate_gaps: bucket(1),
      strong_areas: bucket(2),
      critical_gaps,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn topics(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| (*s).to_owned()).collect()
  }

  fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| (*s).to_owned()).collect()
  }

  #[test]
  fn sparse_catalog_uses_default_vocabulary() {
    let profile = GapProfile::from_catalog(&topics(&["anatomy", "patient_care", "pharmacology"]));
    assert_eq!(profile.critical_gaps, set(&["pharmacology", "anatomy"]));
    assert_eq!(profile.moderate_gaps, set(&["physiology", "patient_care"]));
    assert_eq!(profile.strong_areas, set(&["clinical_skills", "medical_ethics"]));
    assert_eq!(profile.priority_topics, profile.critical_gaps);
  }

  #[test]
  fn six_topics_are_bucketed_in_order() {
    let profile = GapProfile::from_catalog(&topics(&["a", "b", "c", "d", "e", "f"]));
    assert_eq!(profile.critical_gaps, set(&["a", "b"]));
    assert_eq!(profile.moderate_gaps, set(&["c", "d"]));
    assert_eq!(profile.strong_areas, set(&["e", "f"]));
    assert_eq!(profile.priority_topics, set(&["a", "b"]));
  }

  #[test]
  fn eighth_topic_feeds_priority_bucket() {
    let profile =
      GapProfile::from_catalog(&topics(&["a", "b", "c", "d", "e", "f", "g", "h", "i"]));
    assert_eq!(profile.priority_topics, set(&["g", "h"]));
  }

  #[test]
  fn duplicates_and_blanks_do_not_count() {
    let profile =
      GapProfile::from_catalog(&topics(&["a", "a", "", "b", "c", "d", "e", " "]));
    assert_eq!(profile.critical_gaps, set(&["pharmacology", "anatomy"]));
  }
}
