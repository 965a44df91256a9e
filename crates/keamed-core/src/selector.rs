//! Weighted stratified sampling of questions for a quiz session.
//!
//! Tiers are filled strictly in order (critical, moderate, priority, fill),
//! each draw uniform and without replacement. The result is shuffled so its
//! order does not reveal tier boundaries.

use std::collections::{BTreeSet, HashSet};

use rand::{Rng, seq::SliceRandom};

use crate::{gap::GapProfile, question::Question};

pub const DEFAULT_TARGET: usize = 15;

/// Tier quota as a fraction of the target, in tenths, rounded down.
const CRITICAL_TENTHS: usize = 6;
const MODERATE_TENTHS: usize = 3;

/// Select up to `target` distinct questions from `pool` guided by `profile`.
///
/// Returns `min(target, distinct eligible candidates)` questions. An empty
/// pool yields an empty selection; callers decide how to report that.
pub fn select<R: Rng + ?Sized>(
  profile: &GapProfile,
  pool: Vec<Question>,
  target: usize,
  rng: &mut R,
) -> Vec<Question> {
  let mut seen = HashSet::with_capacity(pool.len());
  let mut remaining: Vec<Question> = pool
    .into_iter()
    .filter(|q| q.is_eligible() && seen.insert(q.question_id))
    .collect();

  let mut selected = Vec::with_capacity(target.min(remaining.len()));

  let critical_n = target * CRITICAL_TENTHS / 10;
  draw(&mut remaining, &mut selected, critical_n, rng, |q| {
    in_set(q, &profile.critical_gaps)
  });

  let moderate_n = target * MODERATE_TENTHS / 10;
  draw(&mut remaining, &mut selected, moderate_n, rng, |q| {
    in_set(q, &profile.moderate_gaps)
  });

  let priority_n = target.saturating_sub(selected.len());
  draw(&mut remaining, &mut selected, priority_n, rng, |q| {
    in_set(q, &profile.priority_topics)
  });

  let fill_n = target.saturating_sub(selected.len());
  draw(&mut remaining, &mut selected, fill_n, rng, |q| {
    !in_set(q, &profile.strong_areas)
  });

  let last_resort_n = target.saturating_sub(selected.len());
  draw(&mut remaining, &mut selected, last_resort_n, rng, |_| true);

  selected.shuffle(rng);
  selected
}

fn in_set(q: &Question, topics: &BTreeSet<String>) -> bool {
  q.topic().is_some_and(|t| topics.contains(t))
}

/// Move up to `n` uniformly chosen questions matching `pred` from
/// `remaining` into `selected`.
fn draw<R, F>(
  remaining: &mut Vec<Question>,
  selected: &mut Vec<Question>,
  n: usize,
  rng: &mut R,
  pred: F,
) where
  R: Rng + ?Sized,
  F: Fn(&Question) -> bool,
{
  if n == 0 {
    return;
  }
  let candidates: Vec<usize> = remaining
    .iter()
    .enumerate()
    .filter_map(|(i, q)| pred(q).then_some(i))
    .collect();

  let mut picked: Vec<usize> = candidates.choose_multiple(rng, n).copied().collect();
  // Descending, so each swap_remove leaves the lower indices untouched.
  picked.sort_unstable_by(|a, b| b.cmp(a));
  for i in picked {
    selected.push(remaining.swap_remove(i));
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use rand::{SeedableRng, rngs::StdRng};
  use uuid::Uuid;

  use super::*;

  fn question(topic: &str) -> Question {
    Question {
      question_id:   Uuid::new_v4(),
      exam_id:       Uuid::nil(),
      text:          format!("{topic} question"),
      options:       vec!["A".into(), "B".into(), "C".into(), "D".into()],
      correct_index: 0,
      rationale:     None,
      topic:         Some(topic.to_owned()),
      subtopic:      None,
      difficulty:    None,
    }
  }

  fn pool(per_topic: &[(&str, usize)]) -> Vec<Question> {
    per_topic
      .iter()
      .flat_map(|(t, n)| (0..*n).map(move |_| question(t)))
      .collect()
  }

  fn profile() -> GapProfile {
    let one = |t: &str| BTreeSet::from([t.to_owned()]);
    GapProfile {
      critical_gaps:   one("pharmacology"),
      moderate_gaps:   one("anatomy"),
      strong_areas:    one("ethics"),
      priority_topics: one("patient_care"),
    }
  }

  fn by_topic(qs: &[Question]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for q in qs {
      *counts.entry(q.topic.clone().unwrap()).or_insert(0) += 1;
    }
    counts
  }

  fn assert_distinct(qs: &[Question]) {
    let ids: HashSet<_> = qs.iter().map(|q| q.question_id).collect();
    assert_eq!(ids.len(), qs.len(), "duplicate question in selection");
  }

  #[test]
  fn tier_quotas_are_honoured() {
    let mut rng = StdRng::seed_from_u64(7);
    let candidates =
      pool(&[("pharmacology", 10), ("anatomy", 10), ("patient_care", 10), ("ethics", 10)]);

    for _ in 0..50 {
      let picked = select(&profile(), candidates.clone(), 10, &mut rng);
      assert_eq!(picked.len(), 10);
      assert_distinct(&picked);
      let counts = by_topic(&picked);
      assert_eq!(counts.get("pharmacology"), Some(&6));
      assert_eq!(counts.get("anatomy"), Some(&3));
      assert_eq!(counts.get("patient_care"), Some(&1));
      assert_eq!(counts.get("ethics"), None);
    }
  }

  #[test]
  fn never_exceeds_pool() {
    let mut rng = StdRng::seed_from_u64(1);
    let candidates = pool(&[("pharmacology", 2), ("ethics", 3)]);
    let picked = select(&profile(), candidates, 15, &mut rng);
    assert_eq!(picked.len(), 5);
    assert_distinct(&picked);
  }

  #[test]
  fn strong_areas_are_last_resort() {
    let mut rng = StdRng::seed_from_u64(3);
    let candidates = pool(&[("pharmacology", 1), ("radiology", 4), ("ethics", 10)]);
    let picked = select(&profile(), candidates, 8, &mut rng);
    let counts = by_topic(&picked);
    assert_eq!(counts.get("pharmacology"), Some(&1));
    assert_eq!(counts.get("radiology"), Some(&4));
    assert_eq!(counts.get("ethics"), Some(&3));
  }

  #[test]
  fn duplicates_and_untagged_are_dropped() {
    let mut rng = StdRng::seed_from_u64(11);
    let q = question("pharmacology");
    let mut untagged = question("anatomy");
    untagged.topic = None;
    let picked = select(&profile(), vec![q.clone(), q.clone(), q, untagged], 10, &mut rng);
    assert_eq!(picked.len(), 1);
  }

  #[test]
  fn empty_pool_gives_empty_selection() {
    let mut rng = StdRng::seed_from_u64(0);
    assert!(select(&profile(), Vec::new(), DEFAULT_TARGET, &mut rng).is_empty());
  }

  #[test]
  fn sparse_catalog_scenario_fills_from_remaining_pool() {
    let mut rng = StdRng::seed_from_u64(42);
    let candidates = pool(&[("pharmacology", 5), ("anatomy", 5), ("patient_care", 5)]);
    let topics: Vec<String> = ["anatomy", "patient_care", "pharmacology"]
      .iter()
      .map(|s| (*s).to_owned())
      .collect();
    let gap = GapProfile::from_catalog(&topics);

    for _ in 0..20 {
      let picked = select(&gap, candidates.clone(), 9, &mut rng);
      assert_eq!(picked.len(), 9);
      assert_distinct(&picked);
      let counts = by_topic(&picked);
      let critical = counts.get("pharmacology").copied().unwrap_or(0)
        + counts.get("anatomy").copied().unwrap_or(0);
      // floor(9 * 0.6) critical, floor(9 * 0.3) moderate, the rest priority
      // (which mirrors critical under the default vocabulary).
      assert_eq!(counts.get("patient_care"), Some(&2));
      assert_eq!(critical, 7);
    }
  }
}
