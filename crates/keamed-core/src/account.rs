//! The slice of the user directory the core reads.
//!
//! Entitlements arrive as a JSON blob in the users table. They are decoded
//! once, at the storage boundary, into [`PremiumFeatures`].

use serde::{Deserialize, Serialize};

use crate::usage::ResourceType;

/// Per-user overrides of the tier defaults. A missing field means "use the
/// tier default"; `Some(0)` means unlimited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomLimits {
  pub simulations_per_day:    Option<u32>,
  pub procedures_per_day:     Option<u32>,
  pub quiz_questions_per_day: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub updated_at:             Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub updated_by:             Option<String>,
}

impl CustomLimits {
  pub fn for_resource(&self, resource: ResourceType) -> Option<u32> {
    match resource {
      ResourceType::Simulation => self.simulations_per_day,
      ResourceType::Procedure => self.procedures_per_day,
      ResourceType::QuizQuestion => self.quiz_questions_per_day,
    }
  }
}

/// Typed entitlement flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PremiumFeatures {
  /// Premium tier marker.
  pub ai_simulation: bool,
  pub custom_limits: Option<CustomLimits>,
}

impl PremiumFeatures {
  pub fn is_premium(&self) -> bool { self.ai_simulation }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
  pub user_id:    String,
  pub discipline: String,
  #[serde(default)]
  pub premium:    PremiumFeatures,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn decodes_admin_tool_blob() {
    let blob = r#"{
      "ai_simulation": true,
      "custom_limits": {
        "simulations_per_day": 3,
        "quiz_questions_per_day": 0,
        "updated_at": "2025-01-04T10:00:00",
        "updated_by": "admin_tool"
      }
    }"#;
    let features: PremiumFeatures = serde_json::from_str(blob).unwrap();
    assert!(features.is_premium());
    let limits = features.custom_limits.unwrap();
    assert_eq!(limits.for_resource(ResourceType::Simulation), Some(3));
    assert_eq!(limits.for_resource(ResourceType::Procedure), None);
    assert_eq!(limits.for_resource(ResourceType::QuizQuestion), Some(0));
  }

  #[test]
  fn empty_blob_is_basic_tier() {
    let features: PremiumFeatures = serde_json::from_str("{}").unwrap();
    assert!(!features.is_premium());
    assert!(features.custom_limits.is_none());
  }
}
