//! AI-assisted patient cases for simulations and procedures.
//!
//! When an LLM endpoint is configured, a chat-completion request asks for a
//! case as JSON. The call is bounded by a timeout; on timeout, transport or
//! parse failure (or with no endpoint at all) a canned case is returned.

use std::time::Duration;

use keamed_core::usage::ResourceType;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

// ─── Settings ────────────────────────────────────────────────────────────────

/// An OpenAI-compatible chat-completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
  pub endpoint:     String,
  #[serde(default)]
  pub api_key:      Option<String>,
  pub model:        String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 { 20 }

// ─── Case types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseKind {
  Simulation,
  Procedure,
}

impl CaseKind {
  /// The metered resource a case of this kind consumes.
  pub fn resource(self) -> ResourceType {
    match self {
      Self::Simulation => ResourceType::Simulation,
      Self::Procedure => ResourceType::Procedure,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaseRequest {
  #[serde(default = "default_specialty")]
  pub specialty:  String,
  #[serde(default = "default_difficulty")]
  pub difficulty: String,
}

fn default_specialty() -> String { "emergency".into() }
fn default_difficulty() -> String { "intermediate".into() }

impl Default for CaseRequest {
  fn default() -> Self {
    Self { specialty: default_specialty(), difficulty: default_difficulty() }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Demographics {
  pub age:              u32,
  pub gender:           String,
  pub relevant_history: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
  pub hr:   u32,
  pub bp:   String,
  pub rr:   u32,
  pub temp: f32,
  pub spo2: u32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pain: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseOption {
  pub text:         String,
  pub is_optimal:   bool,
  pub rationale:    String,
  #[serde(default)]
  pub consequences: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionPoint {
  pub id:              String,
  pub situation:       String,
  pub options:         Vec<CaseOption>,
  #[serde(default)]
  pub correct_actions: Vec<String>,
  #[serde(default)]
  pub common_errors:   Vec<String>,
}

/// The clinical content of a case, as produced by the model or the template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseContent {
  pub title:              String,
  pub presentation:       String,
  pub demographics:       Demographics,
  pub initial_vitals:     Vitals,
  pub initial_assessment: String,
  pub decision_points:    Vec<DecisionPoint>,
  #[serde(default)]
  pub learning_points:    Vec<String>,
  /// Minutes.
  pub estimated_duration: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseOrigin {
  Llm,
  Template,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedCase {
  pub id:         Uuid,
  pub kind:       CaseKind,
  pub specialty:  String,
  pub difficulty: String,
  pub origin:     CaseOrigin,
  #[serde(flatten)]
  pub content:    CaseContent,
}

// ─── Generator ───────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
enum LlmError {
  #[error("timed out after {0:?}")]
  Timeout(Duration),
  #[error("transport: {0}")]
  Http(#[from] reqwest::Error),
  #[error("endpoint answered {0}")]
  Status(reqwest::StatusCode),
  #[error("reply had no message content")]
  EmptyReply,
  #[error("reply was not a case: {0}")]
  Json(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct ChatResponse {
  choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
  message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
  content: Option<String>,
}

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Debug, Clone, Default)]
pub struct CaseGenerator {
  client: Client,
  llm:    Option<LlmSettings>,
}

impl CaseGenerator {
  pub fn new(llm: Option<LlmSettings>) -> Self { Self { client: Client::new(), llm } }

  /// A generator that always serves the template case.
  pub fn template_only() -> Self { Self::default() }

  /// Never fails: any model failure degrades to the template case.
  pub async fn generate(&self, kind: CaseKind, request: &CaseRequest) -> GeneratedCase {
    let (origin, content) = match &self.llm {
      Some(settings) => match self.ask_model(settings, kind, request).await {
        Ok(content) => (CaseOrigin::Llm, content),
        Err(e) => {
          tracing::warn!(error = %e, kind = ?kind, "case generation fell back to template");
          (CaseOrigin::Template, template_case(kind, request))
        }
      },
      None => (CaseOrigin::Template, template_case(kind, request)),
    };

    GeneratedCase {
      id: Uuid::new_v4(),
      kind,
      specialty: request.specialty.clone(),
      difficulty: request.difficulty.clone(),
      origin,
      content,
    }
  }

  async fn ask_model(
    &self,
    settings: &LlmSettings,
    kind: CaseKind,
    request: &CaseRequest,
  ) -> Result<CaseContent, LlmError> {
    let limit = Duration::from_secs(settings.timeout_secs);
    tokio::time::timeout(limit, self.chat(settings, kind, request))
      .await
      .map_err(|_| LlmError::Timeout(limit))?
  }

  async fn chat(
    &self,
    settings: &LlmSettings,
    kind: CaseKind,
    request: &CaseRequest,
  ) -> Result<CaseContent, LlmError> {
    let system = "You write realistic clinical training cases for healthcare students. \
      Reply with a single JSON object with the fields title, presentation, \
      demographics {age, gender, relevantHistory}, initialVitals {hr, bp, rr, \
      temp, spo2, pain}, initialAssessment, decisionPoints [{id, situation, \
      options [{text, isOptimal, rationale, consequences}], correctActions, \
      commonErrors}], learningPoints and estimatedDuration (minutes).";
    let task = match kind {
      CaseKind::Simulation => "an interactive patient simulation",
      CaseKind::Procedure => "a step-by-step clinical procedure walkthrough",
    };
    let user = format!(
      "Write {task} in {} at {} difficulty.",
      request.specialty, request.difficulty
    );
    let payload = json!({
      "model": settings.model,
      "messages": [
        { "role": "system", "content": system },
        { "role": "user", "content": user },
      ],
      "response_format": { "type": "json_object" },
    });

    let mut req = self.client.post(&settings.endpoint).json(&payload);
    if let Some(key) = &settings.api_key {
      req = req.bearer_auth(key);
    }
    let resp = req.send().await?;
    if !resp.status().is_success() {
      return Err(LlmError::Status(resp.status()));
    }

    let body: ChatResponse = resp.json().await?;
    let content = body
      .choices
      .into_iter()
      .next()
      .and_then(|c| c.message.content)
      .ok_or(LlmError::EmptyReply)?;
    Ok(serde_json::from_str(&content)?)
  }
}

// ─── Template ────────────────────────────────────────────────────────────────

fn option(text: &str, is_optimal: bool, rationale: &str, consequences: &[&str]) -> CaseOption {
  CaseOption {
    text: text.into(),
    is_optimal,
    rationale: rationale.into(),
    consequences: consequences.iter().map(|s| (*s).to_owned()).collect(),
  }
}

fn strings(items: &[&str]) -> Vec<String> { items.iter().map(|s| (*s).to_owned()).collect() }

/// Canned case used when no model is available.
pub fn template_case(kind: CaseKind, request: &CaseRequest) -> CaseContent {
  let specialty = &request.specialty;
  let difficulty = &request.difficulty;

  let decision_points = match kind {
    CaseKind::Simulation => vec![
      DecisionPoint {
        id:              "dp1".into(),
        situation:       "Initial patient assessment and management priorities".into(),
        options:         vec![
          option(
            "Perform ABCDE assessment and establish IV access",
            true,
            "Standard initial approach for emergency patients",
            &["Systematic assessment", "Early intervention"],
          ),
          option(
            "Order extensive lab tests before assessment",
            false,
            "Delays critical assessment and intervention",
            &["Wasted time", "Missed critical findings"],
          ),
        ],
        correct_actions: strings(&["ABCDE assessment", "IV access", "Monitor vitals"]),
        common_errors:   strings(&["Jumping to diagnosis", "Missing vital signs"]),
      },
      DecisionPoint {
        id:              "dp2".into(),
        situation:       "Patient's condition begins to deteriorate".into(),
        options:         vec![
          option(
            "Administer oxygen and call for senior help",
            true,
            "Appropriate escalation and basic intervention",
            &["Improved oxygenation", "Team support"],
          ),
          option(
            "Continue current management and monitor",
            false,
            "Insufficient response to deterioration",
            &["Further deterioration", "Missed intervention window"],
          ),
        ],
        correct_actions: strings(&["Administer oxygen", "Escalate care", "Reassess"]),
        common_errors:   strings(&["Delaying escalation", "Underestimating severity"]),
      },
    ],
    CaseKind::Procedure => vec![
      DecisionPoint {
        id:              "step1".into(),
        situation:       "Preparing the patient and equipment".into(),
        options:         vec![
          option(
            "Confirm identity, explain the procedure and obtain consent",
            true,
            "Consent and identification precede any intervention",
            &["Cooperative patient", "Safe practice"],
          ),
          option(
            "Begin immediately to save time",
            false,
            "Skips consent and patient identification",
            &["Wrong-patient risk", "Anxious patient"],
          ),
        ],
        correct_actions: strings(&["Hand hygiene", "Verify identity", "Obtain consent"]),
        common_errors:   strings(&["Skipping consent", "Incomplete equipment check"]),
      },
      DecisionPoint {
        id:              "step2".into(),
        situation:       "Performing the procedure with aseptic technique".into(),
        options:         vec![
          option(
            "Maintain a sterile field and monitor the patient throughout",
            true,
            "Reduces infection risk and detects complications early",
            &["Low infection risk", "Early complication detection"],
          ),
          option(
            "Reuse opened equipment from a previous patient",
            false,
            "Breaks aseptic technique",
            &["Infection risk", "Incident report"],
          ),
        ],
        correct_actions: strings(&["Aseptic technique", "Monitor vitals", "Document"]),
        common_errors:   strings(&["Contaminating the field", "Poor documentation"]),
      },
    ],
  };

  let (title_kind, learning_points) = match kind {
    CaseKind::Simulation => ("Clinical Scenario", strings(&[
      "Systematic assessment saves lives",
      "Early recognition of deterioration",
      "Appropriate escalation of care",
    ])),
    CaseKind::Procedure => ("Procedure", strings(&[
      "Consent and identification come first",
      "Asepsis protects the patient",
      "Document every step",
    ])),
  };

  CaseContent {
    title: format!("{} {title_kind} - {}", title_case(specialty), title_case(difficulty)),
    presentation: format!(
      "Patient presents with symptoms typical for {specialty}. Requires clinical assessment \
       and management."
    ),
    demographics: Demographics {
      age:              45,
      gender:           "female".into(),
      relevant_history: "Hypertension, non-smoker".into(),
    },
    initial_vitals: Vitals {
      hr:   110,
      bp:   "140/90".into(),
      rr:   22,
      temp: 38.2,
      spo2: 94,
      pain: Some(6),
    },
    initial_assessment: "Patient appears anxious but alert. Requires immediate assessment \
                         and intervention."
      .into(),
    decision_points,
    learning_points,
    estimated_duration: 20,
  }
}

fn title_case(s: &str) -> String {
  let mut chars = s.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}
