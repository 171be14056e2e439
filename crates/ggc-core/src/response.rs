//! Survey responses, answers and supporting documents.
//!
//! A response is one organisation's evolving submission against one survey.
//! It holds at most one answer per question; answers may cite documents owned
//! by the same organisation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString};
use uuid::Uuid;

use crate::Level;

// ─── Organisation / Document ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organisation {
  pub organisation_id: Uuid,
  pub name:            String,
  pub created_at:      DateTime<Utc>,
}

/// A document in an organisation's library. Only metadata lives here; file
/// storage is handled elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
  pub document_id:     Uuid,
  pub organisation_id: Uuid,
  pub name:            String,
  pub expiry:          Option<NaiveDate>,
  pub created_at:      DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDocument {
  pub name:   String,
  #[serde(default)]
  pub expiry: Option<NaiveDate>,
}

// ─── SurveyResponse ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyResponse {
  pub response_id:     Uuid,
  pub organisation_id: Uuid,
  pub survey_id:       Uuid,
  /// The target tier. Mutable until the response is submitted.
  pub level:           Level,
  pub created_at:      DateTime<Utc>,
  pub modified_at:     DateTime<Utc>,
  /// `None` while the response is a draft. Set exactly once.
  pub submitted_at:    Option<DateTime<Utc>>,
}

impl SurveyResponse {
  pub fn is_submitted(&self) -> bool { self.submitted_at.is_some() }
}

// ─── Answer ──────────────────────────────────────────────────────────────────

/// The closed set of answer values. The kebab-case string is the stored and
/// serialised form.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  AsRefStr,
  EnumIter,
  EnumString,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AnswerValue {
  Yes,
  InProgress,
  No,
  NotApplicable,
}

impl AnswerValue {
  pub fn label(self) -> &'static str {
    match self {
      Self::Yes => "Yes",
      Self::InProgress => "In progress",
      Self::No => "No",
      Self::NotApplicable => "Not Applicable",
    }
  }

  /// Only `Yes` counts towards compliance.
  pub fn is_compliant(self) -> bool { self == Self::Yes }
}

/// A document cited as evidence for an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerDocument {
  pub answer_document_id: Uuid,
  pub answer_id:          Uuid,
  pub document:           Document,
  pub explanation:        String,
  pub created_at:         DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
  pub answer_id:   Uuid,
  pub response_id: Uuid,
  pub question_id: Uuid,
  pub value:       AnswerValue,
  pub explanation: String,
  pub due_date:    Option<NaiveDate>,
  /// Selected option ids; only meaningful for questions with options.
  pub option_ids:  Vec<Uuid>,
  pub documents:   Vec<AnswerDocument>,
}

/// Input to [`crate::store::SurveyStore::upsert_answer`].
///
/// Conditional-required fields are checked by
/// [`crate::form::AnswerForm`], not by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAnswer {
  pub value:       AnswerValue,
  #[serde(default)]
  pub explanation: String,
  #[serde(default)]
  pub due_date:    Option<NaiveDate>,
  #[serde(default)]
  pub option_ids:  Vec<Uuid>,
}

impl NewAnswer {
  pub fn new(value: AnswerValue) -> Self {
    Self { value, explanation: String::new(), due_date: None, option_ids: Vec::new() }
  }
}

// ─── Results ─────────────────────────────────────────────────────────────────

/// Answer tally by value, used by dashboards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AnswerResults {
  pub total:          u32,
  pub yes:            u32,
  pub in_progress:    u32,
  pub no:             u32,
  pub not_applicable: u32,
}

impl AnswerResults {
  pub fn get(&self, value: AnswerValue) -> u32 {
    match value {
      AnswerValue::Yes => self.yes,
      AnswerValue::InProgress => self.in_progress,
      AnswerValue::No => self.no,
      AnswerValue::NotApplicable => self.not_applicable,
    }
  }
}
