//! Question catalog: surveys, areas, sections, questions and options.
//!
//! Catalog records are reference data written by administrators. They are
//! effectively static while organisations take assessments.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString};
use uuid::Uuid;

use crate::Level;

// ─── Survey ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Survey {
  pub survey_id: Uuid,
  pub name:      String,
  pub is_active: bool,
}

/// Input to [`crate::store::SurveyStore::add_survey`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewSurvey {
  pub name:      String,
  #[serde(default = "default_true")]
  pub is_active: bool,
}

fn default_true() -> bool { true }

// ─── Area / Section ──────────────────────────────────────────────────────────

/// A numbered top-level grouping of sections. Ordered by `number`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
  pub area_id: Uuid,
  pub name:    String,
  pub number:  i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewArea {
  pub name:   String,
  pub number: i64,
}

/// A section within an area. Ordered by `(area.number, number)`; `number` is
/// unique within the area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
  pub section_id: Uuid,
  pub area:       Area,
  pub name:       String,
  pub number:     i64,
}

impl Section {
  /// The dotted section code, e.g. `"4.1"`.
  pub fn code(&self) -> String { format!("{}.{}", self.area.number, self.number) }

  /// Ordering key shared by section listing and section navigation.
  pub fn sort_key(&self) -> (i64, i64) { (self.area.number, self.number) }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSection {
  pub area_id: Uuid,
  pub name:    String,
  pub number:  i64,
}

// ─── Question ────────────────────────────────────────────────────────────────

/// The kind of supporting document a question asks for.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  AsRefStr,
  EnumIter,
  EnumString,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UploadType {
  Policy,
  Procedure,
  Process,
}

/// A selectable option on a multi-select question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
  pub option_id:   Uuid,
  pub question_id: Uuid,
  pub name:        String,
  pub sort_order:  i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewQuestionOption {
  pub name:       String,
  #[serde(default)]
  pub sort_order: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
  pub question_id:     Uuid,
  pub survey_id:       Uuid,
  pub section:         Section,
  pub name:            String,
  pub notes:           String,
  pub level:           Level,
  /// Unique within `(survey, section, level)`.
  pub question_number: i64,
  pub upload_type:     Option<UploadType>,
  pub reference:       Option<String>,
  /// Ordered by `sort_order`.
  pub options:         Vec<QuestionOption>,
}

impl Question {
  /// The full four-part code, e.g. `"4.1.2.3"`.
  pub fn code(&self) -> String {
    format!("{}.{}.{}", self.section.code(), self.level.value(), self.question_number)
  }

  pub fn requires_upload(&self) -> bool { self.upload_type.is_some() }

  pub fn has_option(&self, option_id: Uuid) -> bool {
    self.options.iter().any(|o| o.option_id == option_id)
  }
}

/// Input to [`crate::store::SurveyStore::add_question`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewQuestion {
  pub survey_id:       Uuid,
  pub section_id:      Uuid,
  pub name:            String,
  #[serde(default)]
  pub notes:           String,
  pub level:           Level,
  pub question_number: i64,
  #[serde(default)]
  pub upload_type:     Option<UploadType>,
  #[serde(default)]
  pub reference:       Option<String>,
}
