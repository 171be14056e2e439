//! Answer form validation.
//!
//! These are the conditional-required rules that sit in front of the answer
//! store. They are kept out of the store and the aggregator so both stay
//! total over whatever data is persisted.

use std::{collections::BTreeMap, fmt};

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
  catalog::Question,
  response::{AnswerValue, NewAnswer},
};

pub const REQUIRED: &str = "This field is required.";
pub const DUE_DATE_IN_PAST: &str = "This should be in the future.";
pub const UPLOAD_REQUIRED: &str = "You need to attach at least one document, if you do not have a \
                                   document available please select in progress and come back to \
                                   this question later";

/// Field name → error messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
  fields: BTreeMap<&'static str, Vec<String>>,
}

impl ValidationErrors {
  pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
    self.fields.entry(field).or_default().push(message.into());
  }

  pub fn is_empty(&self) -> bool { self.fields.is_empty() }

  pub fn get(&self, field: &str) -> Option<&[String]> { self.fields.get(field).map(Vec::as_slice) }

  pub fn fields(&self) -> &BTreeMap<&'static str, Vec<String>> { &self.fields }
}

impl fmt::Display for ValidationErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let fields: Vec<&str> = self.fields.keys().copied().collect();
    write!(f, "invalid answer: {}", fields.join(", "))
  }
}

impl std::error::Error for ValidationErrors {}

/// An answer submission bound to the question it answers.
#[derive(Debug, Clone)]
pub struct AnswerForm<'a> {
  pub question:       &'a Question,
  pub input:          &'a NewAnswer,
  /// Number of documents already attached to the existing answer, if any.
  pub document_count: usize,
}

impl<'a> AnswerForm<'a> {
  pub fn new(question: &'a Question, input: &'a NewAnswer, document_count: usize) -> Self {
    Self { question, input, document_count }
  }

  /// Check the submission against `today`.
  ///
  /// - `explanation` is required for in-progress, no and not-applicable.
  /// - `due_date` is required for in-progress and may not be in the past.
  /// - a `yes` to a question with an upload type needs an attached document;
  ///   this is only reported when nothing else is wrong.
  pub fn validate(&self, today: NaiveDate) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let input = self.input;

    if let Some(due) = input.due_date
      && due < today
    {
      errors.add("due_date", DUE_DATE_IN_PAST);
    }

    let explanation_required = matches!(
      input.value,
      AnswerValue::InProgress | AnswerValue::No | AnswerValue::NotApplicable
    );
    if explanation_required && input.explanation.trim().is_empty() {
      errors.add("explanation", REQUIRED);
    }
    if input.value == AnswerValue::InProgress && input.due_date.is_none() {
      errors.add("due_date", REQUIRED);
    }

    for option_id in &input.option_ids {
      if !self.question.has_option(*option_id) {
        errors.add("options", format!("{option_id} is not one of the available choices."));
      }
    }

    if errors.is_empty()
      && self.question.requires_upload()
      && input.value == AnswerValue::Yes
      && self.document_count == 0
    {
      errors.add("value", UPLOAD_REQUIRED);
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
  }
}
