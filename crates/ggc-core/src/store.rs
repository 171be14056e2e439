//! The `SurveyStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `ggc-store-sqlite`).
//! The aggregator in [`crate::aggregate`] and the HTTP layer (`ggc-api`)
//! depend on this abstraction, not on any concrete backend.

use std::future::Future;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  DomainError, Level,
  catalog::{
    Area, NewArea, NewQuestion, NewQuestionOption, NewSection, NewSurvey, Question,
    QuestionOption, Section, Survey,
  },
  response::{
    Answer, AnswerDocument, Document, NewAnswer, NewDocument, Organisation, SurveyResponse,
  },
  tally::{Tally, TallyColumn},
};

/// A response with its question and answer totals at its own target tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseTotals {
  pub response:        SurveyResponse,
  pub questions_total: u32,
  pub answers_total:   u32,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over an assessment store backend: the question catalog, the
/// answer store, and the conditional-count aggregates the reports need.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait SurveyStore: Send + Sync {
  type Error: std::error::Error + DomainError + Send + Sync + 'static;

  // ── Catalog administration ────────────────────────────────────────────

  /// Fails with a duplicate integrity violation if the number is taken.
  fn add_area(&self, input: NewArea) -> impl Future<Output = Result<Area, Self::Error>> + Send + '_;

  /// Fails if the area is missing or the number is taken within it.
  fn add_section(
    &self,
    input: NewSection,
  ) -> impl Future<Output = Result<Section, Self::Error>> + Send + '_;

  fn get_section(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Section>, Self::Error>> + Send + '_;

  fn add_survey(
    &self,
    input: NewSurvey,
  ) -> impl Future<Output = Result<Survey, Self::Error>> + Send + '_;

  fn get_survey(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Survey>, Self::Error>> + Send + '_;

  /// Active surveys that have at least one question, ordered by name.
  fn available_surveys(&self) -> impl Future<Output = Result<Vec<Survey>, Self::Error>> + Send + '_;

  /// Fails if `(survey, section, level, question_number)` is taken.
  fn add_question(
    &self,
    input: NewQuestion,
  ) -> impl Future<Output = Result<Question, Self::Error>> + Send + '_;

  /// Append an option to a question. A missing `sort_order` places the option
  /// last.
  fn add_option(
    &self,
    question_id: Uuid,
    input: NewQuestionOption,
  ) -> impl Future<Output = Result<QuestionOption, Self::Error>> + Send + '_;

  fn get_question(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Question>, Self::Error>> + Send + '_;

  // ── Catalog queries ───────────────────────────────────────────────────

  /// The distinct sections that have at least one question in `survey_id`,
  /// ordered by `(area.number, section.number)`.
  fn sections_for_survey(
    &self,
    survey_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Section>, Self::Error>> + Send + '_;

  /// Every question that must be answered for `level`: `question.level <= level`.
  fn questions_for_level(
    &self,
    survey_id: Uuid,
    level: Level,
  ) -> impl Future<Output = Result<Vec<Question>, Self::Error>> + Send + '_;

  /// Questions of one section, ordered by `(level, question_number)`.
  fn questions_for_section(
    &self,
    survey_id: Uuid,
    section_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Question>, Self::Error>> + Send + '_;

  /// The first section strictly after `current` that has a question in the
  /// survey, or the very first such section when `current` is `None`.
  fn next_section<'a>(
    &'a self,
    survey_id: Uuid,
    current: Option<&'a Section>,
  ) -> impl Future<Output = Result<Option<Uuid>, Self::Error>> + Send + 'a;

  /// The last section strictly before `current` that has a question in the
  /// survey.
  fn previous_section<'a>(
    &'a self,
    survey_id: Uuid,
    current: &'a Section,
  ) -> impl Future<Output = Result<Option<Uuid>, Self::Error>> + Send + 'a;

  // ── Organisations and documents ───────────────────────────────────────

  fn add_organisation(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Organisation, Self::Error>> + Send + '_;

  fn get_organisation(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Organisation>, Self::Error>> + Send + '_;

  fn add_document(
    &self,
    organisation_id: Uuid,
    input: NewDocument,
  ) -> impl Future<Output = Result<Document, Self::Error>> + Send + '_;

  // ── Responses ─────────────────────────────────────────────────────────

  /// Return the organisation's most recently modified response for an active
  /// survey, creating one at Bronze if none exists.
  fn start_response(
    &self,
    organisation_id: Uuid,
    survey_id: Uuid,
  ) -> impl Future<Output = Result<SurveyResponse, Self::Error>> + Send + '_;

  fn get_response(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<SurveyResponse>, Self::Error>> + Send + '_;

  /// The organisation's responses whose survey has questions, oldest first.
  fn responses_for_organisation(
    &self,
    organisation_id: Uuid,
  ) -> impl Future<Output = Result<Vec<SurveyResponse>, Self::Error>> + Send + '_;

  /// Change the target tier of a draft response.
  fn set_level(
    &self,
    id: Uuid,
    level: Level,
  ) -> impl Future<Output = Result<SurveyResponse, Self::Error>> + Send + '_;

  /// Mark a draft response as submitted. A response is submitted exactly once.
  fn submit_response(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<SurveyResponse, Self::Error>> + Send + '_;

  /// Every response of the organisation with its question and answer totals
  /// at the response's own tier, ordered by `modified_at` ascending.
  fn response_totals(
    &self,
    organisation_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ResponseTotals>, Self::Error>> + Send + '_;

  // ── Answers ───────────────────────────────────────────────────────────

  fn get_answer(
    &self,
    response_id: Uuid,
    question_id: Uuid,
  ) -> impl Future<Output = Result<Option<Answer>, Self::Error>> + Send + '_;

  fn get_answer_by_id(
    &self,
    answer_id: Uuid,
  ) -> impl Future<Output = Result<Option<Answer>, Self::Error>> + Send + '_;

  /// Create or replace the single answer for `(response, question)`.
  ///
  /// Enforces that the question belongs to the response's survey, that every
  /// option belongs to the question, and that the response is not submitted.
  /// Concurrent writers race; the last write wins.
  fn upsert_answer(
    &self,
    response_id: Uuid,
    question_id: Uuid,
    input: NewAnswer,
  ) -> impl Future<Output = Result<Answer, Self::Error>> + Send + '_;

  /// Remove an answer and its attachments. Documents themselves are kept.
  fn delete_answer(&self, answer_id: Uuid) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// All answers of a response, optionally restricted to questions at or
  /// below `max_level`, with options and documents attached.
  fn answers_for_response(
    &self,
    response_id: Uuid,
    max_level: Option<Level>,
  ) -> impl Future<Output = Result<Vec<Answer>, Self::Error>> + Send + '_;

  /// Cite a document as evidence for an answer. The document must belong to
  /// the response's organisation.
  fn attach_document(
    &self,
    answer_id: Uuid,
    document_id: Uuid,
    explanation: String,
  ) -> impl Future<Output = Result<AnswerDocument, Self::Error>> + Send + '_;

  fn detach_document(
    &self,
    answer_document_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Aggregates ────────────────────────────────────────────────────────

  /// Count the survey's questions once per column, in a single round trip.
  fn tally_questions<'a>(
    &'a self,
    survey_id: Uuid,
    columns: &'a [TallyColumn],
  ) -> impl Future<Output = Result<Tally, Self::Error>> + Send + 'a;

  /// Count the response's answers once per column, in a single round trip.
  fn tally_answers<'a>(
    &'a self,
    response_id: Uuid,
    columns: &'a [TallyColumn],
  ) -> impl Future<Output = Result<Tally, Self::Error>> + Send + 'a;
}
