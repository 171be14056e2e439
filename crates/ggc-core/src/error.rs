//! Error types for `ggc-core`.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// The kind of record a [`Error::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
  Area,
  Section,
  Survey,
  Question,
  QuestionOption,
  Organisation,
  Document,
  Response,
  Answer,
  AnswerDocument,
}

impl fmt::Display for Entity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Area => "area",
      Self::Section => "section",
      Self::Survey => "survey",
      Self::Question => "question",
      Self::QuestionOption => "question option",
      Self::Organisation => "organisation",
      Self::Document => "document",
      Self::Response => "survey response",
      Self::Answer => "answer",
      Self::AnswerDocument => "answer document",
    };
    f.write_str(name)
  }
}

/// A write rejected at the store boundary because it would break a
/// uniqueness or ownership invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityViolation {
  #[error("response {response} already has an answer for question {question}")]
  DuplicateAnswer { response: Uuid, question: Uuid },

  #[error("option {option} does not belong to question {question}")]
  ForeignOption { option: Uuid, question: Uuid },

  #[error("question {question} does not belong to survey {survey}")]
  ForeignQuestion { question: Uuid, survey: Uuid },

  #[error("the document and survey answer organisations must match")]
  DocumentOrganisationMismatch { document: Uuid, answer: Uuid },

  #[error("duplicate {entity}: {key}")]
  Duplicate { entity: Entity, key: String },
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("{entity} not found: {id}")]
  NotFound { entity: Entity, id: Uuid },

  #[error("integrity violation: {0}")]
  Integrity(#[from] IntegrityViolation),

  #[error("survey response {0} is already submitted")]
  AlreadySubmitted(Uuid),

  #[error("invalid tier: {0} (expected 1-4)")]
  InvalidLevel(i64),

  #[error("unknown answer value: {0:?}")]
  UnknownAnswerValue(String),
}

impl Error {
  pub fn not_found(entity: Entity, id: Uuid) -> Self { Self::NotFound { entity, id } }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Implemented by backend error types so that callers generic over a store
/// can recover the domain-level cause (not found, integrity, ...) without
/// knowing the backend.
pub trait DomainError {
  /// The wrapped domain error, if this failure has one.
  fn domain(&self) -> Option<&Error>;
}

impl DomainError for Error {
  fn domain(&self) -> Option<&Error> { Some(self) }
}
