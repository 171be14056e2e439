//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use ggc_core::{DomainError, Error as CoreError, form::ValidationErrors};
use serde_json::json;
use thiserror::Error;
use tracing::warn;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("{0}")]
  Validation(ValidationErrors),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Classify a store failure by its domain cause.
  pub fn from_store<E>(err: E) -> Self
  where
    E: std::error::Error + DomainError + Send + Sync + 'static,
  {
    match err.domain() {
      Some(e @ CoreError::NotFound { .. }) => Self::NotFound(e.to_string()),
      Some(e @ (CoreError::Integrity(_) | CoreError::AlreadySubmitted(_))) => {
        warn!(error = %e, "rejected write");
        Self::Conflict(e.to_string())
      }
      Some(e @ (CoreError::InvalidLevel(_) | CoreError::UnknownAnswerValue(_))) => {
        Self::BadRequest(e.to_string())
      }
      None => Self::Store(Box::new(err)),
    }
  }
}

impl From<ValidationErrors> for ApiError {
  fn from(errors: ValidationErrors) -> Self { Self::Validation(errors) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, body) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, json!({ "error": m })),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, json!({ "error": m })),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, json!({ "error": m })),
      ApiError::Validation(errors) => (
        StatusCode::UNPROCESSABLE_ENTITY,
        json!({ "error": errors.to_string(), "fields": errors.fields() }),
      ),
      ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": e.to_string() })),
    };
    (status, Json(body)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use ggc_core::{Entity, IntegrityViolation};
  use uuid::Uuid;

  use super::*;

  #[test]
  fn domain_errors_map_to_statuses() {
    let id = Uuid::new_v4();
    let cases = [
      (CoreError::not_found(Entity::Response, id), StatusCode::NOT_FOUND),
      (CoreError::AlreadySubmitted(id), StatusCode::CONFLICT),
      (
        IntegrityViolation::DuplicateAnswer { response: id, question: id }.into(),
        StatusCode::CONFLICT,
      ),
      (CoreError::InvalidLevel(7), StatusCode::BAD_REQUEST),
      (CoreError::UnknownAnswerValue("maybe".into()), StatusCode::BAD_REQUEST),
    ];
    for (err, status) in cases {
      assert_eq!(ApiError::from_store(err).into_response().status(), status);
    }
  }

  #[test]
  fn validation_is_unprocessable() {
    let mut errors = ValidationErrors::default();
    errors.add("explanation", "This field is required.");
    let resp = ApiError::from(errors).into_response();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
  }
}
