//! Handlers for answers and their document attachments.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::Utc;
use ggc_core::{
  Entity, Error as CoreError, IntegrityViolation,
  form::AnswerForm,
  response::{Answer, NewAnswer},
  store::SurveyStore,
};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{error::ApiError, found, responses::load_response};

/// `GET /responses/:id/answers/:question`
pub async fn get_one<S: SurveyStore>(
  State(store): State<Arc<S>>,
  Path((id, question_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Answer>, ApiError> {
  let answer = store
    .get_answer(id, question_id)
    .await
    .map_err(ApiError::from_store)?;
  let answer = answer.ok_or_else(|| {
    ApiError::NotFound(format!("response {id} has no answer for question {question_id}"))
  })?;
  Ok(Json(answer))
}

/// `PUT /responses/:id/answers/:question`
///
/// A question from another survey is rejected outright. Otherwise the body is
/// validated against the question before it is stored. Documents already
/// attached to an earlier answer count towards the upload rule.
pub async fn upsert<S: SurveyStore>(
  State(store): State<Arc<S>>,
  Path((id, question_id)): Path<(Uuid, Uuid)>,
  Json(body): Json<NewAnswer>,
) -> Result<Json<Answer>, ApiError> {
  let response = load_response(store.as_ref(), id).await?;
  if response.is_submitted() {
    return Err(ApiError::Conflict(CoreError::AlreadySubmitted(id).to_string()));
  }
  let question = store.get_question(question_id).await.map_err(ApiError::from_store)?;
  let question = found(question, Entity::Question, question_id)?;
  if question.survey_id != response.survey_id {
    let err = CoreError::from(IntegrityViolation::ForeignQuestion {
      question: question_id,
      survey:   response.survey_id,
    });
    warn!(error = %err, "rejected write");
    return Err(ApiError::Conflict(err.to_string()));
  }

  let existing = store
    .get_answer(id, question_id)
    .await
    .map_err(ApiError::from_store)?;
  let document_count = existing.map_or(0, |a| a.documents.len());

  AnswerForm::new(&question, &body, document_count).validate(Utc::now().date_naive())?;

  let answer = store
    .upsert_answer(id, question_id, body)
    .await
    .map_err(ApiError::from_store)?;
  info!(
    response = %id,
    question = %question.code(),
    value = answer.value.label(),
    "answer saved"
  );
  Ok(Json(answer))
}

/// `DELETE /answers/:id`
pub async fn delete_one<S: SurveyStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  store.delete_answer(id).await.map_err(ApiError::from_store)?;
  info!(answer = %id, "answer deleted");
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct AttachBody {
  pub document_id: Uuid,
  #[serde(default)]
  pub explanation: String,
}

/// `POST /answers/:id/documents`
pub async fn attach<S: SurveyStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<AttachBody>,
) -> Result<impl IntoResponse, ApiError> {
  let attached = store
    .attach_document(id, body.document_id, body.explanation)
    .await
    .map_err(ApiError::from_store)?;
  info!(answer = %id, document = %body.document_id, "document attached");
  Ok((StatusCode::CREATED, Json(attached)))
}

/// `DELETE /answer-documents/:id`
pub async fn detach<S: SurveyStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  store.detach_document(id).await.map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}
