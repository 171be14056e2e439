//! Handlers for `/organisations` endpoints.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use ggc_core::{
  Entity,
  report::{SurveyWithProgress, surveys_with_latest_progress},
  response::NewDocument,
  store::SurveyStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::ApiError, found};

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name: String,
}

/// `POST /organisations` with body `{"name":"Acme Trust"}`
pub async fn create<S: SurveyStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let name = body.name.trim();
  if name.is_empty() {
    return Err(ApiError::BadRequest("organisation name must not be empty".into()));
  }
  let organisation = store
    .add_organisation(name.to_owned())
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(organisation)))
}

/// `GET /organisations/:id/surveys`
///
/// Invitations live outside this service, so every survey carries an empty
/// `invites` list.
pub async fn surveys<S: SurveyStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<SurveyWithProgress>>, ApiError> {
  let organisation = store.get_organisation(id).await.map_err(ApiError::from_store)?;
  found(organisation, Entity::Organisation, id)?;
  let surveys = surveys_with_latest_progress(store.as_ref(), id, Vec::new())
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(surveys))
}

/// `POST /organisations/:id/documents`
pub async fn create_document<S: SurveyStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<NewDocument>,
) -> Result<impl IntoResponse, ApiError> {
  let document = store.add_document(id, body).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(document)))
}
