//! Handlers for the question catalog.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/areas` | Body: `{"name":"Governance","number":1}` |
//! | `POST` | `/sections` | Body: `{"area_id":..,"name":..,"number":1}` |
//! | `GET`  | `/surveys` | Active surveys with questions |
//! | `POST` | `/surveys` | Body: `{"name":"GGC 2026"}` |
//! | `GET`  | `/surveys/:id/sections` | Ordered by area then section number |
//! | `GET`  | `/surveys/:id/sections/next` | Optional `?after=<section>` |
//! | `GET`  | `/surveys/:id/sections/:section/previous` | |
//! | `GET`  | `/surveys/:id/sections/:section/questions` | 404 if the section has none |
//! | `GET`  | `/surveys/:id/questions` | Optional `?level=1..4`, defaults to every tier |
//! | `POST` | `/questions` | |
//! | `POST` | `/questions/:id/options` | Body: `{"name":"Board minutes"}` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use ggc_core::{
  Entity, Level,
  catalog::{NewArea, NewQuestion, NewQuestionOption, NewSection, NewSurvey, Question, Section, Survey},
  store::SurveyStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::ApiError, found};

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST /areas`
pub async fn create_area<S: SurveyStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewArea>,
) -> Result<impl IntoResponse, ApiError> {
  let area = store.add_area(body).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(area)))
}

/// `POST /sections`
pub async fn create_section<S: SurveyStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewSection>,
) -> Result<impl IntoResponse, ApiError> {
  let section = store.add_section(body).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(section)))
}

/// `POST /surveys`
pub async fn create_survey<S: SurveyStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewSurvey>,
) -> Result<impl IntoResponse, ApiError> {
  let survey = store.add_survey(body).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(survey)))
}

/// `POST /questions`
pub async fn create_question<S: SurveyStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewQuestion>,
) -> Result<impl IntoResponse, ApiError> {
  let question = store.add_question(body).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(question)))
}

/// `POST /questions/:id/options`
pub async fn create_option<S: SurveyStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<NewQuestionOption>,
) -> Result<impl IntoResponse, ApiError> {
  let option = store.add_option(id, body).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(option)))
}

// ─── Surveys and sections ────────────────────────────────────────────────────

/// `GET /surveys`
pub async fn list_surveys<S: SurveyStore>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<Survey>>, ApiError> {
  let surveys = store.available_surveys().await.map_err(ApiError::from_store)?;
  Ok(Json(surveys))
}

/// `GET /surveys/:id/sections`
pub async fn sections<S: SurveyStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Section>>, ApiError> {
  let sections = store.sections_for_survey(id).await.map_err(ApiError::from_store)?;
  Ok(Json(sections))
}

/// The neighbouring section of a navigation step; `null` at either end.
#[derive(Debug, Serialize, Deserialize)]
pub struct Adjacent {
  pub section_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct NextParams {
  pub after: Option<Uuid>,
}

async fn load_section<S: SurveyStore>(store: &S, id: Uuid) -> Result<Section, ApiError> {
  let section = store.get_section(id).await.map_err(ApiError::from_store)?;
  found(section, Entity::Section, id)
}

/// `GET /surveys/:id/sections/next[?after=<section>]`
pub async fn next_section<S: SurveyStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Query(params): Query<NextParams>,
) -> Result<Json<Adjacent>, ApiError> {
  let current = match params.after {
    Some(section_id) => Some(load_section(store.as_ref(), section_id).await?),
    None => None,
  };
  let section_id = store
    .next_section(id, current.as_ref())
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(Adjacent { section_id }))
}

/// `GET /surveys/:id/sections/:section/previous`
pub async fn previous_section<S: SurveyStore>(
  State(store): State<Arc<S>>,
  Path((id, section_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Adjacent>, ApiError> {
  let current = load_section(store.as_ref(), section_id).await?;
  let section_id = store
    .previous_section(id, &current)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(Adjacent { section_id }))
}

// ─── Questions ───────────────────────────────────────────────────────────────

/// `GET /surveys/:id/sections/:section/questions`
pub async fn section_questions<S: SurveyStore>(
  State(store): State<Arc<S>>,
  Path((id, section_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Vec<Question>>, ApiError> {
  let questions = store
    .questions_for_section(id, section_id)
    .await
    .map_err(ApiError::from_store)?;
  if questions.is_empty() {
    return Err(ApiError::NotFound(format!(
      "survey {id} has no questions in section {section_id}"
    )));
  }
  Ok(Json(questions))
}

#[derive(Debug, Deserialize)]
pub struct LevelParams {
  pub level: Option<i64>,
}

/// `GET /surveys/:id/questions[?level=<1..4>]`
pub async fn questions<S: SurveyStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Query(params): Query<LevelParams>,
) -> Result<Json<Vec<Question>>, ApiError> {
  let level = match params.level {
    Some(value) => Level::try_from(value).map_err(|e| ApiError::BadRequest(e.to_string()))?,
    None => Level::Platinum,
  };
  let questions = store
    .questions_for_level(id, level)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(questions))
}
