//! Handlers for `/responses` endpoints: lifecycle and reports.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/responses` | Reuses the latest response for the survey if one exists |
//! | `GET`  | `/responses/:id` | 404 if not found |
//! | `PUT`  | `/responses/:id/level` | Body: `{"level":2}`; 400 outside 1..4 |
//! | `POST` | `/responses/:id/submit` | 409 if already submitted |
//! | `GET`  | `/responses/:id/progress` | |
//! | `GET`  | `/responses/:id/compliance` | |
//! | `GET`  | `/responses/:id/report` | |
//! | `GET`  | `/responses/:id/results` | |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use ggc_core::{
  Entity, Level,
  aggregate::{Progress, answer_results, get_progress},
  report::{ComplianceReport, FullReport, compliance_report, full_report},
  response::{AnswerResults, SurveyResponse},
  store::SurveyStore,
};
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{error::ApiError, found};

pub(crate) async fn load_response<S: SurveyStore>(
  store: &S,
  id: Uuid,
) -> Result<SurveyResponse, ApiError> {
  let response = store.get_response(id).await.map_err(ApiError::from_store)?;
  found(response, Entity::Response, id)
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StartBody {
  pub organisation_id: Uuid,
  pub survey_id:       Uuid,
}

/// `POST /responses`
pub async fn start<S: SurveyStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<StartBody>,
) -> Result<Json<SurveyResponse>, ApiError> {
  let response = store
    .start_response(body.organisation_id, body.survey_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(response))
}

/// `GET /responses/:id`
pub async fn get_one<S: SurveyStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<SurveyResponse>, ApiError> {
  Ok(Json(load_response(store.as_ref(), id).await?))
}

#[derive(Debug, Deserialize)]
pub struct LevelBody {
  pub level: i64,
}

/// `PUT /responses/:id/level`
pub async fn set_level<S: SurveyStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<LevelBody>,
) -> Result<Json<SurveyResponse>, ApiError> {
  let level = Level::try_from(body.level).map_err(|e| ApiError::BadRequest(e.to_string()))?;
  let response = store.set_level(id, level).await.map_err(ApiError::from_store)?;
  info!(response = %id, level = %level, "target tier changed");
  Ok(Json(response))
}

/// `POST /responses/:id/submit`
pub async fn submit<S: SurveyStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<SurveyResponse>, ApiError> {
  let response = store.submit_response(id).await.map_err(ApiError::from_store)?;
  info!(response = %id, level = %response.level, "response submitted");
  Ok(Json(response))
}

// ─── Reports ─────────────────────────────────────────────────────────────────

/// `GET /responses/:id/progress`
pub async fn progress<S: SurveyStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Progress>, ApiError> {
  let response = load_response(store.as_ref(), id).await?;
  let progress = get_progress(store.as_ref(), &response)
    .await
    .map_err(ApiError::from_store)?;
  debug!(response = %id, percentage = progress.info.percentage, "progress report");
  Ok(Json(progress))
}

/// `GET /responses/:id/compliance`
pub async fn compliance<S: SurveyStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<ComplianceReport>, ApiError> {
  let response = load_response(store.as_ref(), id).await?;
  let report = compliance_report(store.as_ref(), &response)
    .await
    .map_err(ApiError::from_store)?;
  debug!(
    response = %id,
    percentage = report.target_level_progress.info.percentage,
    "compliance report"
  );
  Ok(Json(report))
}

/// `GET /responses/:id/report`
pub async fn report<S: SurveyStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<FullReport>, ApiError> {
  let response = load_response(store.as_ref(), id).await?;
  let report = full_report(store.as_ref(), &response)
    .await
    .map_err(ApiError::from_store)?;
  debug!(response = %id, sections = report.compliance.sections.len(), "full report");
  Ok(Json(report))
}

/// `GET /responses/:id/results`
pub async fn results<S: SurveyStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<AnswerResults>, ApiError> {
  load_response(store.as_ref(), id).await?;
  let results = answer_results(store.as_ref(), id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(results))
}
