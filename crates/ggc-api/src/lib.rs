//! JSON REST API for the Global Grant Community assessment engine.
//!
//! Exposes an axum [`Router`] backed by any [`ggc_core::store::SurveyStore`].
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", ggc_api::api_router(store.clone()))
//! ```

pub mod answers;
pub mod catalog;
pub mod error;
pub mod organisations;
pub mod responses;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, post, put},
};
use ggc_core::{Entity, Error as CoreError, store::SurveyStore};
use uuid::Uuid;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: SurveyStore + 'static,
{
  Router::new()
    // Catalog
    .route("/areas", post(catalog::create_area::<S>))
    .route("/sections", post(catalog::create_section::<S>))
    .route("/surveys", get(catalog::list_surveys::<S>).post(catalog::create_survey::<S>))
    .route("/surveys/{id}/sections", get(catalog::sections::<S>))
    .route("/surveys/{id}/sections/next", get(catalog::next_section::<S>))
    .route(
      "/surveys/{id}/sections/{section}/previous",
      get(catalog::previous_section::<S>),
    )
    .route(
      "/surveys/{id}/sections/{section}/questions",
      get(catalog::section_questions::<S>),
    )
    .route("/surveys/{id}/questions", get(catalog::questions::<S>))
    .route("/questions", post(catalog::create_question::<S>))
    .route("/questions/{id}/options", post(catalog::create_option::<S>))
    // Organisations
    .route("/organisations", post(organisations::create::<S>))
    .route("/organisations/{id}/surveys", get(organisations::surveys::<S>))
    .route("/organisations/{id}/documents", post(organisations::create_document::<S>))
    // Responses
    .route("/responses", post(responses::start::<S>))
    .route("/responses/{id}", get(responses::get_one::<S>))
    .route("/responses/{id}/level", put(responses::set_level::<S>))
    .route("/responses/{id}/submit", post(responses::submit::<S>))
    .route("/responses/{id}/progress", get(responses::progress::<S>))
    .route("/responses/{id}/compliance", get(responses::compliance::<S>))
    .route("/responses/{id}/report", get(responses::report::<S>))
    .route("/responses/{id}/results", get(responses::results::<S>))
    // Answers
    .route(
      "/responses/{id}/answers/{question}",
      get(answers::get_one::<S>).put(answers::upsert::<S>),
    )
    .route("/answers/{id}", delete(answers::delete_one::<S>))
    .route("/answers/{id}/documents", post(answers::attach::<S>))
    .route("/answer-documents/{id}", delete(answers::detach::<S>))
    .with_state(store)
}

/// Turn a missing record into a 404.
pub(crate) fn found<T>(value: Option<T>, entity: Entity, id: Uuid) -> Result<T, ApiError> {
  value.ok_or_else(|| ApiError::NotFound(CoreError::not_found(entity, id).to_string()))
}
