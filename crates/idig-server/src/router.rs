use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::handler;
use crate::state::AppState;

/// Build the axum router with all iDig endpoints.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/idig", get(handler::list_trenches))
        .route("/idig/{project}/{trench}", post(handler::sync_trench))
        .route(
            "/idig/{project}/{trench}/attachments/{name}",
            get(handler::read_attachment).put(handler::write_attachment),
        )
        .route("/idig/{project}/{trench}/surveys", get(handler::read_surveys))
        .route(
            "/idig/{project}/{trench}/surveys/{uuid}/versions",
            get(handler::read_survey_versions),
        )
        .route("/idig/{project}/{trench}/versions", get(handler::list_versions))
        .with_state(state)
}
