use axum::{extract::State, response::Response, Extension, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::{
    error::AppResult,
    middleware::RequestId,
    models::{FeedbackRequest, Outcome, RankedRecommendations},
    routes::{outcome_response, AppState},
};

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub message: &'static str,
    #[serde(flatten)]
    pub result: RankedRecommendations,
}

/// Handler for feedback-driven refinement
pub async fn feedback(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<FeedbackRequest>,
) -> AppResult<Response> {
    tracing::info!(request_id = %request_id, "Processing feedback");

    let outcome = match state.recommender.refine_with_feedback(request).await? {
        Outcome::Found(result) => Outcome::Found(FeedbackResponse {
            message: "Feedback received and processed.",
            result,
        }),
        Outcome::NoResults => Outcome::NoResults,
    };

    Ok(outcome_response(outcome, "No recommendations found."))
}
