use axum::{extract::State, response::Response, Extension, Json};
use std::sync::Arc;

use crate::{
    error::AppResult,
    middleware::RequestId,
    models::{NaturalLanguageRequest, PreferenceRequest},
    routes::{outcome_response, AppState},
};

/// Handler for structured-preference recommendations
pub async fn recommend(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<PreferenceRequest>,
) -> AppResult<Response> {
    tracing::info!(
        request_id = %request_id,
        genres = %request.genres,
        actors = %request.actors,
        min_rating = ?request.min_rating,
        "Processing preference recommendation request"
    );

    let outcome = state.recommender.recommend_by_preferences(request).await?;
    Ok(outcome_response(
        outcome,
        "No recommendations found for the given preferences.",
    ))
}

/// Handler for natural-language recommendations
pub async fn recommend_v2(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<NaturalLanguageRequest>,
) -> AppResult<Response> {
    tracing::info!(
        request_id = %request_id,
        "Processing natural language recommendation request"
    );

    let outcome = state.recommender.recommend_by_query(request).await?;

    tracing::info!(
        request_id = %request_id,
        found = outcome.is_found(),
        "Natural language recommendation completed"
    );

    Ok(outcome_response(outcome, "No recommendations found."))
}
