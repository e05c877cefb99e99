use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    catalog::CatalogStore,
    middleware::{make_span_with_request_id, request_id_middleware},
    models::Outcome,
    services::Recommender,
};

pub mod catalog;
pub mod feedback;
pub mod recommendations;

/// Shared application state
///
/// Only immutable service handles; nothing here is written per request.
#[derive(Clone)]
pub struct AppState {
    pub recommender: Recommender,
    pub catalog: Arc<dyn CatalogStore>,
}

impl AppState {
    pub fn new(recommender: Recommender, catalog: Arc<dyn CatalogStore>) -> Self {
        Self {
            recommender,
            catalog,
        }
    }
}

/// Creates the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/recommend", post(recommendations::recommend))
        .route("/recommendationsv2", post(recommendations::recommend_v2))
        .route("/feedback", post(feedback::feedback))
        .route("/catalog/distinct/:field", get(catalog::distinct))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Renders a flow outcome: the payload on success, 404 with `message` otherwise
pub(crate) fn outcome_response<T: Serialize>(outcome: Outcome<T>, not_found_message: &str) -> Response {
    match outcome {
        Outcome::Found(body) => (StatusCode::OK, Json(body)).into_response(),
        Outcome::NoResults => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": not_found_message })),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{catalog::InMemoryCatalog, llm::MockLlmClient, middleware::REQUEST_ID_HEADER};
    use axum::{body::Body, http::Request};
    use std::time::Duration;
    use tower::ServiceExt;

    fn app() -> Router {
        let catalog = Arc::new(InMemoryCatalog::default());
        let recommender = Recommender::new(
            catalog.clone(),
            Arc::new(MockLlmClient::new()),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        create_router(Arc::new(AppState::new(recommender, catalog)))
    }

    #[test]
    fn test_no_results_is_not_found() {
        let response = outcome_response::<Value>(Outcome::NoResults, "No recommendations found.");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = outcome_response(Outcome::Found(json!({"recommendations": []})), "unused");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_request_id_round_trip() {
        let request = Request::builder()
            .uri("/health")
            .header(REQUEST_ID_HEADER, "frontend-7")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "frontend-7");
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let request = Request::builder()
            .uri("/health")
            .header("origin", "http://localhost:3000")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let request = Request::builder()
            .uri("/api/recommendations")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
