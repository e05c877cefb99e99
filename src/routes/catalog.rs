use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::{
    catalog::Field,
    error::{AppError, AppResult},
    routes::AppState,
};

#[derive(Debug, Serialize)]
pub struct DistinctResponse {
    pub field: &'static str,
    pub values: Vec<String>,
}

/// Handler listing the distinct values of a catalog field
///
/// Diagnostics only: shows what vocabulary the catalog actually holds.
pub async fn distinct(
    State(state): State<Arc<AppState>>,
    Path(field): Path<String>,
) -> AppResult<Json<DistinctResponse>> {
    let field = Field::from_document_name(&field)
        .ok_or_else(|| AppError::InvalidInput(format!("Unknown catalog field: {}", field)))?;

    let values = state.catalog.distinct(field).await?;
    tracing::debug!(field = %field, count = values.len(), "Distinct catalog values");

    Ok(Json(DistinctResponse {
        field: field.document_name(),
        values,
    }))
}
