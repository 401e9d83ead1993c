use crate::AppState;
use crate::api::error::AppError;
use crate::models::{CenterPage, CenterResponse, Page};
use crate::utils::validation::ValidationError;
use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};

use super::types::CentersQuery;

#[utoipa::path(
    get,
    path = "/centers",
    tag = "ORMA_CENTERS",
    params(CentersQuery),
    responses(
        (status = 200, description = "One page of centers", body = CenterPage),
        (status = 400, description = "Invalid filter or pagination")
    )
)]
pub async fn get_centers(
    State(state): State<AppState>,
    query: Result<Query<CentersQuery>, QueryRejection>,
) -> Result<Json<Page<CenterResponse>>, AppError> {
    let Query(query) =
        query.map_err(|e| ValidationError::new("INVALID_QUERY", e.body_text()))?;
    let filter = query.into_filter(state.config.max_page_size)?;

    let page = state
        .centers
        .centers(&filter)
        .await
        .map_err(|e| AppError::service(module_path!(), e))?;

    Ok(Json(page))
}
