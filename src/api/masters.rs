//! Lookup values: platforms, operation types, business divisions

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::db;
use crate::error::ApiResult;
use crate::models::MasterValue;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct MasterQuery {
    pub category: Option<String>,
}

/// GET /api/masters
pub async fn list_masters(
    State(state): State<AppState>,
    Query(query): Query<MasterQuery>,
) -> ApiResult<Json<Vec<MasterValue>>> {
    let values = db::masters::list_masters(&state.db, query.category.as_deref()).await?;
    Ok(Json(values))
}
