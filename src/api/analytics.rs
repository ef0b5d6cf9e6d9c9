//! Rollup endpoints over the joined budget/result rows

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Serialize;

use super::fetch_performance;
use crate::analytics;
use crate::error::ApiResult;
use crate::models::{DepartmentMonth, PerformanceRow, RowFilter, Rollup};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct RollupResponse {
    pub totals: Rollup,
    pub groups: Vec<Rollup>,
}

#[derive(Debug, Serialize)]
pub struct DepartmentBudgetResponse {
    pub totals: Rollup,
    pub months: Vec<DepartmentMonth>,
}

async fn rollup_response(
    state: &AppState,
    filter: &RowFilter,
    group: fn(&[PerformanceRow]) -> Vec<Rollup>,
) -> ApiResult<Json<RollupResponse>> {
    let rows = fetch_performance(state, filter).await?;
    Ok(Json(RollupResponse {
        totals: analytics::totals(&rows),
        groups: group(&rows),
    }))
}

/// GET /api/analytics/clients
pub async fn clients(
    State(state): State<AppState>,
    Query(filter): Query<RowFilter>,
) -> ApiResult<Json<RollupResponse>> {
    rollup_response(&state, &filter, analytics::by_client).await
}

/// GET /api/analytics/departments
pub async fn departments(
    State(state): State<AppState>,
    Query(filter): Query<RowFilter>,
) -> ApiResult<Json<RollupResponse>> {
    rollup_response(&state, &filter, analytics::by_department).await
}

/// GET /api/analytics/departments/budget
pub async fn department_budget(
    State(state): State<AppState>,
    Query(filter): Query<RowFilter>,
) -> ApiResult<Json<DepartmentBudgetResponse>> {
    let rows = fetch_performance(&state, &filter).await?;
    Ok(Json(DepartmentBudgetResponse {
        totals: analytics::totals(&rows),
        months: analytics::department_budget_by_month(&rows),
    }))
}

/// GET /api/analytics/platforms
pub async fn platforms(
    State(state): State<AppState>,
    Query(filter): Query<RowFilter>,
) -> ApiResult<Json<RollupResponse>> {
    rollup_response(&state, &filter, analytics::by_platform).await
}

/// GET /api/analytics/monthly
pub async fn monthly(
    State(state): State<AppState>,
    Query(filter): Query<RowFilter>,
) -> ApiResult<Json<RollupResponse>> {
    rollup_response(&state, &filter, analytics::by_month).await
}
