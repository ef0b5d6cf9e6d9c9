//! Budget and result records keyed by (campaign, year, month, platform,
//! operation type), with optional team allocations.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use tracing::info;

use super::fetch_performance;
use crate::context::RequestContext;
use crate::db::{
    self,
    performance::{AllocationOwner, replace_allocations},
    Upserted,
};
use crate::error::{ApiError, ApiResult};
use crate::models::{BudgetInput, NaturalKey, PerformanceRow, ResultInput, RowFilter, TeamAllocation};
use crate::AppState;

const ALLOCATION_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetPart {
    pub amount: f64,
    #[serde(default)]
    pub target_kpi: String,
    #[serde(default)]
    pub notes: String,
    /// `None` leaves existing allocations untouched.
    pub team_allocations: Option<Vec<TeamAllocation>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPart {
    pub actual_spend: f64,
    #[serde(default)]
    pub actual_result: f64,
    #[serde(default)]
    pub notes: String,
    pub team_allocations: Option<Vec<TeamAllocation>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetResultBody {
    #[serde(flatten)]
    pub key: NaturalKey,
    pub budget: Option<BudgetPart>,
    pub result: Option<ResultPart>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SavedRecord {
    pub id: i64,
    pub created: bool,
}

impl From<Upserted> for SavedRecord {
    fn from(upserted: Upserted) -> Self {
        Self {
            id: upserted.id(),
            created: matches!(upserted, Upserted::Created(_)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SavedBudgetResult {
    pub budget: Option<SavedRecord>,
    pub result: Option<SavedRecord>,
}

/// Percentages must add up to 100; an empty list clears allocations.
pub fn check_allocations(allocations: &[TeamAllocation]) -> ApiResult<()> {
    if allocations.is_empty() {
        return Ok(());
    }
    if let Some(bad) = allocations
        .iter()
        .find(|a| !(0.0..=100.0).contains(&a.percentage))
    {
        return Err(ApiError::BadRequest(format!(
            "allocation for user {} must be between 0 and 100, got {}",
            bad.user_id, bad.percentage
        )));
    }
    let total: f64 = allocations.iter().map(|a| a.percentage).sum();
    if (total - 100.0).abs() > ALLOCATION_TOLERANCE {
        return Err(ApiError::BadRequest(format!(
            "team allocations must sum to 100%, got {:.2}%",
            total
        )));
    }
    Ok(())
}

fn check_body(body: &BudgetResultBody) -> ApiResult<()> {
    let key = &body.key;
    if body.budget.is_none() && body.result.is_none() {
        return Err(ApiError::BadRequest("budget or result is required".to_string()));
    }
    if !(1..=12).contains(&key.month) {
        return Err(ApiError::BadRequest("month must be between 1 and 12".to_string()));
    }
    if !(2000..=2100).contains(&key.year) {
        return Err(ApiError::BadRequest("year must be between 2000 and 2100".to_string()));
    }
    if key.platform.trim().is_empty() || key.operation_type.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "platform and operationType are required".to_string(),
        ));
    }
    if let Some(budget) = &body.budget {
        if budget.amount < 0.0 {
            return Err(ApiError::BadRequest("amount must not be negative".to_string()));
        }
        check_allocations(budget.team_allocations.as_deref().unwrap_or_default())?;
    }
    if let Some(result) = &body.result {
        if result.actual_spend < 0.0 {
            return Err(ApiError::BadRequest("actualSpend must not be negative".to_string()));
        }
        check_allocations(result.team_allocations.as_deref().unwrap_or_default())?;
    }
    Ok(())
}

async fn check_users(conn: &mut PgConnection, allocations: &[TeamAllocation]) -> ApiResult<()> {
    for allocation in allocations {
        if !db::performance::user_exists(conn, allocation.user_id).await? {
            return Err(ApiError::BadRequest(format!(
                "user {} does not exist",
                allocation.user_id
            )));
        }
    }
    Ok(())
}

/// GET /api/budget-results
pub async fn list_budget_results(
    State(state): State<AppState>,
    Query(filter): Query<RowFilter>,
) -> ApiResult<Json<Vec<PerformanceRow>>> {
    Ok(Json(fetch_performance(&state, &filter).await?))
}

/// POST /api/budget-results
///
/// Upserts the budget and/or result for one natural key in a single
/// transaction.
pub async fn save_budget_result(
    State(state): State<AppState>,
    context: RequestContext,
    Json(mut body): Json<BudgetResultBody>,
) -> ApiResult<(StatusCode, Json<SavedBudgetResult>)> {
    body.key.platform = body.key.platform.trim().to_string();
    body.key.operation_type = body.key.operation_type.trim().to_string();
    check_body(&body)?;

    let mut tx = state.db.begin().await?;
    if !db::campaigns::campaign_exists(&mut tx, body.key.campaign_id).await? {
        return Err(ApiError::NotFound(format!("campaign {}", body.key.campaign_id)));
    }

    let mut saved = SavedBudgetResult {
        budget: None,
        result: None,
    };

    if let Some(part) = &body.budget {
        let input = BudgetInput {
            key: body.key.clone(),
            amount: part.amount,
            target_kpi: part.target_kpi.clone(),
            notes: part.notes.clone(),
        };
        let upserted = db::performance::upsert_budget(&mut tx, &input).await?;
        if let Some(allocations) = &part.team_allocations {
            check_users(&mut tx, allocations).await?;
            replace_allocations(&mut tx, AllocationOwner::Budget(upserted.id()), allocations).await?;
        }
        saved.budget = Some(upserted.into());
    }

    if let Some(part) = &body.result {
        let input = ResultInput {
            key: body.key.clone(),
            actual_spend: part.actual_spend,
            actual_result: part.actual_result,
            notes: part.notes.clone(),
        };
        let upserted = db::performance::upsert_result(&mut tx, &input).await?;
        if let Some(allocations) = &part.team_allocations {
            check_users(&mut tx, allocations).await?;
            replace_allocations(&mut tx, AllocationOwner::Result(upserted.id()), allocations).await?;
        }
        saved.result = Some(upserted.into());
    }

    tx.commit().await?;

    info!(
        request_id = %context.request_id,
        user_id = ?context.user_id,
        campaign_id = body.key.campaign_id,
        year = body.key.year,
        month = body.key.month,
        "budget/result saved"
    );

    let created = [saved.budget, saved.result]
        .iter()
        .flatten()
        .any(|record| record.created);
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(saved)))
}
