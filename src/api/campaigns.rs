//! Campaign CRUD

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use tracing::info;

use crate::context::RequestContext;
use crate::db::{self, Upserted};
use crate::error::{ApiError, ApiResult};
use crate::models::{Campaign, CampaignInput, ClientRef};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignQuery {
    pub client_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignBody {
    pub client_id: i64,
    pub name: String,
    #[serde(default)]
    pub purpose: String,
    pub start_year: i32,
    pub start_month: i32,
    pub end_year: Option<i32>,
    pub end_month: Option<i32>,
    #[serde(default)]
    pub total_budget: f64,
    #[serde(default = "default_status")]
    pub status: String,
}

fn default_status() -> String {
    "active".to_string()
}

#[derive(Debug, Serialize)]
pub struct SavedCampaign {
    pub created: bool,
    pub campaign: Campaign,
}

impl CampaignBody {
    fn into_input(self) -> ApiResult<CampaignInput> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ApiError::BadRequest("name is required".to_string()));
        }
        check_month("startMonth", self.start_month)?;
        if let Some(month) = self.end_month {
            check_month("endMonth", month)?;
        }
        if self.end_year.is_some() != self.end_month.is_some() {
            return Err(ApiError::BadRequest(
                "endYear and endMonth must be given together".to_string(),
            ));
        }
        if let (Some(end_year), Some(end_month)) = (self.end_year, self.end_month) {
            if (end_year, end_month) < (self.start_year, self.start_month) {
                return Err(ApiError::BadRequest("campaign ends before it starts".to_string()));
            }
        }
        if self.total_budget < 0.0 {
            return Err(ApiError::BadRequest("totalBudget must not be negative".to_string()));
        }

        Ok(CampaignInput {
            client: ClientRef::Id(self.client_id),
            name,
            purpose: self.purpose,
            start_year: self.start_year,
            start_month: self.start_month,
            end_year: self.end_year,
            end_month: self.end_month,
            total_budget: self.total_budget,
            status: self.status,
        })
    }
}

fn check_month(field: &str, month: i32) -> ApiResult<()> {
    if (1..=12).contains(&month) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!("{field} must be between 1 and 12")))
    }
}

async fn require_client(conn: &mut PgConnection, client_id: i64) -> ApiResult<i64> {
    db::clients::find_client_id(conn, client_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("client {client_id}")))
}

fn conflict_or(err: sqlx::Error) -> ApiError {
    if db::is_unique_violation(&err) {
        ApiError::Conflict("this client already has a campaign with that name".to_string())
    } else {
        ApiError::Database(err)
    }
}

/// GET /api/campaigns
pub async fn list_campaigns(
    State(state): State<AppState>,
    Query(query): Query<CampaignQuery>,
) -> ApiResult<Json<Vec<Campaign>>> {
    let campaigns = db::campaigns::list_campaigns(&state.db, query.client_id).await?;
    Ok(Json(campaigns))
}

/// GET /api/campaigns/:id
pub async fn get_campaign(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Campaign>> {
    let mut conn = state.db.acquire().await?;
    db::campaigns::get_campaign(&mut conn, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("campaign {id}")))
}

/// POST /api/campaigns
///
/// Upserts on (client, name).
pub async fn create_campaign(
    State(state): State<AppState>,
    context: RequestContext,
    Json(body): Json<CampaignBody>,
) -> ApiResult<(StatusCode, Json<SavedCampaign>)> {
    let client_id = body.client_id;
    let input = body.into_input()?;

    let mut tx = state.db.begin().await?;
    require_client(&mut tx, client_id).await?;
    let upserted = db::campaigns::upsert_campaign(&mut tx, client_id, &input).await?;
    let campaign = db::campaigns::get_campaign(&mut tx, upserted.id())
        .await?
        .ok_or_else(|| ApiError::Internal("campaign vanished after upsert".to_string()))?;
    tx.commit().await?;

    let created = matches!(upserted, Upserted::Created(_));
    info!(
        request_id = %context.request_id,
        user_id = ?context.user_id,
        campaign_id = campaign.id,
        created,
        "campaign saved"
    );

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(SavedCampaign { created, campaign })))
}

/// PUT /api/campaigns/:id
pub async fn update_campaign(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    context: RequestContext,
    Json(body): Json<CampaignBody>,
) -> ApiResult<Json<Campaign>> {
    let client_id = body.client_id;
    let input = body.into_input()?;

    let mut tx = state.db.begin().await?;
    require_client(&mut tx, client_id).await?;
    let found = db::campaigns::update_campaign(&mut tx, id, client_id, &input)
        .await
        .map_err(conflict_or)?;
    if !found {
        return Err(ApiError::NotFound(format!("campaign {id}")));
    }
    let campaign = db::campaigns::get_campaign(&mut tx, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("campaign {id}")))?;
    tx.commit().await?;

    info!(
        request_id = %context.request_id,
        user_id = ?context.user_id,
        campaign_id = id,
        "campaign updated"
    );
    Ok(Json(campaign))
}

/// DELETE /api/campaigns/:id
pub async fn delete_campaign(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    context: RequestContext,
) -> ApiResult<StatusCode> {
    let mut conn = state.db.acquire().await?;
    if !db::campaigns::delete_campaign(&mut conn, id).await? {
        return Err(ApiError::NotFound(format!("campaign {id}")));
    }

    info!(
        request_id = %context.request_id,
        user_id = ?context.user_id,
        campaign_id = id,
        "campaign deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}
