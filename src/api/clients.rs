//! Client listing and upsert

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::context::RequestContext;
use crate::db::{self, Upserted};
use crate::error::{ApiError, ApiResult};
use crate::models::{Client, ClientInput};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientQuery {
    pub business_division: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SavedClient {
    pub created: bool,
    pub client: Client,
}

/// GET /api/clients
pub async fn list_clients(
    State(state): State<AppState>,
    Query(query): Query<ClientQuery>,
) -> ApiResult<Json<Vec<Client>>> {
    let clients = db::clients::list_clients(&state.db, query.business_division.as_deref()).await?;
    Ok(Json(clients))
}

fn validate(input: &ClientInput) -> ApiResult<()> {
    if input.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }
    if input.business_division.trim().is_empty() {
        return Err(ApiError::BadRequest("businessDivision is required".to_string()));
    }
    Ok(())
}

/// POST /api/clients
///
/// Upserts on the client name: 201 when created, 200 when an existing
/// client was overwritten.
pub async fn create_client(
    State(state): State<AppState>,
    context: RequestContext,
    Json(mut input): Json<ClientInput>,
) -> ApiResult<(StatusCode, Json<SavedClient>)> {
    input.name = input.name.trim().to_string();
    input.business_division = input.business_division.trim().to_string();
    validate(&input)?;

    let mut tx = state.db.begin().await?;
    let upserted = db::clients::upsert_client(&mut tx, &input).await?;
    let client = db::clients::get_client(&mut tx, upserted.id())
        .await?
        .ok_or_else(|| ApiError::Internal("client vanished after upsert".to_string()))?;
    tx.commit().await?;

    let created = matches!(upserted, Upserted::Created(_));
    info!(
        request_id = %context.request_id,
        user_id = ?context.user_id,
        client_id = client.id,
        created,
        "client saved"
    );

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(SavedClient { created, client })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, division: &str) -> ClientInput {
        ClientInput {
            name: name.to_string(),
            business_division: division.to_string(),
            priority: "中".to_string(),
            sales_person: String::new(),
            notes: String::new(),
        }
    }

    #[test]
    fn requires_name_and_division() {
        assert!(validate(&input("ミナト物産", "SO事業部")).is_ok());
        assert!(matches!(validate(&input(" ", "SO事業部")), Err(ApiError::BadRequest(_))));
        assert!(matches!(validate(&input("ミナト物産", "")), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn body_defaults_priority() {
        let parsed: ClientInput =
            serde_json::from_str(r#"{"name":"A社","businessDivision":"HO事業部"}"#).unwrap();
        assert_eq!(parsed.priority, "中");
        assert_eq!(parsed.sales_person, "");
    }
}
