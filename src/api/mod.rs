//! HTTP API handlers

use axum::extract::Multipart;

use crate::analytics::join_budgets_and_results;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::import::ImportOptions;
use crate::models::{PerformanceRow, RowFilter};
use crate::AppState;

pub mod analytics;
pub mod budget_results;
pub mod campaigns;
pub mod clients;
pub mod csv_import;
pub mod health;
pub mod import_export;
pub mod masters;

pub use health::health_routes;

/// Multipart form shared by both import endpoints.
#[derive(Debug, Default)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Raw `dataType` field; absent means auto-detect.
    pub data_type: Option<String>,
    pub options: ImportOptions,
}

/// Reads the `file`, `dataType` and `options` fields; other fields are ignored.
pub async fn read_upload(mut multipart: Multipart) -> ApiResult<Upload> {
    let mut upload = Upload::default();
    let mut saw_file = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed upload: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                upload.file_name = field.file_name().unwrap_or_default().to_string();
                upload.bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("could not read file: {}", e)))?
                    .to_vec();
                saw_file = true;
            }
            Some("dataType") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("could not read dataType: {}", e)))?;
                let text = text.trim();
                if !text.is_empty() {
                    upload.data_type = Some(text.to_string());
                }
            }
            Some("options") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("could not read options: {}", e)))?;
                if !text.trim().is_empty() {
                    upload.options = serde_json::from_str(&text)
                        .map_err(|e| ApiError::BadRequest(format!("invalid options: {}", e)))?;
                }
            }
            _ => {}
        }
    }

    if !saw_file {
        return Err(ApiError::BadRequest("multipart field \"file\" is required".to_string()));
    }

    Ok(upload)
}

/// Budgets and results matching `filter`, joined on their natural key.
pub async fn fetch_performance(state: &AppState, filter: &RowFilter) -> ApiResult<Vec<PerformanceRow>> {
    if let Some(month) = filter.month {
        if !(1..=12).contains(&month) {
            return Err(ApiError::BadRequest("month must be between 1 and 12".to_string()));
        }
    }

    let budgets = db::performance::fetch_budget_lines(&state.db, filter).await?;
    let results = db::performance::fetch_result_lines(&state.db, filter).await?;
    Ok(join_budgets_and_results(&budgets, &results))
}
