//! CSV/XLSX record import and template download

use axum::{
    extract::{Multipart, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::info;

use super::read_upload;
use crate::context::RequestContext;
use crate::error::{ApiError, ApiResult};
use crate::import::{self, template::csv_template, ImportSummary};
use crate::models::RecordType;
use crate::AppState;

/// `auto` (or nothing) means detect from the header row.
pub fn parse_hint(data_type: Option<&str>) -> ApiResult<Option<RecordType>> {
    match data_type.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) if value.eq_ignore_ascii_case("auto") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(ApiError::BadRequest),
    }
}

/// POST /api/csv-import
///
/// Multipart fields: `file`, optional `dataType`, optional `options` JSON.
pub async fn import_csv(
    State(state): State<AppState>,
    context: RequestContext,
    multipart: Multipart,
) -> ApiResult<Json<ImportSummary>> {
    let upload = read_upload(multipart).await?;
    let hint = parse_hint(upload.data_type.as_deref())?;

    info!(
        request_id = %context.request_id,
        user_id = ?context.user_id,
        file_name = %upload.file_name,
        bytes = upload.bytes.len(),
        hint = ?hint,
        "import requested"
    );

    let summary = import::run_import(
        &state.db,
        &upload.file_name,
        &upload.bytes,
        hint,
        &upload.options,
        state.import_timeout,
    )
    .await?;

    Ok(Json(summary))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateQuery {
    pub data_type: String,
}

/// GET /api/csv-import/template?dataType=budgets
pub async fn download_template(Query(query): Query<TemplateQuery>) -> ApiResult<impl IntoResponse> {
    let record_type: RecordType = query.data_type.parse().map_err(ApiError::BadRequest)?;
    let body = csv_template(record_type).map_err(|e| ApiError::Internal(e.to_string()))?;
    let disposition = format!("attachment; filename=\"{}_template.csv\"", record_type);

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}
