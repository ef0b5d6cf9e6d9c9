//! Spreadsheet export and re-import of the 12-column budget/result sheet

use axum::{
    extract::{Multipart, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::info;

use super::{fetch_performance, read_upload};
use crate::context::RequestContext;
use crate::error::{ApiError, ApiResult};
use crate::export;
use crate::import::workbook::{run_workbook_import, WorkbookSummary};
use crate::models::RowFilter;
use crate::AppState;

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Xlsx,
    Csv,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportQuery {
    pub year: Option<i32>,
    pub month: Option<i32>,
    pub client_id: Option<i64>,
    pub campaign_id: Option<i64>,
    pub platform: Option<String>,
    pub department: Option<String>,
    #[serde(default)]
    pub format: ExportFormat,
}

impl ExportQuery {
    fn filter(&self) -> RowFilter {
        RowFilter {
            year: self.year,
            month: self.month,
            client_id: self.client_id,
            campaign_id: self.campaign_id,
            platform: self.platform.clone(),
            department: self.department.clone(),
        }
    }
}

fn file_name(query: &ExportQuery) -> String {
    let period = match (query.year, query.month) {
        (Some(year), Some(month)) => format!("_{year:04}{month:02}"),
        (Some(year), None) => format!("_{year:04}"),
        _ => String::new(),
    };
    let extension = match query.format {
        ExportFormat::Xlsx => "xlsx",
        ExportFormat::Csv => "csv",
    };
    format!("budget_results{period}.{extension}")
}

/// GET /api/import-export
pub async fn export_sheet(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> ApiResult<impl IntoResponse> {
    let rows = fetch_performance(&state, &query.filter()).await?;

    let (content_type, body) = match query.format {
        ExportFormat::Xlsx => (
            XLSX_CONTENT_TYPE,
            export::write_xlsx(&rows).map_err(|e| ApiError::Internal(e.to_string()))?,
        ),
        ExportFormat::Csv => (
            "text/csv; charset=utf-8",
            export::write_csv(&rows).map_err(|e| ApiError::Internal(e.to_string()))?,
        ),
    };

    info!(rows = rows.len(), format = ?query.format, "sheet exported");

    let disposition = format!("attachment; filename=\"{}\"", file_name(&query));
    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

/// POST /api/import-export
///
/// Accepts the layout produced by the export; budgets and results for every
/// row are upserted in one transaction.
pub async fn import_sheet(
    State(state): State<AppState>,
    context: RequestContext,
    multipart: Multipart,
) -> ApiResult<Json<WorkbookSummary>> {
    let upload = read_upload(multipart).await?;

    info!(
        request_id = %context.request_id,
        user_id = ?context.user_id,
        file_name = %upload.file_name,
        bytes = upload.bytes.len(),
        "sheet import requested"
    );

    let summary =
        run_workbook_import(&state.db, &upload.bytes, &upload.options, state.import_timeout)
            .await?;
    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_defaults_to_xlsx() {
        let query: ExportQuery = parse_query("year=2025&month=8");
        assert_eq!(query.format, ExportFormat::Xlsx);
        assert_eq!(file_name(&query), "budget_results_202508.xlsx");
    }

    #[test]
    fn csv_format_is_selectable() {
        let query: ExportQuery = parse_query("format=csv&department=SO");
        assert_eq!(query.format, ExportFormat::Csv);
        assert_eq!(query.filter().department.as_deref(), Some("SO"));
        assert_eq!(file_name(&query), "budget_results.csv");
    }

    fn parse_query(raw: &str) -> ExportQuery {
        let uri: axum::http::Uri = format!("/api/import-export?{raw}").parse().unwrap();
        Query::<ExportQuery>::try_from_uri(&uri).unwrap().0
    }
}
