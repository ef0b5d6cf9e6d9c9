//! Re-import of the 12-column budget/result sheet produced by `export`.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use super::table::{self, RawRow, RawTable};
use super::validate::{parse_amount, parse_whole, row_error};
use super::{bounded, Counts, ImportError, ImportFailure, ImportOptions};
use crate::db;
use crate::export::HEADERS;
use crate::models::{BudgetInput, NaturalKey, ResultInput};

const REQUIRED: [&str; 6] = ["年", "月", "クライアント名", "キャンペーン名", "プラットフォーム", "運用タイプ"];

#[derive(Debug, Clone, PartialEq)]
pub struct WorkbookRow {
    pub line: usize,
    pub client_name: String,
    pub campaign_name: String,
    pub year: i32,
    pub month: i32,
    pub platform: String,
    pub operation_type: String,
    pub budget: Option<f64>,
    pub actual_spend: Option<f64>,
    pub actual_result: Option<f64>,
    pub notes: String,
}

#[derive(Debug, Default)]
pub struct ParsedWorkbook {
    pub rows: Vec<WorkbookRow>,
    pub errors: Vec<String>,
    pub blank_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkbookSummary {
    pub import_id: Uuid,
    pub budgets: Counts,
    pub results: Counts,
    pub skipped_blank: usize,
    pub errors: Vec<String>,
}

fn money(cell: &str, column: &str) -> Result<Option<f64>, String> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(None);
    }
    parse_amount(cell)
        .map(Some)
        .ok_or_else(|| format!("{} must be an amount, got {:?}", column, cell))
}

fn lookup<'a>(columns: &HashMap<&str, usize>, row: &'a RawRow, column: &str) -> &'a str {
    columns
        .get(column)
        .and_then(|index| row.cells.get(*index))
        .map(|value| value.trim())
        .unwrap_or_default()
}

fn parse_row(columns: &HashMap<&str, usize>, row: &RawRow) -> Result<WorkbookRow, String> {
    let cell = |column: &str| lookup(columns, row, column);

    let year = parse_whole(cell("年")).ok_or_else(|| format!("invalid year {:?}", cell("年")))?;
    let month = parse_whole(cell("月"))
        .filter(|month| (1..=12).contains(month))
        .ok_or_else(|| format!("invalid month {:?}", cell("月")))?;

    Ok(WorkbookRow {
        line: row.line,
        client_name: cell("クライアント名").to_string(),
        campaign_name: cell("キャンペーン名").to_string(),
        year: year as i32,
        month: month as i32,
        platform: cell("プラットフォーム").to_string(),
        operation_type: cell("運用タイプ").to_string(),
        budget: money(cell("予算"), "予算")?,
        actual_spend: money(cell("実績費用"), "実績費用")?,
        actual_result: money(cell("実績成果"), "実績成果")?,
        notes: cell("備考").to_string(),
    })
}

pub fn parse_workbook(table: &RawTable) -> Result<ParsedWorkbook, ImportError> {
    let columns: HashMap<&str, usize> = table
        .headers
        .iter()
        .enumerate()
        .map(|(index, header)| (header.trim(), index))
        .collect();

    let missing: Vec<&str> = REQUIRED
        .iter()
        .copied()
        .filter(|column| !columns.contains_key(column))
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::Parse(format!(
            "not a budget/result sheet; missing columns: {} (expected {})",
            missing.join(", "),
            HEADERS.join(", ")
        )));
    }

    let mut parsed = ParsedWorkbook::default();

    for row in &table.rows {
        if row.is_blank() {
            parsed.blank_rows += 1;
            continue;
        }

        let cell = |column: &str| lookup(&columns, row, column);

        let empty: Vec<&str> = REQUIRED
            .iter()
            .copied()
            .filter(|column| cell(*column).is_empty())
            .collect();
        if !empty.is_empty() {
            parsed.errors.push(row_error(
                row.line,
                format!("missing required field(s): {}", empty.join(", ")),
            ));
            continue;
        }

        let parsed_row = parse_row(&columns, row);
        match parsed_row {
            Ok(parsed_row) => parsed.rows.push(parsed_row),
            Err(message) => parsed.errors.push(row_error(row.line, message)),
        }
    }

    Ok(parsed)
}

async fn resolve_campaign(
    conn: &mut PgConnection,
    cache: &mut HashMap<(String, String), i64>,
    row: &WorkbookRow,
) -> Result<i64, ImportError> {
    let cache_key = (row.client_name.clone(), row.campaign_name.clone());
    if let Some(id) = cache.get(&cache_key) {
        return Ok(*id);
    }

    let client_id = db::clients::find_client_id_by_name(conn, &row.client_name)
        .await?
        .ok_or_else(|| {
            ImportError::Referential(row_error(
                row.line,
                format!("client \"{}\" does not exist", row.client_name),
            ))
        })?;

    let campaign_id = db::campaigns::find_campaign_id_by_name(conn, client_id, &row.campaign_name)
        .await?
        .ok_or_else(|| {
            ImportError::Referential(row_error(
                row.line,
                format!(
                    "campaign \"{}\" does not exist for client \"{}\"",
                    row.campaign_name, row.client_name
                ),
            ))
        })?;

    cache.insert(cache_key, campaign_id);
    Ok(campaign_id)
}

pub async fn reconcile_workbook(
    conn: &mut PgConnection,
    rows: &[WorkbookRow],
) -> Result<(Counts, Counts), ImportError> {
    let mut budgets = Counts::default();
    let mut results = Counts::default();
    let mut campaigns = HashMap::new();

    for row in rows {
        let campaign_id = resolve_campaign(conn, &mut campaigns, row).await?;
        let key = NaturalKey {
            campaign_id,
            year: row.year,
            month: row.month,
            platform: row.platform.clone(),
            operation_type: row.operation_type.clone(),
        };

        if let Some(amount) = row.budget {
            let budget = BudgetInput {
                key: key.clone(),
                amount,
                target_kpi: String::new(),
                notes: row.notes.clone(),
            };
            budgets.tally(db::performance::upsert_budget(conn, &budget).await?);
        }

        if row.actual_spend.is_some() || row.actual_result.is_some() {
            let result = ResultInput {
                key,
                actual_spend: row.actual_spend.unwrap_or(0.0),
                actual_result: row.actual_result.unwrap_or(0.0),
                notes: row.notes.clone(),
            };
            results.tally(db::performance::upsert_result(conn, &result).await?);
        }
    }

    Ok((budgets, results))
}

pub async fn run_workbook_import(
    pool: &PgPool,
    bytes: &[u8],
    options: &ImportOptions,
    timeout: Duration,
) -> Result<WorkbookSummary, ImportFailure> {
    let import_id = Uuid::new_v4();
    let (raw, diagnostics) = table::from_xlsx(bytes, options.trim_whitespace)?;
    let parsed = parse_workbook(&raw).map_err(|error| ImportFailure::new(error, &diagnostics))?;

    if parsed.rows.is_empty() {
        return Err(ImportFailure::new(
            ImportError::NoValidRows {
                errors: parsed.errors,
            },
            &diagnostics,
        ));
    }

    let outcome = bounded(timeout, async {
        let mut tx = pool.begin().await?;
        db::set_statement_timeout(&mut tx, timeout).await?;
        let counts = reconcile_workbook(&mut tx, &parsed.rows).await?;
        tx.commit().await?;
        Ok::<_, ImportError>(counts)
    })
    .await;

    let (budgets, results) = outcome.map_err(|error| {
        warn!(%import_id, %error, "workbook import rolled back");
        ImportFailure::new(error, &diagnostics)
    })?;

    info!(
        %import_id,
        budgets_created = budgets.created,
        budgets_updated = budgets.updated,
        results_created = results.created,
        results_updated = results.updated,
        "workbook import committed"
    );

    Ok(WorkbookSummary {
        import_id,
        budgets,
        results,
        skipped_blank: parsed.blank_rows,
        errors: parsed.errors,
    })
}
