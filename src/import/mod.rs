//! Spreadsheet import: diagnose, detect, validate, then reconcile every
//! valid row inside a single transaction.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{self, Upserted};
use crate::models::{ClientRef, ImportRecord, RecordType};

pub mod detect;
pub mod diagnose;
pub mod schema;
pub mod table;
pub mod template;
pub mod validate;
pub mod workbook;

pub use detect::Detection;
pub use diagnose::{Diagnostics, ImportOptions};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("the file contains no data")]
    Empty,

    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("could not parse file: {0}")]
    Parse(String),

    #[error("could not determine data type from columns [{}]", .headers.join(", "))]
    UnknownType { headers: Vec<String> },

    #[error("missing required columns for {record_type}: {}", .missing.join(", "))]
    MissingColumns {
        record_type: RecordType,
        missing: Vec<&'static str>,
    },

    #[error("no valid rows to import")]
    NoValidRows { errors: Vec<String> },

    /// A row referenced a campaign or client that does not exist; the
    /// whole batch was rolled back.
    #[error("{0}")]
    Referential(String),

    #[error("import timed out after {0} seconds and was rolled back")]
    Timeout(u64),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ImportError {
    pub fn row_errors(&self) -> &[String] {
        match self {
            ImportError::NoValidRows { errors } => errors,
            _ => &[],
        }
    }

    pub fn is_client_error(&self) -> bool {
        !matches!(self, ImportError::Timeout(_) | ImportError::Database(_))
    }
}

/// An import error plus whatever was learned about the file before it.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ImportFailure {
    #[source]
    pub error: ImportError,
    pub diagnostics: Option<Diagnostics>,
}

impl ImportFailure {
    pub fn new(error: ImportError, diagnostics: &Diagnostics) -> Self {
        Self {
            error,
            diagnostics: Some(diagnostics.clone()),
        }
    }
}

impl From<ImportError> for ImportFailure {
    fn from(error: ImportError) -> Self {
        Self {
            error,
            diagnostics: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub created: usize,
    pub updated: usize,
}

impl Counts {
    pub fn tally(&mut self, upserted: Upserted) {
        match upserted {
            Upserted::Created(_) => self.created += 1,
            Upserted::Updated(_) => self.updated += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub import_id: Uuid,
    pub data_type: RecordType,
    pub created: usize,
    pub updated: usize,
    pub skipped_blank: usize,
    pub errors: Vec<String>,
    pub diagnostics: Diagnostics,
}

/// Everything decided before touching the database.
#[derive(Debug)]
pub struct ImportPlan {
    pub record_type: RecordType,
    pub detection: Detection,
    pub records: Vec<(usize, ImportRecord)>,
    pub errors: Vec<String>,
    pub blank_rows: usize,
    pub diagnostics: Diagnostics,
}

pub fn is_xlsx(file_name: &str, bytes: &[u8]) -> bool {
    let lowered = file_name.to_lowercase();
    lowered.ends_with(".xlsx") || lowered.ends_with(".xlsm") || bytes.starts_with(b"PK\x03\x04")
}

/// Parses, diagnoses and validates an upload. `hint` of `None` means
/// auto-detect.
pub fn plan_import(
    file_name: &str,
    bytes: &[u8],
    hint: Option<RecordType>,
    options: &ImportOptions,
) -> Result<ImportPlan, ImportFailure> {
    if bytes.is_empty() {
        return Err(ImportError::Empty.into());
    }

    let (mut raw, diagnostics, blank_lines) = if is_xlsx(file_name, bytes) {
        let (raw, diagnostics) = table::from_xlsx(bytes, options.trim_whitespace)?;
        (raw, diagnostics, 0)
    } else {
        let prepared = diagnose::prepare(bytes, options)?;
        let raw = table::from_csv(&prepared, options.trim_whitespace)
            .map_err(|error| ImportFailure::new(error, &prepared.diagnostics))?;
        (raw, prepared.diagnostics, prepared.blank_lines)
    };

    raw.headers = schema::canonical_headers(&raw.headers);

    let detection = detect::detect(&raw.headers);
    let record_type = match hint.or(detection.record_type()) {
        Some(record_type) => record_type,
        None => {
            return Err(ImportFailure::new(
                ImportError::UnknownType {
                    headers: raw.headers.clone(),
                },
                &diagnostics,
            ))
        }
    };

    let missing = schema::missing_required(record_type, &raw.headers);
    if !missing.is_empty() {
        return Err(ImportFailure::new(
            ImportError::MissingColumns {
                record_type,
                missing,
            },
            &diagnostics,
        ));
    }

    let validated = validate::validate_rows(record_type, &raw);
    if validated.records.is_empty() {
        return Err(ImportFailure::new(
            ImportError::NoValidRows {
                errors: validated.errors,
            },
            &diagnostics,
        ));
    }

    Ok(ImportPlan {
        record_type,
        detection,
        records: validated.records,
        errors: validated.errors,
        blank_rows: validated.blank_rows + blank_lines,
        diagnostics,
    })
}

async fn resolve_client(
    conn: &mut PgConnection,
    cache: &mut HashMap<String, i64>,
    line: usize,
    client: &ClientRef,
) -> Result<i64, ImportError> {
    let cache_key = client.to_string();
    if let Some(id) = cache.get(&cache_key) {
        return Ok(*id);
    }

    let found = match client {
        ClientRef::Id(id) => db::clients::find_client_id(conn, *id).await?,
        ClientRef::Name(name) => db::clients::find_client_id_by_name(conn, name).await?,
    };

    match found {
        Some(id) => {
            cache.insert(cache_key, id);
            Ok(id)
        }
        None => Err(ImportError::Referential(validate::row_error(
            line,
            format!("client {} does not exist", client),
        ))),
    }
}

async fn ensure_campaign(
    conn: &mut PgConnection,
    known: &mut HashSet<i64>,
    line: usize,
    campaign_id: i64,
) -> Result<(), ImportError> {
    if known.contains(&campaign_id) {
        return Ok(());
    }
    if !db::campaigns::campaign_exists(conn, campaign_id).await? {
        return Err(ImportError::Referential(validate::row_error(
            line,
            format!("campaign {} does not exist", campaign_id),
        )));
    }
    known.insert(campaign_id);
    Ok(())
}

/// Upserts each record in file order. The first referential failure stops
/// the batch; the caller's transaction is then dropped, rolling it back.
pub async fn reconcile(
    conn: &mut PgConnection,
    records: &[(usize, ImportRecord)],
) -> Result<Counts, ImportError> {
    let mut counts = Counts::default();
    let mut campaigns = HashSet::new();
    let mut clients = HashMap::new();

    for (line, record) in records {
        let upserted = match record {
            ImportRecord::Budget(budget) => {
                ensure_campaign(conn, &mut campaigns, *line, budget.key.campaign_id).await?;
                db::performance::upsert_budget(conn, budget).await?
            }
            ImportRecord::Result(result) => {
                ensure_campaign(conn, &mut campaigns, *line, result.key.campaign_id).await?;
                db::performance::upsert_result(conn, result).await?
            }
            ImportRecord::Client(client) => db::clients::upsert_client(conn, client).await?,
            ImportRecord::Campaign(campaign) => {
                let client_id = resolve_client(conn, &mut clients, *line, &campaign.client).await?;
                db::campaigns::upsert_campaign(conn, client_id, campaign).await?
            }
        };
        counts.tally(upserted);
    }

    Ok(counts)
}

/// Awaits `work` for at most `timeout`. Running out of time, and Postgres
/// cancelling a statement under the matching `statement_timeout`, both come
/// back as `Timeout`.
pub async fn bounded<T, F>(timeout: Duration, work: F) -> Result<T, ImportError>
where
    F: Future<Output = Result<T, ImportError>>,
{
    match tokio::time::timeout(timeout, work).await {
        Ok(Err(ImportError::Database(err))) if db::is_query_canceled(&err) => {
            Err(ImportError::Timeout(timeout.as_secs()))
        }
        Ok(result) => result,
        Err(_) => Err(ImportError::Timeout(timeout.as_secs())),
    }
}

/// Runs `records` through `reconcile` in one transaction bounded by
/// `timeout`.
pub async fn commit_records(
    pool: &PgPool,
    records: &[(usize, ImportRecord)],
    timeout: Duration,
) -> Result<Counts, ImportError> {
    bounded(timeout, async {
        let mut tx = pool.begin().await?;
        db::set_statement_timeout(&mut tx, timeout).await?;
        let counts = reconcile(&mut tx, records).await?;
        tx.commit().await?;
        Ok::<_, ImportError>(counts)
    })
    .await
}

pub async fn run_import(
    pool: &PgPool,
    file_name: &str,
    bytes: &[u8],
    hint: Option<RecordType>,
    options: &ImportOptions,
    timeout: Duration,
) -> Result<ImportSummary, ImportFailure> {
    let import_id = Uuid::new_v4();
    let plan = plan_import(file_name, bytes, hint, options)?;

    info!(
        %import_id,
        file_name,
        data_type = %plan.record_type,
        detection = ?plan.detection,
        rows = plan.records.len(),
        invalid = plan.errors.len(),
        "import planned"
    );

    let counts = commit_records(pool, &plan.records, timeout)
        .await
        .map_err(|error| {
            warn!(%import_id, %error, "import rolled back");
            ImportFailure::new(error, &plan.diagnostics)
        })?;

    info!(
        %import_id,
        created = counts.created,
        updated = counts.updated,
        "import committed"
    );

    Ok(ImportSummary {
        import_id,
        data_type: plan.record_type,
        created: counts.created,
        updated: counts.updated,
        skipped_blank: plan.blank_rows,
        errors: plan.errors,
        diagnostics: plan.diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUDGET_CSV: &str =
        "campaign_id,year,month,platform,operation_type,amount\n1,2025,8,Google,運用代行,500000\n";

    #[test]
    fn plans_budget_file() {
        let plan = plan_import("budgets.csv", BUDGET_CSV.as_bytes(), None, &ImportOptions::default())
            .unwrap();

        assert_eq!(plan.record_type, RecordType::Budgets);
        assert_eq!(plan.detection, Detection::Exact(RecordType::Budgets));
        assert_eq!(plan.records.len(), 1);
        assert_eq!(plan.records[0].0, 2);
        assert_eq!(plan.diagnostics.delimiter, ",");
    }

    #[test]
    fn invalid_rows_are_reported_alongside_valid_ones() {
        let csv = "campaign_id,year,month,platform,operation_type,amount\n\
                   1,2025,8,Google,運用代行,500000\n\
                   ,,,,,\n\
                   1,2025,,Yahoo,運用代行,100\n";
        let plan = plan_import("b.csv", csv.as_bytes(), None, &ImportOptions::default()).unwrap();

        assert_eq!(plan.records.len(), 1);
        assert_eq!(plan.blank_rows, 1);
        assert_eq!(plan.errors, vec!["Line 4: missing required field(s): month"]);
    }

    #[test]
    fn errors_after_blank_lines_name_the_source_line() {
        let csv = "campaign_id,year,month,platform,operation_type,amount\n\
                   \n\
                   1,2025,,Google,運用代行,100\n\
                   1,2025,8,Google,運用代行,500000\n";
        let plan = plan_import("b.csv", csv.as_bytes(), None, &ImportOptions::default()).unwrap();

        assert_eq!(plan.errors, vec!["Line 3: missing required field(s): month"]);
        assert_eq!(plan.records[0].0, 4);
        assert_eq!(plan.blank_rows, 1);
    }

    #[test]
    fn notes_with_reference_marks_are_imported() {
        let csv = "campaign_id,year,month,platform,operation_type,amount,notes\n\
                   1,2025,8,Google,運用代行,500000,※要確認\n\
                   1,2025,9,Google,運用代行,400000,\n";
        let plan = plan_import("b.csv", csv.as_bytes(), None, &ImportOptions::default()).unwrap();

        assert_eq!(plan.records.len(), 2);
        assert!(plan.errors.is_empty());
        assert_eq!(plan.diagnostics.comment_lines, 0);
    }

    #[test]
    fn unknown_headers_fail_with_diagnostics() {
        let failure = plan_import("x.csv", b"foo\tbar\n1\t2\n", None, &ImportOptions::default())
            .unwrap_err();

        assert!(matches!(failure.error, ImportError::UnknownType { .. }));
        let diagnostics = failure.diagnostics.unwrap();
        assert_eq!(diagnostics.delimiter, "tab");
        assert_eq!(diagnostics.data_line_count, 1);
    }

    #[test]
    fn hint_with_missing_columns_is_rejected() {
        let failure = plan_import(
            "budgets.csv",
            BUDGET_CSV.as_bytes(),
            Some(RecordType::Results),
            &ImportOptions::default(),
        )
        .unwrap_err();

        match failure.error {
            ImportError::MissingColumns { record_type, missing } => {
                assert_eq!(record_type, RecordType::Results);
                assert_eq!(missing, vec!["actual_spend"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn all_rows_invalid_is_an_error_with_row_messages() {
        let csv = "name,business_division\nAcme,\n";
        let failure = plan_import("c.csv", csv.as_bytes(), None, &ImportOptions::default()).unwrap_err();

        assert_eq!(failure.error.to_string(), "no valid rows to import");
        assert_eq!(
            failure.error.row_errors(),
            ["Line 2: missing required field(s): business_division".to_string()]
        );
        assert!(failure.error.is_client_error());
    }

    #[test]
    fn empty_upload_is_rejected() {
        let failure = plan_import("empty.csv", b"", None, &ImportOptions::default()).unwrap_err();
        assert!(matches!(failure.error, ImportError::Empty));
        assert!(failure.diagnostics.is_none());
    }

    #[tokio::test]
    async fn bounded_work_that_never_finishes_times_out() {
        let outcome: Result<(), ImportError> =
            bounded(Duration::ZERO, std::future::pending()).await;
        assert!(matches!(outcome, Err(ImportError::Timeout(0))));
    }

    #[tokio::test]
    async fn bounded_passes_other_errors_through() {
        let outcome: Result<(), ImportError> =
            bounded(Duration::from_secs(5), async { Err(ImportError::Empty) }).await;
        assert!(matches!(outcome, Err(ImportError::Empty)));
    }

    #[test]
    fn detects_xlsx_by_name_or_magic() {
        assert!(is_xlsx("Report.XLSX", b""));
        assert!(is_xlsx("upload", b"PK\x03\x04rest"));
        assert!(!is_xlsx("budgets.csv", b"campaign_id"));
    }
}
