//! Row validation: turns raw spreadsheet rows into typed `ImportRecord`s.

use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate};

use super::schema::{schema, PERIOD_COLUMNS};
use super::table::{RawRow, RawTable};
use crate::models::{
    BudgetInput, CampaignInput, ClientInput, ClientRef, ImportRecord, NaturalKey, RecordType,
    ResultInput,
};

const MIN_YEAR: i32 = 2000;
const MAX_YEAR: i32 = 2100;

#[derive(Debug, Default)]
pub struct Validated {
    /// Source line and record, in file order.
    pub records: Vec<(usize, ImportRecord)>,
    pub errors: Vec<String>,
    pub blank_rows: usize,
}

pub fn row_error(line: usize, message: impl std::fmt::Display) -> String {
    format!("Line {}: {}", line, message)
}

/// Parses a currency or plain number: `"¥1,200,000"`, `"1,200円"`, `" 42 "`.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '¥' | '￥' | '$' | ',' | '，' | '円') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|value| value.is_finite())
}

pub fn parse_whole(raw: &str) -> Option<i64> {
    let value = parse_amount(raw)?;
    if value.fract() != 0.0 {
        return None;
    }
    Some(value as i64)
}

fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}

fn year_month(year: i32, month: u32) -> Option<(i32, i32)> {
    if (MIN_YEAR..=MAX_YEAR).contains(&year) && (1..=12).contains(&month) {
        Some((year, month as i32))
    } else {
        None
    }
}

fn split_pair(raw: &str, separator: char) -> Option<(&str, &str)> {
    let mut parts = raw.split(separator);
    let first = parts.next()?;
    let second = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((first.trim(), second.trim()))
}

/// Parses a year-month from the formats spreadsheets hand us. Returns
/// `None` rather than guessing; callers turn that into a row error.
pub fn parse_period(raw: &str) -> Option<(i32, i32)> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    // 2025年8月 / 2025年08月
    if let Some(rest) = value.strip_suffix('月') {
        let (year, month) = split_pair(rest, '年')?;
        return year_month(year.parse().ok()?, month.parse().ok()?);
    }

    for format in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return year_month(date.year(), date.month());
        }
    }

    for separator in ['-', '/'] {
        if let Some((first, second)) = split_pair(value, separator) {
            let month: u32 = second.parse().ok()?;
            return match first.len() {
                4 => year_month(first.parse().ok()?, month),
                // YY/MM
                2 => year_month(2000 + first.parse::<i32>().ok()?, month),
                _ => None,
            };
        }
    }

    if value.len() == 6 && value.chars().all(|c| c.is_ascii_digit()) {
        let year: i32 = value[..4].parse().ok()?;
        let month: u32 = value[4..].parse().ok()?;
        if let Some(parsed) = year_month(year, month) {
            return Some(parsed);
        }
    }

    let serial: f64 = value.parse().ok()?;
    if !(1.0..2_958_466.0).contains(&serial) {
        return None;
    }
    let date = excel_serial_to_date(serial)?;
    year_month(date.year(), date.month())
}

/// Column lookup for one row by canonical header name.
struct RowView<'a> {
    columns: &'a HashMap<String, usize>,
    row: &'a RawRow,
}

impl<'a> RowView<'a> {
    fn get(&self, column: &str) -> Option<&'a str> {
        let index = *self.columns.get(column)?;
        self.row
            .cells
            .get(index)
            .map(|cell| cell.trim())
            .filter(|cell| !cell.is_empty())
    }

    fn period(&self) -> Option<&'a str> {
        PERIOD_COLUMNS.iter().find_map(|column| self.get(column))
    }

    fn text_or(&self, column: &str, record_type: RecordType) -> String {
        match self.get(column) {
            Some(value) => value.to_string(),
            None => default_for(record_type, column).to_string(),
        }
    }

    fn whole(&self, column: &str) -> Result<i64, String> {
        let raw = self.get(column).unwrap_or_default();
        parse_whole(raw).ok_or_else(|| format!("{} must be a whole number, got {:?}", column, raw))
    }

    fn optional_whole(&self, column: &str) -> Result<Option<i64>, String> {
        match self.get(column) {
            None => Ok(None),
            Some(raw) => parse_whole(raw)
                .map(Some)
                .ok_or_else(|| format!("{} must be a whole number, got {:?}", column, raw)),
        }
    }

    fn amount(&self, column: &str) -> Result<f64, String> {
        let raw = self.get(column).unwrap_or_default();
        parse_amount(raw).ok_or_else(|| format!("{} must be numeric, got {:?}", column, raw))
    }

    /// Non-critical numbers: blank or unparseable become zero.
    fn lenient_amount(&self, column: &str) -> f64 {
        self.get(column).and_then(parse_amount).unwrap_or(0.0)
    }
}

fn default_for(record_type: RecordType, column: &str) -> &'static str {
    schema(record_type)
        .optional
        .iter()
        .find(|(name, _)| *name == column)
        .map(|(_, default)| *default)
        .unwrap_or("")
}

fn missing_fields(view: &RowView<'_>, record_type: RecordType) -> Vec<&'static str> {
    let has_period = view.period().is_some();
    schema(record_type)
        .required
        .iter()
        .copied()
        .filter(|column| {
            if has_period && (*column == "year" || *column == "month") {
                return false;
            }
            view.get(column).is_none()
        })
        .collect()
}

fn natural_key(view: &RowView<'_>) -> Result<NaturalKey, String> {
    let campaign_id = view.whole("campaign_id")?;

    let (year, month) = if view.get("year").is_some() && view.get("month").is_some() {
        let year = view.whole("year")?;
        let month = view.whole("month")?;
        let in_range = i32::try_from(year)
            .ok()
            .zip(u32::try_from(month).ok())
            .and_then(|(year, month)| year_month(year, month));
        in_range.ok_or_else(|| format!("invalid year/month {}/{}", year, month))?
    } else {
        let raw = view.period().unwrap_or_default();
        parse_period(raw).ok_or_else(|| format!("unrecognized date {:?}", raw))?
    };

    Ok(NaturalKey {
        campaign_id,
        year,
        month,
        platform: view.get("platform").unwrap_or_default().to_string(),
        operation_type: view.get("operation_type").unwrap_or_default().to_string(),
    })
}

fn to_record(view: &RowView<'_>, record_type: RecordType) -> Result<ImportRecord, String> {
    let record = match record_type {
        RecordType::Results => ImportRecord::Result(ResultInput {
            key: natural_key(view)?,
            actual_spend: view.amount("actual_spend")?,
            actual_result: view.lenient_amount("actual_result"),
            notes: view.text_or("notes", record_type),
        }),
        RecordType::Budgets => ImportRecord::Budget(BudgetInput {
            key: natural_key(view)?,
            amount: view.amount("amount")?,
            target_kpi: view.text_or("target_kpi", record_type),
            notes: view.text_or("notes", record_type),
        }),
        RecordType::Clients => ImportRecord::Client(ClientInput {
            name: view.text_or("name", record_type),
            business_division: view.text_or("business_division", record_type),
            priority: view.text_or("priority", record_type),
            sales_person: view.text_or("sales_person", record_type),
            notes: view.text_or("notes", record_type),
        }),
        RecordType::Campaigns => {
            let client_raw = view.get("client_id").unwrap_or_default();
            let client = match parse_whole(client_raw) {
                Some(id) => ClientRef::Id(id),
                None => ClientRef::Name(client_raw.to_string()),
            };
            let start_year = view.whole("start_year")?;
            let start_month = view.whole("start_month")?;
            let (start_year, start_month) = i32::try_from(start_year)
                .ok()
                .zip(u32::try_from(start_month).ok())
                .and_then(|(year, month)| year_month(year, month))
                .ok_or_else(|| format!("invalid start {}/{}", start_year, start_month))?;
            let end_year = view
                .optional_whole("end_year")?
                .map(|value| {
                    i32::try_from(value)
                        .ok()
                        .filter(|year| (MIN_YEAR..=MAX_YEAR).contains(year))
                        .ok_or_else(|| format!("invalid end_year {}", value))
                })
                .transpose()?;
            let end_month = view
                .optional_whole("end_month")?
                .map(|value| {
                    i32::try_from(value)
                        .ok()
                        .filter(|month| (1..=12).contains(month))
                        .ok_or_else(|| format!("invalid end_month {}", value))
                })
                .transpose()?;
            if let (Some(year), Some(month)) = (end_year, end_month) {
                if (year, month) < (start_year, start_month) {
                    return Err(format!(
                        "campaign ends {}/{} before it starts {}/{}",
                        year, month, start_year, start_month
                    ));
                }
            }

            ImportRecord::Campaign(CampaignInput {
                client,
                name: view.text_or("name", record_type),
                purpose: view.text_or("purpose", record_type),
                start_year,
                start_month,
                end_year,
                end_month,
                total_budget: view.lenient_amount("total_budget"),
                status: view.text_or("status", record_type),
            })
        }
    };
    Ok(record)
}

/// Validates every row against `record_type`. `table.headers` must already
/// be canonical. Each rejected row contributes exactly one error.
pub fn validate_rows(record_type: RecordType, table: &RawTable) -> Validated {
    let columns: HashMap<String, usize> = table
        .headers
        .iter()
        .enumerate()
        .map(|(index, header)| (header.clone(), index))
        .collect();

    let mut validated = Validated::default();

    for row in &table.rows {
        if row.is_blank() {
            validated.blank_rows += 1;
            continue;
        }

        let view = RowView {
            columns: &columns,
            row,
        };

        let missing = missing_fields(&view, record_type);
        if !missing.is_empty() {
            validated.errors.push(row_error(
                row.line,
                format!("missing required field(s): {}", missing.join(", ")),
            ));
            continue;
        }

        match to_record(&view, record_type) {
            Ok(record) => validated.records.push((row.line, record)),
            Err(message) => validated.errors.push(row_error(row.line, message)),
        }
    }

    validated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .enumerate()
                .map(|(index, cells)| RawRow {
                    line: index + 2,
                    cells: cells.iter().map(|c| c.to_string()).collect(),
                })
                .collect(),
        }
    }

    const BUDGET_HEADERS: [&str; 6] = [
        "campaign_id",
        "year",
        "month",
        "platform",
        "operation_type",
        "amount",
    ];

    #[test]
    fn currency_strings_parse_to_numbers() {
        assert_eq!(parse_amount("¥1,200,000"), Some(1_200_000.0));
        assert_eq!(parse_amount("￥ 3,000円"), Some(3000.0));
        assert_eq!(parse_amount("12.5"), Some(12.5));
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn period_formats_are_recognized() {
        assert_eq!(parse_period("2025年8月"), Some((2025, 8)));
        assert_eq!(parse_period("2025年08月"), Some((2025, 8)));
        assert_eq!(parse_period("2025-08-15"), Some((2025, 8)));
        assert_eq!(parse_period("25/08"), Some((2025, 8)));
        assert_eq!(parse_period("2025/8"), Some((2025, 8)));
        assert_eq!(parse_period("202508"), Some((2025, 8)));
        // 2025-08-01 as an Excel serial
        assert_eq!(parse_period("45870"), Some((2025, 8)));
    }

    #[test]
    fn unparseable_period_is_none() {
        assert_eq!(parse_period("next month"), None);
        assert_eq!(parse_period("2025年13月"), None);
        assert_eq!(parse_period("99/99"), None);
    }

    #[test]
    fn valid_budget_row_becomes_record() {
        let table = table(&BUDGET_HEADERS, &[&["1", "2025", "8", "Google", "運用代行", "500000"]]);
        let validated = validate_rows(RecordType::Budgets, &table);

        assert!(validated.errors.is_empty());
        assert_eq!(validated.records.len(), 1);
        let (line, record) = &validated.records[0];
        assert_eq!(*line, 2);
        match record {
            ImportRecord::Budget(budget) => {
                assert_eq!(budget.key.campaign_id, 1);
                assert_eq!(budget.key.year, 2025);
                assert_eq!(budget.key.month, 8);
                assert_eq!(budget.key.platform, "Google");
                assert_eq!(budget.amount, 500_000.0);
                assert_eq!(budget.target_kpi, "");
            }
            other => panic!("expected budget, got {:?}", other),
        }
    }

    #[test]
    fn missing_required_field_yields_one_error_with_line() {
        let table = table(
            &BUDGET_HEADERS,
            &[
                &["1", "2025", "8", "Google", "運用代行", "500000"],
                &["1", "2025", "", "", "運用代行", "500000"],
            ],
        );
        let validated = validate_rows(RecordType::Budgets, &table);

        assert_eq!(validated.records.len(), 1);
        assert_eq!(validated.errors.len(), 1);
        assert_eq!(
            validated.errors[0],
            "Line 3: missing required field(s): month, platform"
        );
    }

    #[test]
    fn blank_rows_are_skipped_silently() {
        let table = table(&BUDGET_HEADERS, &[&["", "", "", "", "", ""]]);
        let validated = validate_rows(RecordType::Budgets, &table);
        assert!(validated.records.is_empty());
        assert!(validated.errors.is_empty());
        assert_eq!(validated.blank_rows, 1);
    }

    #[test]
    fn critical_numbers_must_parse_but_optional_ones_fall_back() {
        let headers = [
            "campaign_id",
            "year",
            "month",
            "platform",
            "operation_type",
            "actual_spend",
            "actual_result",
        ];
        let table = table(
            &headers,
            &[
                &["1", "2025", "8", "Meta", "運用代行", "¥120,000", "n/a"],
                &["1", "2025", "8", "Meta", "運用代行", "lots", "3"],
            ],
        );
        let validated = validate_rows(RecordType::Results, &table);

        assert_eq!(validated.records.len(), 1);
        match &validated.records[0].1 {
            ImportRecord::Result(result) => {
                assert_eq!(result.actual_spend, 120_000.0);
                assert_eq!(result.actual_result, 0.0);
            }
            other => panic!("expected result, got {:?}", other),
        }
        assert_eq!(validated.errors.len(), 1);
        assert!(validated.errors[0].starts_with("Line 3: actual_spend must be numeric"));
    }

    #[test]
    fn bad_period_is_an_error_not_the_current_month() {
        let headers = ["campaign_id", "period", "platform", "operation_type", "amount"];
        let table = table(
            &headers,
            &[
                &["1", "2025年9月", "Yahoo", "運用代行", "1000"],
                &["1", "someday", "Yahoo", "運用代行", "1000"],
            ],
        );
        let validated = validate_rows(RecordType::Budgets, &table);

        assert_eq!(validated.records.len(), 1);
        assert_eq!(validated.errors, vec!["Line 3: unrecognized date \"someday\""]);
    }

    #[test]
    fn campaign_rows_accept_client_name_and_defaults() {
        let headers = ["client_id", "name", "start_year", "start_month"];
        let table = table(&headers, &[&["株式会社サンプル", "春施策", "2025", "4"]]);
        let validated = validate_rows(RecordType::Campaigns, &table);

        match &validated.records[0].1 {
            ImportRecord::Campaign(campaign) => {
                assert_eq!(campaign.client, ClientRef::Name("株式会社サンプル".to_string()));
                assert_eq!(campaign.status, "active");
                assert_eq!(campaign.total_budget, 0.0);
                assert_eq!(campaign.end_year, None);
            }
            other => panic!("expected campaign, got {:?}", other),
        }
    }

    #[test]
    fn campaign_end_year_is_range_checked() {
        let headers = ["client_id", "name", "start_year", "start_month", "end_year", "end_month"];
        let table = table(
            &headers,
            &[
                &["1", "通年施策", "2025", "4", "2026", "3"],
                &["1", "桁あふれ", "2025", "4", "4294969296", "3"],
                &["1", "遠い未来", "2025", "4", "2999", "3"],
                &["1", "逆転", "2025", "4", "2025", "3"],
            ],
        );
        let validated = validate_rows(RecordType::Campaigns, &table);

        assert_eq!(validated.records.len(), 1);
        match &validated.records[0].1 {
            ImportRecord::Campaign(campaign) => {
                assert_eq!(campaign.end_year, Some(2026));
                assert_eq!(campaign.end_month, Some(3));
            }
            other => panic!("expected campaign, got {:?}", other),
        }
        assert_eq!(
            validated.errors,
            vec![
                "Line 3: invalid end_year 4294969296",
                "Line 4: invalid end_year 2999",
                "Line 5: campaign ends 2025/3 before it starts 2025/4",
            ]
        );
    }

    #[test]
    fn client_priority_defaults() {
        let table = table(&["name", "business_division"], &[&["Acme", "SO事業部"]]);
        let validated = validate_rows(RecordType::Clients, &table);
        match &validated.records[0].1 {
            ImportRecord::Client(client) => assert_eq!(client.priority, "中"),
            other => panic!("expected client, got {:?}", other),
        }
    }
}
