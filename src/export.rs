//! Fixed 12-column budget/result sheet, written as XLSX or CSV.

use rust_xlsxwriter::{Format, Workbook, XlsxError};

use crate::analytics::consumption_rate;
use crate::departments;
use crate::models::PerformanceRow;

pub const HEADERS: [&str; 12] = [
    "年",
    "月",
    "クライアント名",
    "事業部",
    "キャンペーン名",
    "プラットフォーム",
    "運用タイプ",
    "予算",
    "実績費用",
    "実績成果",
    "消化率",
    "備考",
];

pub const SHEET_NAME: &str = "予算実績";

/// `¥1,234,567`, rounded to the yen.
pub fn format_yen(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if rounded < 0 {
        format!("-¥{}", grouped)
    } else {
        format!("¥{}", grouped)
    }
}

/// Consumption rate cell: `120.0%`, or `-` when there is no budget.
pub fn format_rate(row: &PerformanceRow) -> String {
    if row.budget <= 0.0 {
        return "-".to_string();
    }
    format!("{:.1}%", consumption_rate(row.budget, row.actual_spend))
}

/// Blank when that side of the join has no record, so a re-import does not
/// invent zero-valued budgets or results.
fn money_cell(present: bool, value: f64) -> String {
    if present {
        format_yen(value)
    } else {
        String::new()
    }
}

pub fn row_cells(row: &PerformanceRow) -> [String; 12] {
    [
        row.key.year.to_string(),
        row.key.month.to_string(),
        row.client_name.clone(),
        departments::department_for(&row.business_division),
        row.campaign_name.clone(),
        row.key.platform.clone(),
        row.key.operation_type.clone(),
        money_cell(row.has_budget, row.budget),
        money_cell(row.has_result, row.actual_spend),
        money_cell(row.has_result, row.actual_result),
        format_rate(row),
        row.notes.clone(),
    ]
}

pub fn write_xlsx(rows: &[PerformanceRow]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, header) in HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
        worksheet.set_column_width(col as u16, if col < 2 { 8 } else { 16 })?;
    }

    for (index, row) in rows.iter().enumerate() {
        let line = (index + 1) as u32;
        let cells = row_cells(row);
        worksheet.write_number(line, 0, row.key.year)?;
        worksheet.write_number(line, 1, row.key.month)?;
        for (col, cell) in cells.iter().enumerate().skip(2) {
            worksheet.write_string(line, col as u16, cell.as_str())?;
        }
    }

    workbook.save_to_buffer()
}

pub fn write_csv(rows: &[PerformanceRow]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADERS)?;
    for row in rows {
        writer.write_record(row_cells(row))?;
    }
    writer.into_inner().map_err(|e| e.into_error().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NaturalKey;

    fn row(budget: f64, spend: f64) -> PerformanceRow {
        PerformanceRow {
            key: NaturalKey {
                campaign_id: 3,
                year: 2025,
                month: 8,
                platform: "Google".to_string(),
                operation_type: "運用代行".to_string(),
            },
            client_id: 1,
            client_name: "ミナト物産".to_string(),
            business_division: "SO事業部".to_string(),
            campaign_name: "下期施策".to_string(),
            budget,
            actual_spend: spend,
            actual_result: 0.0,
            has_budget: budget > 0.0,
            has_result: spend > 0.0,
            notes: String::new(),
        }
    }

    #[test]
    fn yen_formatting_groups_thousands() {
        assert_eq!(format_yen(1_200_000.0), "¥1,200,000");
        assert_eq!(format_yen(999.0), "¥999");
        assert_eq!(format_yen(1000.4), "¥1,000");
        assert_eq!(format_yen(0.0), "¥0");
        assert_eq!(format_yen(-12_345.0), "-¥12,345");
    }

    #[test]
    fn cells_translate_division_and_rate() {
        let cells = row_cells(&row(1_000_000.0, 1_200_000.0));
        assert_eq!(cells[3], "SO");
        assert_eq!(cells[7], "¥1,000,000");
        assert_eq!(cells[10], "120.0%");
        let result_only = row_cells(&row(0.0, 5.0));
        assert_eq!(result_only[7], "");
        assert_eq!(result_only[8], "¥5");
        assert_eq!(result_only[10], "-");
    }

    #[test]
    fn csv_export_has_fixed_header() {
        let bytes = write_csv(&[row(500_000.0, 0.0)]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), HEADERS.join(","));
        assert!(lines.next().unwrap().starts_with("2025,8,ミナト物産,SO,下期施策,Google,運用代行,\"¥500,000\""));
    }

    #[test]
    fn xlsx_export_is_a_zip_archive() {
        let bytes = write_xlsx(&[row(1.0, 1.0)]).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }
}
