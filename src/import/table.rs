//! Reading CSV text or an XLSX workbook into header + rows of strings.

use std::io::Cursor;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};

use super::diagnose::{is_comment_line, is_explanatory_line, Diagnostics, PreparedText};
use super::ImportError;

#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    /// 1-based line (CSV) or sheet row (XLSX) in the uploaded file.
    pub line: usize,
    pub cells: Vec<String>,
}

impl RawRow {
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|cell| cell.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

pub fn from_csv(prepared: &PreparedText, trim: bool) -> Result<RawTable, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(prepared.delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(if trim { csv::Trim::All } else { csv::Trim::None })
        .from_reader(prepared.text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ImportError::Parse(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ImportError::Parse(e.to_string()))?;
        let cleaned_line = record
            .position()
            .map(|position| position.line() as usize)
            .unwrap_or_default();
        let line = prepared
            .line_map
            .get(cleaned_line.saturating_sub(1))
            .copied()
            .unwrap_or(cleaned_line);

        rows.push(RawRow {
            line,
            cells: record.iter().map(str::to_string).collect(),
        });
    }

    Ok(RawTable { headers, rows })
}

pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(n) => n.to_string(),
        Data::Float(f) => format!("{}", f),
        Data::Bool(b) => b.to_string(),
        Data::Error(e) => format!("#ERR({:?})", e),
        // Serial number; the period parser understands Excel serials.
        Data::DateTime(dt) => format!("{}", dt.as_f64()),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}

/// Reads the first worksheet. Leading blank or comment rows are skipped;
/// the first remaining row is the header.
pub fn from_xlsx(bytes: &[u8], trim: bool) -> Result<(RawTable, Diagnostics), ImportError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))
        .map_err(|e: calamine::XlsxError| ImportError::Parse(format!("XLSX: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ImportError::Empty)?
        .map_err(|e| ImportError::Parse(format!("XLSX: {}", e)))?;

    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);

    let mut table = RawTable::default();
    let mut diagnostics = Diagnostics {
        delimiter: "xlsx".to_string(),
        ..Diagnostics::default()
    };
    let mut header_seen = false;

    for (offset, row) in range.rows().enumerate() {
        diagnostics.line_count += 1;
        let mut cells: Vec<String> = row.iter().map(cell_to_string).collect();
        if trim {
            for cell in cells.iter_mut() {
                *cell = cell.trim().to_string();
            }
        }

        let joined = cells.join(" ");
        if is_comment_line(&joined) || (!header_seen && is_explanatory_line(&joined)) {
            diagnostics.comment_lines += 1;
            continue;
        }

        let line = first_row + offset + 1;
        if !header_seen {
            if joined.trim().is_empty() {
                continue;
            }
            table.headers = cells;
            header_seen = true;
            continue;
        }

        let raw = RawRow { line, cells };
        if !raw.is_blank() {
            diagnostics.data_line_count += 1;
        }
        table.rows.push(raw);
    }

    if !header_seen {
        return Err(ImportError::Empty);
    }

    Ok((table, diagnostics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::diagnose::{prepare, ImportOptions};

    #[test]
    fn csv_rows_keep_source_line_numbers() {
        let raw = "# comment\ncampaign_id;year\n1;2025\n# another\n2;2026\n";
        let prepared = prepare(raw.as_bytes(), &ImportOptions::default()).unwrap();
        let table = from_csv(&prepared, true).unwrap();

        assert_eq!(table.headers, vec!["campaign_id", "year"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].line, 3);
        assert_eq!(table.rows[1].line, 5);
        assert_eq!(table.rows[1].cells, vec!["2", "2026"]);
    }

    #[test]
    fn blank_lines_do_not_shift_line_numbers() {
        let raw = "campaign_id,year,month\n\n1,2025,8\n\n\n2,2025,\n";
        let prepared = prepare(raw.as_bytes(), &ImportOptions::default()).unwrap();
        let table = from_csv(&prepared, true).unwrap();

        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].line, 3);
        assert_eq!(table.rows[1].line, 6);
    }

    #[test]
    fn trims_cells_only_when_asked() {
        let prepared = prepare(b"a,b\n x , y \n", &ImportOptions::default()).unwrap();
        assert_eq!(from_csv(&prepared, true).unwrap().rows[0].cells, vec!["x", "y"]);
        assert_eq!(from_csv(&prepared, false).unwrap().rows[0].cells, vec![" x ", " y "]);
    }

    #[test]
    fn delimiter_only_rows_are_blank() {
        let prepared = prepare(b"a,b\n,\n1,2\n", &ImportOptions::default()).unwrap();
        let table = from_csv(&prepared, true).unwrap();
        assert!(table.rows[0].is_blank());
        assert!(!table.rows[1].is_blank());
    }

    #[test]
    fn float_cells_render_without_trailing_zero() {
        assert_eq!(cell_to_string(&Data::Float(1200000.0)), "1200000");
        assert_eq!(cell_to_string(&Data::Float(0.5)), "0.5");
        assert_eq!(cell_to_string(&Data::Empty), "");
    }

    #[test]
    fn garbage_bytes_are_not_a_workbook() {
        assert!(matches!(
            from_xlsx(b"not a zip archive", true),
            Err(ImportError::Parse(_))
        ));
    }
}
