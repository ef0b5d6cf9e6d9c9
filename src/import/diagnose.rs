//! Pre-parse inspection of uploaded text: BOM, comment lines, delimiter and
//! encoding damage.

use serde::{Deserialize, Serialize};

use super::ImportError;

const BOM: &str = "\u{feff}";

const CANDIDATE_DELIMITERS: [u8; 4] = [b',', b'\t', b';', b'|'];

/// Lines containing any of these are template explanations, not data.
const EXPLANATORY_PHRASES: [&str; 7] = [
    "必須項目",
    "任意項目",
    "記入例",
    "※",
    "description:",
    "required fields",
    "optional fields",
];

/// UTF-8 Japanese text decoded as Shift_JIS.
const SHIFT_JIS_MARKERS: [&str; 5] = ["縺", "繧", "繝", "譁", "螟"];

/// UTF-8 text decoded as Latin-1 / Windows-1252.
const LATIN1_MARKERS: [&str; 5] = ["ã‚", "ãƒ", "â€", "Ã©", "Ã¼"];

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportOptions {
    pub delimiter: String,
    pub encoding: String,
    pub trim_whitespace: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            delimiter: "auto".to_string(),
            encoding: "auto".to_string(),
            trim_whitespace: true,
        }
    }
}

impl ImportOptions {
    fn explicit_delimiter(&self) -> Result<Option<u8>, ImportError> {
        match self.delimiter.as_str() {
            "" | "auto" => Ok(None),
            "\\t" | "tab" => Ok(Some(b'\t')),
            value if value.len() == 1 => Ok(value.as_bytes().first().copied()),
            other => Err(ImportError::Parse(format!("unsupported delimiter {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub had_bom: bool,
    pub delimiter: String,
    pub line_count: usize,
    pub data_line_count: usize,
    pub comment_lines: usize,
    pub suspected_encoding: Option<String>,
}

/// Text ready for the CSV reader, with a map back to source line numbers.
#[derive(Debug, Clone)]
pub struct PreparedText {
    pub text: String,
    pub delimiter: u8,
    /// `line_map[i]` is the 1-based source line of cleaned line `i`.
    pub line_map: Vec<usize>,
    /// Whitespace-only lines dropped from `text`.
    pub blank_lines: usize,
    pub diagnostics: Diagnostics,
}

pub fn delimiter_label(delimiter: u8) -> String {
    match delimiter {
        b'\t' => "tab".to_string(),
        other => (other as char).to_string(),
    }
}

pub fn decode(bytes: &[u8], options: &ImportOptions) -> Result<(String, bool), ImportError> {
    match options.encoding.to_lowercase().as_str() {
        "" | "auto" | "utf-8" | "utf8" => {}
        other => return Err(ImportError::UnsupportedEncoding(other.to_string())),
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => Ok((text.to_string(), false)),
        Err(_) => Ok((String::from_utf8_lossy(bytes).into_owned(), true)),
    }
}

pub fn strip_bom(text: &str) -> (&str, bool) {
    match text.strip_prefix(BOM) {
        Some(rest) => (rest, true),
        None => (text, false),
    }
}

/// `#` lines are comments anywhere in the file.
pub fn is_comment_line(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

/// Template explanation rows. Only meaningful above the header; below it the
/// same phrases are ordinary cell content such as a `※要確認` note.
pub fn is_explanatory_line(line: &str) -> bool {
    let lowered = line.trim_start().to_lowercase();
    EXPLANATORY_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
}

/// Picks the candidate separator occurring most often in `line`; ties keep
/// the earlier candidate, so a line without separators yields a comma.
pub fn infer_delimiter(line: &str) -> u8 {
    let mut best = b',';
    let mut best_count = 0usize;
    for candidate in CANDIDATE_DELIMITERS {
        let count = line.bytes().filter(|byte| *byte == candidate).count();
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }
    best
}

pub fn suspect_encoding(text: &str, lossy: bool) -> Option<String> {
    if lossy || text.contains('\u{fffd}') {
        return Some("shift_jis".to_string());
    }
    if SHIFT_JIS_MARKERS.iter().any(|marker| text.contains(marker)) {
        return Some("shift_jis".to_string());
    }
    if LATIN1_MARKERS.iter().any(|marker| text.contains(marker)) {
        return Some("latin1".to_string());
    }
    None
}

pub fn prepare(bytes: &[u8], options: &ImportOptions) -> Result<PreparedText, ImportError> {
    let (decoded, lossy) = decode(bytes, options)?;
    let (body, had_bom) = strip_bom(&decoded);

    let mut kept: Vec<&str> = Vec::new();
    let mut line_map = Vec::new();
    let mut comment_lines = 0usize;
    let mut blank_lines = 0usize;
    let mut line_count = 0usize;

    for (index, line) in body.lines().enumerate() {
        line_count += 1;
        if line.trim().is_empty() {
            blank_lines += 1;
            continue;
        }
        let header_seen = !kept.is_empty();
        if is_comment_line(line) || (!header_seen && is_explanatory_line(line)) {
            comment_lines += 1;
            continue;
        }
        kept.push(line);
        line_map.push(index + 1);
    }

    let Some(header_line) = kept.first() else {
        return Err(ImportError::Empty);
    };

    let delimiter = match options.explicit_delimiter()? {
        Some(delimiter) => delimiter,
        None => infer_delimiter(header_line),
    };

    let data_line_count = kept.len().saturating_sub(1);

    let diagnostics = Diagnostics {
        had_bom,
        delimiter: delimiter_label(delimiter),
        line_count,
        data_line_count,
        comment_lines,
        suspected_encoding: suspect_encoding(body, lossy),
    };

    let mut text = kept.join("\n");
    text.push('\n');

    Ok(PreparedText {
        text,
        delimiter,
        line_map,
        blank_lines,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_bom_and_counts_comments() {
        let raw = "\u{feff}# budgets template\n※ 必須項目です\ncampaign_id,year,month\n1,2025,8\n";
        let prepared = prepare(raw.as_bytes(), &ImportOptions::default()).unwrap();

        assert!(prepared.diagnostics.had_bom);
        assert_eq!(prepared.diagnostics.comment_lines, 2);
        assert_eq!(prepared.diagnostics.line_count, 4);
        assert_eq!(prepared.diagnostics.data_line_count, 1);
        assert_eq!(prepared.text, "campaign_id,year,month\n1,2025,8\n");
        assert_eq!(prepared.line_map, vec![3, 4]);
    }

    #[test]
    fn explanatory_phrases_below_header_are_data() {
        let raw = "campaign_id,year,month,notes\n1,2025,8,※要確認\n# dropped\n1,2025,9,記入例どおり\n";
        let prepared = prepare(raw.as_bytes(), &ImportOptions::default()).unwrap();

        assert_eq!(prepared.diagnostics.comment_lines, 1);
        assert_eq!(prepared.diagnostics.data_line_count, 2);
        assert_eq!(prepared.line_map, vec![1, 2, 4]);
    }

    #[test]
    fn blank_lines_are_dropped_and_counted() {
        let raw = "campaign_id,year\n\n1,2025\n   \n2,2026\n";
        let prepared = prepare(raw.as_bytes(), &ImportOptions::default()).unwrap();

        assert_eq!(prepared.blank_lines, 2);
        assert_eq!(prepared.text, "campaign_id,year\n1,2025\n2,2026\n");
        assert_eq!(prepared.line_map, vec![1, 3, 5]);
    }

    #[test]
    fn infers_delimiter_from_header() {
        assert_eq!(infer_delimiter("a\tb\tc"), b'\t');
        assert_eq!(infer_delimiter("a;b;c,d"), b';');
        assert_eq!(infer_delimiter("a|b|c"), b'|');
        assert_eq!(infer_delimiter("single"), b',');
    }

    #[test]
    fn explicit_delimiter_wins() {
        let options = ImportOptions {
            delimiter: ";".to_string(),
            ..ImportOptions::default()
        };
        let prepared = prepare(b"a,b,c\n1,2,3\n", &options).unwrap();
        assert_eq!(prepared.delimiter, b';');
        assert_eq!(prepared.diagnostics.delimiter, ";");
    }

    #[test]
    fn flags_mojibake_and_invalid_bytes() {
        assert_eq!(suspect_encoding("繧ｭ繝｣繝ｳ繝壹ャ", false).as_deref(), Some("shift_jis"));
        assert_eq!(suspect_encoding("ã‚­ãƒ£", false).as_deref(), Some("latin1"));
        assert_eq!(suspect_encoding("キャンペーン", false), None);

        let prepared = prepare(&[0x83, 0x4c, b',', b'a', b'\n'], &ImportOptions::default()).unwrap();
        assert_eq!(prepared.diagnostics.suspected_encoding.as_deref(), Some("shift_jis"));
    }

    #[test]
    fn rejects_unknown_encoding_and_empty_files() {
        let options = ImportOptions {
            encoding: "euc-jp".to_string(),
            ..ImportOptions::default()
        };
        assert!(matches!(
            prepare(b"a,b\n", &options),
            Err(ImportError::UnsupportedEncoding(_))
        ));
        assert!(matches!(
            prepare(b"# only a comment\n\n", &ImportOptions::default()),
            Err(ImportError::Empty)
        ));
    }
}
