//! Column contracts for each importable record type.

use crate::models::RecordType;

#[derive(Debug)]
pub struct RecordSchema {
    pub record_type: RecordType,
    pub required: &'static [&'static str],
    /// Optional columns with the value used when the cell is blank.
    pub optional: &'static [(&'static str, &'static str)],
    pub example: &'static [&'static str],
}

const RESULTS: RecordSchema = RecordSchema {
    record_type: RecordType::Results,
    required: &[
        "campaign_id",
        "year",
        "month",
        "platform",
        "operation_type",
        "actual_spend",
    ],
    optional: &[("actual_result", "0"), ("notes", "")],
    example: &["1", "2025", "8", "Google", "運用代行", "480000", "120", ""],
};

const BUDGETS: RecordSchema = RecordSchema {
    record_type: RecordType::Budgets,
    required: &[
        "campaign_id",
        "year",
        "month",
        "platform",
        "operation_type",
        "amount",
    ],
    optional: &[("target_kpi", ""), ("notes", "")],
    example: &["1", "2025", "8", "Google", "運用代行", "500000", "CPA 5000", ""],
};

const CLIENTS: RecordSchema = RecordSchema {
    record_type: RecordType::Clients,
    required: &["name", "business_division"],
    optional: &[("priority", "中"), ("sales_person", ""), ("notes", "")],
    example: &["株式会社サンプル", "SO事業部", "高", "山田", ""],
};

const CAMPAIGNS: RecordSchema = RecordSchema {
    record_type: RecordType::Campaigns,
    required: &["client_id", "name", "start_year", "start_month"],
    optional: &[
        ("end_year", ""),
        ("end_month", ""),
        ("purpose", ""),
        ("total_budget", "0"),
        ("status", "active"),
    ],
    example: &[
        "1",
        "夏季キャンペーン",
        "2025",
        "7",
        "2025",
        "9",
        "認知拡大",
        "1500000",
        "active",
    ],
};

const CLIENT_NAME: &str = "クライアント名";
const CAMPAIGN_NAME: &str = "キャンペーン名";

/// Columns that stand in for `year` + `month` when those are absent.
pub const PERIOD_COLUMNS: [&str; 2] = ["period", "date"];

const ALIASES: [(&str, &str); 30] = [
    ("キャンペーンid", "campaign_id"),
    ("案件id", "campaign_id"),
    ("年", "year"),
    ("月", "month"),
    ("年月", "period"),
    ("期間", "period"),
    ("日付", "date"),
    ("プラットフォーム", "platform"),
    ("媒体", "platform"),
    ("運用タイプ", "operation_type"),
    ("運用種別", "operation_type"),
    ("予算", "amount"),
    ("予算額", "amount"),
    ("実績費用", "actual_spend"),
    ("消化金額", "actual_spend"),
    ("実績成果", "actual_result"),
    ("成果", "actual_result"),
    (CLIENT_NAME, "name"),
    (CAMPAIGN_NAME, "name"),
    ("クライアントid", "client_id"),
    ("事業部", "business_division"),
    ("優先度", "priority"),
    ("担当営業", "sales_person"),
    ("備考", "notes"),
    ("目的", "purpose"),
    ("開始年", "start_year"),
    ("開始月", "start_month"),
    ("終了年", "end_year"),
    ("終了月", "end_month"),
    ("総予算", "total_budget"),
];

pub fn schema(record_type: RecordType) -> &'static RecordSchema {
    match record_type {
        RecordType::Results => &RESULTS,
        RecordType::Budgets => &BUDGETS,
        RecordType::Clients => &CLIENTS,
        RecordType::Campaigns => &CAMPAIGNS,
    }
}

fn compact(value: &str) -> String {
    value.chars().filter(|c| *c != '_').collect()
}

fn known_columns() -> impl Iterator<Item = &'static str> {
    RecordType::ALL
        .into_iter()
        .flat_map(|record_type| {
            let schema = schema(record_type);
            schema
                .required
                .iter()
                .copied()
                .chain(schema.optional.iter().map(|(name, _)| *name))
        })
        .chain(PERIOD_COLUMNS)
        .chain(["status", "target_kpi"])
}

/// Lower-cases a header, folds separators to `_`, and maps spelling
/// variants (`campaignId`, `Campaign ID`, `キャンペーンID`) onto the
/// canonical column name. Unknown headers come back normalized only.
pub fn canonical_header(raw: &str) -> String {
    let normalized = normalize(raw);

    if let Some((_, canonical)) = ALIASES.iter().find(|(alias, _)| *alias == normalized) {
        return canonical.to_string();
    }

    let key = compact(&normalized);
    known_columns()
        .find(|column| compact(column) == key)
        .map(str::to_string)
        .unwrap_or(normalized)
}

fn normalize(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('\u{feff}')
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' || c == '　' { '_' } else { c })
        .collect()
}

/// Canonicalizes a whole header row. Beside a campaign-name column,
/// `クライアント名` names the owning client (an id or a name) rather than the
/// record's own name, so it becomes `client_id`.
pub fn canonical_headers(raw: &[String]) -> Vec<String> {
    let names_campaign = raw.iter().any(|header| normalize(header) == CAMPAIGN_NAME);
    raw.iter()
        .map(|header| {
            if names_campaign && normalize(header) == CLIENT_NAME {
                "client_id".to_string()
            } else {
                canonical_header(header)
            }
        })
        .collect()
}

fn has_period(headers: &[String]) -> bool {
    headers
        .iter()
        .any(|header| PERIOD_COLUMNS.contains(&header.as_str()))
}

/// Required columns of `record_type` that `headers` (already canonical)
/// does not provide.
pub fn missing_required(record_type: RecordType, headers: &[String]) -> Vec<&'static str> {
    let period = has_period(headers);
    schema(record_type)
        .required
        .iter()
        .copied()
        .filter(|column| {
            if period && (*column == "year" || *column == "month") {
                return false;
            }
            !headers.iter().any(|header| header.as_str() == *column)
        })
        .collect()
}
