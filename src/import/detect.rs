//! Record type detection from a header row.

use super::schema::missing_required;
use crate::models::RecordType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    /// The headers satisfy this type's required columns.
    Exact(RecordType),
    /// No exact match; keywords in the headers suggest this type.
    Heuristic(RecordType),
    Unknown,
}

impl Detection {
    pub fn record_type(&self) -> Option<RecordType> {
        match self {
            Detection::Exact(record_type) | Detection::Heuristic(record_type) => Some(*record_type),
            Detection::Unknown => None,
        }
    }
}

fn heuristic(headers: &[String]) -> Option<RecordType> {
    let joined = headers.join(" ");
    let mentions = |needles: &[&str]| needles.iter().any(|needle| joined.contains(needle));

    if mentions(&["spend", "実績", "消化"]) {
        return Some(RecordType::Results);
    }
    if mentions(&["amount", "budget", "予算"]) && mentions(&["campaign", "キャンペーン", "案件"]) {
        return Some(RecordType::Budgets);
    }
    if mentions(&["division", "department", "事業部"]) {
        return Some(RecordType::Clients);
    }
    if mentions(&["client", "クライアント"]) {
        return Some(RecordType::Campaigns);
    }
    None
}

/// `headers` must already be canonical (see `schema::canonical_header`).
pub fn detect(headers: &[String]) -> Detection {
    let exact = RecordType::ALL
        .into_iter()
        .find(|record_type| missing_required(*record_type, headers).is_empty());

    match exact {
        Some(record_type) => Detection::Exact(record_type),
        None => heuristic(headers)
            .map(Detection::Heuristic)
            .unwrap_or(Detection::Unknown),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::schema::{canonical_header, schema};

    fn headers(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|h| canonical_header(h)).collect()
    }

    #[test]
    fn each_required_set_detects_its_own_type() {
        for record_type in RecordType::ALL {
            let required = headers(schema(record_type).required);
            assert_eq!(detect(&required), Detection::Exact(record_type), "{record_type}");
        }
    }

    #[test]
    fn tolerates_underscore_variants() {
        let detected = detect(&headers(&[
            "CampaignId",
            "Year",
            "Month",
            "Platform",
            "OperationType",
            "Amount",
        ]));
        assert_eq!(detected, Detection::Exact(RecordType::Budgets));
    }

    #[test]
    fn japanese_headers_detect() {
        let detected = detect(&headers(&[
            "キャンペーンID",
            "年",
            "月",
            "プラットフォーム",
            "運用タイプ",
            "実績費用",
            "実績成果",
        ]));
        assert_eq!(detected, Detection::Exact(RecordType::Results));
    }

    #[test]
    fn falls_back_to_keywords() {
        assert_eq!(
            detect(&headers(&["campaign", "total spend"])),
            Detection::Heuristic(RecordType::Results)
        );
        assert_eq!(
            detect(&headers(&["department", "client name"])),
            Detection::Heuristic(RecordType::Clients)
        );
    }

    #[test]
    fn unrelated_headers_are_unknown() {
        assert_eq!(detect(&headers(&["foo", "bar"])), Detection::Unknown);
        assert_eq!(detect(&[]), Detection::Unknown);
    }
}
