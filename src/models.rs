use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub business_division: String,
    pub priority: String,
    pub sales_person: String,
    pub notes: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: i64,
    pub client_id: i64,
    pub client_name: String,
    pub name: String,
    pub purpose: String,
    pub start_year: i32,
    pub start_month: i32,
    pub end_year: Option<i32>,
    pub end_month: Option<i32>,
    pub total_budget: f64,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterValue {
    pub category: String,
    pub value: String,
    pub sort_order: i32,
}

/// Composite key shared by budgets and results; re-imports match on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NaturalKey {
    pub campaign_id: i64,
    pub year: i32,
    pub month: i32,
    pub platform: String,
    pub operation_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamAllocation {
    pub user_id: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetInput {
    pub key: NaturalKey,
    pub amount: f64,
    pub target_kpi: String,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultInput {
    pub key: NaturalKey,
    pub actual_spend: f64,
    pub actual_result: f64,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInput {
    pub name: String,
    pub business_division: String,
    #[serde(default = "default_priority")]
    pub priority: String,
    #[serde(default)]
    pub sales_person: String,
    #[serde(default)]
    pub notes: String,
}

pub fn default_priority() -> String {
    "中".to_string()
}

/// How a campaign row names its client: a numeric id or the client's name.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientRef {
    Id(i64),
    Name(String),
}

impl fmt::Display for ClientRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientRef::Id(id) => write!(f, "id {id}"),
            ClientRef::Name(name) => write!(f, "\"{name}\""),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CampaignInput {
    pub client: ClientRef,
    pub name: String,
    pub purpose: String,
    pub start_year: i32,
    pub start_month: i32,
    pub end_year: Option<i32>,
    pub end_month: Option<i32>,
    pub total_budget: f64,
    pub status: String,
}

/// A validated spreadsheet row, one variant per importable record kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportRecord {
    Result(ResultInput),
    Budget(BudgetInput),
    Client(ClientInput),
    Campaign(CampaignInput),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Results,
    Budgets,
    Clients,
    Campaigns,
}

impl RecordType {
    /// Detection order; earlier entries have the more specific header sets.
    pub const ALL: [RecordType; 4] = [
        RecordType::Results,
        RecordType::Budgets,
        RecordType::Campaigns,
        RecordType::Clients,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Results => "results",
            RecordType::Budgets => "budgets",
            RecordType::Clients => "clients",
            RecordType::Campaigns => "campaigns",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "results" | "result" => Ok(RecordType::Results),
            "budgets" | "budget" => Ok(RecordType::Budgets),
            "clients" | "client" => Ok(RecordType::Clients),
            "campaigns" | "campaign" => Ok(RecordType::Campaigns),
            other => Err(format!("unknown data type: {other}")),
        }
    }
}

/// Budget row joined to its campaign and client.
#[derive(Debug, Clone)]
pub struct BudgetLine {
    pub key: NaturalKey,
    pub client_id: i64,
    pub client_name: String,
    pub business_division: String,
    pub campaign_name: String,
    pub amount: f64,
    pub notes: String,
}

/// Result row joined to its campaign and client.
#[derive(Debug, Clone)]
pub struct ResultLine {
    pub key: NaturalKey,
    pub client_id: i64,
    pub client_name: String,
    pub business_division: String,
    pub campaign_name: String,
    pub actual_spend: f64,
    pub actual_result: f64,
    pub notes: String,
}

/// Budget and result for one natural key, either side possibly missing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceRow {
    #[serde(flatten)]
    pub key: NaturalKey,
    pub client_id: i64,
    pub client_name: String,
    pub business_division: String,
    pub campaign_name: String,
    pub budget: f64,
    pub actual_spend: f64,
    pub actual_result: f64,
    pub has_budget: bool,
    pub has_result: bool,
    pub notes: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rollup {
    pub key: String,
    pub label: String,
    pub row_count: usize,
    pub campaign_count: usize,
    pub total_budget: f64,
    pub total_spend: f64,
    pub total_result: f64,
    pub consumption_rate: f64,
    pub efficiency: f64,
    pub roi: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentMonth {
    pub department: String,
    pub year: i32,
    pub month: i32,
    pub total_budget: f64,
    pub total_spend: f64,
    pub consumption_rate: f64,
}

/// Filters shared by listing, export and analytics.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowFilter {
    pub year: Option<i32>,
    pub month: Option<i32>,
    pub client_id: Option<i64>,
    pub campaign_id: Option<i64>,
    pub platform: Option<String>,
    pub department: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_type_parses_singular_and_plural() {
        assert_eq!("Budgets".parse::<RecordType>(), Ok(RecordType::Budgets));
        assert_eq!("result".parse::<RecordType>(), Ok(RecordType::Results));
        assert!("auto".parse::<RecordType>().is_err());
    }
}
