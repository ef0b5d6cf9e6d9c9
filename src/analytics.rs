use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::departments;
use crate::models::{BudgetLine, DepartmentMonth, NaturalKey, PerformanceRow, ResultLine, Rollup};

/// `spend / budget` as a percentage; zero when nothing was budgeted.
pub fn consumption_rate(total_budget: f64, total_spend: f64) -> f64 {
    if total_budget <= 0.0 {
        return 0.0;
    }
    total_spend / total_budget * 100.0
}

pub fn efficiency(total_result: f64, total_spend: f64) -> f64 {
    if total_spend <= 0.0 {
        return 0.0;
    }
    total_result / total_spend
}

/// `(result / spend - 1)` as a percentage.
pub fn roi(total_result: f64, total_spend: f64) -> f64 {
    if total_spend <= 0.0 {
        return 0.0;
    }
    (total_result / total_spend - 1.0) * 100.0
}

/// Pairs budgets and results sharing a natural key. Keys present on only
/// one side still produce a row, with zeros on the other.
pub fn join_budgets_and_results(budgets: &[BudgetLine], results: &[ResultLine]) -> Vec<PerformanceRow> {
    let mut joined: BTreeMap<NaturalKey, PerformanceRow> = BTreeMap::new();

    for budget in budgets {
        let entry = joined.entry(budget.key.clone()).or_insert_with(|| PerformanceRow {
            key: budget.key.clone(),
            client_id: budget.client_id,
            client_name: budget.client_name.clone(),
            business_division: budget.business_division.clone(),
            campaign_name: budget.campaign_name.clone(),
            budget: 0.0,
            actual_spend: 0.0,
            actual_result: 0.0,
            has_budget: false,
            has_result: false,
            notes: String::new(),
        });
        entry.budget += budget.amount;
        entry.has_budget = true;
        if entry.notes.is_empty() {
            entry.notes = budget.notes.clone();
        }
    }

    for result in results {
        let entry = joined.entry(result.key.clone()).or_insert_with(|| PerformanceRow {
            key: result.key.clone(),
            client_id: result.client_id,
            client_name: result.client_name.clone(),
            business_division: result.business_division.clone(),
            campaign_name: result.campaign_name.clone(),
            budget: 0.0,
            actual_spend: 0.0,
            actual_result: 0.0,
            has_budget: false,
            has_result: false,
            notes: String::new(),
        });
        entry.actual_spend += result.actual_spend;
        entry.actual_result += result.actual_result;
        entry.has_result = true;
        if entry.notes.is_empty() {
            entry.notes = result.notes.clone();
        }
    }

    let mut rows: Vec<PerformanceRow> = joined.into_values().collect();
    rows.sort_by(|a, b| {
        (a.key.year, a.key.month, &a.client_name, &a.campaign_name, &a.key.platform, &a.key.operation_type).cmp(&(
            b.key.year,
            b.key.month,
            &b.client_name,
            &b.campaign_name,
            &b.key.platform,
            &b.key.operation_type,
        ))
    });
    rows
}

#[derive(Default)]
struct Accumulator {
    label: String,
    row_count: usize,
    campaigns: HashSet<i64>,
    total_budget: f64,
    total_spend: f64,
    total_result: f64,
}

/// Groups `rows` by the `(key, label)` that `group` assigns each row.
pub fn rollup<F>(rows: &[PerformanceRow], group: F) -> Vec<Rollup>
where
    F: Fn(&PerformanceRow) -> (String, String),
{
    let mut groups: HashMap<String, Accumulator> = HashMap::new();

    for row in rows {
        let (key, label) = group(row);
        let entry = groups.entry(key).or_insert_with(|| Accumulator {
            label,
            ..Accumulator::default()
        });
        entry.row_count += 1;
        entry.campaigns.insert(row.key.campaign_id);
        entry.total_budget += row.budget;
        entry.total_spend += row.actual_spend;
        entry.total_result += row.actual_result;
    }

    let mut rollups: Vec<Rollup> = groups
        .into_iter()
        .map(|(key, acc)| Rollup {
            key,
            label: acc.label,
            row_count: acc.row_count,
            campaign_count: acc.campaigns.len(),
            total_budget: acc.total_budget,
            total_spend: acc.total_spend,
            total_result: acc.total_result,
            consumption_rate: consumption_rate(acc.total_budget, acc.total_spend),
            efficiency: efficiency(acc.total_result, acc.total_spend),
            roi: roi(acc.total_result, acc.total_spend),
        })
        .collect();

    rollups.sort_by(|a, b| a.key.cmp(&b.key));
    rollups
}

fn largest_budget_first(mut rollups: Vec<Rollup>) -> Vec<Rollup> {
    rollups.sort_by(|a, b| {
        b.total_budget
            .partial_cmp(&a.total_budget)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.key.cmp(&b.key))
    });
    rollups
}

pub fn by_client(rows: &[PerformanceRow]) -> Vec<Rollup> {
    largest_budget_first(rollup(rows, |row| {
        (row.client_id.to_string(), row.client_name.clone())
    }))
}

pub fn by_department(rows: &[PerformanceRow]) -> Vec<Rollup> {
    largest_budget_first(rollup(rows, |row| {
        let department = departments::department_for(&row.business_division);
        (department.clone(), department)
    }))
}

pub fn by_campaign(rows: &[PerformanceRow]) -> Vec<Rollup> {
    largest_budget_first(rollup(rows, |row| {
        (
            row.key.campaign_id.to_string(),
            format!("{} / {}", row.client_name, row.campaign_name),
        )
    }))
}

pub fn by_platform(rows: &[PerformanceRow]) -> Vec<Rollup> {
    largest_budget_first(rollup(rows, |row| {
        (row.key.platform.clone(), row.key.platform.clone())
    }))
}

/// Chronological; keys are `YYYY-MM`.
pub fn by_month(rows: &[PerformanceRow]) -> Vec<Rollup> {
    rollup(rows, |row| {
        let key = format!("{:04}-{:02}", row.key.year, row.key.month);
        (key.clone(), key)
    })
}

/// Grand total over every row; zeroed when `rows` is empty.
pub fn totals(rows: &[PerformanceRow]) -> Rollup {
    rollup(rows, |_| ("total".to_string(), "合計".to_string()))
        .pop()
        .unwrap_or_else(|| Rollup {
            key: "total".to_string(),
            label: "合計".to_string(),
            row_count: 0,
            campaign_count: 0,
            total_budget: 0.0,
            total_spend: 0.0,
            total_result: 0.0,
            consumption_rate: 0.0,
            efficiency: 0.0,
            roi: 0.0,
        })
}

/// Budget against spend per department per month.
pub fn department_budget_by_month(rows: &[PerformanceRow]) -> Vec<DepartmentMonth> {
    let mut groups: BTreeMap<(String, i32, i32), (f64, f64)> = BTreeMap::new();

    for row in rows {
        let department = departments::department_for(&row.business_division);
        let entry = groups
            .entry((department, row.key.year, row.key.month))
            .or_insert((0.0, 0.0));
        entry.0 += row.budget;
        entry.1 += row.actual_spend;
    }

    groups
        .into_iter()
        .map(|((department, year, month), (total_budget, total_spend))| DepartmentMonth {
            department,
            year,
            month,
            total_budget,
            total_spend,
            consumption_rate: consumption_rate(total_budget, total_spend),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(campaign_id: i64, month: i32, platform: &str) -> NaturalKey {
        NaturalKey {
            campaign_id,
            year: 2025,
            month,
            platform: platform.to_string(),
            operation_type: "運用代行".to_string(),
        }
    }

    fn budget(campaign_id: i64, client: (i64, &str, &str), month: i32, platform: &str, amount: f64) -> BudgetLine {
        BudgetLine {
            key: key(campaign_id, month, platform),
            client_id: client.0,
            client_name: client.1.to_string(),
            business_division: client.2.to_string(),
            campaign_name: format!("campaign {campaign_id}"),
            amount,
            notes: String::new(),
        }
    }

    fn result(
        campaign_id: i64,
        client: (i64, &str, &str),
        month: i32,
        platform: &str,
        spend: f64,
        outcome: f64,
    ) -> ResultLine {
        ResultLine {
            key: key(campaign_id, month, platform),
            client_id: client.0,
            client_name: client.1.to_string(),
            business_division: client.2.to_string(),
            campaign_name: format!("campaign {campaign_id}"),
            actual_spend: spend,
            actual_result: outcome,
            notes: String::new(),
        }
    }

    const MINATO: (i64, &str, &str) = (1, "ミナト物産", "SO事業部");
    const HOKUTO: (i64, &str, &str) = (2, "北斗HD", "HO事業部");

    #[test]
    fn consumption_rate_over_budget() {
        assert!((consumption_rate(1_000_000.0, 1_200_000.0) - 120.0).abs() < 1e-9);
        assert_eq!(consumption_rate(0.0, 500.0), 0.0);
    }

    #[test]
    fn roi_and_efficiency() {
        assert!((efficiency(1_500_000.0, 1_000_000.0) - 1.5).abs() < 1e-9);
        assert!((roi(1_500_000.0, 1_000_000.0) - 50.0).abs() < 1e-9);
        assert_eq!(roi(100.0, 0.0), 0.0);
    }

    #[test]
    fn join_matches_on_natural_key() {
        let budgets = vec![
            budget(10, MINATO, 8, "Google", 500_000.0),
            budget(10, MINATO, 8, "Yahoo", 200_000.0),
        ];
        let results = vec![
            result(10, MINATO, 8, "Google", 450_000.0, 600_000.0),
            result(10, MINATO, 9, "Google", 10_000.0, 0.0),
        ];

        let rows = join_budgets_and_results(&budgets, &results);
        assert_eq!(rows.len(), 3);

        let google = rows
            .iter()
            .find(|row| row.key.platform == "Google" && row.key.month == 8)
            .unwrap();
        assert_eq!(google.budget, 500_000.0);
        assert_eq!(google.actual_spend, 450_000.0);
        assert!(google.has_budget && google.has_result);

        let yahoo = rows.iter().find(|row| row.key.platform == "Yahoo").unwrap();
        assert!(yahoo.has_budget && !yahoo.has_result);
        assert_eq!(yahoo.actual_spend, 0.0);

        let september = rows.iter().find(|row| row.key.month == 9).unwrap();
        assert!(!september.has_budget);
        assert_eq!(rows.last().unwrap().key.month, 9);
    }

    #[test]
    fn client_rollup_sums_and_rates() {
        let budgets = vec![
            budget(10, MINATO, 7, "Google", 600_000.0),
            budget(11, MINATO, 7, "Meta", 400_000.0),
            budget(20, HOKUTO, 7, "Google", 300_000.0),
        ];
        let results = vec![
            result(10, MINATO, 7, "Google", 700_000.0, 900_000.0),
            result(11, MINATO, 7, "Meta", 500_000.0, 300_000.0),
        ];
        let rows = join_budgets_and_results(&budgets, &results);
        let clients = by_client(&rows);

        assert_eq!(clients.len(), 2);
        let minato = &clients[0];
        assert_eq!(minato.label, "ミナト物産");
        assert_eq!(minato.campaign_count, 2);
        assert_eq!(minato.total_budget, 1_000_000.0);
        assert_eq!(minato.total_spend, 1_200_000.0);
        assert!((minato.consumption_rate - 120.0).abs() < 1e-9);
        assert!((minato.roi - 0.0).abs() < 1e-9);

        let hokuto = &clients[1];
        assert_eq!(hokuto.total_spend, 0.0);
        assert_eq!(hokuto.consumption_rate, 0.0);
        assert_eq!(hokuto.efficiency, 0.0);
    }

    #[test]
    fn department_rollups_use_codes() {
        let budgets = vec![
            budget(10, MINATO, 7, "Google", 100.0),
            budget(20, HOKUTO, 7, "Google", 300.0),
            budget(20, HOKUTO, 8, "Google", 300.0),
        ];
        let rows = join_budgets_and_results(&budgets, &[]);

        let departments = by_department(&rows);
        assert_eq!(departments[0].key, "HO");
        assert_eq!(departments[0].total_budget, 600.0);
        assert_eq!(departments[1].key, "SO");

        let monthly = department_budget_by_month(&rows);
        assert_eq!(monthly.len(), 3);
        assert_eq!(
            (monthly[0].department.as_str(), monthly[0].month),
            ("HO", 7)
        );
    }

    #[test]
    fn monthly_rollup_is_chronological() {
        let budgets = vec![
            budget(10, MINATO, 9, "Google", 1.0),
            budget(10, MINATO, 7, "Google", 1.0),
        ];
        let rows = join_budgets_and_results(&budgets, &[]);
        let months: Vec<String> = by_month(&rows).into_iter().map(|r| r.key).collect();
        assert_eq!(months, vec!["2025-07", "2025-09"]);
    }

    #[test]
    fn platform_rollup_groups_across_clients() {
        let budgets = vec![
            budget(10, MINATO, 7, "Google", 100.0),
            budget(20, HOKUTO, 7, "Google", 50.0),
            budget(20, HOKUTO, 7, "Meta", 500.0),
        ];
        let rows = join_budgets_and_results(&budgets, &[]);
        let platforms = by_platform(&rows);
        assert_eq!(platforms[0].key, "Meta");
        assert_eq!(platforms[1].total_budget, 150.0);
        assert_eq!(platforms[1].campaign_count, 2);
        assert_eq!(by_campaign(&rows).len(), 2);
    }

    #[test]
    fn totals_cover_every_row() {
        let budgets = vec![
            budget(10, MINATO, 7, "Google", 1_000_000.0),
            budget(20, HOKUTO, 7, "Google", 0.0),
        ];
        let results = vec![result(10, MINATO, 7, "Google", 1_200_000.0, 0.0)];
        let total = totals(&join_budgets_and_results(&budgets, &results));
        assert_eq!(total.row_count, 2);
        assert_eq!(total.campaign_count, 2);
        assert!((total.consumption_rate - 120.0).abs() < 1e-9);

        assert_eq!(totals(&[]).row_count, 0);
    }
}
