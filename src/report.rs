use std::fmt::Write;

use chrono::NaiveDate;

use crate::analytics;
use crate::export::{format_rate, format_yen};
use crate::models::{PerformanceRow, RowFilter, Rollup};

/// Human-readable scope line, e.g. `2025-08, department SO`.
pub fn describe_filter(filter: &RowFilter) -> String {
    let mut parts = Vec::new();
    match (filter.year, filter.month) {
        (Some(year), Some(month)) => parts.push(format!("{year:04}-{month:02}")),
        (Some(year), None) => parts.push(format!("{year:04}")),
        (None, Some(month)) => parts.push(format!("month {month}")),
        (None, None) => {}
    }
    if let Some(client_id) = filter.client_id {
        parts.push(format!("client {client_id}"));
    }
    if let Some(campaign_id) = filter.campaign_id {
        parts.push(format!("campaign {campaign_id}"));
    }
    if let Some(platform) = &filter.platform {
        parts.push(format!("platform {platform}"));
    }
    if let Some(department) = &filter.department {
        parts.push(format!("department {department}"));
    }

    if parts.is_empty() {
        "all periods".to_string()
    } else {
        parts.join(", ")
    }
}

fn rollup_line(output: &mut String, rollup: &Rollup) {
    let _ = writeln!(
        output,
        "- {}: budget {} / spend {} ({:.1}%), result {}, ROI {:.1}%",
        rollup.label,
        format_yen(rollup.total_budget),
        format_yen(rollup.total_spend),
        rollup.consumption_rate,
        format_yen(rollup.total_result),
        rollup.roi
    );
}

fn rollup_section(output: &mut String, heading: &str, rollups: &[Rollup], limit: usize) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## {heading}");

    if rollups.is_empty() {
        let _ = writeln!(output, "No budgets or results recorded for this scope.");
    } else {
        for rollup in rollups.iter().take(limit) {
            rollup_line(output, rollup);
        }
    }
}

pub fn build_report(scope: &str, generated_on: NaiveDate, rows: &[PerformanceRow]) -> String {
    let totals = analytics::totals(rows);

    let mut output = String::new();
    let _ = writeln!(output, "# Budget Performance Report");
    let _ = writeln!(output, "Generated {} for {}", generated_on, scope);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Totals");
    let _ = writeln!(
        output,
        "- {} lines across {} campaigns",
        totals.row_count, totals.campaign_count
    );
    let _ = writeln!(output, "- Budget: {}", format_yen(totals.total_budget));
    let _ = writeln!(
        output,
        "- Spend: {} ({:.1}% consumed)",
        format_yen(totals.total_spend),
        totals.consumption_rate
    );
    let _ = writeln!(
        output,
        "- Result: {} (ROI {:.1}%)",
        format_yen(totals.total_result),
        totals.roi
    );

    rollup_section(&mut output, "By Department", &analytics::by_department(rows), usize::MAX);
    rollup_section(&mut output, "Top Clients", &analytics::by_client(rows), 10);
    rollup_section(&mut output, "Top Campaigns", &analytics::by_campaign(rows), 10);
    rollup_section(&mut output, "Platform Mix", &analytics::by_platform(rows), usize::MAX);
    rollup_section(&mut output, "Monthly Trend", &analytics::by_month(rows), usize::MAX);

    let mut overspent: Vec<&PerformanceRow> = rows
        .iter()
        .filter(|row| row.has_budget && row.actual_spend > row.budget)
        .collect();
    overspent.sort_by(|a, b| {
        let over_a = a.actual_spend - a.budget;
        let over_b = b.actual_spend - b.budget;
        over_b
            .partial_cmp(&over_a)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let _ = writeln!(output);
    let _ = writeln!(output, "## Over Budget");

    if overspent.is_empty() {
        let _ = writeln!(output, "Every line is within budget.");
    } else {
        for row in overspent.iter().take(10) {
            let _ = writeln!(
                output,
                "- {:04}-{:02} {} / {} on {} ({}): spend {} against {} ({})",
                row.key.year,
                row.key.month,
                row.client_name,
                row.campaign_name,
                row.key.platform,
                row.key.operation_type,
                format_yen(row.actual_spend),
                format_yen(row.budget),
                format_rate(row)
            );
        }
    }

    output
}
