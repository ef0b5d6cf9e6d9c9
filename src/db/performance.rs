//! Budgets, results and their team allocations.

use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};

use super::Upserted;
use crate::departments;
use crate::models::{
    BudgetInput, BudgetLine, NaturalKey, ResultInput, ResultLine, RowFilter, TeamAllocation,
};

fn key_from_row(row: &PgRow) -> NaturalKey {
    NaturalKey {
        campaign_id: row.get("campaign_id"),
        year: row.get("year"),
        month: row.get("month"),
        platform: row.get("platform"),
        operation_type: row.get("operation_type"),
    }
}

fn filtered_query(table: &str, value_columns: &str) -> String {
    format!(
        "SELECT t.campaign_id, t.year, t.month, t.platform, t.operation_type, {value_columns}, t.notes, \
                c.name AS campaign_name, cl.id AS client_id, cl.name AS client_name, cl.business_division \
         FROM ad_ops.{table} t \
         JOIN ad_ops.campaigns c ON c.id = t.campaign_id \
         JOIN ad_ops.clients cl ON cl.id = c.client_id \
         WHERE ($1::INT IS NULL OR t.year = $1) \
           AND ($2::INT IS NULL OR t.month = $2) \
           AND ($3::BIGINT IS NULL OR cl.id = $3) \
           AND ($4::BIGINT IS NULL OR c.id = $4) \
           AND ($5::TEXT IS NULL OR t.platform = $5) \
           AND ($6::TEXT IS NULL OR cl.business_division = $6) \
         ORDER BY t.year, t.month, cl.name, c.name, t.platform, t.operation_type"
    )
}

async fn fetch_filtered(pool: &PgPool, query: &str, filter: &RowFilter) -> sqlx::Result<Vec<PgRow>> {
    let division = filter.department.as_deref().map(departments::division_for);
    sqlx::query(query)
        .bind(filter.year)
        .bind(filter.month)
        .bind(filter.client_id)
        .bind(filter.campaign_id)
        .bind(filter.platform.as_deref())
        .bind(division)
        .fetch_all(pool)
        .await
}

pub async fn fetch_budget_lines(pool: &PgPool, filter: &RowFilter) -> sqlx::Result<Vec<BudgetLine>> {
    let query = filtered_query("budgets", "t.amount");
    let rows = fetch_filtered(pool, &query, filter).await?;

    Ok(rows
        .iter()
        .map(|row| BudgetLine {
            key: key_from_row(row),
            client_id: row.get("client_id"),
            client_name: row.get("client_name"),
            business_division: row.get("business_division"),
            campaign_name: row.get("campaign_name"),
            amount: row.get("amount"),
            notes: row.get("notes"),
        })
        .collect())
}

pub async fn fetch_result_lines(pool: &PgPool, filter: &RowFilter) -> sqlx::Result<Vec<ResultLine>> {
    let query = filtered_query("results", "t.actual_spend, t.actual_result");
    let rows = fetch_filtered(pool, &query, filter).await?;

    Ok(rows
        .iter()
        .map(|row| ResultLine {
            key: key_from_row(row),
            client_id: row.get("client_id"),
            client_name: row.get("client_name"),
            business_division: row.get("business_division"),
            campaign_name: row.get("campaign_name"),
            actual_spend: row.get("actual_spend"),
            actual_result: row.get("actual_result"),
            notes: row.get("notes"),
        })
        .collect())
}

/// Rows stored for `campaign_id` in `budgets` or `results`.
pub async fn count_rows(pool: &PgPool, table: &str, campaign_id: i64) -> sqlx::Result<i64> {
    let table = match table {
        "results" => "results",
        _ => "budgets",
    };
    sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM ad_ops.{table} WHERE campaign_id = $1"
    ))
    .bind(campaign_id)
    .fetch_one(pool)
    .await
}

/// Inserts or overwrites the budget with the same natural key.
pub async fn upsert_budget(conn: &mut PgConnection, input: &BudgetInput) -> sqlx::Result<Upserted> {
    let key = &input.key;
    let row = sqlx::query(
        r#"
        INSERT INTO ad_ops.budgets
        (campaign_id, year, month, platform, operation_type, amount, target_kpi, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (campaign_id, year, month, platform, operation_type) DO UPDATE
        SET amount = EXCLUDED.amount,
            target_kpi = EXCLUDED.target_kpi,
            notes = EXCLUDED.notes,
            updated_at = NOW()
        RETURNING id, (xmax = 0) AS inserted
        "#,
    )
    .bind(key.campaign_id)
    .bind(key.year)
    .bind(key.month)
    .bind(&key.platform)
    .bind(&key.operation_type)
    .bind(input.amount)
    .bind(&input.target_kpi)
    .bind(&input.notes)
    .fetch_one(&mut *conn)
    .await?;

    Ok(Upserted::from_row(&row))
}

/// Inserts or overwrites the result with the same natural key.
pub async fn upsert_result(conn: &mut PgConnection, input: &ResultInput) -> sqlx::Result<Upserted> {
    let key = &input.key;
    let row = sqlx::query(
        r#"
        INSERT INTO ad_ops.results
        (campaign_id, year, month, platform, operation_type, actual_spend, actual_result, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (campaign_id, year, month, platform, operation_type) DO UPDATE
        SET actual_spend = EXCLUDED.actual_spend,
            actual_result = EXCLUDED.actual_result,
            notes = EXCLUDED.notes,
            updated_at = NOW()
        RETURNING id, (xmax = 0) AS inserted
        "#,
    )
    .bind(key.campaign_id)
    .bind(key.year)
    .bind(key.month)
    .bind(&key.platform)
    .bind(&key.operation_type)
    .bind(input.actual_spend)
    .bind(input.actual_result)
    .bind(&input.notes)
    .fetch_one(&mut *conn)
    .await?;

    Ok(Upserted::from_row(&row))
}

#[derive(Debug, Clone, Copy)]
pub enum AllocationOwner {
    Budget(i64),
    Result(i64),
}

/// Replaces every allocation attached to `owner` with `allocations`.
pub async fn replace_allocations(
    conn: &mut PgConnection,
    owner: AllocationOwner,
    allocations: &[TeamAllocation],
) -> sqlx::Result<()> {
    let (column, owner_id) = match owner {
        AllocationOwner::Budget(id) => ("budget_id", id),
        AllocationOwner::Result(id) => ("result_id", id),
    };

    sqlx::query(&format!(
        "DELETE FROM ad_ops.team_allocations WHERE {column} = $1"
    ))
    .bind(owner_id)
    .execute(&mut *conn)
    .await?;

    for allocation in allocations {
        sqlx::query(&format!(
            "INSERT INTO ad_ops.team_allocations ({column}, user_id, percentage) VALUES ($1, $2, $3)"
        ))
        .bind(owner_id)
        .bind(allocation.user_id)
        .bind(allocation.percentage)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

pub async fn user_exists(conn: &mut PgConnection, user_id: i64) -> sqlx::Result<bool> {
    let row = sqlx::query("SELECT 1 AS found FROM ad_ops.users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.is_some())
}
