use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};

use super::Upserted;
use crate::models::{Campaign, CampaignInput};

const CAMPAIGN_COLUMNS: &str = r#"
    c.id, c.client_id, cl.name AS client_name, c.name, c.purpose,
    c.start_year, c.start_month, c.end_year, c.end_month, c.total_budget, c.status
"#;

fn campaign_from_row(row: &PgRow) -> Campaign {
    Campaign {
        id: row.get("id"),
        client_id: row.get("client_id"),
        client_name: row.get("client_name"),
        name: row.get("name"),
        purpose: row.get("purpose"),
        start_year: row.get("start_year"),
        start_month: row.get("start_month"),
        end_year: row.get("end_year"),
        end_month: row.get("end_month"),
        total_budget: row.get("total_budget"),
        status: row.get("status"),
    }
}

pub async fn list_campaigns(pool: &PgPool, client_id: Option<i64>) -> sqlx::Result<Vec<Campaign>> {
    let query = format!(
        "SELECT {CAMPAIGN_COLUMNS} \
         FROM ad_ops.campaigns c \
         JOIN ad_ops.clients cl ON cl.id = c.client_id \
         WHERE ($1::BIGINT IS NULL OR c.client_id = $1) \
         ORDER BY cl.name, c.name"
    );
    let rows = sqlx::query(&query).bind(client_id).fetch_all(pool).await?;
    Ok(rows.iter().map(campaign_from_row).collect())
}

pub async fn get_campaign(conn: &mut PgConnection, id: i64) -> sqlx::Result<Option<Campaign>> {
    let query = format!(
        "SELECT {CAMPAIGN_COLUMNS} \
         FROM ad_ops.campaigns c \
         JOIN ad_ops.clients cl ON cl.id = c.client_id \
         WHERE c.id = $1"
    );
    let row = sqlx::query(&query).bind(id).fetch_optional(&mut *conn).await?;
    Ok(row.as_ref().map(campaign_from_row))
}

pub async fn campaign_exists(conn: &mut PgConnection, id: i64) -> sqlx::Result<bool> {
    let row = sqlx::query("SELECT 1 AS found FROM ad_ops.campaigns WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.is_some())
}

pub async fn find_campaign_id_by_name(
    conn: &mut PgConnection,
    client_id: i64,
    name: &str,
) -> sqlx::Result<Option<i64>> {
    let row = sqlx::query("SELECT id FROM ad_ops.campaigns WHERE client_id = $1 AND name = $2")
        .bind(client_id)
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(|row| row.get("id")))
}

/// Inserts or overwrites the campaign with the same (client, name).
pub async fn upsert_campaign(
    conn: &mut PgConnection,
    client_id: i64,
    input: &CampaignInput,
) -> sqlx::Result<Upserted> {
    let row = sqlx::query(
        r#"
        INSERT INTO ad_ops.campaigns
        (client_id, name, purpose, start_year, start_month, end_year, end_month, total_budget, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (client_id, name) DO UPDATE
        SET purpose = EXCLUDED.purpose,
            start_year = EXCLUDED.start_year,
            start_month = EXCLUDED.start_month,
            end_year = EXCLUDED.end_year,
            end_month = EXCLUDED.end_month,
            total_budget = EXCLUDED.total_budget,
            status = EXCLUDED.status,
            updated_at = NOW()
        RETURNING id, (xmax = 0) AS inserted
        "#,
    )
    .bind(client_id)
    .bind(&input.name)
    .bind(&input.purpose)
    .bind(input.start_year)
    .bind(input.start_month)
    .bind(input.end_year)
    .bind(input.end_month)
    .bind(input.total_budget)
    .bind(&input.status)
    .fetch_one(&mut *conn)
    .await?;

    Ok(Upserted::from_row(&row))
}

/// Returns `false` when no campaign has this id.
pub async fn update_campaign(
    conn: &mut PgConnection,
    id: i64,
    client_id: i64,
    input: &CampaignInput,
) -> sqlx::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE ad_ops.campaigns
        SET client_id = $2, name = $3, purpose = $4, start_year = $5, start_month = $6,
            end_year = $7, end_month = $8, total_budget = $9, status = $10, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(client_id)
    .bind(&input.name)
    .bind(&input.purpose)
    .bind(input.start_year)
    .bind(input.start_month)
    .bind(input.end_year)
    .bind(input.end_month)
    .bind(input.total_budget)
    .bind(&input.status)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Budgets, results and allocations go with it through `ON DELETE CASCADE`.
pub async fn delete_campaign(conn: &mut PgConnection, id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM ad_ops.campaigns WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
