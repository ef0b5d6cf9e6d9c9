use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool, Row};

pub mod campaigns;
pub mod clients;
pub mod masters;
pub mod performance;

/// Whether an upsert inserted a fresh row or overwrote an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Created(i64),
    Updated(i64),
}

impl Upserted {
    pub fn id(&self) -> i64 {
        match self {
            Upserted::Created(id) | Upserted::Updated(id) => *id,
        }
    }

    /// Reads `id` and `inserted` from an `INSERT .. ON CONFLICT .. RETURNING
    /// id, (xmax = 0) AS inserted` row.
    pub(crate) fn from_row(row: &sqlx::postgres::PgRow) -> Self {
        let id: i64 = row.get("id");
        let inserted: bool = row.get("inserted");
        if inserted {
            Upserted::Created(id)
        } else {
            Upserted::Updated(id)
        }
    }
}

pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Bounds every statement in the current transaction.
pub async fn set_statement_timeout(conn: &mut PgConnection, timeout: Duration) -> sqlx::Result<()> {
    let millis = timeout.as_millis().max(1);
    sqlx::query(&format!("SET LOCAL statement_timeout = {millis}"))
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Postgres `unique_violation`.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db_err| db_err.code())
        .map(|code| code == "23505")
        .unwrap_or(false)
}

/// Postgres `query_canceled`, raised when `statement_timeout` fires.
pub fn is_query_canceled(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db_err| db_err.code())
        .map(|code| code == "57014")
        .unwrap_or(false)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;

    let masters = [
        ("platform", "Google", 1),
        ("platform", "Yahoo", 2),
        ("platform", "Meta", 3),
        ("platform", "TikTok", 4),
        ("operation_type", "運用代行", 1),
        ("operation_type", "広告費", 2),
        ("operation_type", "制作費", 3),
        ("business_division", "SO事業部", 1),
        ("business_division", "HO事業部", 2),
        ("business_division", "SLS事業部", 3),
        ("business_division", "デジタル事業部", 4),
    ];

    for (category, value, sort_order) in masters {
        sqlx::query(
            r#"
            INSERT INTO ad_ops.masters (category, value, sort_order)
            VALUES ($1, $2, $3)
            ON CONFLICT (category, value) DO UPDATE SET sort_order = EXCLUDED.sort_order
            "#,
        )
        .bind(category)
        .bind(value)
        .bind(sort_order)
        .execute(&mut *tx)
        .await?;
    }

    let users = [
        ("佐藤 花子", "hanako.sato@example.com", "SO"),
        ("鈴木 一郎", "ichiro.suzuki@example.com", "HO"),
        ("田中 美咲", "misaki.tanaka@example.com", "DIGITAL"),
    ];

    for (name, email, department) in users {
        sqlx::query(
            r#"
            INSERT INTO ad_ops.users (name, email, department)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE
            SET name = EXCLUDED.name, department = EXCLUDED.department
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(department)
        .execute(&mut *tx)
        .await?;
    }

    let clients = [
        ("株式会社ミナト物産", "SO事業部", "高"),
        ("北斗ホールディングス", "HO事業部", "中"),
        ("あおば不動産", "デジタル事業部", "低"),
    ];

    for (name, division, priority) in clients {
        let client_id: i64 = sqlx::query(
            r#"
            INSERT INTO ad_ops.clients (name, business_division, priority)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO UPDATE
            SET business_division = EXCLUDED.business_division, priority = EXCLUDED.priority
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(division)
        .bind(priority)
        .fetch_one(&mut *tx)
        .await?
        .get("id");

        let campaign_id: i64 = sqlx::query(
            r#"
            INSERT INTO ad_ops.campaigns (client_id, name, purpose, start_year, start_month, total_budget)
            VALUES ($1, $2, '認知拡大', 2025, 7, 3000000)
            ON CONFLICT (client_id, name) DO UPDATE SET purpose = EXCLUDED.purpose
            RETURNING id
            "#,
        )
        .bind(client_id)
        .bind(format!("{name} 下期施策"))
        .fetch_one(&mut *tx)
        .await?
        .get("id");

        for (month, budget, spend, result) in [
            (7, 1_000_000.0, 1_200_000.0, 1_500_000.0),
            (8, 1_000_000.0, 850_000.0, 900_000.0),
        ] {
            for (table, value_sql) in [
                ("budgets", "amount"),
                ("results", "actual_spend"),
            ] {
                let value: f64 = if table == "budgets" { budget } else { spend };
                sqlx::query(&format!(
                    r#"
                    INSERT INTO ad_ops.{table} (campaign_id, year, month, platform, operation_type, {value_sql})
                    VALUES ($1, 2025, $2, 'Google', '運用代行', $3)
                    ON CONFLICT (campaign_id, year, month, platform, operation_type)
                    DO UPDATE SET {value_sql} = EXCLUDED.{value_sql}
                    "#
                ))
                .bind(campaign_id)
                .bind(month)
                .bind(value)
                .execute(&mut *tx)
                .await?;
            }

            sqlx::query(
                r#"
                UPDATE ad_ops.results SET actual_result = $1
                WHERE campaign_id = $2 AND year = 2025 AND month = $3
                  AND platform = 'Google' AND operation_type = '運用代行'
                "#,
            )
            .bind(result)
            .bind(campaign_id)
            .bind(month)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;
    Ok(())
}
