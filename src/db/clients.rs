use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};

use super::Upserted;
use crate::models::{Client, ClientInput};

fn client_from_row(row: &PgRow) -> Client {
    Client {
        id: row.get("id"),
        name: row.get("name"),
        business_division: row.get("business_division"),
        priority: row.get("priority"),
        sales_person: row.get("sales_person"),
        notes: row.get("notes"),
    }
}

pub async fn list_clients(pool: &PgPool, business_division: Option<&str>) -> sqlx::Result<Vec<Client>> {
    let rows = sqlx::query(
        r#"
        SELECT id, name, business_division, priority, sales_person, notes
        FROM ad_ops.clients
        WHERE ($1::TEXT IS NULL OR business_division = $1)
        ORDER BY name
        "#,
    )
    .bind(business_division)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(client_from_row).collect())
}

pub async fn find_client_id(conn: &mut PgConnection, id: i64) -> sqlx::Result<Option<i64>> {
    let row = sqlx::query("SELECT id FROM ad_ops.clients WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(|row| row.get("id")))
}

pub async fn find_client_id_by_name(conn: &mut PgConnection, name: &str) -> sqlx::Result<Option<i64>> {
    let row = sqlx::query("SELECT id FROM ad_ops.clients WHERE name = $1")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(|row| row.get("id")))
}

/// Inserts or overwrites the client with the same name.
pub async fn upsert_client(conn: &mut PgConnection, input: &ClientInput) -> sqlx::Result<Upserted> {
    let row = sqlx::query(
        r#"
        INSERT INTO ad_ops.clients (name, business_division, priority, sales_person, notes)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (name) DO UPDATE
        SET business_division = EXCLUDED.business_division,
            priority = EXCLUDED.priority,
            sales_person = EXCLUDED.sales_person,
            notes = EXCLUDED.notes,
            updated_at = NOW()
        RETURNING id, (xmax = 0) AS inserted
        "#,
    )
    .bind(&input.name)
    .bind(&input.business_division)
    .bind(&input.priority)
    .bind(&input.sales_person)
    .bind(&input.notes)
    .fetch_one(&mut *conn)
    .await?;

    Ok(Upserted::from_row(&row))
}

pub async fn get_client(conn: &mut PgConnection, id: i64) -> sqlx::Result<Option<Client>> {
    let row = sqlx::query(
        r#"
        SELECT id, name, business_division, priority, sales_person, notes
        FROM ad_ops.clients
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.as_ref().map(client_from_row))
}
