use sqlx::{PgPool, Row};

use crate::models::MasterValue;

pub async fn list_masters(pool: &PgPool, category: Option<&str>) -> sqlx::Result<Vec<MasterValue>> {
    let rows = sqlx::query(
        r#"
        SELECT category, value, sort_order
        FROM ad_ops.masters
        WHERE ($1::TEXT IS NULL OR category = $1)
        ORDER BY category, sort_order, value
        "#,
    )
    .bind(category)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| MasterValue {
            category: row.get("category"),
            value: row.get("value"),
            sort_order: row.get("sort_order"),
        })
        .collect())
}
