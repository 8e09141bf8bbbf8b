use crate::models::CombinedRecord;
use chrono::Utc;
use sqlx::PgPool;

/// 建表 (幂等)
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ledger_receipt (
            id           BIGSERIAL PRIMARY KEY,
            date         TEXT,
            location     TEXT,
            total_amount BIGINT,
            created_at   TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ledger_receipt_item (
            id         BIGSERIAL PRIMARY KEY,
            receipt_id BIGINT NOT NULL REFERENCES ledger_receipt(id) ON DELETE CASCADE,
            position   INTEGER NOT NULL,
            name       TEXT NOT NULL,
            price      BIGINT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// 保存合并后的小票, 返回主表 ID; 主表与明细在同一事务内写入
pub async fn insert_receipt(pool: &PgPool, record: &CombinedRecord) -> Result<i64, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let (receipt_id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO ledger_receipt (date, location, total_amount, created_at)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(record.date.as_deref())
    .bind(record.location.as_deref())
    .bind(record.total_amount.map(to_db_amount).transpose()?)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    if !record.items.is_empty() {
        tracing::debug!("写入 {} 条明细, receipt_id={}", record.items.len(), receipt_id);

        let rows = record
            .items
            .iter()
            .enumerate()
            .map(|(position, item)| {
                Ok((position as i32, item.name.as_str(), to_db_amount(item.price)?))
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        let mut query_builder = sqlx::QueryBuilder::<sqlx::Postgres>::new(
            "INSERT INTO ledger_receipt_item (receipt_id, position, name, price) ",
        );
        query_builder.push_values(rows, |mut b, (position, name, price)| {
            b.push_bind(receipt_id)
                .push_bind(position)
                .push_bind(name)
                .push_bind(price);
        });
        query_builder.build().execute(&mut *tx).await?;
    }

    tx.commit().await?;
    Ok(receipt_id)
}

/// 金额必须落在 BIGINT 范围内
fn to_db_amount(amount: u64) -> Result<i64, sqlx::Error> {
    i64::try_from(amount)
        .map_err(|_| sqlx::Error::Protocol(format!("amount {} exceeds BIGINT", amount)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_fit_bigint() {
        assert_eq!(to_db_amount(6500).unwrap(), 6500);
        let err = to_db_amount(u64::MAX).unwrap_err();
        assert!(matches!(err, sqlx::Error::Protocol(msg) if msg.contains("exceeds BIGINT")));
    }
}
