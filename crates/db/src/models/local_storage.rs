use chrono::Utc;
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

/// A string value persisted under a string key, mirroring browser `localStorage`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LocalStorageItem {
    pub key: String,
    pub value: String,
    /// Epoch milliseconds of the last write.
    pub updated_at: i64,
}

impl LocalStorageItem {
    pub async fn find(pool: &SqlitePool, key: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, LocalStorageItem>(
            r#"SELECT key, value, updated_at
               FROM local_storage
               WHERE key = $1"#,
        )
        .bind(key)
        .fetch_optional(pool)
        .await
    }

    pub async fn get_value(pool: &SqlitePool, key: &str) -> Result<Option<String>, sqlx::Error> {
        Ok(Self::find(pool, key).await?.map(|item| item.value))
    }

    pub async fn set(pool: &SqlitePool, key: &str, value: &str) -> Result<Self, sqlx::Error> {
        let now = Utc::now().timestamp_millis();
        sqlx::query_as::<_, LocalStorageItem>(
            r#"INSERT INTO local_storage (key, value, updated_at)
               VALUES ($1, $2, $3)
               ON CONFLICT(key) DO UPDATE SET
                   value = excluded.value,
                   updated_at = excluded.updated_at
               RETURNING key, value, updated_at"#,
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .fetch_one(pool)
        .await
    }
}
