use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::info;

use crate::models::ClientRecord;
use crate::types::AppResult;

/// Persistent client_id -> (api_key, allowed_origin) mapping.
///
/// Lookups hit the backing store on every call; nothing is cached between
/// requests, so an admin `delete` takes effect immediately.
#[async_trait]
pub trait ClientRegistry: Send + Sync {
    async fn lookup(&self, client_id: &str) -> AppResult<Option<ClientRecord>>;

    async fn allowed_origin(&self, client_id: &str) -> AppResult<Option<String>>;

    async fn insert(&self, record: &ClientRecord) -> AppResult<()>;

    /// Returns whether a record was removed. Stored blobs are left alone.
    async fn delete(&self, client_id: &str) -> AppResult<bool>;

    async fn list_all(&self) -> AppResult<Vec<ClientRecord>>;

    async fn ping(&self) -> AppResult<()>;

    async fn close(&self);
}

#[derive(Clone)]
pub struct SqliteClientRegistry {
    pool: SqlitePool,
}

impl SqliteClientRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClientRegistry for SqliteClientRegistry {
    async fn lookup(&self, client_id: &str) -> AppResult<Option<ClientRecord>> {
        let record = sqlx::query_as::<_, ClientRecord>(
            "SELECT client_id, api_key, allowed_origin FROM clients WHERE client_id = ?",
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn allowed_origin(&self, client_id: &str) -> AppResult<Option<String>> {
        let origin = sqlx::query_scalar::<_, String>(
            "SELECT allowed_origin FROM clients WHERE client_id = ?",
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(origin)
    }

    async fn insert(&self, record: &ClientRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO clients (client_id, api_key, allowed_origin)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&record.client_id)
        .bind(&record.api_key)
        .bind(&record.allowed_origin)
        .execute(&self.pool)
        .await?;

        info!(client_id = %record.client_id, "Client registered");
        Ok(())
    }

    async fn delete(&self, client_id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM clients WHERE client_id = ?")
            .bind(client_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_all(&self) -> AppResult<Vec<ClientRecord>> {
        let records = sqlx::query_as::<_, ClientRecord>(
            "SELECT client_id, api_key, allowed_origin FROM clients ORDER BY client_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
