use async_trait::async_trait;
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row};
use std::str::FromStr;
use tracing::{debug, info};

use crate::autonumber::item::SequenceFieldValue;
use crate::config::DatabaseConfig;
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::{PartitionQuery, SequenceStore};

/// SQLite implementation of the sequence store
pub struct SqliteSequenceStore {
    pool: SqlitePool,
}

impl SqliteSequenceStore {
    /// Connect using the configured URL, creating the database file when missing
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| {
                AppError::ConfigurationError(format!("Invalid database URL {}: {}", config.url, e))
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_with(options)
            .await
            .map_err(|e| {
                AppError::AllocationStoreError(format!(
                    "Failed to connect to {}: {}",
                    config.url, e
                ))
            })?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// Single-connection in-memory store; the database lives as long as the pool
    pub async fn new_in_memory() -> AppResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| {
                AppError::AllocationStoreError(format!(
                    "Failed to connect to in-memory SQLite: {}",
                    e
                ))
            })?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// Create the value and counter tables if they do not exist yet
    pub async fn initialize(&self) -> AppResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS autonumber_values (
                entity_type TEXT NOT NULL,
                entity_id INTEGER NOT NULL,
                field_name TEXT NOT NULL,
                value INTEGER,
                auto_grouping TEXT,
                auto_grouping_pattern TEXT,
                manual_grouping TEXT,
                PRIMARY KEY (entity_type, entity_id, field_name)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::AllocationStoreError(format!("Failed to create values table: {}", e))
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS autonumber_counters (
                entity_type TEXT NOT NULL,
                field_name TEXT NOT NULL,
                auto_grouping TEXT NOT NULL,
                manual_grouping TEXT NOT NULL,
                last_value INTEGER NOT NULL,
                PRIMARY KEY (entity_type, field_name, auto_grouping, manual_grouping)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::AllocationStoreError(format!("Failed to create counters table: {}", e))
        })?;

        for (name, columns) in [
            ("idx_autonumber_auto_grouping", "entity_type, field_name, auto_grouping"),
            ("idx_autonumber_manual_grouping", "entity_type, field_name, manual_grouping"),
            ("idx_autonumber_value", "entity_type, field_name, value"),
        ] {
            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS {} ON autonumber_values({})",
                name, columns
            ))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::AllocationStoreError(format!("Failed to create index {}: {}", name, e))
            })?;
        }

        info!("Autonumber tables initialized");
        Ok(())
    }

    /// Health check to verify database connectivity
    pub async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::AllocationStoreError(format!("Database health check failed: {}", e))
            })?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Append the partition filters of `query` to a statement that already has a WHERE clause
fn push_partition_filters(qb: &mut QueryBuilder<'_, Sqlite>, query: &PartitionQuery) {
    qb.push(" entity_type = ");
    qb.push_bind(query.entity_type.clone());
    qb.push(" AND field_name = ");
    qb.push_bind(query.field_name.clone());

    if let Some(auto_grouping) = &query.auto_grouping {
        qb.push(" AND auto_grouping = ");
        qb.push_bind(auto_grouping.clone());
    }
    if let Some(manual_grouping) = &query.manual_grouping {
        qb.push(" AND manual_grouping = ");
        qb.push_bind(manual_grouping.clone());
    }
}

#[async_trait]
impl SequenceStore for SqliteSequenceStore {
    async fn max_value(&self, query: &PartitionQuery) -> AppResult<Option<i64>> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT MAX(value) AS max_value FROM autonumber_values WHERE",
        );
        push_partition_filters(&mut qb, query);

        let row = qb.build().fetch_one(&self.pool).await.map_err(|e| {
            AppError::AllocationStoreError(format!(
                "Failed to read maximum value for {}.{}: {}",
                query.entity_type, query.field_name, e
            ))
        })?;

        let max_value: Option<i64> = row.try_get("max_value").map_err(|e| {
            AppError::AllocationStoreError(format!("Failed to decode maximum value: {}", e))
        })?;
        debug!("Maximum value for {:?} is {:?}", query, max_value);
        Ok(max_value)
    }

    async fn next_counter_value(&self, query: &PartitionQuery) -> AppResult<i64> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "INSERT INTO autonumber_counters \
             (entity_type, field_name, auto_grouping, manual_grouping, last_value) VALUES (",
        );
        let mut key = qb.separated(", ");
        key.push_bind(query.entity_type.clone());
        key.push_bind(query.field_name.clone());
        key.push_bind(query.auto_grouping.clone().unwrap_or_default());
        key.push_bind(query.manual_grouping.clone().unwrap_or_default());
        qb.push(", (SELECT COALESCE(MAX(value), 0) FROM autonumber_values WHERE");
        push_partition_filters(&mut qb, query);
        qb.push(
            ") + 1) ON CONFLICT (entity_type, field_name, auto_grouping, manual_grouping) \
             DO UPDATE SET \
             last_value = MAX(autonumber_counters.last_value + 1, excluded.last_value) \
             RETURNING last_value",
        );

        let row = qb.build().fetch_one(&self.pool).await.map_err(|e| {
            AppError::AllocationStoreError(format!(
                "Failed to advance counter for {}.{}: {}",
                query.entity_type, query.field_name, e
            ))
        })?;

        row.try_get::<i64, _>("last_value").map_err(|e| {
            AppError::AllocationStoreError(format!("Failed to decode counter value: {}", e))
        })
    }

    async fn save_values(
        &self,
        entity_type: &str,
        entity_id: i64,
        values: &[(&str, &SequenceFieldValue)],
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::AllocationStoreError(format!("Failed to begin transaction: {}", e))
        })?;

        for (field_name, value) in values {
            sqlx::query(
                r#"
                INSERT INTO autonumber_values
                    (entity_type, entity_id, field_name, value,
                     auto_grouping, auto_grouping_pattern, manual_grouping)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (entity_type, entity_id, field_name) DO UPDATE SET
                    value = excluded.value,
                    auto_grouping = excluded.auto_grouping,
                    auto_grouping_pattern = excluded.auto_grouping_pattern,
                    manual_grouping = excluded.manual_grouping
                "#,
            )
            .bind(entity_type)
            .bind(entity_id)
            .bind(*field_name)
            .bind(value.value)
            .bind(value.auto_grouping.clone())
            .bind(value.auto_grouping_pattern.clone())
            .bind(value.manual_grouping.clone())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::AllocationStoreError(format!(
                    "Failed to save {}.{} for {}: {}",
                    entity_type, field_name, entity_id, e
                ))
            })?;
        }

        // Dropping the transaction on an early return rolls every field back
        tx.commit().await.map_err(|e| {
            AppError::AllocationStoreError(format!(
                "Failed to commit values of {} {}: {}",
                entity_type, entity_id, e
            ))
        })?;
        Ok(())
    }

    async fn load_value(
        &self,
        entity_type: &str,
        entity_id: i64,
        field_name: &str,
    ) -> AppResult<Option<SequenceFieldValue>> {
        let row = sqlx::query(
            r#"
            SELECT value, auto_grouping, auto_grouping_pattern, manual_grouping
            FROM autonumber_values
            WHERE entity_type = ? AND entity_id = ? AND field_name = ?
            "#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .bind(field_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::AllocationStoreError(format!(
                "Failed to load {}.{} for {}: {}",
                entity_type, field_name, entity_id, e
            ))
        })?;

        Ok(row.map(|row| SequenceFieldValue {
            value: row.get("value"),
            auto_grouping: row.get("auto_grouping"),
            auto_grouping_pattern: row.get("auto_grouping_pattern"),
            manual_grouping: row.get("manual_grouping"),
        }))
    }

    async fn delete_values(&self, entity_type: &str, entity_id: i64) -> AppResult<u64> {
        let result =
            sqlx::query("DELETE FROM autonumber_values WHERE entity_type = ? AND entity_id = ?")
                .bind(entity_type)
                .bind(entity_id)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    AppError::AllocationStoreError(format!(
                        "Failed to delete values of {} {}: {}",
                        entity_type, entity_id, e
                    ))
                })?;
        Ok(result.rows_affected())
    }
}
