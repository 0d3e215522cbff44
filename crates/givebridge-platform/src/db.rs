use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::{PgPool, Row, postgres::PgPoolOptions};
use uuid::Uuid;

use givebridge_core::document::{FIELD_CREATED_AT, timestamp_value};
use givebridge_core::{Document, DocumentStore, FieldFilter, FieldMap, StoreError};

pub async fn connect_database(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Postgres-backed document store: every logical store shares one JSONB
/// table keyed by store name + document id. `createdAt` is stamped here, so
/// the database clock is the only clock that counts.
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                store_name TEXT NOT NULL,
                id TEXT NOT NULL,
                data JSONB NOT NULL,
                PRIMARY KEY (store_name, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn unavailable(store: &str) -> impl FnOnce(sqlx::Error) -> StoreError + '_ {
    move |err| StoreError::unavailable(store, err)
}

fn decode_row(store: &str, row: &sqlx::postgres::PgRow) -> Result<Document, StoreError> {
    let id: String = row
        .try_get("id")
        .map_err(|err| StoreError::malformed(store, err))?;
    let data: Value = row
        .try_get("data")
        .map_err(|err| StoreError::malformed(store, err))?;
    let Value::Object(fields) = data else {
        return Err(StoreError::malformed(
            store,
            format!("{id}: document body is not an object"),
        ));
    };
    Ok(Document::new(id, fields))
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn query(&self, store: &str, filter: FieldFilter) -> Result<Vec<Document>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, data FROM documents WHERE store_name = $1 AND data -> $2::text = $3",
        )
        .bind(store)
        .bind(&filter.field)
        .bind(&filter.equals)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable(store))?;

        rows.iter().map(|row| decode_row(store, row)).collect()
    }

    async fn get(&self, store: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query("SELECT id, data FROM documents WHERE store_name = $1 AND id = $2")
            .bind(store)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable(store))?;

        row.map(|row| decode_row(store, &row)).transpose()
    }

    async fn add(&self, store: &str, mut fields: FieldMap) -> Result<Document, StoreError> {
        let id = Uuid::new_v4().to_string();
        fields.insert(FIELD_CREATED_AT.to_string(), timestamp_value(Utc::now()));

        sqlx::query("INSERT INTO documents (store_name, id, data) VALUES ($1, $2, $3)")
            .bind(store)
            .bind(&id)
            .bind(Value::Object(fields.clone()))
            .execute(&self.pool)
            .await
            .map_err(unavailable(store))?;

        Ok(Document::new(id, fields))
    }

    async fn update(&self, store: &str, id: &str, patch: FieldMap) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE documents SET data = data || $3 WHERE store_name = $1 AND id = $2",
        )
        .bind(store)
        .bind(id)
        .bind(Value::Object(patch))
        .execute(&self.pool)
        .await
        .map_err(unavailable(store))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(store, id));
        }
        Ok(())
    }

    async fn update_if(
        &self,
        store: &str,
        id: &str,
        guard: FieldFilter,
        patch: FieldMap,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET data = data || $3
            WHERE store_name = $1 AND id = $2 AND data -> $4::text = $5
            "#,
        )
        .bind(store)
        .bind(id)
        .bind(Value::Object(patch))
        .bind(&guard.field)
        .bind(&guard.equals)
        .execute(&self.pool)
        .await
        .map_err(unavailable(store))?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        // Distinguish a failed guard from a missing document.
        match self.get(store, id).await? {
            Some(_) => Ok(false),
            None => Err(StoreError::not_found(store, id)),
        }
    }

    async fn delete(&self, store: &str, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM documents WHERE store_name = $1 AND id = $2")
            .bind(store)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unavailable(store))?;

        Ok(())
    }
}
