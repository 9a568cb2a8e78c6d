//! API key storage.
//!
//! Keys are stored as SHA-256 hashes and each one is bound to a caller
//! identity (user + workspace). The plaintext is returned once at creation.

use chrono::Utc;
use humanloop_types::error::RepositoryError;
use humanloop_types::identity::Caller;
use sqlx::Row;
use uuid::Uuid;

use super::format_datetime;
use super::pool::DatabasePool;
use crate::crypto::hash::{generate_api_key, sha256_hex};

/// A stored key without its secret.
#[derive(Debug, Clone)]
pub struct ApiKeyRecord {
    pub id: Uuid,
    pub name: String,
    pub caller: Caller,
}

pub struct SqliteApiKeyStore {
    pool: DatabasePool,
}

impl SqliteApiKeyStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Create a key for `caller`. Returns the record and the plaintext key.
    pub async fn create(
        &self,
        name: &str,
        caller: &Caller,
    ) -> Result<(ApiKeyRecord, String), RepositoryError> {
        let plaintext = generate_api_key();
        let id = Uuid::now_v7();

        sqlx::query(
            "INSERT INTO api_keys (id, key_hash, name, user_id, workspace_id, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(sha256_hex(&plaintext))
        .bind(name)
        .bind(&caller.user_id)
        .bind(&caller.workspace_id)
        .bind(format_datetime(&Utc::now()))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let record = ApiKeyRecord {
            id,
            name: name.to_string(),
            caller: caller.clone(),
        };
        Ok((record, plaintext))
    }

    /// Resolve a presented key to its caller identity.
    pub async fn authenticate(&self, key: &str) -> Result<Option<Caller>, RepositoryError> {
        let row = sqlx::query("SELECT id, user_id, workspace_id FROM api_keys WHERE key_hash = ?")
            .bind(sha256_hex(key))
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let id: String = row.get("id");
        let caller = Caller::new(
            row.get::<String, _>("user_id"),
            row.get::<String, _>("workspace_id"),
        );

        // Best effort; a failed timestamp update must not fail the request.
        if let Err(e) = sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE id = ?")
            .bind(format_datetime(&Utc::now()))
            .bind(&id)
            .execute(&self.pool.writer)
            .await
        {
            tracing::debug!(error = %e, "failed to record api key usage");
        }

        Ok(Some(caller))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::test_pool;

    #[tokio::test]
    async fn test_create_and_authenticate() {
        let store = SqliteApiKeyStore::new(test_pool().await);
        let caller = Caller::new("u1", "w1");
        let (record, key) = store.create("ci", &caller).await.unwrap();
        assert_eq!(record.caller, caller);

        assert_eq!(store.authenticate(&key).await.unwrap(), Some(caller));
        assert_eq!(store.authenticate("hloop_wrong").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_only_hash_is_stored() {
        let pool = test_pool().await;
        let store = SqliteApiKeyStore::new(pool.clone());
        let (_, key) = store.create("ci", &Caller::new("u1", "w1")).await.unwrap();

        let (stored,): (String,) = sqlx::query_as("SELECT key_hash FROM api_keys")
            .fetch_one(&pool.reader)
            .await
            .unwrap();
        assert_ne!(stored, key);
        assert_eq!(stored, sha256_hex(&key));
    }
}
