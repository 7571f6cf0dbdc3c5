//! Lookup of the tokenserver's `users` rows.
//!
//! The valid-request check compares the `uid` in the token response with the
//! row the tokenserver allocated. [`PgUserDirectory`] reads the deployment's
//! database; [`InMemoryUserDirectory`] backs tests and fake servers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sqlx_core::pool::PoolOptions;
use sqlx_core::query_as::query_as;
use sqlx_postgres::{PgPool, Postgres};

use crate::error::HarnessError;

/// One row of the tokenserver `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub uid: i64,
    pub email: String,
    pub generation: i64,
    pub client_state: String,
    pub keys_changed_at: Option<i64>,
    pub nodeid: i64,
    pub created_at: i64,
    pub replaced_at: Option<i64>,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Returns the row for `uid`, if any.
    async fn get_user(&self, uid: i64) -> Result<Option<UserRecord>, HarnessError>;
}

/// Reads `users` from the tokenserver's PostgreSQL database.
#[derive(Debug, Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a small pool against `url`.
    ///
    /// # Errors
    /// Returns `HarnessError::UserDirectory` if the database is unreachable.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, HarnessError> {
        let pool = PoolOptions::<Postgres>::new()
            .max_connections(2)
            .acquire_timeout(timeout)
            .connect(url)
            .await
            .map_err(|e| {
                HarnessError::user_directory(format!("failed to connect to tokenserver database: {e}"))
            })?;
        tracing::debug!("connected to tokenserver database");
        Ok(Self { pool })
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn get_user(&self, uid: i64) -> Result<Option<UserRecord>, HarnessError> {
        let row: Option<(i64, String, i64, String, Option<i64>, i64, i64, Option<i64>)> =
            query_as(
                r#"
                SELECT uid, email, generation, client_state, keys_changed_at, nodeid, created_at, replaced_at
                FROM users
                WHERE uid = $1
                "#,
            )
            .bind(uid)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| HarnessError::user_directory(format!("Failed to get user: {e}")))?;

        Ok(row.map(
            |(uid, email, generation, client_state, keys_changed_at, nodeid, created_at, replaced_at)| {
                UserRecord {
                    uid,
                    email,
                    generation,
                    client_state,
                    keys_changed_at,
                    nodeid,
                    created_at,
                    replaced_at,
                }
            },
        ))
    }
}

/// Users held in memory, keyed by uid.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserDirectory {
    users: Arc<DashMap<i64, UserRecord>>,
}

impl InMemoryUserDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: UserRecord) {
        self.users.insert(user.uid, user);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get_user(&self, uid: i64) -> Result<Option<UserRecord>, HarnessError> {
        Ok(self.users.get(&uid).map(|entry| entry.value().clone()))
    }
}

/// Connects to `database_url` when one is configured.
///
/// # Errors
/// Propagates connection failures.
pub async fn connect_from_config(
    database_url: Option<&str>,
    timeout: Duration,
) -> Result<Option<Arc<dyn UserDirectory>>, HarnessError> {
    match database_url {
        Some(url) if !url.is_empty() => {
            let directory = PgUserDirectory::connect(url, timeout).await?;
            Ok(Some(Arc::new(directory)))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(uid: i64, email: &str, replaced_at: Option<i64>) -> UserRecord {
        UserRecord {
            uid,
            email: email.to_string(),
            generation: 0,
            client_state: String::new(),
            keys_changed_at: Some(1234),
            nodeid: 1,
            created_at: 1_700_000_000_000,
            replaced_at,
        }
    }

    #[tokio::test]
    async fn test_in_memory_lookup() {
        let directory = InMemoryUserDirectory::new();
        directory.insert(user(7, "a@example.com", None));

        assert_eq!(directory.get_user(7).await.unwrap().unwrap().uid, 7);
        assert!(directory.get_user(8).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_replaces_row_with_same_uid() {
        let directory = InMemoryUserDirectory::new();
        directory.insert(user(1, "a@example.com", None));
        directory.insert(user(1, "a@example.com", Some(10)));

        let row = directory.get_user(1).await.unwrap().unwrap();
        assert_eq!(row.replaced_at, Some(10));
    }

    #[tokio::test]
    async fn test_no_database_url_means_no_directory() {
        assert!(connect_from_config(None, Duration::from_secs(1)).await.unwrap().is_none());
        assert!(
            connect_from_config(Some(""), Duration::from_secs(1))
                .await
                .unwrap()
                .is_none()
        );
    }
}
