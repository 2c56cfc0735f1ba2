// SPDX-FileCopyrightText: 2026 Notifier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retrying store client.
//!
//! Every operation takes a closure that runs inside one SQLite transaction on
//! the database's background thread. The transaction commits only when the
//! closure returns `Ok`. Each attempt is bounded by `op_timeout`; `*_retry`
//! variants re-run the closure after transient failures, pausing and
//! refreshing the connection in between.

use std::sync::Arc;
use std::time::Duration;

use notifier_config::model::StorageConfig;
use rusqlite::{Transaction, TransactionBehavior};
use tracing::{info, warn};

use crate::database::Database;
use crate::error::{StoreError, map_tr_err};

/// Handle shared by the SQLite queues. Cheap to clone.
#[derive(Clone)]
pub struct StoreClient {
    db: Arc<Database>,
    retries_num: u32,
    retries_interval: Duration,
    op_timeout: Duration,
}

impl StoreClient {
    pub fn new(db: Arc<Database>, config: &StorageConfig) -> Self {
        Self::with_policy(
            db,
            config.retries_num,
            config.retries_interval(),
            config.op_timeout(),
        )
    }

    pub fn with_policy(
        db: Arc<Database>,
        retries_num: u32,
        retries_interval: Duration,
        op_timeout: Duration,
    ) -> Self {
        Self {
            db,
            retries_num,
            retries_interval,
            op_timeout,
        }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Insert-or-update. A uniqueness violation surfaces as
    /// [`StoreError::DuplicateKey`].
    pub async fn upsert<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Fn(&Transaction<'_>) -> Result<T, StoreError> + Send + Sync + 'static,
        T: Send + 'static,
    {
        self.execute("upsert", false, op).await
    }

    pub async fn upsert_retry<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Fn(&Transaction<'_>) -> Result<T, StoreError> + Send + Sync + 'static,
        T: Send + 'static,
    {
        self.execute("upsert", true, op).await
    }

    /// Atomically selects and mutates one row. `None` from the closure means
    /// nothing matched and becomes [`StoreError::NotFound`].
    pub async fn find_and_modify<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Fn(&Transaction<'_>) -> Result<Option<T>, StoreError> + Send + Sync + 'static,
        T: Send + 'static,
    {
        self.execute("find_and_modify", false, move |tx: &Transaction<'_>| {
            op(tx)?.ok_or(StoreError::NotFound)
        })
        .await
    }

    pub async fn find_and_modify_retry<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Fn(&Transaction<'_>) -> Result<Option<T>, StoreError> + Send + Sync + 'static,
        T: Send + 'static,
    {
        self.execute("find_and_modify", true, move |tx: &Transaction<'_>| {
            op(tx)?.ok_or(StoreError::NotFound)
        })
        .await
    }

    /// Runs a conditional update. The closure returns the number of rows it
    /// changed; zero becomes [`StoreError::NotFound`].
    pub async fn update<F>(&self, op: F) -> Result<(), StoreError>
    where
        F: Fn(&Transaction<'_>) -> Result<usize, StoreError> + Send + Sync + 'static,
    {
        self.execute("update", false, require_match(op)).await
    }

    pub async fn update_retry<F>(&self, op: F) -> Result<(), StoreError>
    where
        F: Fn(&Transaction<'_>) -> Result<usize, StoreError> + Send + Sync + 'static,
    {
        self.execute("update", true, require_match(op)).await
    }

    pub async fn insert<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Fn(&Transaction<'_>) -> Result<T, StoreError> + Send + Sync + 'static,
        T: Send + 'static,
    {
        self.execute("insert", false, op).await
    }

    pub async fn insert_retry<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Fn(&Transaction<'_>) -> Result<T, StoreError> + Send + Sync + 'static,
        T: Send + 'static,
    {
        self.execute("insert", true, op).await
    }

    /// Deletes rows and returns how many went away. Always retried.
    pub async fn remove<F>(&self, op: F) -> Result<u64, StoreError>
    where
        F: Fn(&Transaction<'_>) -> Result<usize, StoreError> + Send + Sync + 'static,
    {
        self.execute("remove", true, move |tx: &Transaction<'_>| {
            Ok(op(tx)? as u64)
        })
        .await
    }

    /// Read-only access, retried like the other idempotent operations.
    pub async fn query<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Fn(&Transaction<'_>) -> Result<T, StoreError> + Send + Sync + 'static,
        T: Send + 'static,
    {
        self.execute("query", true, op).await
    }

    /// Creates an index on `table(keys...)` unless it already exists.
    ///
    /// A sparse index only covers rows where every key is non-null, so with
    /// `unique` several rows may leave the keys unset.
    pub async fn create_index(
        &self,
        table: &str,
        unique: bool,
        sparse: bool,
        keys: &[&str],
    ) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Err(StoreError::InvalidRequest(
                "an index needs at least one key".to_string(),
            ));
        }
        if let Some(bad) = std::iter::once(&table)
            .chain(keys)
            .find(|ident| !is_identifier(ident))
        {
            return Err(StoreError::InvalidRequest(format!(
                "`{bad}` is not a valid identifier"
            )));
        }

        let name = format!("idx_{table}_{}", keys.join("_"));
        let mut sql = format!(
            "CREATE {}INDEX IF NOT EXISTS {name} ON {table} ({})",
            if unique { "UNIQUE " } else { "" },
            keys.join(", ")
        );
        if sparse {
            let filter: Vec<String> = keys.iter().map(|k| format!("{k} IS NOT NULL")).collect();
            sql.push_str(" WHERE ");
            sql.push_str(&filter.join(" AND "));
        }

        info!(table, index = %name, unique, sparse, "creating index");
        self.execute("create_index", false, move |tx: &Transaction<'_>| {
            tx.execute_batch(&sql)?;
            Ok(())
        })
        .await
    }

    async fn execute<T, F>(&self, operation: &'static str, retry: bool, op: F) -> Result<T, StoreError>
    where
        F: Fn(&Transaction<'_>) -> Result<T, StoreError> + Send + Sync + 'static,
        T: Send + 'static,
    {
        let op = Arc::new(op);
        let mut attempt: u32 = 0;
        loop {
            let err = match self.attempt(Arc::clone(&op)).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if !retry || err.is_terminal() || attempt >= self.retries_num {
                return Err(err);
            }

            attempt += 1;
            warn!(operation, attempt, error = %err, "store operation failed, retrying");
            tokio::time::sleep(self.retries_interval).await;
            if let Err(e) = self.db.refresh().await {
                warn!(operation, error = %e, "failed to refresh store connection");
            }
        }
    }

    async fn attempt<T, F>(&self, op: Arc<F>) -> Result<T, StoreError>
    where
        F: Fn(&Transaction<'_>) -> Result<T, StoreError> + Send + Sync + 'static,
        T: Send + 'static,
    {
        let conn = self.db.connection();
        let call = conn.call(move |conn| -> Result<T, StoreError> {
            // Immediate so a writer waits on busy_timeout instead of failing
            // when its read lock cannot be upgraded.
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let out = (*op)(&tx)?;
            tx.commit()?;
            Ok(out)
        });
        // A call abandoned on timeout still runs to completion on the
        // background thread and may commit.
        match tokio::time::timeout(self.op_timeout, call).await {
            Ok(result) => result.map_err(map_tr_err),
            Err(_) => Err(StoreError::Timeout(self.op_timeout)),
        }
    }
}

fn require_match<F>(op: F) -> impl Fn(&Transaction<'_>) -> Result<(), StoreError> + Send + Sync + 'static
where
    F: Fn(&Transaction<'_>) -> Result<usize, StoreError> + Send + Sync + 'static,
{
    move |tx: &Transaction<'_>| match op(tx)? {
        0 => Err(StoreError::NotFound),
        _ => Ok(()),
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use rusqlite::{OptionalExtension, params};
    use tracing_test::traced_test;

    use super::*;

    async fn client(retries_num: u32) -> (StoreClient, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.db");
        let db = Database::open_with(path.to_str().unwrap(), true, Duration::from_secs(1))
            .await
            .unwrap();
        let client = StoreClient::with_policy(
            Arc::new(db),
            retries_num,
            Duration::from_millis(1),
            Duration::from_secs(2),
        );
        (client, dir)
    }

    fn insert_notification(tx: &Transaction<'_>, message_id: i64) -> Result<i64, StoreError> {
        tx.execute(
            "INSERT INTO notifications (request_id, text, ready_at, user_id, chat_id, message_id)
             VALUES ('r', 't', 0, 1, 2, ?1)",
            params![message_id],
        )?;
        Ok(tx.last_insert_rowid())
    }

    async fn notification_count(client: &StoreClient) -> i64 {
        client
            .query(|tx| {
                Ok(tx.query_row("SELECT COUNT(*) FROM notifications", [], |r| r.get(0))?)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn insert_commits() {
        let (client, _dir) = client(0).await;
        let id = client.insert(|tx| insert_notification(tx, 1)).await.unwrap();
        assert!(id > 0);
        assert_eq!(notification_count(&client).await, 1);
    }

    #[tokio::test]
    async fn failing_closure_rolls_back() {
        let (client, _dir) = client(0).await;
        let err = client
            .insert(|tx| {
                insert_notification(tx, 1)?;
                Err::<(), _>(StoreError::InvalidRequest("abort".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidRequest(_)));
        assert_eq!(notification_count(&client).await, 0);
    }

    #[tokio::test]
    async fn duplicate_key_is_terminal_even_when_retrying() {
        let (client, _dir) = client(3).await;
        client
            .create_index("notifications", true, false, &["user_id", "chat_id", "message_id"])
            .await
            .unwrap();
        client.insert(|tx| insert_notification(tx, 1)).await.unwrap();

        let attempts = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&attempts);
        let err = client
            .insert_retry(move |tx| {
                seen.fetch_add(1, Ordering::SeqCst);
                insert_notification(tx, 1)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn transient_errors_are_retried_until_success() {
        let (client, _dir) = client(3).await;
        let attempts = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&attempts);
        let value = client
            .upsert_retry(move |_tx| {
                if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(StoreError::transient("database is locked"))
                } else {
                    Ok(7)
                }
            })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(logs_contain("store operation failed, retrying"));
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let (client, _dir) = client(2).await;
        let attempts = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&attempts);
        let err = client
            .update_retry(move |_tx| {
                seen.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::transient("disk I/O error"))
            })
            .await
            .unwrap_err();
        assert!(err.is_retriable());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retrying_variant_surfaces_first_error() {
        let (client, _dir) = client(5).await;
        let attempts = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&attempts);
        let err = client
            .upsert(move |_tx| {
                seen.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(StoreError::transient("busy"))
            })
            .await
            .unwrap_err();
        assert!(err.is_retriable());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn update_without_match_is_not_found() {
        let (client, _dir) = client(1).await;
        let err = client
            .update_retry(|tx| {
                Ok(tx.execute(
                    "UPDATE message_buckets SET processing_id = NULL WHERE processing_id = 'x'",
                    [],
                )?)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn find_and_modify_none_is_not_found() {
        let (client, _dir) = client(0).await;
        let err = client
            .find_and_modify(|_tx| Ok(None::<i64>))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn find_and_modify_retry_survives_transient_errors() {
        let (client, _dir) = client(3).await;
        let id = client.insert(|tx| insert_notification(tx, 1)).await.unwrap();

        let attempts = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&attempts);
        let taken = client
            .find_and_modify_retry(move |tx| {
                if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(StoreError::transient("database is locked"));
                }
                Ok(tx
                    .query_row(
                        "DELETE FROM notifications WHERE id = ?1 RETURNING message_id",
                        params![id],
                        |r| r.get::<_, i64>(0),
                    )
                    .optional()?)
            })
            .await
            .unwrap();
        assert_eq!(taken, 1);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(notification_count(&client).await, 0);

        // NotFound is terminal, so an empty selection is not retried.
        let attempts = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&attempts);
        let err = client
            .find_and_modify_retry(move |_tx| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(None::<i64>)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn remove_reports_count() {
        let (client, _dir) = client(0).await;
        for id in 1..=3 {
            client.insert(move |tx| insert_notification(tx, id)).await.unwrap();
        }
        let removed = client
            .remove(|tx| Ok(tx.execute("DELETE FROM notifications WHERE message_id < 3", [])?))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(notification_count(&client).await, 1);
    }

    #[tokio::test]
    async fn slow_attempt_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slow.db");
        let db = Database::open_with(path.to_str().unwrap(), true, Duration::from_secs(1))
            .await
            .unwrap();
        let client = StoreClient::with_policy(
            Arc::new(db),
            0,
            Duration::from_millis(1),
            Duration::from_millis(20),
        );
        let err = client
            .insert(|_tx| {
                std::thread::sleep(Duration::from_millis(200));
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Timeout(d) if d == Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn create_index_rejects_bad_identifiers() {
        let (client, _dir) = client(0).await;
        let err = client
            .create_index("notifications; DROP TABLE x", false, false, &["ready_at"])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidRequest(_)));

        let err = client
            .create_index("notifications", false, false, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn sparse_unique_index_allows_many_nulls() {
        let (client, _dir) = client(0).await;
        client
            .create_index("message_buckets", true, true, &["processing_id"])
            .await
            .unwrap();
        // Creating it twice is fine.
        client
            .create_index("message_buckets", true, true, &["processing_id"])
            .await
            .unwrap();

        client
            .insert(|tx| {
                tx.execute("INSERT INTO message_buckets (chat_id) VALUES (1), (2)", [])?;
                Ok(())
            })
            .await
            .unwrap();
        client
            .update(|tx| {
                Ok(tx.execute(
                    "UPDATE message_buckets SET processing_id = 'a' WHERE chat_id = 1",
                    [],
                )?)
            })
            .await
            .unwrap();
        let err = client
            .update(|tx| {
                Ok(tx.execute(
                    "UPDATE message_buckets SET processing_id = 'a' WHERE chat_id = 2",
                    [],
                )?)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey));
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("head_created_at"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier("a.b"));
        assert!(!is_identifier(""));
    }
}
