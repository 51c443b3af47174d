//! Session-scoped Postgres advisory lock, generalizing the acquire/retry/
//! release discipline of a filesystem lock to a database session: acquire
//! is non-blocking (`pg_try_advisory_lock`), and the connection that
//! acquires the lock is the only connection allowed to release it, so the
//! lock always runs against `Database::lock_pool` (capacity 1).

use daybook_core::error::{DaybookError, Result};
use sqlx::postgres::PgPool;
use sqlx::Row;

/// Holds the lock for as long as it is alive; releases on drop via a
/// best-effort synchronous-from-async teardown (errors are logged, never
/// panicked on, since a dropped connection already released the lock at the
/// session level).
pub struct TickLock {
    pool: PgPool,
    key: i64,
    released: bool,
}

impl TickLock {
    /// Attempts to acquire the advisory lock for `run_id`. Returns
    /// `Ok(None)` (not an error) when another tick already holds it — this
    /// is the expected, frequent case, not a failure.
    pub async fn try_acquire(pool: &PgPool, run_id: &str) -> Result<Option<TickLock>> {
        let key = crate::stable_lock_key(run_id);
        let row = sqlx::query("SELECT pg_try_advisory_lock($1) AS acquired")
            .bind(key)
            .fetch_one(pool)
            .await
            .map_err(|e| DaybookError::Database(e.to_string()))?;
        let acquired: bool = row.try_get("acquired").map_err(|e| DaybookError::Database(e.to_string()))?;

        if acquired {
            Ok(Some(TickLock {
                pool: pool.clone(),
                key,
                released: false,
            }))
        } else {
            Ok(None)
        }
    }

    pub async fn release(mut self) -> Result<()> {
        self.release_inner().await
    }

    async fn release_inner(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(self.key)
            .execute(&self.pool)
            .await
            .map_err(|e| DaybookError::Database(e.to_string()))?;
        self.released = true;
        Ok(())
    }
}

impl Drop for TickLock {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let pool = self.pool.clone();
        let key = self.key;
        // Best-effort: a connection drop also ends the session and releases
        // every advisory lock held by it, so an explicit unlock here is a
        // courtesy for pools that recycle connections rather than closing
        // them. Spawn so Drop stays synchronous.
        tokio::spawn(async move {
            let _ = sqlx::query("SELECT pg_advisory_unlock($1)")
                .bind(key)
                .execute(&pool)
                .await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_lock_key_is_deterministic() {
        assert_eq!(crate::stable_lock_key("run-a"), crate::stable_lock_key("run-a"));
        assert_ne!(crate::stable_lock_key("run-a"), crate::stable_lock_key("run-b"));
    }
}
