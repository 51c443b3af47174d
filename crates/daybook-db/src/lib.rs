pub mod advisory_lock;
pub mod repo;

use daybook_core::error::{DaybookError, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};

/// Wraps the two pools the pipeline needs: the ordinary query pool, and a
/// single-connection pool dedicated to advisory locks. These must be
/// separate — a session-scoped advisory lock acquired on one connection and
/// released on another is simply a no-op release, so the lock pool is kept
/// at `max_connections(1)` and never shared with ordinary queries.
#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
    pub lock_pool: PgPool,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| DaybookError::Database(e.to_string()))?;

        let lock_pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await
            .map_err(|e| DaybookError::Database(e.to_string()))?;

        Ok(Database { pool, lock_pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DaybookError::Database(e.to_string()))
    }
}

/// Derives a stable 64-bit key for `pg_try_advisory_lock` from a runId.
/// Two different runIds collide only in the astronomically unlikely case of
/// a SHA-256 truncation collision, which is an acceptable risk for a
/// liveness lock (worst case: two runs briefly refuse to tick concurrently).
#[must_use]
pub fn stable_lock_key(run_id: &str) -> i64 {
    let digest = daybook_hash::sha256(run_id);
    let bytes = &digest.as_bytes()[0..16];
    let hex = std::str::from_utf8(bytes).unwrap_or("0000000000000000");
    i64::from_str_radix(hex, 16).unwrap_or(0)
}
