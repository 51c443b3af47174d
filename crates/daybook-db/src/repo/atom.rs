use std::collections::HashSet;

use chrono::{DateTime, Utc};
use daybook_core::error::{DaybookError, Result};
use daybook_core::model::{Category, FilterMode, MessageAtom, Role, RoleValue};
use sqlx::{PgExecutor, Row};

pub struct NewAtom {
    pub atom_stable_id: String,
    pub source: String,
    pub source_conversation_id: Option<String>,
    pub source_message_id: Option<String>,
    pub timestamp_utc: DateTime<Utc>,
    pub day_date: String,
    pub role: Role,
    pub text: String,
    pub text_hash: String,
    pub import_batch_id: String,
}

pub struct AtomRepo;

impl AtomRepo {
    /// Returns the subset of `candidate_ids` already present, so ingest can
    /// skip them before starting its insert transaction.
    pub async fn existing_ids<'e, E>(
        executor: E,
        candidate_ids: &[String],
    ) -> Result<HashSet<String>>
    where
        E: PgExecutor<'e>,
    {
        let rows = sqlx::query(
            "SELECT atom_stable_id FROM message_atoms WHERE atom_stable_id = ANY($1)",
        )
        .bind(candidate_ids)
        .fetch_all(executor)
        .await
        .map_err(|e| DaybookError::Database(e.to_string()))?;

        rows.iter()
            .map(|r| {
                r.try_get::<String, _>("atom_stable_id")
                    .map_err(|e| DaybookError::Database(e.to_string()))
            })
            .collect()
    }

    /// Inserts new atoms, ignoring any that already exist (duplicate-safe:
    /// the primary key makes this idempotent even under a racing concurrent
    /// import of the same export file). Returns how many rows were actually
    /// inserted.
    ///
    /// Takes a connection (not a generic executor) because it issues one
    /// statement per atom inside the caller's transaction, and a bare
    /// `&mut PgConnection` can be cheaply reborrowed each iteration where a
    /// generic `PgExecutor` parameter could not.
    pub async fn insert_many(
        conn: &mut sqlx::PgConnection,
        atoms: &[NewAtom],
    ) -> Result<u64> {
        if atoms.is_empty() {
            return Ok(0);
        }

        let mut inserted = 0u64;
        // sqlx doesn't support a portable bulk-VALUES bind list without a
        // macro here, so atoms are inserted one at a time inside the
        // caller's transaction; ON CONFLICT DO NOTHING keeps it duplicate-safe.
        for atom in atoms {
            let result = sqlx::query(
                "INSERT INTO message_atoms
                    (atom_stable_id, source, source_conversation_id, source_message_id,
                     timestamp_utc, day_date, role, text, text_hash, import_batch_id)
                 VALUES ($1, $2, $3, $4, $5, $6::date, $7, $8, $9, $10::uuid)
                 ON CONFLICT (atom_stable_id) DO NOTHING",
            )
            .bind(&atom.atom_stable_id)
            .bind(&atom.source)
            .bind(&atom.source_conversation_id)
            .bind(&atom.source_message_id)
            .bind(atom.timestamp_utc)
            .bind(&atom.day_date)
            .bind(atom.role.as_str())
            .bind(&atom.text)
            .bind(&atom.text_hash)
            .bind(&atom.import_batch_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| DaybookError::Database(e.to_string()))?;
            inserted += result.rows_affected();
        }

        Ok(inserted)
    }

    /// Calendar dates within `[start_date, end_date]` (inclusive) having at
    /// least one role=user atom in one of `batch_ids`, from `sources`, with
    /// a label for `(model, prompt_version_id)` passing `filter_mode` /
    /// `filter_categories`.
    #[allow(clippy::too_many_arguments)]
    pub async fn eligible_day_dates<'e, E>(
        executor: E,
        batch_ids: &[String],
        sources: &[String],
        start_date: &str,
        end_date: &str,
        model: &str,
        prompt_version_id: &str,
        filter_mode: FilterMode,
        filter_categories: &[String],
    ) -> Result<Vec<String>>
    where
        E: PgExecutor<'e>,
    {
        let negate = matches!(filter_mode, FilterMode::Exclude);
        let rows = sqlx::query(
            "SELECT DISTINCT a.day_date::text AS day_date
             FROM message_atoms a
             JOIN message_labels l
               ON l.atom_stable_id = a.atom_stable_id
              AND l.model = $5
              AND l.prompt_version_id = $6::uuid
             WHERE a.import_batch_id = ANY($1::uuid[])
               AND a.source = ANY($2)
               AND a.role = 'user'
               AND a.day_date BETWEEN $3::date AND $4::date
               AND (CASE WHEN $8 THEN l.category <> ALL($7) ELSE l.category = ANY($7) END)
             ORDER BY day_date",
        )
        .bind(batch_ids)
        .bind(sources)
        .bind(start_date)
        .bind(end_date)
        .bind(model)
        .bind(prompt_version_id)
        .bind(filter_categories)
        .bind(negate)
        .fetch_all(executor)
        .await
        .map_err(|e| DaybookError::Database(e.to_string()))?;

        rows.iter()
            .map(|r| {
                r.try_get::<String, _>("day_date")
                    .map_err(|e| DaybookError::Database(e.to_string()))
            })
            .collect()
    }

    /// Loads role=user atoms for one day, across `batch_ids`/`sources`,
    /// filtered by label, ordered `source ASC, timestampUtc ASC, role ASC,
    /// atomStableId ASC` per the bundle builder's ordering contract.
    #[allow(clippy::too_many_arguments)]
    pub async fn load_bundle_atoms<'e, E>(
        executor: E,
        batch_ids: &[String],
        day_date: &str,
        sources: &[String],
        model: &str,
        prompt_version_id: &str,
        filter_mode: FilterMode,
        filter_categories: &[String],
    ) -> Result<Vec<MessageAtom>>
    where
        E: PgExecutor<'e>,
    {
        let negate = matches!(filter_mode, FilterMode::Exclude);
        let rows = sqlx::query(
            "SELECT a.atom_stable_id, a.source, a.source_conversation_id,
                    a.source_message_id, a.timestamp_utc, a.day_date::text AS day_date,
                    a.role, a.text, a.text_hash, a.import_batch_id::text AS import_batch_id
             FROM message_atoms a
             JOIN message_labels l
               ON l.atom_stable_id = a.atom_stable_id
              AND l.model = $5
              AND l.prompt_version_id = $6::uuid
             WHERE a.import_batch_id = ANY($1::uuid[])
               AND a.day_date = $2::date
               AND a.source = ANY($3)
               AND a.role = 'user'
               AND (CASE WHEN $8 THEN l.category <> ALL($7) ELSE l.category = ANY($7) END)
             ORDER BY a.source ASC, a.timestamp_utc ASC, a.role ASC, a.atom_stable_id ASC",
        )
        .bind(batch_ids)
        .bind(day_date)
        .bind(sources)
        .bind(model)
        .bind(prompt_version_id)
        .bind(filter_categories)
        .bind(negate)
        .fetch_all(executor)
        .await
        .map_err(|e| DaybookError::Database(e.to_string()))?;

        rows.iter().map(row_to_atom).collect()
    }

    /// Loads every atom for a day across `batch_ids`, regardless of label,
    /// in §9.1 order — used by the export renderer's atoms view.
    pub async fn load_day_atoms<'e, E>(
        executor: E,
        batch_ids: &[String],
        day_date: &str,
    ) -> Result<Vec<MessageAtom>>
    where
        E: PgExecutor<'e>,
    {
        let rows = sqlx::query(
            "SELECT atom_stable_id, source, source_conversation_id,
                    source_message_id, timestamp_utc, day_date::text AS day_date,
                    role, text, text_hash, import_batch_id::text AS import_batch_id
             FROM message_atoms
             WHERE import_batch_id = ANY($1::uuid[]) AND day_date = $2::date
             ORDER BY source ASC, timestamp_utc ASC, role ASC, atom_stable_id ASC",
        )
        .bind(batch_ids)
        .bind(day_date)
        .fetch_all(executor)
        .await
        .map_err(|e| DaybookError::Database(e.to_string()))?;

        rows.iter().map(row_to_atom).collect()
    }

    /// Unlabeled-atom keyset page for the classify pipeline: atoms in
    /// `import_batch_id` lacking a label for `(model, prompt_version_id)`,
    /// ordered by atom_stable_id, cursor on the last-seen id.
    pub async fn unlabeled_page<'e, E>(
        executor: E,
        import_batch_id: &str,
        model: &str,
        prompt_version_id: &str,
        after_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<MessageAtom>>
    where
        E: PgExecutor<'e>,
    {
        let rows = sqlx::query(
            "SELECT a.atom_stable_id, a.source, a.source_conversation_id,
                    a.source_message_id, a.timestamp_utc, a.day_date::text AS day_date,
                    a.role, a.text, a.text_hash, a.import_batch_id::text AS import_batch_id
             FROM message_atoms a
             WHERE a.import_batch_id = $1::uuid
               AND a.atom_stable_id > COALESCE($2, '')
               AND NOT EXISTS (
                   SELECT 1 FROM message_labels l
                   WHERE l.atom_stable_id = a.atom_stable_id
                     AND l.model = $3 AND l.prompt_version_id = $4::uuid
               )
             ORDER BY a.atom_stable_id ASC
             LIMIT $5",
        )
        .bind(import_batch_id)
        .bind(after_id)
        .bind(model)
        .bind(prompt_version_id)
        .bind(limit)
        .fetch_all(executor)
        .await
        .map_err(|e| DaybookError::Database(e.to_string()))?;

        rows.iter().map(row_to_atom).collect()
    }

    pub async fn category_for_atom<'e, E>(
        executor: E,
        atom_stable_id: &str,
        model: &str,
        prompt_version_id: &str,
    ) -> Result<Option<Category>>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query(
            "SELECT category FROM message_labels
             WHERE atom_stable_id = $1 AND model = $2 AND prompt_version_id = $3::uuid",
        )
        .bind(atom_stable_id)
        .bind(model)
        .bind(prompt_version_id)
        .fetch_optional(executor)
        .await
        .map_err(|e| DaybookError::Database(e.to_string()))?;

        match row {
            Some(r) => {
                let category: String =
                    r.try_get("category").map_err(|e| DaybookError::Database(e.to_string()))?;
                Ok(Category::from_str_upper(&category))
            }
            None => Ok(None),
        }
    }
}

fn row_to_atom(row: &sqlx::postgres::PgRow) -> Result<MessageAtom> {
    let role_str: String = row.try_get("role").map_err(|e| DaybookError::Database(e.to_string()))?;
    let role: Role = role_str
        .parse()
        .map_err(|_| DaybookError::Database(format!("invalid role in row: {role_str}")))?;

    Ok(MessageAtom {
        atom_stable_id: row
            .try_get("atom_stable_id")
            .map_err(|e| DaybookError::Database(e.to_string()))?,
        source: row.try_get("source").map_err(|e| DaybookError::Database(e.to_string()))?,
        source_conversation_id: row
            .try_get("source_conversation_id")
            .map_err(|e| DaybookError::Database(e.to_string()))?,
        source_message_id: row
            .try_get("source_message_id")
            .map_err(|e| DaybookError::Database(e.to_string()))?,
        timestamp_utc: row
            .try_get("timestamp_utc")
            .map_err(|e| DaybookError::Database(e.to_string()))?,
        day_date: row.try_get("day_date").map_err(|e| DaybookError::Database(e.to_string()))?,
        role: RoleValue(role),
        text: row.try_get("text").map_err(|e| DaybookError::Database(e.to_string()))?,
        text_hash: row.try_get("text_hash").map_err(|e| DaybookError::Database(e.to_string()))?,
        import_batch_id: row
            .try_get("import_batch_id")
            .map_err(|e| DaybookError::Database(e.to_string()))?,
    })
}
