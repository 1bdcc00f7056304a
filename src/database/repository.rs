/*!
 * Repository layer for database operations.
 *
 * Runs, their checkpointed stage rows and the durable completion cache.
 */

use anyhow::Result;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};

use super::connection::DatabaseConnection;
use super::models::{RunRecord, Stage, StageRow};
use crate::completion::CacheStore;

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    db: DatabaseConnection,
}

impl Repository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with the default database location
    pub fn new_default() -> Result<Self> {
        let db = DatabaseConnection::new_default()?;
        Ok(Self::new(db))
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// SHA-256 hex digest used to recognise a transcript
    pub fn hash_text(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    // =========================================================================
    // Run Operations
    // =========================================================================

    pub async fn create_run(&self, run: &RunRecord) -> Result<()> {
        let run = run.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO runs (id, transcript_hash, source_language, target_language, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                    params![
                        run.id,
                        run.transcript_hash,
                        run.source_language,
                        run.target_language,
                        run.created_at,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get_run(&self, run_id: &str) -> Result<Option<RunRecord>> {
        let run_id = run_id.to_string();

        self.db
            .execute_async(move |conn| {
                let run = conn
                    .query_row(
                        r#"
                        SELECT id, transcript_hash, source_language, target_language, created_at
                        FROM runs WHERE id = ?1
                        "#,
                        [&run_id],
                        |row| {
                            Ok(RunRecord {
                                id: row.get(0)?,
                                transcript_hash: row.get(1)?,
                                source_language: row.get(2)?,
                                target_language: row.get(3)?,
                                created_at: row.get(4)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(run)
            })
            .await
    }

    pub async fn delete_run(&self, run_id: &str) -> Result<()> {
        let run_id = run_id.to_string();

        self.db
            .execute_async(move |conn| {
                conn.execute("DELETE FROM runs WHERE id = ?1", [&run_id])?;
                Ok(())
            })
            .await
    }

    // =========================================================================
    // Stage Operations
    // =========================================================================

    /// Replace the rows of one stage of a run
    pub async fn save_stage(&self, run_id: &str, stage: Stage, rows: Vec<StageRow>) -> Result<()> {
        let run_id = run_id.to_string();
        debug!("Checkpointing {} rows of stage {} for run {}", rows.len(), stage, run_id);

        self.db
            .transaction_async(move |tx| {
                tx.execute(
                    "DELETE FROM stage_rows WHERE run_id = ?1 AND stage = ?2",
                    params![run_id, stage.to_string()],
                )?;

                let mut stmt = tx.prepare(
                    r#"
                    INSERT INTO stage_rows (run_id, stage, position, id, text, translation, speaker_id, start, "end")
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    "#,
                )?;
                for (position, row) in rows.iter().enumerate() {
                    stmt.execute(params![
                        run_id,
                        stage.to_string(),
                        position as i64,
                        row.id as i64,
                        row.text,
                        row.translation,
                        row.speaker_id,
                        row.start,
                        row.end,
                    ])?;
                }
                Ok(())
            })
            .await
    }

    /// Rows of one stage in saved order; `None` when the stage was never saved
    pub async fn load_stage(&self, run_id: &str, stage: Stage) -> Result<Option<Vec<StageRow>>> {
        let run_id = run_id.to_string();

        let rows = self
            .db
            .execute_async(move |conn| Self::load_stage_sync(conn, &run_id, stage))
            .await?;
        Ok(if rows.is_empty() { None } else { Some(rows) })
    }

    fn load_stage_sync(conn: &Connection, run_id: &str, stage: Stage) -> Result<Vec<StageRow>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT id, text, translation, speaker_id, start, "end"
            FROM stage_rows WHERE run_id = ?1 AND stage = ?2
            ORDER BY position
            "#,
        )?;

        let rows = stmt
            .query_map(params![run_id, stage.to_string()], |row| {
                Ok(StageRow {
                    id: row.get::<_, i64>(0)? as u64,
                    text: row.get(1)?,
                    translation: row.get(2)?,
                    speaker_id: row.get(3)?,
                    start: row.get(4)?,
                    end: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // =========================================================================
    // Completion Cache Operations
    // =========================================================================

    pub fn cached_response(&self, hash: &str) -> Result<Option<String>> {
        self.db.execute(|conn| {
            let response = conn
                .query_row(
                    "SELECT response FROM completion_cache WHERE hash = ?1",
                    [hash],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(response)
        })
    }

    pub fn cache_response(&self, hash: &str, response: &str) -> Result<()> {
        self.db.execute(|conn| {
            conn.execute(
                r#"
                INSERT OR REPLACE INTO completion_cache (hash, response, created_at)
                VALUES (?1, ?2, datetime('now'))
                "#,
                params![hash, response],
            )?;
            Ok(())
        })
    }

    pub async fn clear_cache(&self) -> Result<i64> {
        self.db
            .execute_async(|conn| {
                let deleted = conn.execute("DELETE FROM completion_cache", [])?;
                Ok(deleted as i64)
            })
            .await
    }
}

impl CacheStore for Repository {
    fn load(&self, key: &str) -> Result<Option<String>> {
        self.cached_response(key)
    }

    fn save(&self, key: &str, response: &str) -> Result<()> {
        self.cache_response(key, response)
    }
}
