use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::{
    ChainResult, Dataset, DatasetStatus, ResponseRow, SentimentLabel, SourceKind,
};

/// SQLite-backed row store for datasets and response rows.
///
/// The connection sits behind a mutex so one `Storage` can be shared by
/// concurrent `advance()` calls; the claim primitive additionally runs as a
/// single conditional UPDATE so overlapping claims are impossible even
/// across processes sharing the database file.
pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_db()?;
        Ok(storage)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_db()?;
        Ok(storage)
    }

    fn init_db(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS datasets (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                source TEXT NOT NULL,
                columns_json TEXT NOT NULL,
                total_rows INTEGER NOT NULL,
                analyzed_rows INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'processing',
                summary TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS responses (
                id INTEGER PRIMARY KEY,
                dataset_id INTEGER NOT NULL REFERENCES datasets(id) ON DELETE CASCADE,
                row_index INTEGER NOT NULL,
                fields_json TEXT NOT NULL,
                respondent TEXT,
                sentiment_label TEXT,
                sentiment_score REAL,
                confidence REAL,
                provider TEXT,
                question_sentiments_json TEXT,
                analyzed_at TEXT,
                claim_token TEXT,
                claimed_at TEXT,
                UNIQUE(dataset_id, row_index)
            );

            CREATE INDEX IF NOT EXISTS idx_responses_dataset_id ON responses(dataset_id);
            CREATE INDEX IF NOT EXISTS idx_responses_dataset_row
                ON responses(dataset_id, row_index);
            "#,
        )?;

        Ok(())
    }

    /// Ingestion boundary: insert a dataset and all of its rows in one
    /// transaction. Row creation is all-or-nothing.
    pub fn create_dataset(
        &self,
        title: &str,
        source: SourceKind,
        columns: &[String],
        rows: &[BTreeMap<String, Value>],
    ) -> Result<i64> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        tx.execute(
            r#"
            INSERT INTO datasets (title, source, columns_json, total_rows, analyzed_rows, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, 0, 'processing', ?5, ?5)
            "#,
            params![
                title,
                source.to_string(),
                serde_json::to_string(columns)?,
                rows.len() as u32,
                now,
            ],
        )?;

        let dataset_id = tx.last_insert_rowid();

        for (index, fields) in rows.iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO responses (dataset_id, row_index, fields_json, respondent)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![
                    dataset_id,
                    index as u32,
                    serde_json::to_string(fields)?,
                    detect_respondent(fields),
                ],
            )?;
        }

        tx.commit()?;
        Ok(dataset_id)
    }

    pub fn get_dataset(&self, id: i64) -> Result<Option<Dataset>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, title, source, columns_json, total_rows, analyzed_rows, status, summary, created_at, updated_at
             FROM datasets WHERE id = ?1",
            params![id],
            map_dataset,
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn list_datasets(&self) -> Result<Vec<Dataset>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, title, source, columns_json, total_rows, analyzed_rows, status, summary, created_at, updated_at
             FROM datasets ORDER BY created_at DESC",
        )?;

        let datasets = stmt.query_map([], map_dataset)?;
        datasets
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Deletes the dataset and, via the FK cascade, all of its rows.
    pub fn delete_dataset(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute("DELETE FROM datasets WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    /// Ingestion boundary: marks an unrecoverable ingestion error. Only a
    /// processing dataset can fail; terminal states never move backward.
    pub fn mark_failed(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE datasets SET status = 'failed', updated_at = ?1 WHERE id = ?2 AND status = 'processing'",
            params![Utc::now().to_rfc3339(), id],
        )?;
        if changed == 0 {
            return Err(Error::InvalidDatasetState(format!(
                "dataset {} is not in processing state",
                id
            )));
        }
        Ok(())
    }

    /// Atomically claim up to `limit` unanalyzed rows, lowest row_index
    /// first. Rows already claimed by a live claim are skipped; claims older
    /// than `claim_timeout_secs` are considered abandoned and reclaimed.
    pub fn claim_batch(
        &self,
        dataset_id: i64,
        limit: u32,
        claim_token: &str,
        claim_timeout_secs: u64,
    ) -> Result<Vec<ResponseRow>> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let now = Utc::now();
        let stale_before = (now - Duration::seconds(claim_timeout_secs as i64)).to_rfc3339();

        tx.execute(
            r#"
            UPDATE responses SET claim_token = ?1, claimed_at = ?2
            WHERE id IN (
                SELECT id FROM responses
                WHERE dataset_id = ?3
                  AND sentiment_label IS NULL
                  AND (claim_token IS NULL OR claimed_at < ?4)
                ORDER BY row_index ASC
                LIMIT ?5
            )
            "#,
            params![claim_token, now.to_rfc3339(), dataset_id, stale_before, limit],
        )?;

        let rows = {
            let mut stmt = tx.prepare(
                "SELECT id, dataset_id, row_index, fields_json, respondent, sentiment_label,
                        sentiment_score, confidence, provider, question_sentiments_json, analyzed_at
                 FROM responses WHERE claim_token = ?1 ORDER BY row_index ASC",
            )?;
            let mapped = stmt.query_map(params![claim_token], map_response)?;
            mapped.collect::<std::result::Result<Vec<_>, _>>()?
        };

        tx.commit()?;
        Ok(rows)
    }

    /// Persist a classification on a claimed row and clear the claim.
    /// Refuses to overwrite an already-analyzed row; returns whether the
    /// write landed.
    pub fn store_result(
        &self,
        row_id: i64,
        result: &ChainResult,
        question_sentiments: &BTreeMap<String, SentimentLabel>,
        analyzed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            r#"
            UPDATE responses
            SET sentiment_label = ?1, sentiment_score = ?2, confidence = ?3,
                provider = ?4, question_sentiments_json = ?5, analyzed_at = ?6,
                claim_token = NULL, claimed_at = NULL
            WHERE id = ?7 AND sentiment_label IS NULL
            "#,
            params![
                result.label.to_string(),
                result.score,
                result.confidence,
                result.provider,
                serde_json::to_string(question_sentiments)?,
                analyzed_at.to_rfc3339(),
                row_id,
            ],
        )?;
        Ok(changed > 0)
    }

    /// Return a row to the unanalyzed pool after a row-scoped failure.
    pub fn release_claim(&self, row_id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE responses SET claim_token = NULL, claimed_at = NULL WHERE id = ?1 AND sentiment_label IS NULL",
            params![row_id],
        )?;
        Ok(())
    }

    /// Progress accounting after a batch: refresh `analyzed_rows` and flip to
    /// completed when the dataset is full. The count comes from the rows
    /// themselves rather than a running increment, so accounting stays
    /// correct even if an earlier caller died between persisting rows and
    /// reaching this call. The refresh and the transition share one
    /// transaction.
    pub fn finish_batch(&self, dataset_id: i64) -> Result<Dataset> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        tx.execute(
            "UPDATE datasets SET analyzed_rows = (
                 SELECT COUNT(*) FROM responses
                 WHERE dataset_id = ?1 AND sentiment_label IS NOT NULL
             ), updated_at = ?2
             WHERE id = ?1",
            params![dataset_id, now],
        )?;

        let completed = tx.execute(
            "UPDATE datasets SET status = 'completed', updated_at = ?1
             WHERE id = ?2 AND status = 'processing' AND analyzed_rows >= total_rows",
            params![now, dataset_id],
        )?;

        if completed > 0 {
            let summary = build_summary(&tx, dataset_id)?;
            tx.execute(
                "UPDATE datasets SET summary = ?1 WHERE id = ?2",
                params![summary, dataset_id],
            )?;
        }

        let dataset = tx
            .query_row(
                "SELECT id, title, source, columns_json, total_rows, analyzed_rows, status, summary, created_at, updated_at
                 FROM datasets WHERE id = ?1",
                params![dataset_id],
                map_dataset,
            )
            .optional()?
            .ok_or(Error::DatasetNotFound(dataset_id))?;

        tx.commit()?;
        Ok(dataset)
    }

    /// Re-analyze reset: clears every row's analysis fields and returns the
    /// dataset to processing with zero progress.
    pub fn reset_analysis(&self, dataset_id: i64) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        let changed = tx.execute(
            "UPDATE datasets SET analyzed_rows = 0, status = 'processing', summary = NULL, updated_at = ?1 WHERE id = ?2",
            params![now, dataset_id],
        )?;
        if changed == 0 {
            return Err(Error::DatasetNotFound(dataset_id));
        }

        tx.execute(
            r#"
            UPDATE responses
            SET sentiment_label = NULL, sentiment_score = NULL, confidence = NULL,
                provider = NULL, question_sentiments_json = NULL, analyzed_at = NULL,
                claim_token = NULL, claimed_at = NULL
            WHERE dataset_id = ?1
            "#,
            params![dataset_id],
        )?;

        tx.commit()?;
        Ok(())
    }

    pub fn get_rows(&self, dataset_id: i64) -> Result<Vec<ResponseRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, dataset_id, row_index, fields_json, respondent, sentiment_label,
                    sentiment_score, confidence, provider, question_sentiments_json, analyzed_at
             FROM responses WHERE dataset_id = ?1 ORDER BY row_index ASC",
        )?;

        let rows = stmt.query_map(params![dataset_id], map_response)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Label frequencies over analyzed rows, for the aggregator and the
    /// completion summary.
    pub fn count_labels(&self, dataset_id: i64) -> Result<BTreeMap<String, u32>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT sentiment_label, COUNT(*) FROM responses
             WHERE dataset_id = ?1 AND sentiment_label IS NOT NULL
             GROUP BY sentiment_label",
        )?;

        let counts = stmt.query_map(params![dataset_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
        })?;

        counts
            .collect::<std::result::Result<BTreeMap<_, _>, _>>()
            .map_err(Into::into)
    }
}

fn detect_respondent(fields: &BTreeMap<String, Value>) -> Option<String> {
    for candidate in ["respondent", "name", "email"] {
        let found = fields.iter().find_map(|(key, value)| {
            if key.trim().to_lowercase() == candidate {
                match value {
                    Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                    _ => None,
                }
            } else {
                None
            }
        });
        if found.is_some() {
            return found;
        }
    }
    None
}

fn build_summary(conn: &Connection, dataset_id: i64) -> rusqlite::Result<String> {
    let mut stmt = conn.prepare(
        "SELECT sentiment_label, COUNT(*) FROM responses
         WHERE dataset_id = ?1 AND sentiment_label IS NOT NULL
         GROUP BY sentiment_label",
    )?;
    let counts: Vec<(String, u32)> = stmt
        .query_map(params![dataset_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let total: u32 = counts.iter().map(|(_, c)| c).sum();
    if total == 0 {
        return Ok("0 responses analyzed".to_string());
    }

    let pct = |label: &str| -> u32 {
        let count = counts
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, c)| *c)
            .unwrap_or(0);
        (count * 100 + total / 2) / total
    };

    Ok(format!(
        "{} responses: {}% positive, {}% neutral, {}% negative",
        total,
        pct("Positive"),
        pct("Neutral"),
        pct("Negative"),
    ))
}

fn map_dataset(row: &rusqlite::Row<'_>) -> rusqlite::Result<Dataset> {
    let source_str: String = row.get(2)?;
    let columns_json: String = row.get(3)?;
    let status_str: String = row.get(6)?;
    let created_at_str: String = row.get(8)?;
    let updated_at_str: String = row.get(9)?;

    Ok(Dataset {
        id: row.get(0)?,
        title: row.get(1)?,
        source: SourceKind::parse(&source_str).unwrap_or(SourceKind::Csv),
        columns: serde_json::from_str(&columns_json).unwrap_or_default(),
        total_rows: row.get(4)?,
        analyzed_rows: row.get(5)?,
        status: DatasetStatus::parse(&status_str).unwrap_or(DatasetStatus::Processing),
        summary: row.get(7)?,
        created_at: parse_timestamp(&created_at_str),
        updated_at: parse_timestamp(&updated_at_str),
    })
}

fn map_response(row: &rusqlite::Row<'_>) -> rusqlite::Result<ResponseRow> {
    let fields_json: String = row.get(3)?;
    let label_str: Option<String> = row.get(5)?;
    let breakdown_json: Option<String> = row.get(9)?;
    let analyzed_at_str: Option<String> = row.get(10)?;

    Ok(ResponseRow {
        id: row.get(0)?,
        dataset_id: row.get(1)?,
        row_index: row.get(2)?,
        fields: serde_json::from_str(&fields_json).unwrap_or_default(),
        respondent: row.get(4)?,
        sentiment_label: label_str.as_deref().and_then(SentimentLabel::parse),
        sentiment_score: row.get(6)?,
        confidence: row.get(7)?,
        provider: row.get(8)?,
        question_sentiments: breakdown_json
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok()),
        analyzed_at: analyzed_at_str.as_deref().map(parse_timestamp),
    })
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
