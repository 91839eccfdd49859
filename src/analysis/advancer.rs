use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::classify::ProviderChain;
use crate::config::AnalyzerConfig;
use crate::error::{Error, Result};
use crate::models::{Dataset, DatasetStatus, ResponseRow, SentimentLabel};
use crate::storage::Storage;

/// Progress report returned by one `advance()` call.
#[derive(Debug, Clone, Serialize)]
pub struct AdvanceReport {
    pub processed: u32,
    pub analyzed_total: u32,
    pub total_rows: u32,
    pub done: bool,
}

/// The resumable unit of work: claims a bounded slice of unanalyzed rows,
/// classifies them, persists results, and reports progress.
///
/// An external driver calls `advance()` repeatedly until `done`. Selection is
/// always "still unanalyzed, lowest row_index first", so a retried or
/// repeated call continues from wherever the previous one left off without
/// any cursor state. Failures are row-scoped: a row that cannot
/// be classified or persisted stays unanalyzed and is retried by a later
/// call.
pub struct BatchAdvancer {
    storage: Arc<Storage>,
    chain: Arc<ProviderChain>,
    config: AnalyzerConfig,
}

impl BatchAdvancer {
    pub fn new(storage: Arc<Storage>, chain: Arc<ProviderChain>, config: AnalyzerConfig) -> Self {
        Self {
            storage,
            chain,
            config,
        }
    }

    pub async fn advance(&self, dataset_id: i64) -> Result<AdvanceReport> {
        let dataset = self
            .storage
            .get_dataset(dataset_id)?
            .ok_or(Error::DatasetNotFound(dataset_id))?;

        // Terminal datasets take no work and see no mutation.
        if dataset.status != DatasetStatus::Processing {
            return Ok(report(&dataset, 0));
        }

        let claim_token = Uuid::new_v4().to_string();
        let rows = self.storage.claim_batch(
            dataset_id,
            self.config.batch_size,
            &claim_token,
            self.config.claim_timeout_secs,
        )?;

        if rows.is_empty() {
            // Nothing claimable: either another caller holds live claims, or
            // every row is analyzed and only the accounting is pending.
            let dataset = self.storage.finish_batch(dataset_id)?;
            return Ok(report(&dataset, 0));
        }

        tracing::info!(
            dataset_id,
            claimed = rows.len(),
            "Advancing dataset by one batch"
        );

        let outcomes = self.classify_batch(&dataset, &rows).await;

        let mut processed = 0u32;
        for (row, outcome) in rows.iter().zip(outcomes) {
            let breakdown = self.question_breakdown(&dataset, row);
            match self
                .storage
                .store_result(row.id, &outcome, &breakdown, Utc::now())
            {
                Ok(true) => processed += 1,
                Ok(false) => {
                    // Lost a race with another writer; that writer accounts
                    // for the row.
                    tracing::warn!(row_index = row.row_index, "Row was already analyzed");
                }
                Err(e) => {
                    tracing::warn!(
                        row_index = row.row_index,
                        "Failed to persist row analysis, will retry later: {}",
                        e
                    );
                    if let Err(release_err) = self.storage.release_claim(row.id) {
                        tracing::warn!(
                            row_index = row.row_index,
                            "Failed to release claim: {}",
                            release_err
                        );
                    }
                }
            }
        }

        let dataset = self.storage.finish_batch(dataset_id)?;
        if dataset.is_done() {
            tracing::info!(dataset_id, "Dataset analysis completed");
        }

        Ok(report(&dataset, processed))
    }

    /// Clears all analysis results and returns the dataset to processing;
    /// subsequent `advance()` calls start over from row 0.
    pub fn reanalyze(&self, dataset_id: i64) -> Result<()> {
        self.storage.reset_analysis(dataset_id)?;
        tracing::info!(dataset_id, "Dataset reset for re-analysis");
        Ok(())
    }

    /// Classify the claimed rows with bounded parallelism. The chain is
    /// total, so every row gets an outcome.
    async fn classify_batch(
        &self,
        dataset: &Dataset,
        rows: &[ResponseRow],
    ) -> Vec<crate::models::ChainResult> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency_limit.max(1)));

        let futures = rows.iter().map(|row| {
            let chain = self.chain.clone();
            let sem = semaphore.clone();
            let text = extract_answer_text(&dataset.columns, row);
            async move {
                // acquire() only fails if the semaphore closes, which we never do
                let _permit = sem.acquire().await;
                chain.classify(&text).await
            }
        });

        join_all(futures).await
    }

    /// Per-question breakdown, rule-derived per answer so each row costs at
    /// most one remote call.
    fn question_breakdown(
        &self,
        dataset: &Dataset,
        row: &ResponseRow,
    ) -> BTreeMap<String, SentimentLabel> {
        let mut breakdown = BTreeMap::new();
        for column in &dataset.columns {
            if let Some(answer) = row.field_text(column) {
                breakdown.insert(column.clone(), self.chain.classify_local(&answer).label);
            }
        }
        breakdown
    }
}

/// Joined non-empty answers in column order; what the classifier sees.
fn extract_answer_text(columns: &[String], row: &ResponseRow) -> String {
    columns
        .iter()
        .filter_map(|column| row.field_text(column))
        .collect::<Vec<_>>()
        .join(". ")
}

fn report(dataset: &Dataset, processed: u32) -> AdvanceReport {
    AdvanceReport {
        processed,
        analyzed_total: dataset.analyzed_rows,
        total_rows: dataset.total_rows,
        done: dataset.is_done(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;
    use serde_json::json;
    use std::collections::BTreeMap as Map;

    fn advancer_with(batch_size: u32) -> (Arc<Storage>, BatchAdvancer) {
        let storage = Arc::new(Storage::in_memory().unwrap());
        // No providers configured: the chain answers rule-only, offline.
        let chain = Arc::new(ProviderChain::new(vec![], 0, 500));
        let config = AnalyzerConfig {
            batch_size,
            cooldown_ms: 0,
            ..AnalyzerConfig::default()
        };
        let advancer = BatchAdvancer::new(storage.clone(), chain, config);
        (storage, advancer)
    }

    fn ingest(storage: &Storage, comments: &[&str]) -> i64 {
        let columns = vec!["comments".to_string()];
        let rows: Vec<Map<String, serde_json::Value>> = comments
            .iter()
            .map(|c| {
                let mut fields = Map::new();
                fields.insert("comments".to_string(), json!(c));
                fields
            })
            .collect();
        storage
            .create_dataset("test", SourceKind::Csv, &columns, &rows)
            .unwrap()
    }

    #[tokio::test]
    async fn batches_converge_to_done() {
        let (storage, advancer) = advancer_with(10);
        let comments: Vec<String> = (0..25).map(|i| format!("comment {}", i)).collect();
        let refs: Vec<&str> = comments.iter().map(String::as_str).collect();
        let id = ingest(&storage, &refs);

        let first = advancer.advance(id).await.unwrap();
        assert_eq!(first.processed, 10);
        assert_eq!(first.analyzed_total, 10);
        assert!(!first.done);

        let second = advancer.advance(id).await.unwrap();
        assert_eq!(second.processed, 10);
        assert_eq!(second.analyzed_total, 20);
        assert!(!second.done);

        let third = advancer.advance(id).await.unwrap();
        assert_eq!(third.processed, 5);
        assert_eq!(third.analyzed_total, 25);
        assert!(third.done);
        assert_eq!(third.total_rows, 25);
    }

    #[tokio::test]
    async fn advance_after_done_is_noop() {
        let (storage, advancer) = advancer_with(10);
        let id = ingest(&storage, &["great", "terrible"]);

        let first = advancer.advance(id).await.unwrap();
        assert!(first.done);

        let again = advancer.advance(id).await.unwrap();
        assert_eq!(again.processed, 0);
        assert!(again.done);
        assert_eq!(again.analyzed_total, 2);
    }

    #[tokio::test]
    async fn analyzed_rows_is_monotonic_and_bounded() {
        let (storage, advancer) = advancer_with(3);
        let comments: Vec<String> = (0..8).map(|i| format!("row {}", i)).collect();
        let refs: Vec<&str> = comments.iter().map(String::as_str).collect();
        let id = ingest(&storage, &refs);

        let mut last_total = 0;
        for _ in 0..5 {
            let result = advancer.advance(id).await.unwrap();
            assert!(result.analyzed_total >= last_total);
            assert!(result.analyzed_total <= result.total_rows);
            last_total = result.analyzed_total;
        }
        assert_eq!(last_total, 8);
    }

    #[tokio::test]
    async fn missing_dataset_is_an_error() {
        let (_storage, advancer) = advancer_with(10);
        let err = advancer.advance(999).await.unwrap_err();
        assert!(matches!(err, Error::DatasetNotFound(999)));
    }

    #[tokio::test]
    async fn failed_dataset_takes_no_work() {
        let (storage, advancer) = advancer_with(10);
        let id = ingest(&storage, &["one", "two"]);
        storage.mark_failed(id).unwrap();

        let result = advancer.advance(id).await.unwrap();
        assert_eq!(result.processed, 0);
        assert!(!result.done);
        assert_eq!(storage.get_dataset(id).unwrap().unwrap().analyzed_rows, 0);
    }

    #[tokio::test]
    async fn rule_fallback_classifies_rows() {
        let (storage, advancer) = advancer_with(10);
        let id = ingest(&storage, &["excellent, really helpful", "3"]);

        let result = advancer.advance(id).await.unwrap();
        assert!(result.done);

        let rows = storage.get_rows(id).unwrap();

        assert_eq!(rows[0].sentiment_label, Some(SentimentLabel::Positive));
        assert!(rows[0].sentiment_score.unwrap() >= 0.6);
        assert_eq!(rows[0].provider.as_deref(), Some("fallback"));

        assert_eq!(rows[1].sentiment_label, Some(SentimentLabel::Neutral));
        assert_eq!(rows[1].sentiment_score, Some(0.0));
    }

    #[tokio::test]
    async fn breakdown_covers_answered_questions() {
        let (storage, advancer) = advancer_with(10);
        let columns = vec!["rating".to_string(), "comments".to_string()];
        let mut fields = Map::new();
        fields.insert("rating".to_string(), json!(5));
        fields.insert("comments".to_string(), json!("awful experience"));
        let id = storage
            .create_dataset("t", SourceKind::Csv, &columns, &[fields])
            .unwrap();

        advancer.advance(id).await.unwrap();

        let rows = storage.get_rows(id).unwrap();
        let breakdown = rows[0].question_sentiments.as_ref().unwrap();
        assert_eq!(breakdown.get("rating"), Some(&SentimentLabel::Positive));
        assert_eq!(breakdown.get("comments"), Some(&SentimentLabel::Negative));
    }

    #[tokio::test]
    async fn reanalyze_resets_completed_dataset() {
        let (storage, advancer) = advancer_with(10);
        let id = ingest(&storage, &["good", "bad", "okay"]);

        let first = advancer.advance(id).await.unwrap();
        assert!(first.done);

        advancer.reanalyze(id).unwrap();

        let dataset = storage.get_dataset(id).unwrap().unwrap();
        assert_eq!(dataset.status, DatasetStatus::Processing);
        assert_eq!(dataset.analyzed_rows, 0);
        assert!(storage.get_rows(id).unwrap().iter().all(|r| !r.is_analyzed()));

        // Advancing again converges back to done
        let redo = advancer.advance(id).await.unwrap();
        assert_eq!(redo.processed, 3);
        assert!(redo.done);
    }

    #[tokio::test]
    async fn concurrent_advance_never_double_analyzes() {
        let (storage, advancer) = advancer_with(10);
        let comments: Vec<String> = (0..20).map(|i| format!("comment {}", i)).collect();
        let refs: Vec<&str> = comments.iter().map(String::as_str).collect();
        let id = ingest(&storage, &refs);

        let advancer = Arc::new(advancer);
        let a = advancer.clone();
        let b = advancer.clone();

        let (first, second) = tokio::join!(a.advance(id), b.advance(id));
        let first = first.unwrap();
        let second = second.unwrap();

        // Disjoint claims: 20 rows split exactly between the two callers
        assert_eq!(first.processed + second.processed, 20);

        let dataset = storage.get_dataset(id).unwrap().unwrap();
        assert_eq!(dataset.analyzed_rows, 20);
        assert_eq!(dataset.status, DatasetStatus::Completed);

        let rows = storage.get_rows(id).unwrap();
        assert!(rows.iter().all(|r| r.is_analyzed()));
    }
}
