use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::sentiment::SentimentLabel;

/// One respondent's raw answers plus derived sentiment.
///
/// A row is "analyzed" iff `sentiment_label` is set; analysis is never
/// overwritten except by an explicit re-analyze reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRow {
    pub id: i64,
    pub dataset_id: i64,
    /// 0-based, stable, unique within the dataset.
    pub row_index: u32,
    /// Raw field map as ingested: column name -> string or number value.
    pub fields: BTreeMap<String, Value>,
    pub respondent: Option<String>,
    pub sentiment_label: Option<SentimentLabel>,
    pub sentiment_score: Option<f32>,
    pub confidence: Option<f32>,
    /// Provider id that produced the classification ("fallback" for rule-based).
    pub provider: Option<String>,
    /// Rule-derived per-answer breakdown: column name -> label.
    pub question_sentiments: Option<BTreeMap<String, SentimentLabel>>,
    pub analyzed_at: Option<DateTime<Utc>>,
}

impl ResponseRow {
    pub fn is_analyzed(&self) -> bool {
        self.sentiment_label.is_some()
    }

    /// Field value as display text, skipping empty strings and nulls.
    pub fn field_text(&self, column: &str) -> Option<String> {
        match self.fields.get(column)? {
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}
