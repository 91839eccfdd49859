use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::{DatasetStatus, ResponseRow};
use crate::storage::Storage;

/// How a question's answers are tallied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QuestionKind {
    /// Small closed answer set (ratings, multiple choice): tally raw values.
    Option,
    /// Free text: tally sentiment labels of analyzed answers.
    FreeText,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionDistribution {
    pub question: String,
    pub kind: QuestionKind,
    /// Answer value (or sentiment label) -> frequency.
    pub counts: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetAnalytics {
    pub dataset_id: i64,
    pub title: String,
    pub status: DatasetStatus,
    pub total_responses: u32,
    pub analyzed_responses: u32,
    /// Overall sentiment label -> frequency over analyzed rows.
    pub overall: BTreeMap<String, u32>,
    pub distributions: Vec<QuestionDistribution>,
    pub raw_responses: Vec<ResponseRow>,
}

const OPTION_MAX_DISTINCT: usize = 10;
const OPTION_MAX_LEN: usize = 24;

/// Read-only summarizer over a dataset's rows. Partial datasets yield
/// partial distributions; nothing is mutated.
pub struct Aggregator {
    storage: Arc<Storage>,
}

impl Aggregator {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    pub fn aggregate(&self, dataset_id: i64) -> Result<DatasetAnalytics> {
        let dataset = self
            .storage
            .get_dataset(dataset_id)?
            .ok_or(Error::DatasetNotFound(dataset_id))?;
        let rows = self.storage.get_rows(dataset_id)?;
        let overall = self.storage.count_labels(dataset_id)?;

        let analyzed_responses = rows.iter().filter(|r| r.is_analyzed()).count() as u32;

        let distributions = dataset
            .columns
            .iter()
            .map(|column| distribution_for(column, &rows))
            .collect();

        Ok(DatasetAnalytics {
            dataset_id,
            title: dataset.title,
            status: dataset.status,
            total_responses: dataset.total_rows,
            analyzed_responses,
            overall,
            distributions,
            raw_responses: rows,
        })
    }
}

fn distribution_for(column: &str, rows: &[ResponseRow]) -> QuestionDistribution {
    let values: Vec<String> = rows
        .iter()
        .filter_map(|row| row.field_text(column))
        .collect();

    let kind = classify_question(&values);
    let mut counts: BTreeMap<String, u32> = BTreeMap::new();

    match kind {
        QuestionKind::Option => {
            for value in values {
                *counts.entry(value).or_insert(0) += 1;
            }
        }
        QuestionKind::FreeText => {
            // Only analyzed rows carry a per-question label; unanalyzed rows
            // simply don't contribute yet.
            for row in rows {
                if let Some(breakdown) = &row.question_sentiments {
                    if let Some(label) = breakdown.get(column) {
                        *counts.entry(label.to_string()).or_insert(0) += 1;
                    }
                }
            }
        }
    }

    QuestionDistribution {
        question: column.to_string(),
        kind,
        counts,
    }
}

fn classify_question(values: &[String]) -> QuestionKind {
    let mut distinct: Vec<&str> = Vec::new();
    for value in values {
        if value.chars().count() > OPTION_MAX_LEN {
            return QuestionKind::FreeText;
        }
        if !distinct.contains(&value.as_str()) {
            distinct.push(value);
            if distinct.len() > OPTION_MAX_DISTINCT {
                return QuestionKind::FreeText;
            }
        }
    }
    QuestionKind::Option
}
