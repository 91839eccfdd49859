use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    Csv,
    Sheet,
}

impl SourceKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Some(SourceKind::Csv),
            "sheet" => Some(SourceKind::Sheet),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Csv => write!(f, "csv"),
            SourceKind::Sheet => write!(f, "sheet"),
        }
    }
}

/// Lifecycle: `Processing` at ingestion, then exactly one forward transition
/// to `Completed` (all rows analyzed) or `Failed` (ingestion error).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetStatus {
    Processing,
    Completed,
    Failed,
}

impl DatasetStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "processing" => Some(DatasetStatus::Processing),
            "completed" => Some(DatasetStatus::Completed),
            "failed" => Some(DatasetStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for DatasetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetStatus::Processing => write!(f, "processing"),
            DatasetStatus::Completed => write!(f, "completed"),
            DatasetStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One imported collection of feedback rows with a shared column schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub id: i64,
    pub title: String,
    pub source: SourceKind,
    /// Declared column schema, in ingestion order.
    pub columns: Vec<String>,
    pub total_rows: u32,
    pub analyzed_rows: u32,
    pub status: DatasetStatus,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Dataset {
    pub fn is_done(&self) -> bool {
        self.status == DatasetStatus::Completed
    }
}
