pub mod config;
pub mod error;
pub mod models;
pub mod classify;
pub mod ingest;
pub mod analysis;
pub mod storage;

pub use config::{AnalyzerConfig, Config};
pub use error::{Error, Result};
pub use classify::{ProviderChain, RuleClassifier, SentimentProvider};
pub use analysis::{AdvanceReport, Aggregator, BatchAdvancer};
pub use storage::Storage;
