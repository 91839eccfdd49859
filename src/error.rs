use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Provider API error: {0}")]
    ProviderApi(String),

    #[error("Rate limit exceeded, retry after {0} ms")]
    RateLimited(u64),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Dataset not found: {0}")]
    DatasetNotFound(i64),

    #[error("Invalid dataset state: {0}")]
    InvalidDatasetState(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Transient provider failures get a cooldown before the chain moves on;
    /// everything else skips to the next provider immediately.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::RateLimited(_))
    }
}
