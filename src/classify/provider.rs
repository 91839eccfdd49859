use async_trait::async_trait;

use crate::classify::prompts::ClassifyRequest;
use crate::error::Result;
use crate::models::sentiment::Classification;

/// A remote sentiment classification service.
///
/// Implementations issue exactly one request per call and surface failures as
/// errors; the fallback walk and cooldown policy live in the chain, not here.
#[async_trait]
pub trait SentimentProvider: Send + Sync {
    async fn classify(&self, request: &ClassifyRequest) -> Result<Classification>;
    fn name(&self) -> &str;
}
