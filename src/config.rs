use crate::error::{Error, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub database_path: String,
    /// Ordered list of provider ids walked by the fallback chain.
    pub provider_order: Vec<String>,
    pub batch_size: u32,
    pub cooldown_ms: u64,
    pub text_truncate_len: usize,
    pub concurrency_limit: usize,
    pub claim_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let anthropic_api_key = env::var("ANTHROPIC_API_KEY").ok().filter(|k| !k.is_empty());
        let openai_api_key = env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());

        let database_path =
            env::var("DATABASE_PATH").unwrap_or_else(|_| "feedlens.db".to_string());

        let provider_order = env::var("PROVIDER_ORDER")
            .unwrap_or_else(|_| "claude,openai".to_string())
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        if provider_order.is_empty() {
            return Err(Error::Config(
                "PROVIDER_ORDER must name at least one provider".to_string(),
            ));
        }

        let batch_size = env::var("BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        let cooldown_ms = env::var("COOLDOWN_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1500);

        let text_truncate_len = env::var("TEXT_TRUNCATE_LEN")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(500);

        let concurrency_limit = env::var("CONCURRENCY_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(4);

        let claim_timeout_secs = env::var("CLAIM_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(120);

        Ok(Self {
            anthropic_api_key,
            openai_api_key,
            database_path,
            provider_order,
            batch_size,
            cooldown_ms,
            text_truncate_len,
            concurrency_limit,
            claim_timeout_secs,
        })
    }
}

/// The knobs the batch advancer and provider chain actually consume.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Rows processed per advance() call.
    pub batch_size: u32,
    /// Delay after a provider rate-limit before trying the next provider.
    pub cooldown_ms: u64,
    /// Max characters of answer text sent to a remote provider.
    pub text_truncate_len: usize,
    /// Concurrent classification calls within one batch.
    pub concurrency_limit: usize,
    /// Age after which an unfinished claim becomes reselectable.
    pub claim_timeout_secs: u64,
}

impl From<&Config> for AnalyzerConfig {
    fn from(config: &Config) -> Self {
        Self {
            batch_size: config.batch_size,
            cooldown_ms: config.cooldown_ms,
            text_truncate_len: config.text_truncate_len,
            concurrency_limit: config.concurrency_limit,
            claim_timeout_secs: config.claim_timeout_secs,
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            cooldown_ms: 1500,
            text_truncate_len: 500,
            concurrency_limit: 4,
            claim_timeout_secs: 120,
        }
    }
}
