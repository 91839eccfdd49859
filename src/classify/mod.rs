pub mod chain;
pub mod claude;
pub mod lexicon;
pub mod openai;
pub mod parser;
pub mod prompts;
pub mod provider;
pub mod rules;

pub use chain::{ProviderChain, FALLBACK_PROVIDER};
pub use claude::ClaudeProvider;
pub use openai::OpenAiProvider;
pub use prompts::ClassifyRequest;
pub use provider::SentimentProvider;
pub use rules::RuleClassifier;

use std::sync::Arc;

use crate::config::Config;

/// Build the ordered provider list from configuration. Providers whose keys
/// are absent are skipped; an empty result means the chain runs rule-only.
pub fn build_providers(config: &Config) -> Vec<Arc<dyn SentimentProvider>> {
    let mut providers: Vec<Arc<dyn SentimentProvider>> = Vec::new();

    for id in &config.provider_order {
        match id.as_str() {
            "claude" => {
                if let Some(key) = &config.anthropic_api_key {
                    providers.push(Arc::new(ClaudeProvider::new(key.clone(), None)));
                } else {
                    tracing::warn!("Skipping provider 'claude': ANTHROPIC_API_KEY not set");
                }
            }
            "openai" => {
                if let Some(key) = &config.openai_api_key {
                    providers.push(Arc::new(OpenAiProvider::new(key.clone(), None)));
                } else {
                    tracing::warn!("Skipping provider 'openai': OPENAI_API_KEY not set");
                }
            }
            other => {
                tracing::warn!("Unknown provider '{}' in PROVIDER_ORDER, skipping", other);
            }
        }
    }

    providers
}
