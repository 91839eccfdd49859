use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use crate::classify::prompts::ClassifyRequest;
use crate::classify::provider::SentimentProvider;
use crate::classify::rules::RuleClassifier;
use crate::models::sentiment::{ChainResult, Classification};

/// Ordered provider walk with a rule-based floor.
///
/// Escalates through the configured providers in order and returns the first
/// successful classification. A rate-limited provider costs one cooldown
/// before the next is tried; structural failures move on immediately. When
/// every provider is exhausted the rule classifier answers, so `classify`
/// never fails. The chain touches no storage.
pub struct ProviderChain {
    providers: Vec<Arc<dyn SentimentProvider>>,
    rules: RuleClassifier,
    cooldown: Duration,
    truncate_len: usize,
}

pub const FALLBACK_PROVIDER: &str = "fallback";

impl ProviderChain {
    pub fn new(
        providers: Vec<Arc<dyn SentimentProvider>>,
        cooldown_ms: u64,
        truncate_len: usize,
    ) -> Self {
        Self {
            providers,
            rules: RuleClassifier::new(),
            cooldown: Duration::from_millis(cooldown_ms),
            truncate_len,
        }
    }

    pub async fn classify(&self, text: &str) -> ChainResult {
        let request = ClassifyRequest::new(truncate(text, self.truncate_len));

        for provider in &self.providers {
            match provider.classify(&request).await {
                Ok(result) => {
                    let clamped =
                        Classification::new(result.label, result.score, result.confidence);
                    return ChainResult::from_classification(clamped, provider.name());
                }
                Err(e) if e.is_rate_limited() => {
                    tracing::warn!(
                        provider = provider.name(),
                        "Provider rate limited, cooling down before next provider: {}",
                        e
                    );
                    sleep(self.cooldown).await;
                }
                Err(e) => {
                    tracing::warn!(
                        provider = provider.name(),
                        "Provider failed, trying next: {}",
                        e
                    );
                }
            }
        }

        // All providers exhausted: the rule classifier is total, so this
        // always produces a result. The fallback sees the full text.
        ChainResult::from_classification(self.rules.classify(text), FALLBACK_PROVIDER)
    }

    /// Rule-based classification without any provider call. Used for the
    /// per-question breakdown so a row costs at most one remote request.
    pub fn classify_local(&self, text: &str) -> Classification {
        self.rules.classify(text)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::provider::SentimentProvider;
    use crate::error::{Error, Result};
    use crate::models::sentiment::SentimentLabel;
    use async_trait::async_trait;
    use std::sync::Mutex;

    enum Behavior {
        Succeed(Classification),
        RateLimit,
        Fail,
    }

    struct ScriptedProvider {
        id: &'static str,
        behavior: Behavior,
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl SentimentProvider for ScriptedProvider {
        async fn classify(&self, request: &ClassifyRequest) -> Result<Classification> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.id, request.text.chars().count()));
            match &self.behavior {
                Behavior::Succeed(c) => Ok(*c),
                Behavior::RateLimit => Err(Error::RateLimited(0)),
                Behavior::Fail => Err(Error::ProviderApi("boom".to_string())),
            }
        }

        fn name(&self) -> &str {
            self.id
        }
    }

    fn scripted(
        id: &'static str,
        behavior: Behavior,
        calls: &Arc<Mutex<Vec<String>>>,
    ) -> Arc<dyn SentimentProvider> {
        Arc::new(ScriptedProvider {
            id,
            behavior,
            calls: calls.clone(),
        })
    }

    #[tokio::test]
    async fn no_providers_falls_back_to_rules() {
        let chain = ProviderChain::new(vec![], 0, 500);
        let rules = RuleClassifier::new();

        let text = "excellent, really helpful";
        let result = chain.classify(text).await;
        let expected = rules.classify(text);

        assert_eq!(result.provider, FALLBACK_PROVIDER);
        assert_eq!(result.label, expected.label);
        assert_eq!(result.score, expected.score);
        assert_eq!(result.confidence, expected.confidence);
    }

    #[tokio::test]
    async fn all_providers_failing_matches_rule_output() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let chain = ProviderChain::new(
            vec![
                scripted("claude", Behavior::Fail, &calls),
                scripted("openai", Behavior::Fail, &calls),
            ],
            0,
            500,
        );
        let rules = RuleClassifier::new();

        let text = "this was terrible and slow";
        let result = chain.classify(text).await;
        let expected = rules.classify(text);

        assert_eq!(result.provider, FALLBACK_PROVIDER);
        assert_eq!(result.label, expected.label);
        assert_eq!(result.score, expected.score);
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn first_success_short_circuits() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let winner = Classification::new(SentimentLabel::Positive, 0.9, 0.95);
        let chain = ProviderChain::new(
            vec![
                scripted("claude", Behavior::Succeed(winner), &calls),
                scripted("openai", Behavior::Fail, &calls),
            ],
            0,
            500,
        );

        let result = chain.classify("great stuff").await;

        assert_eq!(result.provider, "claude");
        assert_eq!(result.label, SentimentLabel::Positive);
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rate_limited_provider_escalates_in_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let second = Classification::new(SentimentLabel::Negative, -0.5, 0.9);
        let chain = ProviderChain::new(
            vec![
                scripted("claude", Behavior::RateLimit, &calls),
                scripted("openai", Behavior::Succeed(second), &calls),
            ],
            0,
            500,
        );

        let result = chain.classify("not great").await;

        assert_eq!(result.provider, "openai");
        let seen = calls.lock().unwrap();
        assert!(seen[0].starts_with("claude:"));
        assert!(seen[1].starts_with("openai:"));
    }

    #[tokio::test]
    async fn truncates_text_before_sending() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let chain = ProviderChain::new(vec![scripted("claude", Behavior::Fail, &calls)], 0, 10);

        let long_text = "x".repeat(100);
        chain.classify(&long_text).await;

        assert_eq!(calls.lock().unwrap()[0], "claude:10");
    }

    #[tokio::test]
    async fn out_of_range_provider_values_are_clamped() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        // Bypass the Classification constructor to simulate a misbehaving impl.
        let raw = Classification {
            label: SentimentLabel::Positive,
            score: 2.0,
            confidence: 1.5,
        };
        let chain = ProviderChain::new(
            vec![scripted("claude", Behavior::Succeed(raw), &calls)],
            0,
            500,
        );

        let result = chain.classify("fine").await;

        assert_eq!(result.score, 1.0);
        assert_eq!(result.confidence, 1.0);
    }
}
