use serde::{Deserialize, Serialize};

/// The fixed label set every classifier in the system maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Some(SentimentLabel::Positive),
            "neutral" => Some(SentimentLabel::Neutral),
            "negative" => Some(SentimentLabel::Negative),
            _ => None,
        }
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SentimentLabel::Positive => write!(f, "Positive"),
            SentimentLabel::Neutral => write!(f, "Neutral"),
            SentimentLabel::Negative => write!(f, "Negative"),
        }
    }
}

/// A single classification result: label, score in [-1, 1], confidence in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: SentimentLabel,
    pub score: f32,
    pub confidence: f32,
}

impl Classification {
    pub fn new(label: SentimentLabel, score: f32, confidence: f32) -> Self {
        Self {
            label,
            score: score.clamp(-1.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Chain output: a classification plus the id of the provider that produced it.
/// `provider` is `"fallback"` when the rule-based floor answered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainResult {
    pub label: SentimentLabel,
    pub score: f32,
    pub confidence: f32,
    pub provider: String,
}

impl ChainResult {
    pub fn from_classification(c: Classification, provider: impl Into<String>) -> Self {
        Self {
            label: c.label,
            score: c.score,
            confidence: c.confidence,
            provider: provider.into(),
        }
    }
}
