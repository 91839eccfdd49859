pub const SYSTEM_PROMPT: &str = r#"You are a sentiment analysis engine for customer feedback.
Classify the sentiment of the feedback text you are given.

You must respond with valid JSON matching this exact schema and nothing else:
{
    "sentiment_label": "Positive" | "Neutral" | "Negative",
    "sentiment_score": -1.0 to 1.0 (negative values for negative sentiment),
    "confidence": 0.0 to 1.0
}

Guidelines:
- "sentiment_label" must be exactly one of Positive, Neutral, Negative
- Score magnitude reflects intensity: mild praise ~0.3, enthusiastic praise ~0.9
- Mixed or factual statements with no clear valence are Neutral with score near 0
- Judge the respondent's attitude, not the topic"#;

/// One classification request: the (already truncated) answer text.
#[derive(Debug, Clone)]
pub struct ClassifyRequest {
    pub text: String,
}

impl ClassifyRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn to_prompt(&self) -> String {
        format!(
            "Classify the sentiment of this feedback:\n\n\"{}\"\n\nRespond with JSON only:\n",
            self.text
        )
    }
}
