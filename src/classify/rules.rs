use crate::classify::lexicon::{Lexicon, PhraseKind};
use crate::models::sentiment::{Classification, SentimentLabel};

const NUMERIC_CONFIDENCE: f32 = 0.8;
const PHRASE_CONFIDENCE: f32 = 0.8;
const NEUTRAL_PHRASE_CONFIDENCE: f32 = 0.7;
const TIE_CONFIDENCE: f32 = 0.4;
const KEYWORD_SCORE_CAP: f32 = 0.85;
const KEYWORD_CONFIDENCE_CAP: f32 = 0.65;

/// Local, deterministic, always-available sentiment classifier.
///
/// Total over all inputs: never errors, never blocks, performs no I/O. This
/// is the floor the provider chain falls back to when every remote provider
/// is exhausted, so the pipeline terminates with a result even fully offline.
pub struct RuleClassifier {
    lexicon: Lexicon,
}

impl RuleClassifier {
    pub fn new() -> Self {
        Self {
            lexicon: Lexicon::new(),
        }
    }

    pub fn classify(&self, text: &str) -> Classification {
        let normalized = text.trim().to_lowercase();

        // 1. Numeric ratings map onto a fixed scale.
        if let Some(rating) = parse_numeric(&normalized) {
            return classify_rating(rating);
        }

        // 2. Exact match against curated phrase sets.
        match self.lexicon.match_phrase(&normalized) {
            Some(PhraseKind::Positive) => {
                return Classification::new(SentimentLabel::Positive, 0.75, PHRASE_CONFIDENCE)
            }
            Some(PhraseKind::Negative) => {
                return Classification::new(SentimentLabel::Negative, -0.75, PHRASE_CONFIDENCE)
            }
            Some(PhraseKind::Neutral) => {
                return Classification::new(SentimentLabel::Neutral, 0.0, NEUTRAL_PHRASE_CONFIDENCE)
            }
            None => {}
        }

        // 3. Weighted keyword scan; ties default to neutral.
        let (positive, negative) = self.lexicon.keyword_weights(&normalized);
        if positive > negative {
            Classification::new(
                SentimentLabel::Positive,
                keyword_score(positive),
                keyword_confidence(positive),
            )
        } else if negative > positive {
            Classification::new(
                SentimentLabel::Negative,
                -keyword_score(negative),
                keyword_confidence(negative),
            )
        } else {
            Classification::new(SentimentLabel::Neutral, 0.0, TIE_CONFIDENCE)
        }
    }
}

impl Default for RuleClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_numeric(text: &str) -> Option<f32> {
    if text.is_empty() {
        return None;
    }
    text.parse::<f32>().ok()
}

fn classify_rating(rating: f32) -> Classification {
    if rating >= 4.0 {
        Classification::new(SentimentLabel::Positive, 0.7, NUMERIC_CONFIDENCE)
    } else if rating >= 3.0 {
        Classification::new(SentimentLabel::Neutral, 0.0, NUMERIC_CONFIDENCE)
    } else {
        Classification::new(SentimentLabel::Negative, -0.6, NUMERIC_CONFIDENCE)
    }
}

fn keyword_score(weight: f32) -> f32 {
    (0.3 + 0.12 * weight).min(KEYWORD_SCORE_CAP)
}

fn keyword_confidence(weight: f32) -> f32 {
    (0.45 + 0.05 * weight).min(KEYWORD_CONFIDENCE_CAP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_rating_scale() {
        let classifier = RuleClassifier::new();

        let high = classifier.classify("5");
        assert_eq!(high.label, SentimentLabel::Positive);
        assert!((high.score - 0.7).abs() < f32::EPSILON);

        let four = classifier.classify("4");
        assert_eq!(four.label, SentimentLabel::Positive);

        let mid = classifier.classify("3");
        assert_eq!(mid.label, SentimentLabel::Neutral);
        assert_eq!(mid.score, 0.0);

        let low = classifier.classify("1");
        assert_eq!(low.label, SentimentLabel::Negative);
        assert!((low.score + 0.6).abs() < f32::EPSILON);
    }

    #[test]
    fn exact_phrase_match() {
        let classifier = RuleClassifier::new();

        assert_eq!(
            classifier.classify("Excellent").label,
            SentimentLabel::Positive
        );
        assert_eq!(
            classifier.classify("  terrible ").label,
            SentimentLabel::Negative
        );
        let neutral = classifier.classify("okay");
        assert_eq!(neutral.label, SentimentLabel::Neutral);
        assert_eq!(neutral.score, 0.0);
    }

    #[test]
    fn weighted_keywords_score_positive() {
        let classifier = RuleClassifier::new();

        // "excellent" (2.0) + "helpful" (1.0) -> 0.3 + 0.12 * 3 = 0.66
        let result = classifier.classify("excellent, really helpful");
        assert_eq!(result.label, SentimentLabel::Positive);
        assert!(result.score >= 0.6, "score was {}", result.score);
        assert!(result.confidence < 0.9);
    }

    #[test]
    fn keyword_score_is_capped() {
        let classifier = RuleClassifier::new();

        let result = classifier
            .classify("excellent amazing fantastic wonderful perfect brilliant outstanding");
        assert_eq!(result.label, SentimentLabel::Positive);
        assert!(result.score <= 0.85);
        assert!(result.confidence <= 0.65);
    }

    #[test]
    fn tie_defaults_to_neutral() {
        let classifier = RuleClassifier::new();

        let mixed = classifier.classify("good but bad");
        assert_eq!(mixed.label, SentimentLabel::Neutral);
        assert_eq!(mixed.score, 0.0);
        assert!((mixed.confidence - 0.4).abs() < f32::EPSILON);

        let unknown = classifier.classify("the delivery arrived on tuesday");
        assert_eq!(unknown.label, SentimentLabel::Neutral);
    }

    #[test]
    fn total_over_arbitrary_input() {
        let classifier = RuleClassifier::new();

        for text in ["", "   ", "!!!", "日本語のフィードバック", "-2.5", "4.5", "NaN"] {
            let result = classifier.classify(text);
            assert!((-1.0..=1.0).contains(&result.score), "input {:?}", text);
            assert!((0.0..=1.0).contains(&result.confidence));
        }
    }
}
