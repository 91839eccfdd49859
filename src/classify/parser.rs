use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::sentiment::{Classification, SentimentLabel};

#[derive(Deserialize)]
struct WireClassification {
    sentiment_label: String,
    sentiment_score: f32,
    confidence: Option<f32>,
}

/// Parse a provider's text response into a classification.
///
/// Providers are instructed to answer with bare JSON, but models wrap output
/// in markdown fences or prose often enough that we extract the first JSON
/// object before deserializing. A label outside the valid set is a structural
/// failure; scores and confidence are clamped to their documented ranges.
pub fn parse_provider_response(response: &str) -> Result<Classification> {
    let json_str = extract_json(response)?;

    let wire: WireClassification = serde_json::from_str(&json_str)
        .map_err(|e| Error::ParseError(format!("Malformed classification JSON: {}", e)))?;

    let label = SentimentLabel::parse(&wire.sentiment_label).ok_or_else(|| {
        Error::ParseError(format!(
            "Label '{}' is not in the valid set",
            wire.sentiment_label
        ))
    })?;

    Ok(Classification::new(
        label,
        wire.sentiment_score,
        wire.confidence.unwrap_or(0.9),
    ))
}

fn extract_json(text: &str) -> Result<String> {
    // Markdown-fenced JSON block
    if let Some(start) = text.find("```json") {
        let start = start + 7;
        if let Some(end) = text[start..].find("```") {
            return Ok(text[start..start + end].trim().to_string());
        }
    }

    // Plain fenced block, possibly with a language identifier on the fence line
    if let Some(start) = text.find("```") {
        let start = start + 3;
        let start = text[start..]
            .find('\n')
            .map(|i| start + i + 1)
            .unwrap_or(start);
        if let Some(end) = text[start..].find("```") {
            let content = text[start..start + end].trim();
            if content.starts_with('{') {
                return Ok(content.to_string());
            }
        }
    }

    // Raw JSON object, brace-matched with string awareness
    if let Some(start) = text.find('{') {
        let mut depth = 0;
        let mut end = start;
        let mut in_string = false;
        let mut escape_next = false;

        for (i, c) in text[start..].char_indices() {
            if escape_next {
                escape_next = false;
                continue;
            }

            match c {
                '\\' if in_string => escape_next = true,
                '"' => in_string = !in_string,
                '{' if !in_string => depth += 1,
                '}' if !in_string => {
                    depth -= 1;
                    if depth == 0 {
                        end = start + i + 1;
                        break;
                    }
                }
                _ => {}
            }
        }

        if depth == 0 && end > start {
            return Ok(text[start..end].to_string());
        }
    }

    Err(Error::ParseError(
        "No valid JSON found in response".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_json() {
        let result = parse_provider_response(
            r#"{"sentiment_label": "Positive", "sentiment_score": 0.8, "confidence": 0.95}"#,
        )
        .unwrap();
        assert_eq!(result.label, SentimentLabel::Positive);
        assert!((result.score - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn parses_fenced_json() {
        let input = r#"Here is the classification:
```json
{"sentiment_label": "Negative", "sentiment_score": -0.6, "confidence": 0.8}
```
"#;
        let result = parse_provider_response(input).unwrap();
        assert_eq!(result.label, SentimentLabel::Negative);
    }

    #[test]
    fn parses_json_embedded_in_prose() {
        let input = r#"The answer is {"sentiment_label": "Neutral", "sentiment_score": 0.0} as requested."#;
        let result = parse_provider_response(input).unwrap();
        assert_eq!(result.label, SentimentLabel::Neutral);
        // Missing confidence defaults to the remote baseline
        assert!((result.confidence - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn clamps_out_of_range_values() {
        let result = parse_provider_response(
            r#"{"sentiment_label": "Positive", "sentiment_score": 3.2, "confidence": 1.4}"#,
        )
        .unwrap();
        assert_eq!(result.score, 1.0);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn rejects_invalid_label() {
        let err = parse_provider_response(
            r#"{"sentiment_label": "Ecstatic", "sentiment_score": 0.9}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ParseError(_)));
    }

    #[test]
    fn rejects_missing_json() {
        let err = parse_provider_response("I cannot classify this.").unwrap_err();
        assert!(matches!(err, Error::ParseError(_)));
    }
}
