use std::collections::HashMap;

/// Curated sentiment vocabulary backing the rule-based classifier.
///
/// Phrase sets are matched exactly against the whole (lowercased, trimmed)
/// answer; keyword weights are summed over word occurrences. Strong words
/// carry weight 2.0, mild words 1.0.
pub struct Lexicon {
    positive_phrases: Vec<&'static str>,
    negative_phrases: Vec<&'static str>,
    neutral_phrases: Vec<&'static str>,
    positive_keywords: HashMap<&'static str, f32>,
    negative_keywords: HashMap<&'static str, f32>,
}

impl Lexicon {
    pub fn new() -> Self {
        let mut lexicon = Self {
            positive_phrases: Vec::new(),
            negative_phrases: Vec::new(),
            neutral_phrases: Vec::new(),
            positive_keywords: HashMap::new(),
            negative_keywords: HashMap::new(),
        };

        lexicon.init_phrases();
        lexicon.init_positive_keywords();
        lexicon.init_negative_keywords();

        lexicon
    }

    fn init_phrases(&mut self) {
        self.positive_phrases = vec![
            "excellent",
            "amazing",
            "love it",
            "loved it",
            "great",
            "very good",
            "awesome",
            "fantastic",
            "perfect",
            "outstanding",
            "highly recommend",
            "best ever",
            "yes",
            "definitely",
            "absolutely",
        ];

        self.negative_phrases = vec![
            "terrible",
            "awful",
            "horrible",
            "hate it",
            "hated it",
            "very bad",
            "worst",
            "worst ever",
            "useless",
            "waste of time",
            "waste of money",
            "never again",
            "no",
            "disappointing",
        ];

        self.neutral_phrases = vec![
            "okay",
            "ok",
            "fine",
            "average",
            "not sure",
            "maybe",
            "no comment",
            "n/a",
            "none",
            "nothing",
            "neutral",
            "it was alright",
            "alright",
        ];
    }

    fn init_positive_keywords(&mut self) {
        let strong = vec![
            "excellent",
            "amazing",
            "fantastic",
            "outstanding",
            "wonderful",
            "perfect",
            "love",
            "loved",
            "brilliant",
            "exceptional",
            "delighted",
            "impressed",
        ];
        let mild = vec![
            "good",
            "great",
            "helpful",
            "nice",
            "useful",
            "easy",
            "friendly",
            "smooth",
            "fast",
            "clear",
            "enjoyable",
            "satisfied",
            "happy",
            "pleasant",
            "recommend",
            "convenient",
            "reliable",
            "responsive",
            "intuitive",
            "like",
            "liked",
            "better",
            "improved",
            "works",
        ];

        for word in strong {
            self.positive_keywords.insert(word, 2.0);
        }
        for word in mild {
            self.positive_keywords.insert(word, 1.0);
        }
    }

    fn init_negative_keywords(&mut self) {
        let strong = vec![
            "terrible",
            "awful",
            "horrible",
            "worst",
            "hate",
            "hated",
            "useless",
            "broken",
            "unacceptable",
            "disgusting",
            "furious",
            "scam",
        ];
        let mild = vec![
            "bad",
            "poor",
            "slow",
            "confusing",
            "difficult",
            "hard",
            "annoying",
            "frustrating",
            "frustrated",
            "disappointed",
            "disappointing",
            "expensive",
            "buggy",
            "crash",
            "crashes",
            "crashed",
            "unhelpful",
            "rude",
            "unclear",
            "complicated",
            "problem",
            "problems",
            "issue",
            "issues",
            "worse",
            "lacking",
            "missing",
            "dislike",
        ];

        for word in strong {
            self.negative_keywords.insert(word, 2.0);
        }
        for word in mild {
            self.negative_keywords.insert(word, 1.0);
        }
    }

    pub fn match_phrase(&self, text: &str) -> Option<PhraseKind> {
        if self.positive_phrases.iter().any(|p| *p == text) {
            Some(PhraseKind::Positive)
        } else if self.negative_phrases.iter().any(|p| *p == text) {
            Some(PhraseKind::Negative)
        } else if self.neutral_phrases.iter().any(|p| *p == text) {
            Some(PhraseKind::Neutral)
        } else {
            None
        }
    }

    /// Summed (positive, negative) keyword weights over the words of `text`.
    pub fn keyword_weights(&self, text: &str) -> (f32, f32) {
        let mut positive = 0.0;
        let mut negative = 0.0;

        for word in text.split(|c: char| !c.is_alphanumeric()) {
            if word.is_empty() {
                continue;
            }
            if let Some(w) = self.positive_keywords.get(word) {
                positive += w;
            }
            if let Some(w) = self.negative_keywords.get(word) {
                negative += w;
            }
        }

        (positive, negative)
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhraseKind {
    Positive,
    Negative,
    Neutral,
}
