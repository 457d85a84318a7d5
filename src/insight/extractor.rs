//! Metadata extractor
//!
//! Deterministic keyword heuristics over generated text: sentiment, topics
//! and action items. No I/O.

use super::types::{InsightMetadata, Sentiment};
use regex::Regex;
use std::sync::OnceLock;

const POSITIVE_WORDS: [&str; 7] = [
    "positive",
    "happy",
    "excited",
    "grateful",
    "proud",
    "accomplished",
    "motivated",
];

const NEGATIVE_WORDS: [&str; 7] = [
    "negative",
    "sad",
    "frustrated",
    "anxious",
    "stressed",
    "overwhelmed",
    "disappointed",
];

const TOPICS: [&str; 20] = [
    "work",
    "career",
    "relationships",
    "health",
    "fitness",
    "learning",
    "creativity",
    "family",
    "friends",
    "goals",
    "stress",
    "anxiety",
    "happiness",
    "productivity",
    "time management",
    "self-care",
    "growth",
    "challenges",
    "success",
    "failure",
];

/// Lead-ins that introduce an action item, in match order
const ACTION_LEAD_INS: [&str; 6] = [
    r"try",
    r"consider",
    r"practice",
    r"focus\s+on",
    r"work\s+on",
    r"develop",
];

const MAX_ACTION_ITEMS: usize = 5;

/// Extracts [`InsightMetadata`] from generated text
pub struct MetadataExtractor;

impl MetadataExtractor {
    /// Sentiment, topics and action items of `text`
    pub fn extract(text: &str) -> InsightMetadata {
        InsightMetadata {
            sentiment: Self::sentiment(text),
            topics: Self::topics(text),
            action_items: Self::action_items(text),
            mood: None,
        }
    }

    /// Compare how many listed positive and negative words appear.
    /// Ties, including none at all, are neutral.
    pub fn sentiment(text: &str) -> Sentiment {
        let lower = text.to_lowercase();
        let positive = POSITIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();
        let negative = NEGATIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();

        match positive.cmp(&negative) {
            std::cmp::Ordering::Greater => Sentiment::Positive,
            std::cmp::Ordering::Less => Sentiment::Negative,
            std::cmp::Ordering::Equal => Sentiment::Neutral,
        }
    }

    /// Vocabulary topics mentioned anywhere in `text`, in vocabulary order
    pub fn topics(text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        TOPICS
            .iter()
            .filter(|t| lower.contains(*t))
            .map(|t| t.to_string())
            .collect()
    }

    /// Phrases following an action lead-in, up to the next period. Lead-ins
    /// match anywhere, including inside longer words.
    ///
    /// Kept when the trimmed phrase is 6 to 99 characters long. Matches are
    /// collected pattern by pattern and capped at five.
    pub fn action_items(text: &str) -> Vec<String> {
        let mut items = Vec::new();
        for pattern in action_patterns() {
            for caps in pattern.captures_iter(text) {
                let Some(phrase) = caps.get(1) else {
                    continue;
                };
                let phrase = phrase.as_str().trim();
                let len = phrase.chars().count();
                if len > 5 && len < 100 {
                    items.push(phrase.to_string());
                }
            }
        }
        items.truncate(MAX_ACTION_ITEMS);
        items
    }
}

fn action_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        ACTION_LEAD_INS
            .iter()
            .filter_map(|lead| Regex::new(&format!(r"(?i){}\s+([^.]+)", lead)).ok())
            .collect()
    })
}
