//! Memory context assembly
//!
//! Turns raw search results into the summary and suggestions handed to the
//! insight prompt. Everything here is pure.

use super::types::{MemoryContext, MemorySearchResult, Relevance};

/// Summary used when a search finds nothing
pub const NO_MEMORIES_SUMMARY: &str = "No relevant past memories found.";

/// Maximum characters of a memory quoted in a summary reference
pub const SUMMARY_EXCERPT_CHARS: usize = 100;

/// Number of memories quoted in a summary
const SUMMARY_REFERENCES: usize = 2;

const MAX_SUGGESTIONS: usize = 3;

/// Recurring themes, checked in order
pub const THEMES: [&str; 10] = [
    "work-life balance",
    "personal growth",
    "relationships",
    "health",
    "productivity",
    "creativity",
    "learning",
    "stress management",
    "goal setting",
    "self-care",
];

const GOAL_WORDS: [&str; 3] = ["goal", "commit", "promise"];
const CHALLENGE_WORDS: [&str; 3] = ["challenge", "struggle", "difficult"];

const GOALS_NUDGE: &str = "Reflect on how this connects to goals you've mentioned before";
const CHALLENGES_NUDGE: &str = "Consider what you've learned from similar challenges in the past";

/// Build a context from search results.
pub fn build_context(results: &[MemorySearchResult]) -> MemoryContext {
    if results.is_empty() {
        return MemoryContext::empty();
    }

    MemoryContext {
        relevant_memories: results
            .iter()
            .filter(|r| r.relevance == Relevance::High)
            .map(|r| r.memory.clone())
            .collect(),
        summary: summarize(results),
        suggestions: suggest(results),
    }
}

/// Count sentences over the high and medium buckets, then up to two dated
/// references.
pub fn summarize(results: &[MemorySearchResult]) -> String {
    if results.is_empty() {
        return NO_MEMORIES_SUMMARY.to_string();
    }

    let high = count(results, Relevance::High);
    let medium = count(results, Relevance::Medium);

    let mut parts = Vec::new();
    if high > 0 {
        parts.push(format!(
            "I found {} highly relevant {} from your past entries.",
            high,
            memories_noun(high)
        ));
    }
    if medium > 0 {
        parts.push(format!(
            "There are also {} somewhat related {}.",
            medium,
            memories_noun(medium)
        ));
    }
    for result in results.iter().take(SUMMARY_REFERENCES) {
        parts.push(format!(
            "On {}, you mentioned: \"{}\"",
            result.memory.created_at.format("%Y-%m-%d"),
            excerpt(&result.memory.content, SUMMARY_EXCERPT_CHARS)
        ));
    }

    parts.join(" ")
}

/// Reflection prompts from the raw result contents, at most three.
pub fn suggest(results: &[MemorySearchResult]) -> Vec<String> {
    let contents: Vec<String> = results
        .iter()
        .map(|r| r.memory.content.to_lowercase())
        .collect();

    let mut suggestions = Vec::new();

    let joined = contents.join(" ");
    if let Some(theme) = THEMES.iter().find(|t| joined.contains(*t)) {
        suggestions.push(format!(
            "Consider how this relates to your recurring theme of {}",
            theme
        ));
    }

    let mentions = |words: &[&str]| contents.iter().any(|c| words.iter().any(|w| c.contains(w)));
    if mentions(&GOAL_WORDS) {
        suggestions.push(GOALS_NUDGE.to_string());
    }
    if mentions(&CHALLENGE_WORDS) {
        suggestions.push(CHALLENGES_NUDGE.to_string());
    }

    suggestions.truncate(MAX_SUGGESTIONS);
    suggestions
}

/// First `max_chars` characters of `text`, with `...` appended when cut
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn count(results: &[MemorySearchResult], relevance: Relevance) -> usize {
    results.iter().filter(|r| r.relevance == relevance).count()
}

fn memories_noun(n: usize) -> &'static str {
    if n == 1 {
        "memory"
    } else {
        "memories"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::{Memory, MemoryMetadata};
    use chrono::{TimeZone, Utc};

    fn result(id: &str, content: &str, similarity: f32) -> MemorySearchResult {
        MemorySearchResult::new(
            Memory {
                id: id.to_string(),
                user_id: "u1".to_string(),
                content: content.to_string(),
                context: "diary_entry".to_string(),
                tags: Vec::new(),
                created_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
                metadata: MemoryMetadata::default(),
                embedding: None,
            },
            similarity,
        )
    }

    #[test]
    fn test_empty_results_fixed_summary() {
        let context = build_context(&[]);
        assert_eq!(context.summary, NO_MEMORIES_SUMMARY);
        assert!(context.relevant_memories.is_empty());
        assert!(context.suggestions.is_empty());
    }

    #[test]
    fn test_nonempty_results_never_fixed_summary() {
        let context = build_context(&[result("a", "quiet day", 0.3)]);
        assert_ne!(context.summary, NO_MEMORIES_SUMMARY);
        assert!(context.summary.contains("On 2024-03-01, you mentioned: \"quiet day\""));
    }

    #[test]
    fn test_relevant_memories_are_high_subset_in_order() {
        let results = vec![
            result("h1", "first", 0.95),
            result("m1", "second", 0.7),
            result("h2", "third", 0.85),
            result("l1", "fourth", 0.2),
        ];
        let context = build_context(&results);
        let ids: Vec<&str> = context
            .relevant_memories
            .iter()
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(ids, vec!["h1", "h2"]);
    }

    #[test]
    fn test_summary_counts_and_references() {
        let results = vec![
            result("h1", "first", 0.95),
            result("m1", "second", 0.7),
            result("m2", "third", 0.65),
        ];
        let summary = summarize(&results);
        assert!(summary.starts_with("I found 1 highly relevant memory from your past entries."));
        assert!(summary.contains("There are also 2 somewhat related memories."));
        assert!(summary.contains("\"first\""));
        assert!(summary.contains("\"second\""));
        assert!(!summary.contains("\"third\""));
    }

    #[test]
    fn test_excerpt_truncates_by_chars() {
        let long = "é".repeat(150);
        let cut = excerpt(&long, 100);
        assert_eq!(cut.chars().count(), 103);
        assert!(cut.ends_with("..."));
        assert_eq!(excerpt("short", 100), "short");
        assert_eq!(excerpt(&"a".repeat(100), 100), "a".repeat(100));
    }

    #[test]
    fn test_suggestions_in_check_order() {
        let results = vec![
            result("a", "Working on my health goal", 0.9),
            result("b", "It was a struggle to stay focused", 0.7),
        ];
        assert_eq!(
            suggest(&results),
            vec![
                "Consider how this relates to your recurring theme of health".to_string(),
                GOALS_NUDGE.to_string(),
                CHALLENGES_NUDGE.to_string(),
            ]
        );
    }

    #[test]
    fn test_only_first_theme_used() {
        let results = vec![result("a", "self-care and creativity and relationships", 0.9)];
        let suggestions = suggest(&results);
        assert_eq!(suggestions.len(), 1);
        assert!(suggestions[0].ends_with("relationships"));
    }

    #[test]
    fn test_no_suggestions_without_keywords() {
        assert!(suggest(&[result("a", "rain again", 0.9)]).is_empty());
    }
}
