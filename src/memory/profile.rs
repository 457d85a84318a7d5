//! Entry profiling
//!
//! Derives the tags and structural metadata a memory is stored with from the
//! raw text of a journal entry.

use super::types::{MemoryMetadata, NewMemory};

/// Context label for memories derived from journal entries
pub const DIARY_ENTRY_CONTEXT: &str = "diary_entry";

const TOPICS: [&str; 32] = [
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
    "exercise",
    "diet",
    "sleep",
    "meditation",
    "reading",
    "writing",
    "music",
    "travel",
    "hobbies",
    "finances",
    "education",
    "spirituality",
];

const CATEGORIES: [(&str, &[&str]); 5] = [
    ("goals", &["goal", "aim", "target"]),
    ("challenges", &["challenge", "struggle", "difficult"]),
    ("achievements", &["achieve", "accomplish", "success"]),
    ("learning", &["learn", "study", "understand"]),
    ("emotions", &["feel", "emotion", "mood"]),
];

/// Profile a journal entry into a memory ready to store
pub fn profile_entry(content: &str, user_id: &str, context: &str) -> NewMemory {
    let lower = content.to_lowercase();

    let topics = TOPICS.iter().filter(|t| lower.contains(*t)).map(|t| t.to_string());
    let categories: Vec<String> = CATEGORIES
        .iter()
        .filter(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(name, _)| name.to_string())
        .collect();

    let has = |name: &str| categories.iter().any(|c| c == name);
    let metadata = MemoryMetadata {
        word_count: content.split_whitespace().count(),
        has_goals: has("goals"),
        has_challenges: has("challenges"),
        has_achievements: has("achievements"),
        categories: categories.clone(),
    };

    NewMemory {
        user_id: user_id.to_string(),
        content: content.to_string(),
        context: context.to_string(),
        tags: topics.chain(categories).collect(),
        metadata,
    }
}
