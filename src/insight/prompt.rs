//! Prompt assembly for insight generation

use super::types::{ConversationRole, InsightRequest, InsightType};
use crate::memory::context::excerpt;
use crate::memory::MemoryContext;
use crate::providers::ChatMessage;

/// Characters of a memory quoted in the system instruction
pub const SYSTEM_EXCERPT_CHARS: usize = 150;

/// Memories listed in the system instruction
const MAX_LISTED_MEMORIES: usize = 3;

const FOLLOW_UP_FALLBACK: &str = "Please provide additional insights.";

const BASE_SYSTEM_PROMPT: &str = "\
You are a thoughtful journaling companion who remembers the writer's journey. \
Analyze each diary entry and respond with insight that builds on what you know of their history.

Your responses should be:
1. Emotionally aware: name the emotions present and validate them
2. Pattern-recognizing: point out recurring themes, especially across past entries
3. Actionable: offer specific, practical next steps
4. Growth-oriented: highlight learning opportunities and personal development
5. Encouraging: celebrate wins and keep a warm, motivating tone

When relevant memories from past entries are available, weave them in naturally \
(\"You mentioned before that...\", \"This reminds me of when you...\").

Keep responses concise but complete, typically 200-400 words.";

/// The system instruction, listing up to three relevant memories
pub fn system_prompt(context: Option<&MemoryContext>) -> String {
    let mut prompt = BASE_SYSTEM_PROMPT.to_string();

    let Some(context) = context.filter(|c| !c.relevant_memories.is_empty()) else {
        return prompt;
    };

    let listed: Vec<String> = context
        .relevant_memories
        .iter()
        .take(MAX_LISTED_MEMORIES)
        .enumerate()
        .map(|(i, memory)| {
            format!(
                "{}. {}: \"{}\"",
                i + 1,
                memory.created_at.format("%Y-%m-%d"),
                excerpt(&memory.content, SYSTEM_EXCERPT_CHARS)
            )
        })
        .collect();

    prompt.push_str("\n\nRELEVANT MEMORIES FROM PAST ENTRIES:\n");
    prompt.push_str(&listed.join("\n"));
    prompt.push_str(
        "\n\nUse these memories to personalize your insights. \
         Reference specific past experiences when relevant.",
    );
    prompt
}

/// The new user turn for `request`
pub fn user_prompt(
    document_content: &str,
    request: &InsightRequest,
    context: Option<&MemoryContext>,
) -> String {
    let context = context.filter(|c| c.has_memories());

    match request.kind {
        InsightType::Single => {
            let mut prompt = format!(
                "Please analyze this diary entry and provide insights:\n\n{}",
                document_content
            );
            if let Some(context) = context {
                prompt.push_str(&format!("\n\nMEMORY CONTEXT: {}", context.summary));
                if !context.suggestions.is_empty() {
                    let bullets: Vec<String> = context
                        .suggestions
                        .iter()
                        .map(|s| format!("- {}", s))
                        .collect();
                    prompt.push_str(&format!(
                        "\n\nSUGGESTIONS TO CONSIDER:\n{}",
                        bullets.join("\n")
                    ));
                }
            }
            prompt
        }
        InsightType::Multi => {
            let follow_up = request
                .prompt
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .unwrap_or(FOLLOW_UP_FALLBACK);
            let mut prompt = format!(
                "Please continue our conversation about this diary entry. \
                 Here's the original entry:\n\n{}\n\nUser's follow-up: {}",
                document_content, follow_up
            );
            if let Some(context) = context {
                prompt.push_str(&format!("\n\nMEMORY CONTEXT: {}", context.summary));
            }
            prompt
        }
    }
}

/// System instruction, prior turns in order, then `user_prompt`
pub fn build_messages(
    system_prompt: String,
    request: &InsightRequest,
    user_prompt: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(request.conversation_history.len() + 2);
    messages.push(ChatMessage::system(system_prompt));
    messages.extend(
        request
            .conversation_history
            .iter()
            .map(|turn| match turn.role {
                ConversationRole::User => ChatMessage::user(turn.content.clone()),
                ConversationRole::Assistant => ChatMessage::assistant(turn.content.clone()),
            }),
    );
    messages.push(ChatMessage::user(user_prompt));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insight::types::ConversationMessage;
    use crate::memory::context::build_context;
    use crate::memory::{Memory, MemoryMetadata, MemorySearchResult};
    use crate::providers::ChatRole;
    use chrono::{TimeZone, Utc};

    fn memory(content: &str) -> Memory {
        Memory {
            id: "m1".to_string(),
            user_id: "u1".to_string(),
            content: content.to_string(),
            context: "diary_entry".to_string(),
            tags: Vec::new(),
            created_at: Utc.with_ymd_and_hms(2024, 2, 10, 7, 0, 0).unwrap(),
            metadata: MemoryMetadata::default(),
            embedding: None,
        }
    }

    fn context_with(content: &str, similarity: f32) -> MemoryContext {
        build_context(&[MemorySearchResult::new(memory(content), similarity)])
    }

    #[test]
    fn test_system_prompt_without_memories() {
        let prompt = system_prompt(Some(&MemoryContext::empty()));
        assert!(!prompt.contains("RELEVANT MEMORIES"));
        assert_eq!(prompt, system_prompt(None));
    }

    #[test]
    fn test_system_prompt_lists_memory_excerpt() {
        let long = "a".repeat(200);
        let prompt = system_prompt(Some(&context_with(&long, 0.9)));
        assert!(prompt.contains("RELEVANT MEMORIES FROM PAST ENTRIES:"));
        assert!(prompt.contains(&format!("1. 2024-02-10: \"{}...\"", "a".repeat(150))));
    }

    #[test]
    fn test_single_prompt_with_context() {
        let context = context_with("Working toward my health goal", 0.9);
        let prompt = user_prompt(
            "Slept eight hours.",
            &InsightRequest::single("d1"),
            Some(&context),
        );
        assert!(prompt.starts_with("Please analyze this diary entry and provide insights:\n\nSlept eight hours."));
        assert!(prompt.contains("\n\nMEMORY CONTEXT: I found 1 highly relevant memory"));
        assert!(prompt.contains("SUGGESTIONS TO CONSIDER:\n- Consider how this relates"));
    }

    #[test]
    fn test_single_prompt_skips_empty_context() {
        let prompt = user_prompt(
            "Slept eight hours.",
            &InsightRequest::single("d1"),
            Some(&MemoryContext::empty()),
        );
        assert!(!prompt.contains("MEMORY CONTEXT"));
    }

    #[test]
    fn test_multi_prompt_default_follow_up() {
        let request = InsightRequest::follow_up("d1", None, Vec::new());
        let prompt = user_prompt("Entry text", &request, None);
        assert!(prompt.contains("Entry text"));
        assert!(prompt.ends_with("User's follow-up: Please provide additional insights."));

        let request = InsightRequest::follow_up("d1", Some("Why am I tired?".to_string()), Vec::new());
        assert!(user_prompt("Entry text", &request, None).ends_with("User's follow-up: Why am I tired?"));
    }

    #[test]
    fn test_messages_replay_history_in_order() {
        let now = Utc::now();
        let request = InsightRequest::follow_up(
            "d1",
            Some("more?".to_string()),
            vec![
                ConversationMessage::user("first question", now),
                ConversationMessage::assistant("first answer", now),
            ],
        );
        let messages = build_messages("sys".to_string(), &request, "second question");
        let roles: Vec<ChatRole> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![ChatRole::System, ChatRole::User, ChatRole::Assistant, ChatRole::User]
        );
        assert_eq!(messages[2].content, "first answer");
        assert_eq!(messages[3].content, "second question");
    }
}
