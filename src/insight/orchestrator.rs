//! Insight orchestrator
//!
//! One generation call runs through
//! `Idle -> ContextAssembled -> Requested -> Completed | Failed`:
//! memory context is fetched, the prompt assembled, the completion provider
//! invoked once, metadata extracted and the conversation extended. There are
//! no retries at this layer; transport retries live in the providers.

use super::extractor::MetadataExtractor;
use super::prompt::{build_messages, system_prompt, user_prompt};
use super::types::{ConversationMessage, InsightRequest, InsightResponse};
use crate::error::{Error, Result};
use crate::memory::MemoryEngine;
use crate::providers::{CompletionProvider, ProviderHandle};
use chrono::Utc;
use std::sync::Arc;

/// Default number of memories fetched as generation context
pub const DEFAULT_CONTEXT_SIZE: usize = 3;

/// Stage of one generation call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPhase {
    Idle,
    ContextAssembled,
    Requested,
    Completed,
    Failed,
}

impl GenerationPhase {
    fn advance(&mut self, next: GenerationPhase, document_id: &str) {
        tracing::debug!(document_id, from = ?*self, to = ?next, "Insight generation phase");
        *self = next;
    }
}

/// Generates insights conditioned on memories and conversation history
pub struct InsightOrchestrator {
    completion: ProviderHandle<dyn CompletionProvider>,
    memory: Arc<MemoryEngine>,
    context_size: usize,
}

impl InsightOrchestrator {
    pub fn new(completion: ProviderHandle<dyn CompletionProvider>, memory: Arc<MemoryEngine>) -> Self {
        Self {
            completion,
            memory,
            context_size: DEFAULT_CONTEXT_SIZE,
        }
    }

    /// Number of memories requested for context
    pub fn with_context_size(mut self, size: usize) -> Self {
        self.context_size = size;
        self
    }

    /// Generate an insight for `document_content`.
    ///
    /// Memory context is used only when `user_id` is given; the same user id
    /// receives a new memory of the document afterwards. Errors are
    /// [`Error::Config`] for a missing completion provider and
    /// [`Error::Generation`] for anything the provider reports.
    pub async fn generate_insight(
        &self,
        document_content: &str,
        request: &InsightRequest,
        user_id: Option<&str>,
    ) -> Result<InsightResponse> {
        let completion = self.completion.require()?;
        let mut phase = GenerationPhase::Idle;

        let context = match user_id {
            Some(user_id) => Some(
                self.memory
                    .get_memory_context(document_content, user_id, self.context_size)
                    .await,
            ),
            None => None,
        };
        phase.advance(GenerationPhase::ContextAssembled, &request.document_id);

        let prompt = user_prompt(document_content, request, context.as_ref());
        let messages = build_messages(system_prompt(context.as_ref()), request, &prompt);

        phase.advance(GenerationPhase::Requested, &request.document_id);
        let insight = match completion.complete(&messages).await {
            Ok(text) => text,
            Err(Error::Config(reason)) => {
                phase.advance(GenerationPhase::Failed, &request.document_id);
                return Err(Error::Config(reason));
            }
            Err(e) => {
                phase.advance(GenerationPhase::Failed, &request.document_id);
                tracing::warn!(
                    "Completion via {} failed for document {}: {}",
                    completion.name(),
                    request.document_id,
                    e
                );
                return Err(Error::Generation(e.to_string()));
            }
        };

        let metadata = MetadataExtractor::extract(&insight);

        let now = Utc::now();
        let mut conversation_history = request.conversation_history.clone();
        conversation_history.push(ConversationMessage::user(prompt, now));
        conversation_history.push(ConversationMessage::assistant(insight.clone(), now));

        if let Some(user_id) = user_id {
            self.memory.remember_entry(document_content, user_id).await;
        }

        phase.advance(GenerationPhase::Completed, &request.document_id);
        tracing::info!(
            document_id = %request.document_id,
            kind = %request.kind,
            turns = conversation_history.len(),
            "Generated insight"
        );

        Ok(InsightResponse {
            insight,
            conversation_history,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insight::types::{ConversationRole, Sentiment};
    use crate::memory::{Memory, MemoryMetadata};
    use crate::providers::{ChatRole, EmbeddingProvider};
    use crate::storage::{Collection, InMemoryRemoteStore, LocalCache, RemoteStore};
    use crate::testing::{FixedEmbedder, ScriptedCompletion};
    use chrono::TimeZone;
    use tempfile::TempDir;

    struct Fixture {
        remote: Arc<InMemoryRemoteStore>,
        memory: Arc<MemoryEngine>,
        _dir: TempDir,
    }

    fn fixture(embedder: ProviderHandle<dyn EmbeddingProvider>) -> Fixture {
        let dir = TempDir::new().unwrap();
        let local = Arc::new(LocalCache::open(dir.path().to_path_buf()).unwrap());
        let remote = Arc::new(InMemoryRemoteStore::new());
        let memory = Arc::new(MemoryEngine::new(
            embedder,
            ProviderHandle::configured(remote.clone() as Arc<dyn RemoteStore>),
            local,
        ));
        Fixture {
            remote,
            memory,
            _dir: dir,
        }
    }

    fn orchestrator(f: &Fixture, completion: Arc<ScriptedCompletion>) -> InsightOrchestrator {
        InsightOrchestrator::new(
            ProviderHandle::configured(completion as Arc<dyn CompletionProvider>),
            f.memory.clone(),
        )
    }

    #[tokio::test]
    async fn test_unconfigured_completion_fails_fast() {
        let f = fixture(FixedEmbedder::handle(vec![1.0, 0.0]));
        let orchestrator = InsightOrchestrator::new(
            ProviderHandle::unconfigured("no completion API key"),
            f.memory.clone(),
        );

        let err = orchestrator
            .generate_insight("Entry", &InsightRequest::single("d1"), Some("u1"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Config(_)));
        assert_eq!(f.remote.calls(), 0);
    }

    #[tokio::test]
    async fn test_single_insight_extends_history_and_stores_memory() {
        let f = fixture(FixedEmbedder::handle(vec![1.0, 0.0]));
        let completion =
            ScriptedCompletion::replying("You sound proud of your work. Try a short walk after lunch.");
        let orchestrator = orchestrator(&f, completion.clone());

        let response = orchestrator
            .generate_insight("Shipped the release today.", &InsightRequest::single("d1"), Some("u1"))
            .await
            .unwrap();

        assert_eq!(response.conversation_history.len(), 2);
        assert_eq!(response.conversation_history[0].role, ConversationRole::User);
        assert!(response.conversation_history[0]
            .content
            .contains("Shipped the release today."));
        assert_eq!(response.conversation_history[1].content, response.insight);
        assert_eq!(response.metadata.sentiment, Sentiment::Positive);
        assert_eq!(response.metadata.topics, vec!["work"]);
        assert_eq!(response.metadata.action_items, vec!["a short walk after lunch"]);

        let memories = f.remote.rows(Collection::Memories).await;
        assert_eq!(memories.len(), 1);
        assert_eq!(memories[0]["content"], "Shipped the release today.");
        assert_eq!(memories[0]["context"], "diary_entry");

        let requests = completion.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0][0].role, ChatRole::System);
    }

    #[tokio::test]
    async fn test_follow_up_appends_exactly_one_pair() {
        let f = fixture(FixedEmbedder::handle(vec![1.0, 0.0]));
        let completion = ScriptedCompletion::replying("Rest counts as progress.");
        let orchestrator = orchestrator(&f, completion.clone());

        let first = orchestrator
            .generate_insight("Tired all week.", &InsightRequest::single("d1"), None)
            .await
            .unwrap();
        let request = InsightRequest::follow_up(
            "d1",
            Some("What should I change?".to_string()),
            first.conversation_history.clone(),
        );
        let second = orchestrator
            .generate_insight("Tired all week.", &request, None)
            .await
            .unwrap();

        assert_eq!(second.conversation_history.len(), 4);
        assert_eq!(&second.conversation_history[..2], &first.conversation_history[..]);
        assert!(second.conversation_history[2]
            .content
            .contains("User's follow-up: What should I change?"));

        let sent = &completion.requests()[1];
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[1].role, ChatRole::User);
        assert_eq!(sent[2].role, ChatRole::Assistant);

        // no user id, no memory
        assert!(f.remote.rows(Collection::Memories).await.is_empty());
    }

    #[tokio::test]
    async fn test_provider_error_becomes_generation_error() {
        let f = fixture(FixedEmbedder::handle(vec![1.0, 0.0]));
        let orchestrator = orchestrator(&f, ScriptedCompletion::failing("rate limited"));

        let err = orchestrator
            .generate_insight("Entry", &InsightRequest::single("d1"), Some("u1"))
            .await
            .unwrap_err();

        match err {
            Error::Generation(message) => assert!(message.contains("rate limited")),
            other => panic!("expected generation error, got {}", other),
        }
        assert!(f.remote.rows(Collection::Memories).await.is_empty());
    }

    #[tokio::test]
    async fn test_memories_condition_the_prompt() {
        let f = fixture(FixedEmbedder::handle(vec![1.0, 0.0]));
        let past = Memory {
            id: "m-past".to_string(),
            user_id: "u1".to_string(),
            content: "I set a goal to exercise 3x/week".to_string(),
            context: "diary_entry".to_string(),
            tags: Vec::new(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 15, 20, 0, 0).unwrap(),
            metadata: MemoryMetadata::default(),
            embedding: Some(vec![1.0, 0.0]),
        };
        f.remote
            .upsert(Collection::Memories, serde_json::to_value(&past).unwrap())
            .await
            .unwrap();

        let completion = ScriptedCompletion::replying("Consistency beats intensity.");
        let orchestrator = orchestrator(&f, completion.clone());
        orchestrator
            .generate_insight(
                "Today I skipped the gym again.",
                &InsightRequest::single("d1"),
                Some("u1"),
            )
            .await
            .unwrap();

        let sent = &completion.requests()[0];
        assert!(sent[0]
            .content
            .contains("1. 2024-01-15: \"I set a goal to exercise 3x/week\""));
        let user = &sent.last().unwrap().content;
        assert!(user.contains("MEMORY CONTEXT: I found 1 highly relevant memory"));
        assert!(user.contains("- Reflect on how this connects to goals you've mentioned before"));
    }
}
