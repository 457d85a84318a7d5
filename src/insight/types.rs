//! Insight data types

use crate::storage::{Collection, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One generation call's output, as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    /// Unique insight identifier
    pub id: String,
    /// Document the insight was generated for
    pub document_id: String,
    #[serde(rename = "type")]
    pub kind: InsightType,
    /// Generated text
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Full conversation up to and including this insight
    #[serde(default)]
    pub conversation_history: Vec<ConversationMessage>,
    #[serde(default)]
    pub metadata: InsightMetadata,
}

impl Record for Insight {
    const COLLECTION: Collection = Collection::Insights;

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> Option<&str> {
        Some(&self.document_id)
    }

    fn sort_time(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Whether an insight starts a conversation or follows one up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightType {
    #[default]
    Single,
    Multi,
}

impl std::fmt::Display for InsightType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InsightType::Single => f.write_str("single"),
            InsightType::Multi => f.write_str("multi"),
        }
    }
}

/// Overall tone of a generated text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

/// Structured signal pulled out of a generated text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightMetadata {
    pub sentiment: Sentiment,
    pub topics: Vec<String>,
    pub action_items: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
}

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationRole {
    User,
    Assistant,
}

/// One append-only conversation turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: ConversationRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role: ConversationRole::User,
            content: content.into(),
            timestamp,
        }
    }

    pub fn assistant(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role: ConversationRole::Assistant,
            content: content.into(),
            timestamp,
        }
    }
}

/// Parameters of one generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightRequest {
    pub document_id: String,
    #[serde(rename = "type", default)]
    pub kind: InsightType,
    /// Follow-up question for multi insights
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Prior turns, oldest first
    #[serde(default)]
    pub conversation_history: Vec<ConversationMessage>,
}

impl InsightRequest {
    /// A first-turn request
    pub fn single(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            kind: InsightType::Single,
            prompt: None,
            conversation_history: Vec::new(),
        }
    }

    /// A follow-up continuing `history`
    pub fn follow_up(
        document_id: impl Into<String>,
        prompt: Option<String>,
        history: Vec<ConversationMessage>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            kind: InsightType::Multi,
            prompt,
            conversation_history: history,
        }
    }
}

/// Result of a successful generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightResponse {
    /// Generated text
    pub insight: String,
    /// Prior history plus the new user and assistant turns
    pub conversation_history: Vec<ConversationMessage>,
    pub metadata: InsightMetadata,
}

impl InsightResponse {
    /// Turn the response into a persistable insight
    pub fn into_insight(self, request: &InsightRequest) -> Insight {
        Insight {
            id: Uuid::new_v4().to_string(),
            document_id: request.document_id.clone(),
            kind: request.kind,
            content: self.insight,
            created_at: Utc::now(),
            conversation_history: self.conversation_history,
            metadata: self.metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insight_row_shape() {
        let insight = Insight {
            id: "i1".to_string(),
            document_id: "d1".to_string(),
            kind: InsightType::Multi,
            content: "Nice progress".to_string(),
            created_at: Utc::now(),
            conversation_history: vec![ConversationMessage::user("hi", Utc::now())],
            metadata: InsightMetadata {
                sentiment: Sentiment::Positive,
                ..Default::default()
            },
        };
        let row = serde_json::to_value(&insight).unwrap();
        assert_eq!(row["type"], "multi");
        assert_eq!(row["document_id"], "d1");
        assert_eq!(row["metadata"]["sentiment"], "positive");
        assert_eq!(row["conversation_history"][0]["role"], "user");
        assert!(row["metadata"].get("mood").is_none());

        let back: Insight = serde_json::from_value(row).unwrap();
        assert_eq!(back, insight);
    }

    #[test]
    fn test_request_defaults() {
        let request: InsightRequest = serde_json::from_str(r#"{"document_id":"d1"}"#).unwrap();
        assert_eq!(request.kind, InsightType::Single);
        assert!(request.prompt.is_none());
        assert!(request.conversation_history.is_empty());
    }

    #[test]
    fn test_sparse_metadata_row() {
        let insight: Insight = serde_json::from_str(
            r#"{"id":"i1","document_id":"d1","type":"single","content":"x",
                "created_at":"2024-05-01T10:00:00Z","metadata":{"sentiment":"negative"}}"#,
        )
        .unwrap();
        assert_eq!(insight.metadata.sentiment, Sentiment::Negative);
        assert!(insight.metadata.topics.is_empty());
        assert!(insight.conversation_history.is_empty());
    }
}
