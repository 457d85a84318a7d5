//! Insight generation
//!
//! An insight is one completion call's output plus the conversation that led
//! to it and metadata extracted from the text.

pub mod extractor;
pub mod orchestrator;
pub mod prompt;
pub mod types;

pub use extractor::MetadataExtractor;
pub use orchestrator::{GenerationPhase, InsightOrchestrator};
pub use types::{
    ConversationMessage, ConversationRole, Insight, InsightMetadata, InsightRequest,
    InsightResponse, InsightType, Sentiment,
};
