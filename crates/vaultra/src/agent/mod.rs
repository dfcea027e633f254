//! Conversational assistant grounded in the business's own metrics.

pub mod domain;
pub mod llm;
pub mod repository;
pub mod router;
pub mod service;
pub mod tools;

pub use domain::{
    ChatRequest, ChatResponse, Conversation, ConversationMessage, ConversationView, MessageRole,
    PromptMessage,
};
pub use llm::{generator_from_config, GenerationError, OllamaGenerator, OpenAiGenerator, TextGenerator};
pub use repository::ConversationRepository;
pub use router::agent_router;
pub use service::{AgentService, DEGRADED_REPLY};
pub use tools::{
    select_tools, AgentTools, BusinessDirectory, ContextTool, MetricsReader, ReadinessReader,
    RecommendationReader, ToolOutput,
};
