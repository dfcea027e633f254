use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::domain::{
    ChatRequest, ChatResponse, Conversation, ConversationMessage, ConversationView, MessageRole,
    PromptMessage,
};
use super::llm::TextGenerator;
use super::repository::ConversationRepository;
use super::tools::{select_tools, AgentTools, ToolOutput};
use crate::error::ApiError;
use crate::ids::{ConversationId, MessageId, UserId};

const SYSTEM_PROMPT: &str = "You are Vaultra, a financial assistant that helps small businesses \
improve their funding readiness. You have access to the business's financial metrics, \
readiness score, and recommendations. Be concise, actionable, and data-driven.";

pub const DEGRADED_REPLY: &str =
    "I'm unable to respond at the moment. Please try again shortly.";

pub struct AgentService {
    conversations: Arc<dyn ConversationRepository>,
    tools: AgentTools,
    generator: Arc<dyn TextGenerator>,
}

impl AgentService {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        tools: AgentTools,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            conversations,
            tools,
            generator,
        }
    }

    /// Answers one user turn. The caller has already checked business membership.
    ///
    /// Both the user turn and the reply are appended to the conversation, which is
    /// created when the request does not name one.
    pub async fn chat(
        &self,
        user_id: UserId,
        request: ChatRequest,
        now: DateTime<Utc>,
    ) -> Result<ChatResponse, ApiError> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(ApiError::validation("Message must not be empty"));
        }

        let conversation = match request.conversation_id {
            Some(id) => {
                let existing = self.owned_conversation(id, user_id)?;
                if existing.business_id != request.business_id {
                    return Err(ApiError::forbidden("Access denied"));
                }
                existing
            }
            None => self.conversations.insert_conversation(Conversation {
                id: ConversationId::new(),
                business_id: request.business_id,
                user_id,
                created_at: now,
            })?,
        };

        let outputs = self
            .tools
            .gather(conversation.business_id, &select_tools(message));
        let history = self.conversations.messages(conversation.id)?;
        let prompt = build_prompt(&outputs, &history, message);

        let response = match self.generator.generate(&prompt).await {
            Ok(text) => text,
            Err(err) => {
                warn!(conversation_id = %conversation.id, error = %err, "text generation failed");
                DEGRADED_REPLY.to_string()
            }
        };

        let reply_id = MessageId::new();
        self.conversations.append_messages(vec![
            ConversationMessage {
                id: MessageId::new(),
                conversation_id: conversation.id,
                role: MessageRole::User,
                content: message.to_string(),
                created_at: now,
            },
            ConversationMessage {
                id: reply_id,
                conversation_id: conversation.id,
                role: MessageRole::Assistant,
                content: response.clone(),
                created_at: now,
            },
        ])?;
        info!(
            conversation_id = %conversation.id,
            tools = outputs.len(),
            "assistant replied"
        );

        Ok(ChatResponse {
            conversation_id: conversation.id,
            message_id: reply_id,
            response,
            tool_calls: outputs
                .iter()
                .map(|output| output.tool.name().to_string())
                .collect(),
        })
    }

    pub fn conversation(
        &self,
        id: ConversationId,
        user_id: UserId,
    ) -> Result<ConversationView, ApiError> {
        let conversation = self.owned_conversation(id, user_id)?;
        let messages = self.conversations.messages(conversation.id)?;
        Ok(ConversationView {
            id: conversation.id,
            business_id: conversation.business_id,
            messages,
        })
    }

    fn owned_conversation(
        &self,
        id: ConversationId,
        user_id: UserId,
    ) -> Result<Conversation, ApiError> {
        let conversation = self
            .conversations
            .find_conversation(id)?
            .ok_or_else(|| ApiError::not_found("Conversation not found"))?;
        if conversation.user_id != user_id {
            return Err(ApiError::forbidden("Access denied"));
        }
        Ok(conversation)
    }
}

fn build_prompt(
    outputs: &[ToolOutput],
    history: &[ConversationMessage],
    message: &str,
) -> Vec<PromptMessage> {
    let context: Map<String, Value> = outputs
        .iter()
        .map(|output| (output.tool.name().to_string(), output.payload.clone()))
        .collect();

    let mut prompt = Vec::with_capacity(history.len() + 2);
    prompt.push(PromptMessage::new(
        MessageRole::System,
        format!(
            "{SYSTEM_PROMPT}\n\nBusiness context: {}",
            Value::Object(context)
        ),
    ));
    prompt.extend(
        history
            .iter()
            .map(|turn| PromptMessage::new(turn.role, turn.content.clone())),
    );
    prompt.push(PromptMessage::new(MessageRole::User, message));
    prompt
}
