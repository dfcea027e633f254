use super::domain::{Conversation, ConversationMessage};
use crate::ids::ConversationId;
use crate::store::RepositoryError;

/// Conversation threads with append-only message history.
pub trait ConversationRepository: Send + Sync {
    fn insert_conversation(
        &self,
        conversation: Conversation,
    ) -> Result<Conversation, RepositoryError>;
    fn find_conversation(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError>;
    /// Fails with `NotFound` when the conversation does not exist.
    fn append_messages(&self, messages: Vec<ConversationMessage>) -> Result<(), RepositoryError>;
    /// Oldest first; messages sharing a timestamp keep their append order.
    fn messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<ConversationMessage>, RepositoryError>;
}
