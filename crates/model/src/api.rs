use std::error::Error;

use crate::error::ErrorKind;
use crate::request::{
    ContextUpdate, NewConversation, OutgoingMessage, SendReceipt,
};
use crate::Conversation;

/// The error type for a chat API.
pub trait ApiError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;

    /// Returns the human-readable message from the server's error
    /// payload, if the server sent one.
    fn server_message(&self) -> Option<&str>;
}

/// A remote chat backend.
///
/// Every method returns a future that is fully independent of `self`, so
/// callers can move it onto another task. Implementations should behave
/// like stateless objects: the client may drop them at any time, and it
/// never retries or cancels a request on their behalf.
pub trait ChatApi: Send + Sync {
    /// The error type that may be returned by the backend.
    type Error: ApiError;

    /// Lists every conversation visible to the caller.
    fn list_conversations(
        &self,
    ) -> impl Future<Output = Result<Vec<Conversation>, Self::Error>> + Send + 'static;

    /// Fetches one conversation with its messages.
    fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> impl Future<Output = Result<Conversation, Self::Error>> + Send + 'static;

    /// Creates a conversation. The server assigns its identifier.
    fn create_conversation(
        &self,
        req: &NewConversation,
    ) -> impl Future<Output = Result<Conversation, Self::Error>> + Send + 'static;

    /// Sends a user message and waits for the server's answer.
    fn send_message(
        &self,
        req: &OutgoingMessage,
    ) -> impl Future<Output = Result<SendReceipt, Self::Error>> + Send + 'static;

    /// Deletes a conversation.
    fn delete_conversation(
        &self,
        conversation_id: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static;

    /// Replaces the file context of a conversation.
    fn update_context(
        &self,
        req: &ContextUpdate,
    ) -> impl Future<Output = Result<Conversation, Self::Error>> + Send + 'static;
}
