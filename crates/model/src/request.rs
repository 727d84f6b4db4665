use crate::{FileContext, Message};

/// Parameters for creating a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NewConversation {
    /// Title of the conversation.
    pub title: String,
    /// Files to ground the conversation with from the start.
    pub file_context: Option<FileContext>,
}

/// A user message to deliver to a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OutgoingMessage {
    /// Target conversation.
    pub conversation_id: String,
    /// Text of the message.
    pub content: String,
    /// Overrides the conversation's file context for this message.
    pub file_context: Option<FileContext>,
}

/// Replacement of a conversation's file context.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContextUpdate {
    /// Target conversation.
    pub conversation_id: String,
    /// The new set of files.
    pub file_context: FileContext,
}

/// The server's answer to a sent message.
///
/// Most backends answer with the assistant message alone, which leaves
/// `echoed` empty. Echoing the confirmed user message next to it, as
/// `{userMessage, assistantMessage}`, is an extension some backends
/// offer; when present it takes the local message's place.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SendReceipt {
    /// The confirmed copy of the user's message, when the server echoes
    /// it back.
    pub echoed: Option<Message>,
    /// The message the server returned, usually the assistant's reply.
    pub reply: Message,
}

impl SendReceipt {
    /// Creates a receipt that only carries a reply.
    #[inline]
    pub fn reply(reply: Message) -> Self {
        Self {
            echoed: None,
            reply,
        }
    }

    /// Returns the conversation the receipt belongs to.
    #[inline]
    pub fn conversation_id(&self) -> &str {
        &self.reply.conversation_id
    }
}
