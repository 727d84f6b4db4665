//! The pending/fulfilled/rejected lifecycle shared by remote operations.

use std::fmt::{self, Display};

/// A remote operation issued by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Loads every conversation.
    FetchConversations,
    /// Loads one conversation into the open slot.
    FetchConversation,
    /// Creates a conversation.
    CreateConversation,
    /// Sends (or resends) a user message.
    SendMessage,
    /// Deletes a conversation.
    DeleteConversation,
    /// Replaces a conversation's file context.
    UpdateContext,
}

impl Operation {
    /// Returns the loading flag this operation raises while in flight.
    #[inline]
    pub fn scope(self) -> LoadingScope {
        match self {
            Operation::SendMessage => LoadingScope::Message,
            _ => LoadingScope::General,
        }
    }

    /// Returns the error shown when the server gives no message of its
    /// own.
    pub fn fallback_message(self) -> &'static str {
        match self {
            Operation::FetchConversations => "Failed to fetch conversations",
            Operation::FetchConversation => "Failed to fetch conversation",
            Operation::CreateConversation => "Failed to create conversation",
            Operation::SendMessage => "Failed to send message",
            Operation::DeleteConversation => "Failed to delete conversation",
            Operation::UpdateContext => {
                "Failed to update conversation context"
            }
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::FetchConversations => "fetch conversations",
            Operation::FetchConversation => "fetch conversation",
            Operation::CreateConversation => "create conversation",
            Operation::SendMessage => "send message",
            Operation::DeleteConversation => "delete conversation",
            Operation::UpdateContext => "update context",
        };
        f.write_str(s)
    }
}

/// Which loading flag an operation drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoadingScope {
    /// Conversation loading and management.
    General,
    /// Message sending.
    Message,
}

/// Loading flags and the last error.
///
/// Flags count the requests in flight, so overlapping requests keep a
/// flag raised until the last of them resolves.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Lifecycle {
    general: usize,
    message: usize,
    error: Option<String>,
}

impl Lifecycle {
    /// Enters the pending phase of `op`.
    pub fn begin(&mut self, op: Operation) {
        *self.counter(op.scope()) += 1;
        self.error = None;
        debug!("{op}: pending");
    }

    /// Enters the fulfilled phase of `op`.
    pub fn succeed(&mut self, op: Operation) {
        self.settle(op);
        debug!("{op}: fulfilled");
    }

    /// Enters the rejected phase of `op` and records the error.
    ///
    /// The server's message wins over the operation's fallback unless
    /// it is blank. Returns the recorded message.
    pub fn fail(&mut self, op: Operation, server_message: Option<&str>) -> &str {
        self.settle(op);
        let message = server_message
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(op.fallback_message());
        warn!("{op}: rejected: {message}");
        self.error.insert(message.to_owned())
    }

    /// Drops the last error.
    #[inline]
    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Returns `true` while any conversation request is in flight.
    #[inline]
    pub fn is_loading(&self) -> bool {
        self.general > 0
    }

    /// Returns `true` while any message is being sent.
    #[inline]
    pub fn is_message_loading(&self) -> bool {
        self.message > 0
    }

    /// Returns the last error.
    #[inline]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn settle(&mut self, op: Operation) {
        let counter = self.counter(op.scope());
        *counter = counter.saturating_sub(1);
    }

    fn counter(&mut self, scope: LoadingScope) -> &mut usize {
        match scope {
            LoadingScope::General => &mut self.general,
            LoadingScope::Message => &mut self.message,
        }
    }
}
