use std::time::Duration;

use parley_model::{ErrorKind, FileContext, SourceCitation};

/// The remote operations a test can script.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    /// `GET /conversations`
    ListConversations,
    /// `GET /conversations/{id}`
    GetConversation,
    /// `POST /conversations`
    CreateConversation,
    /// `POST /conversations/{id}/messages`
    SendMessage,
    /// `DELETE /conversations/{id}`
    DeleteConversation,
    /// `PUT /conversations/{id}/context`
    UpdateContext,
}

/// The preset answer to the next sent message.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PresetReply {
    /// Content of the assistant message.
    pub content: String,
    /// Citations attached to the assistant message.
    pub sources: Vec<SourceCitation>,
    /// Whether the confirmed user message is echoed back too.
    pub echo_user: bool,
    /// Overrides the backend delay for this reply only.
    pub delay: Option<Duration>,
}

impl PresetReply {
    /// Creates a reply with the specified content.
    #[inline]
    pub fn with_content<S: Into<String>>(content: S) -> Self {
        Self {
            content: content.into(),
            sources: vec![],
            echo_user: false,
            delay: None,
        }
    }

    /// Attaches citations to the reply.
    #[inline]
    pub fn with_sources(mut self, sources: Vec<SourceCitation>) -> Self {
        self.sources = sources;
        self
    }

    /// Echoes the confirmed user message along with the reply.
    #[inline]
    pub fn echoing_user(mut self) -> Self {
        self.echo_user = true;
        self
    }

    /// Delays this reply by `delay`.
    #[inline]
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// A failure injected into the next call of a route.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PresetFailure {
    /// Kind of the returned error.
    pub kind: ErrorKind,
    /// Message of the error payload, if any.
    pub message: Option<String>,
}

/// A request the backend has received.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RecordedRequest {
    /// Which operation was called.
    pub route: Route,
    /// The conversation addressed by the call, if any.
    pub conversation_id: Option<String>,
    /// Message content or conversation title carried by the call.
    pub text: Option<String>,
    /// File context carried by the call, if any.
    pub file_context: Option<FileContext>,
}
