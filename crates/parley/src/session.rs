use parley_core::{ChatState, ChatStore, ChatStoreBuilder, Error};
use parley_http::HttpChatApi;
use parley_model::{ChatApi, Conversation, Message, ProvisionalId};

use crate::Config;
use crate::command::Command;

const NO_OPEN_CONVERSATION: &str = "Open a conversation first";
const NO_FAILED_MESSAGE: &str = "There is no failed message";

/// The result of a successfully executed [`Command`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The conversation list was loaded.
    Listed(Vec<Conversation>),
    /// A conversation was opened.
    Opened(Conversation),
    /// A conversation was created and opened.
    Created(Conversation),
    /// A conversation was deleted.
    Deleted(String),
    /// The file context of a conversation was replaced.
    ContextUpdated(Conversation),
    /// The assistant replied.
    Replied(Message),
    /// A failed message was dropped.
    Discarded,
    /// The open conversation was closed.
    Closed,
    /// The user asked for help.
    Help,
    /// The user asked to leave.
    Quit,
}

/// A chat session, like a window that lists conversations, shows the
/// open one and has an input box.
///
/// The session is basically a wrapper around [`ChatStore`] that
/// understands prompt [`Command`]s.
#[derive(Clone)]
pub struct Session {
    store: ChatStore,
}

impl Session {
    /// Creates a session over any chat backend.
    ///
    /// Must be called within a tokio runtime.
    #[inline]
    pub fn with_api<A: ChatApi + 'static>(api: A) -> Self {
        Self::with_store(ChatStoreBuilder::with_api(api).build())
    }

    /// Creates a session over the HTTP backend described by `config`.
    ///
    /// Must be called within a tokio runtime.
    pub fn connect(config: &Config) -> Self {
        debug!("connecting with {config:?}");
        Self::with_api(HttpChatApi::new(config.api_config()))
    }

    /// Creates a session over an existing store.
    #[inline]
    pub fn with_store(store: ChatStore) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    #[inline]
    pub fn store(&self) -> &ChatStore {
        &self.store
    }

    /// Returns the latest chat state.
    #[inline]
    pub fn state(&self) -> ChatState {
        self.store.state()
    }

    /// Executes a command against the store.
    pub async fn execute(&self, command: Command) -> Result<Outcome, Error> {
        trace!("execute {command:?}");
        let store = &self.store;
        let outcome = match command {
            Command::List => Outcome::Listed(store.fetch_conversations().await?),
            Command::Open(id) => Outcome::Opened(store.fetch_conversation(id).await?),
            Command::New {
                title,
                file_context,
            } => Outcome::Created(store.create_conversation(title, file_context).await?),
            Command::Delete(id) => {
                let id = match id {
                    Some(id) => id,
                    None => self.current_id()?,
                };
                store.delete_conversation(id.clone()).await?;
                Outcome::Deleted(id)
            }
            Command::Context(file_context) => {
                let id = self.current_id()?;
                Outcome::ContextUpdated(store.update_context(id, file_context).await?)
            }
            Command::Retry => {
                let id = self.last_failed()?;
                Outcome::Replied(store.retry_message(id).await?)
            }
            Command::Discard => {
                let id = self.last_failed()?;
                store.discard_message(id).await?;
                Outcome::Discarded
            }
            Command::Close => {
                store.clear_current_conversation();
                Outcome::Closed
            }
            Command::Help => Outcome::Help,
            Command::Quit => Outcome::Quit,
            Command::Send(content) => {
                let id = self.current_id()?;
                Outcome::Replied(store.send_message(id, content, None).await?)
            }
        };
        Ok(outcome)
    }

    fn current_id(&self) -> Result<String, Error> {
        self.state()
            .current_conversation()
            .map(|c| c.id.clone())
            .ok_or(Error::InvalidInput(NO_OPEN_CONVERSATION))
    }

    fn last_failed(&self) -> Result<ProvisionalId, Error> {
        self.state()
            .last_failed_message()
            .and_then(|msg| msg.id.as_provisional())
            .ok_or(Error::InvalidInput(NO_FAILED_MESSAGE))
    }
}
