mod builder;
mod requests;
#[cfg(test)]
mod tests;

use std::collections::HashMap;

use parley_actor::{Actor, Message, Observable};
use parley_model::{Conversation, FileContext, ProvisionalId};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::api_client::ApiClient;
use crate::error::Error;
use crate::reconcile::ProvisionalClock;
use crate::state::ChatState;
pub use builder::ChatStoreBuilder;
use requests::*;

const EMPTY_TITLE: &str = "Please enter a title for the conversation";
const EMPTY_MESSAGE: &str = "Please enter a message";

type Reply<T> = oneshot::Sender<Result<T, Error>>;

/// The state owned by the store task.
pub(crate) struct StoreState {
    api: ApiClient,
    chat: ChatState,
    clock: ProvisionalClock,
    // File context overrides of sends that may still be retried.
    send_contexts: HashMap<ProvisionalId, FileContext>,
    running_tasks: HashMap<u64, JoinHandle<()>>,
    next_task_id: u64,

    on_error: Option<Box<dyn Fn(&str) + Send + Sync>>,
}

impl Observable for StoreState {
    type Snapshot = ChatState;

    #[inline]
    fn snapshot(&self) -> ChatState {
        self.chat.clone()
    }
}

impl Drop for StoreState {
    fn drop(&mut self) {
        for (_, task) in self.running_tasks.drain() {
            task.abort();
        }
    }
}

/// The client-side chat store.
///
/// The store owns the conversation list, the open conversation, the
/// loading flags and the last error. Operations are dispatched the
/// moment they are called; the returned futures only wait for the
/// outcome, so dropping one does not cancel the request. Observe the
/// state with [`ChatStore::subscribe`].
///
/// Must be created within a tokio runtime.
#[derive(Clone)]
pub struct ChatStore {
    handle: Actor<StoreState>,
}

impl ChatStore {
    fn spawn_from_builder(builder: ChatStoreBuilder) -> Self {
        let ChatStoreBuilder { api, on_error } = builder;
        let state = StoreState {
            api,
            chat: Default::default(),
            clock: Default::default(),
            send_contexts: Default::default(),
            running_tasks: Default::default(),
            next_task_id: 1,
            on_error,
        };
        Self {
            handle: Actor::spawn(state, Some("chat store")),
        }
    }

    fn request<T, M>(
        &self,
        make_msg: impl FnOnce(Reply<T>) -> M,
    ) -> oneshot::Receiver<Result<T, Error>>
    where
        M: Message<StoreState> + 'static,
    {
        let (tx, rx) = oneshot::channel();
        // A dead store drops the message, and with it the sender.
        self.handle.send(make_msg(tx)).ok();
        rx
    }

    /// Loads every conversation, replacing the list.
    pub fn fetch_conversations(
        &self,
    ) -> impl Future<Output = Result<Vec<Conversation>, Error>>
    + Send
    + 'static {
        let rx = self.request(FetchConversations);
        wait(Ok(rx))
    }

    /// Loads one conversation with its messages and opens it.
    ///
    /// The response is dropped if another conversation was opened (or
    /// the open one was closed) in the meantime.
    pub fn fetch_conversation(
        &self,
        conversation_id: impl Into<String>,
    ) -> impl Future<Output = Result<Conversation, Error>>
    + Send
    + 'static {
        let conversation_id = conversation_id.into();
        let rx = self.request(|reply| FetchConversation {
            conversation_id,
            reply,
        });
        wait(Ok(rx))
    }

    /// Creates a conversation, puts it first in the list and opens it.
    ///
    /// A blank title is refused without contacting the server.
    pub fn create_conversation(
        &self,
        title: impl Into<String>,
        file_context: Option<FileContext>,
    ) -> impl Future<Output = Result<Conversation, Error>>
    + Send
    + 'static {
        let title = title.into();
        let rx = if title.trim().is_empty() {
            Err(Error::InvalidInput(EMPTY_TITLE))
        } else {
            Ok(self.request(|reply| CreateConversation {
                title,
                file_context,
                reply,
            }))
        };
        wait(rx)
    }

    /// Sends a user message and resolves to the assistant's reply.
    ///
    /// If the target conversation is open, a provisional copy of the
    /// message shows up right away. It is replaced by the server's
    /// answer on success, and kept and marked failed otherwise.
    /// Blank content is refused without contacting the server.
    pub fn send_message(
        &self,
        conversation_id: impl Into<String>,
        content: impl Into<String>,
        file_context: Option<FileContext>,
    ) -> impl Future<Output = Result<parley_model::Message, Error>>
    + Send
    + 'static {
        let content = content.into();
        let rx = if content.trim().is_empty() {
            Err(Error::InvalidInput(EMPTY_MESSAGE))
        } else {
            let conversation_id = conversation_id.into();
            Ok(self.request(|reply| SendMessage {
                conversation_id,
                content,
                file_context,
                reply,
            }))
        };
        async move { wait(rx).await.map(|receipt| receipt.reply) }
    }

    /// Resends a failed message of the open conversation.
    pub fn retry_message(
        &self,
        id: ProvisionalId,
    ) -> impl Future<Output = Result<parley_model::Message, Error>>
    + Send
    + 'static {
        let rx = self.request(|reply| RetryMessage { id, reply });
        async move { wait(Ok(rx)).await.map(|receipt| receipt.reply) }
    }

    /// Removes a failed message from the open conversation. Returns
    /// `false` if there was no such failed message.
    pub fn discard_message(
        &self,
        id: ProvisionalId,
    ) -> impl Future<Output = Result<bool, Error>> + Send + 'static {
        let rx = self.request(|reply| DiscardMessage { id, reply });
        wait(Ok(rx))
    }

    /// Deletes a conversation. Closes it if it is open.
    pub fn delete_conversation(
        &self,
        conversation_id: impl Into<String>,
    ) -> impl Future<Output = Result<(), Error>> + Send + 'static {
        let conversation_id = conversation_id.into();
        let rx = self.request(|reply| DeleteConversation {
            conversation_id,
            reply,
        });
        wait(Ok(rx))
    }

    /// Replaces the file context of a conversation, in the list and in
    /// the open slot.
    pub fn update_context(
        &self,
        conversation_id: impl Into<String>,
        file_context: FileContext,
    ) -> impl Future<Output = Result<Conversation, Error>>
    + Send
    + 'static {
        let conversation_id = conversation_id.into();
        let rx = self.request(|reply| UpdateContext {
            conversation_id,
            file_context,
            reply,
        });
        wait(Ok(rx))
    }

    /// Closes the open conversation. Replies still in flight for it are
    /// dropped when they arrive.
    #[inline]
    pub fn clear_current_conversation(&self) {
        self.handle.send(ClearCurrent).ok();
    }

    /// Drops the last error.
    #[inline]
    pub fn clear_error(&self) {
        self.handle.send(ClearError).ok();
    }

    /// Returns the latest state.
    #[inline]
    pub fn state(&self) -> ChatState {
        self.handle.snapshot()
    }

    /// Returns a receiver that is notified on every state change.
    #[inline]
    pub fn subscribe(&self) -> watch::Receiver<ChatState> {
        self.handle.subscribe()
    }

    /// Stops the store. Requests in flight are aborted and pending
    /// operations resolve to [`Error::StoreStopped`].
    #[inline]
    pub fn shutdown(&self) {
        self.handle.try_kill();
    }
}

async fn wait<T>(
    rx: Result<oneshot::Receiver<Result<T, Error>>, Error>,
) -> Result<T, Error> {
    rx?.await.map_err(|_| Error::StoreStopped)?
}
