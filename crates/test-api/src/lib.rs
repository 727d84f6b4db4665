//! A local fake chat backend for testing purpose.

mod preset;

use std::collections::{HashMap, VecDeque};
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use parley_model::{
    ApiError, ChatApi, ContextUpdate, Conversation, ErrorKind, FileContext, Message,
    NewConversation, OutgoingMessage, Role, SendReceipt,
};
use tokio::time::sleep;

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
}

impl Error {
    fn new(kind: ErrorKind, message: &str) -> Self {
        Self {
            kind,
            message: Some(message.to_owned()),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {message}", self.kind),
            None => Display::fmt(&self.kind, f),
        }
    }
}

impl StdError for Error {}

impl ApiError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[inline]
    fn server_message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

#[derive(Default)]
struct Backend {
    // Newest first, like a real listing.
    conversations: Vec<Conversation>,
    next_id: u64,
    replies: VecDeque<PresetReply>,
    failures: HashMap<Route, VecDeque<PresetFailure>>,
    delay: Option<Duration>,
    requests: Vec<RecordedRequest>,
}

impl Backend {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn record(
        &mut self,
        route: Route,
        conversation_id: Option<&str>,
        text: Option<&str>,
        file_context: Option<&FileContext>,
    ) -> Result<(), Error> {
        self.requests.push(RecordedRequest {
            route,
            conversation_id: conversation_id.map(ToOwned::to_owned),
            text: text.map(ToOwned::to_owned),
            file_context: file_context.cloned(),
        });
        let failure = self
            .failures
            .get_mut(&route)
            .and_then(VecDeque::pop_front);
        match failure {
            Some(PresetFailure { kind, message }) => Err(Error { kind, message }),
            None => Ok(()),
        }
    }

    fn find_mut(&mut self, id: &str) -> Result<&mut Conversation, Error> {
        self.conversations
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::new(ErrorKind::NotFound, "Conversation not found"))
    }

    fn list(&mut self) -> Result<Vec<Conversation>, Error> {
        self.record(Route::ListConversations, None, None, None)?;
        Ok(self.conversations.clone())
    }

    fn get(&mut self, id: &str) -> Result<Conversation, Error> {
        self.record(Route::GetConversation, Some(id), None, None)?;
        self.find_mut(id).map(|c| c.clone())
    }

    fn create(&mut self, req: &NewConversation) -> Result<Conversation, Error> {
        self.record(
            Route::CreateConversation,
            None,
            Some(&req.title),
            req.file_context.as_ref(),
        )?;
        if req.title.trim().is_empty() {
            return Err(Error::new(ErrorKind::Rejected, "Title is required"));
        }
        let mut conversation =
            Conversation::new(self.next_id("conv"), req.title.clone(), Utc::now());
        conversation.file_context = req.file_context.clone().unwrap_or_default();
        self.conversations.insert(0, conversation.clone());
        Ok(conversation)
    }

    fn send(
        &mut self,
        req: &OutgoingMessage,
    ) -> Result<(SendReceipt, Option<Duration>), Error> {
        self.record(
            Route::SendMessage,
            Some(&req.conversation_id),
            Some(&req.content),
            req.file_context.as_ref(),
        )?;
        self.find_mut(&req.conversation_id)?;
        let user_id = self.next_id("msg");
        let reply_id = self.next_id("msg");
        let preset = self.replies.pop_front().unwrap_or_else(|| {
            PresetReply::with_content(format!("You said {}", req.content))
        });

        let conversation = self.find_mut(&req.conversation_id)?;
        let now = Utc::now();
        let user_msg = Message::confirmed(
            user_id,
            req.conversation_id.clone(),
            Role::User,
            req.content.clone(),
            now,
        );
        let reply = Message::confirmed(
            reply_id,
            req.conversation_id.clone(),
            Role::Assistant,
            preset.content,
            now,
        )
        .with_sources(preset.sources);
        conversation.messages.push(user_msg.clone());
        conversation.messages.push(reply.clone());
        conversation.touch(now);

        let receipt = SendReceipt {
            echoed: preset.echo_user.then_some(user_msg),
            reply,
        };
        Ok((receipt, preset.delay))
    }

    fn delete(&mut self, id: &str) -> Result<(), Error> {
        self.record(Route::DeleteConversation, Some(id), None, None)?;
        let before = self.conversations.len();
        self.conversations.retain(|c| c.id != id);
        if self.conversations.len() == before {
            return Err(Error::new(ErrorKind::NotFound, "Conversation not found"));
        }
        Ok(())
    }

    fn update_context(&mut self, req: &ContextUpdate) -> Result<Conversation, Error> {
        self.record(
            Route::UpdateContext,
            Some(&req.conversation_id),
            None,
            Some(&req.file_context),
        )?;
        let conversation = self.find_mut(&req.conversation_id)?;
        conversation.file_context = req.file_context.clone();
        conversation.touch(Utc::now());
        Ok(conversation.clone())
    }
}

/// A local fake chat backend for testing purpose.
///
/// The backend keeps its conversations in memory and answers every call
/// right away, after an optional delay. Sent messages are answered with
/// the queued [`PresetReply`] values in order, or with an echo of the
/// content once the queue runs dry. Failures can be injected per route.
///
/// Clones share the same backend, so a test can keep one to inspect the
/// server side while the store owns another.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestChatApi {
    backend: Arc<Mutex<Backend>>,
}

impl TestChatApi {
    fn backend(&self) -> MutexGuard<'_, Backend> {
        // A panicking test thread must not hide the state from the others.
        self.backend.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seeds a conversation, placing it at the front of the listing.
    pub fn insert_conversation(&self, conversation: Conversation) {
        self.backend().conversations.insert(0, conversation);
    }

    /// Queues the answer to the next sent message.
    #[inline]
    pub fn add_reply(&self, reply: PresetReply) {
        self.backend().replies.push_back(reply);
    }

    /// Makes the next call of `route` fail.
    pub fn fail_next(&self, route: Route, kind: ErrorKind, message: Option<&str>) {
        self.backend()
            .failures
            .entry(route)
            .or_default()
            .push_back(PresetFailure {
                kind,
                message: message.map(ToOwned::to_owned),
            });
    }

    /// Delays every answer by `duration`.
    #[inline]
    pub fn set_delay(&self, duration: Duration) {
        self.backend().delay = Some(duration);
    }

    /// Returns the requests received so far.
    #[inline]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.backend().requests.clone()
    }

    /// Returns the server-side copy of a conversation.
    #[inline]
    pub fn conversation(&self, id: &str) -> Option<Conversation> {
        self.backend().conversations.iter().find(|c| c.id == id).cloned()
    }

    fn answer<T>(
        &self,
        f: impl FnOnce(&mut Backend) -> Result<T, Error>,
    ) -> (Result<T, Error>, Option<Duration>) {
        let mut backend = self.backend();
        let delay = backend.delay;
        (f(&mut backend), delay)
    }
}

async fn delayed<T>(result: T, delay: Option<Duration>) -> T {
    if let Some(delay) = delay {
        sleep(delay).await;
    }
    result
}

impl ChatApi for TestChatApi {
    type Error = crate::Error;

    fn list_conversations(
        &self,
    ) -> impl Future<Output = Result<Vec<Conversation>, Self::Error>> + Send + 'static
    {
        let (result, delay) = self.answer(Backend::list);
        delayed(result, delay)
    }

    fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> impl Future<Output = Result<Conversation, Self::Error>> + Send + 'static
    {
        let (result, delay) =
            self.answer(|backend| backend.get(conversation_id));
        delayed(result, delay)
    }

    fn create_conversation(
        &self,
        req: &NewConversation,
    ) -> impl Future<Output = Result<Conversation, Self::Error>> + Send + 'static
    {
        let (result, delay) =
            self.answer(|backend| backend.create(req));
        delayed(result, delay)
    }

    fn send_message(
        &self,
        req: &OutgoingMessage,
    ) -> impl Future<Output = Result<SendReceipt, Self::Error>> + Send + 'static
    {
        let (result, delay) = {
            let mut backend = self.backend();
            let default_delay = backend.delay;
            match backend.send(req) {
                Ok((receipt, delay)) => (Ok(receipt), delay.or(default_delay)),
                Err(err) => (Err(err), default_delay),
            }
        };
        delayed(result, delay)
    }

    fn delete_conversation(
        &self,
        conversation_id: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        let (result, delay) =
            self.answer(|backend| backend.delete(conversation_id));
        delayed(result, delay)
    }

    fn update_context(
        &self,
        req: &ContextUpdate,
    ) -> impl Future<Output = Result<Conversation, Self::Error>> + Send + 'static
    {
        let (result, delay) =
            self.answer(|backend| backend.update_context(req));
        delayed(result, delay)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::*;

    fn outgoing(conversation_id: &str, content: &str) -> OutgoingMessage {
        OutgoingMessage {
            conversation_id: conversation_id.to_owned(),
            content: content.to_owned(),
            file_context: None,
        }
    }

    #[tokio::test]
    async fn test_conversation_roundtrip() {
        let api = TestChatApi::default();
        let created = api
            .create_conversation(&NewConversation {
                title: "Plans".to_owned(),
                file_context: Some(["f1"].into_iter().collect()),
            })
            .await
            .unwrap();
        assert_eq!(created.id, "conv-1");

        let receipt = api.send_message(&outgoing("conv-1", "Hi")).await.unwrap();
        assert_eq!(receipt.reply.content, "You said Hi");
        assert!(receipt.echoed.is_none());

        api.add_reply(PresetReply::with_content("Sure.").echoing_user());
        let receipt = api.send_message(&outgoing("conv-1", "Go")).await.unwrap();
        assert_eq!(receipt.reply.content, "Sure.");
        assert_eq!(receipt.echoed.unwrap().content, "Go");

        let stored = api.get_conversation("conv-1").await.unwrap();
        assert_eq!(stored.messages.len(), 4);
        assert!(stored.updated_at >= stored.created_at);

        api.delete_conversation("conv-1").await.unwrap();
        assert!(api.list_conversations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let api = TestChatApi::default();
        api.fail_next(Route::ListConversations, ErrorKind::Server, Some("Database down"));

        let err = api.list_conversations().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Server);
        assert_eq!(err.server_message(), Some("Database down"));
        // Failures are consumed one at a time.
        assert!(api.list_conversations().await.is_ok());

        let err = api.send_message(&outgoing("missing", "Hi")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let routes: Vec<_> = api.requests().into_iter().map(|r| r.route).collect();
        assert_eq!(
            routes,
            [Route::ListConversations, Route::ListConversations, Route::SendMessage]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_delay() {
        let api = TestChatApi::default();
        let conversation = Conversation::new("c1", "Delays", Utc::now());
        api.insert_conversation(conversation);
        api.set_delay(Duration::from_millis(10));
        api.add_reply(PresetReply::with_content("slow").delayed(Duration::from_secs(1)));

        let start = Instant::now();
        api.send_message(&outgoing("c1", "Hi")).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(1));

        let start = Instant::now();
        api.get_conversation("c1").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(10));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
