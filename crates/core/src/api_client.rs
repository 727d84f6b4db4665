use std::fmt::{self, Debug};
use std::pin::Pin;
use std::sync::Arc;

use parley_model::{
    ApiError, ChatApi, ContextUpdate, Conversation, ErrorKind, NewConversation,
    OutgoingMessage, SendReceipt,
};
use tracing::Instrument;

/// A failed remote call, with the backend's error type erased.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ApiFailure {
    pub kind: ErrorKind,
    pub server_message: Option<String>,
}

pub(crate) type ApiResult<T> = Result<T, ApiFailure>;
pub(crate) type BoxedApiFuture<T> =
    Pin<Box<dyn Future<Output = ApiResult<T>> + Send>>;

trait ApiObject: Send + Sync {
    fn list_conversations(&self) -> BoxedApiFuture<Vec<Conversation>>;
    fn get_conversation(&self, id: &str) -> BoxedApiFuture<Conversation>;
    fn create_conversation(
        &self,
        req: &NewConversation,
    ) -> BoxedApiFuture<Conversation>;
    fn send_message(&self, req: &OutgoingMessage) -> BoxedApiFuture<SendReceipt>;
    fn delete_conversation(&self, id: &str) -> BoxedApiFuture<()>;
    fn update_context(&self, req: &ContextUpdate) -> BoxedApiFuture<Conversation>;
}

struct AnyApi<A>(A);

impl<A: ChatApi> ApiObject for AnyApi<A> {
    fn list_conversations(&self) -> BoxedApiFuture<Vec<Conversation>> {
        erase(self.0.list_conversations(), "list conversations")
    }

    fn get_conversation(&self, id: &str) -> BoxedApiFuture<Conversation> {
        erase(self.0.get_conversation(id), "get conversation")
    }

    fn create_conversation(
        &self,
        req: &NewConversation,
    ) -> BoxedApiFuture<Conversation> {
        erase(self.0.create_conversation(req), "create conversation")
    }

    fn send_message(&self, req: &OutgoingMessage) -> BoxedApiFuture<SendReceipt> {
        erase(self.0.send_message(req), "send message")
    }

    fn delete_conversation(&self, id: &str) -> BoxedApiFuture<()> {
        erase(self.0.delete_conversation(id), "delete conversation")
    }

    fn update_context(&self, req: &ContextUpdate) -> BoxedApiFuture<Conversation> {
        erase(self.0.update_context(req), "update context")
    }
}

fn erase<T, E>(
    fut: impl Future<Output = Result<T, E>> + Send + 'static,
    call: &'static str,
) -> BoxedApiFuture<T>
where
    T: Send + 'static,
    E: ApiError,
{
    Box::pin(
        async move {
            fut.await.map_err(|err| {
                error!("got an error: {err}");
                ApiFailure {
                    kind: err.kind(),
                    server_message: err.server_message().map(str::to_owned),
                }
            })
        }
        .instrument(trace_span!("api call", call)),
    )
}

/// A type-erased handle to a [`ChatApi`] backend.
///
/// Every call builds its request synchronously, so the returned future
/// does not borrow the client.
#[derive(Clone)]
pub(crate) struct ApiClient {
    inner: Arc<dyn ApiObject>,
}

impl ApiClient {
    #[inline]
    pub fn new<A: ChatApi + 'static>(api: A) -> Self {
        Self {
            inner: Arc::new(AnyApi(api)),
        }
    }

    #[inline]
    pub fn list_conversations(&self) -> BoxedApiFuture<Vec<Conversation>> {
        self.inner.list_conversations()
    }

    #[inline]
    pub fn get_conversation(&self, id: &str) -> BoxedApiFuture<Conversation> {
        self.inner.get_conversation(id)
    }

    #[inline]
    pub fn create_conversation(
        &self,
        req: &NewConversation,
    ) -> BoxedApiFuture<Conversation> {
        self.inner.create_conversation(req)
    }

    #[inline]
    pub fn send_message(&self, req: &OutgoingMessage) -> BoxedApiFuture<SendReceipt> {
        self.inner.send_message(req)
    }

    #[inline]
    pub fn delete_conversation(&self, id: &str) -> BoxedApiFuture<()> {
        self.inner.delete_conversation(id)
    }

    #[inline]
    pub fn update_context(&self, req: &ContextUpdate) -> BoxedApiFuture<Conversation> {
        self.inner.update_context(req)
    }
}

impl Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient").finish_non_exhaustive()
    }
}
