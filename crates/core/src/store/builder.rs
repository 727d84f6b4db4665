use parley_model::ChatApi;

use super::ChatStore;
use crate::api_client::ApiClient;

/// [`ChatStore`] builder.
pub struct ChatStoreBuilder {
    pub(crate) api: ApiClient,
    pub(crate) on_error: Option<Box<dyn Fn(&str) + Send + Sync>>,
}

impl ChatStoreBuilder {
    /// Creates a new builder backed by the specified API.
    #[inline]
    pub fn with_api<A: ChatApi + 'static>(api: A) -> Self {
        Self {
            api: ApiClient::new(api),
            on_error: None,
        }
    }

    /// Attaches a callback to be invoked with the message of every
    /// failed request.
    #[inline]
    pub fn on_error(
        mut self,
        on_error: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Box::new(on_error));
        self
    }

    /// Builds the store.
    ///
    /// Must be called within a tokio runtime.
    #[inline]
    pub fn build(self) -> ChatStore {
        ChatStore::spawn_from_builder(self)
    }
}
