//! A [`ChatApi`] backend that talks JSON over HTTP.
//!
//! Every request carries the configured bearer token. Responses are
//! single JSON documents; error responses may carry a `message` field
//! that is surfaced through [`ApiError::server_message`].

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod config;
mod proto;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use mime::Mime;
use parley_model::{
    ApiError, ChatApi, ContextUpdate, Conversation, ErrorKind,
    NewConversation, OutgoingMessage, SendReceipt,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url, header};
use serde::de::DeserializeOwned;

pub use config::{HttpApiConfig, HttpApiConfigBuilder};
use proto::{
    ConversationPayload, CreateConversationBody, ErrorBody, SendMessageBody,
    SendMessageResponse, UpdateContextBody,
};

/// Error type for [`HttpChatApi`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
    server_message: Option<String>,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
            server_message: None,
        }
    }

    fn with_server_message(mut self, server_message: Option<String>) -> Self {
        self.server_message = server_message;
        self
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.server_message {
            Some(server_message) => {
                write!(f, "{}: {}", self.message, server_message)
            }
            None => write!(f, "{}", self.message),
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
        self.server_message.as_deref()
    }
}

/// HTTP chat backend.
#[derive(Clone, Debug)]
pub struct HttpChatApi {
    client: Client,
    config: Arc<HttpApiConfig>,
}

impl HttpChatApi {
    /// Creates a new `HttpChatApi` with the given configuration.
    #[inline]
    pub fn new(config: HttpApiConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, Error> {
        let invalid = || {
            Error::new(
                format!("invalid base url: {}", self.config.base_url),
                ErrorKind::Transport,
            )
        };
        let mut url = Url::parse(&self.config.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        segments: &[&str],
    ) -> Result<RequestBuilder, Error> {
        let url = self.endpoint(segments)?;
        trace!("{method} {url}");
        let mut req = self
            .client
            .request(method, url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.config.token))
            .header(header::ACCEPT, "application/json");
        if let Some(timeout) = self.config.timeout {
            req = req.timeout(timeout);
        }
        Ok(req)
    }
}

impl ChatApi for HttpChatApi {
    type Error = Error;

    fn list_conversations(
        &self,
    ) -> impl Future<Output = Result<Vec<Conversation>, Self::Error>> + Send + 'static
    {
        let req = self.request(Method::GET, &["conversations"]);
        async move {
            let resp = send(req?).await?;
            let payloads: Vec<ConversationPayload> = read_json(resp).await?;
            Ok(payloads.into_iter().map(Into::into).collect())
        }
    }

    fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> impl Future<Output = Result<Conversation, Self::Error>> + Send + 'static
    {
        let req = self.request(Method::GET, &["conversations", conversation_id]);
        async move {
            let resp = send(req?).await?;
            let payload: ConversationPayload = read_json(resp).await?;
            Ok(payload.into())
        }
    }

    fn create_conversation(
        &self,
        req: &NewConversation,
    ) -> impl Future<Output = Result<Conversation, Self::Error>> + Send + 'static
    {
        let body = CreateConversationBody {
            title: &req.title,
            file_context: req.file_context.as_ref(),
        };
        let req = self
            .request(Method::POST, &["conversations"])
            .map(|r| r.json(&body));
        async move {
            let resp = send(req?).await?;
            let payload: ConversationPayload = read_json(resp).await?;
            Ok(payload.into())
        }
    }

    fn send_message(
        &self,
        req: &OutgoingMessage,
    ) -> impl Future<Output = Result<SendReceipt, Self::Error>> + Send + 'static
    {
        let body = SendMessageBody {
            content: &req.content,
            file_context: req.file_context.as_ref(),
        };
        let req = self
            .request(
                Method::POST,
                &["conversations", req.conversation_id.as_str(), "messages"],
            )
            .map(|r| r.json(&body));
        async move {
            let resp = send(req?).await?;
            let payload: SendMessageResponse = read_json(resp).await?;
            Ok(payload.into())
        }
    }

    fn delete_conversation(
        &self,
        conversation_id: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        let req =
            self.request(Method::DELETE, &["conversations", conversation_id]);
        async move {
            // The body of a successful deletion carries nothing we need.
            send(req?).await?;
            Ok(())
        }
    }

    fn update_context(
        &self,
        req: &ContextUpdate,
    ) -> impl Future<Output = Result<Conversation, Self::Error>> + Send + 'static
    {
        let body = UpdateContextBody {
            file_context: &req.file_context,
        };
        let req = self
            .request(
                Method::PUT,
                &["conversations", req.conversation_id.as_str(), "context"],
            )
            .map(|r| r.json(&body));
        async move {
            let resp = send(req?).await?;
            let payload: ConversationPayload = read_json(resp).await?;
            Ok(payload.into())
        }
    }
}

async fn send(req: RequestBuilder) -> Result<Response, Error> {
    let resp = match req.send().await {
        Ok(resp) => resp,
        Err(err) => {
            error!("request failed: {err}");
            return Err(Error::new(format!("{err}"), ErrorKind::Transport));
        }
    };

    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let server_message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|body| body.message)
        .filter(|message| !message.trim().is_empty());
    warn!("server responded with {status}: {server_message:?}");
    Err(
        Error::new(format!("server responded with {status}"), kind_of(status))
            .with_server_message(server_message),
    )
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, Error> {
    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    if let Some(content_type) = content_type {
        let is_json = content_type
            .parse()
            .map(|m: Mime| {
                m.subtype() == mime::JSON || m.suffix() == Some(mime::JSON)
            })
            .unwrap_or(false);
        if !is_json {
            return Err(Error::new(
                format!("unexpected content type: {content_type}"),
                ErrorKind::InvalidResponse,
            ));
        }
    }

    let bytes = resp
        .bytes()
        .await
        .map_err(|err| Error::new(format!("{err}"), ErrorKind::Transport))?;
    serde_json::from_slice(&bytes).map_err(|err| {
        error!("failed to decode response: {err}");
        Error::new(
            format!("invalid response body: {err}"),
            ErrorKind::InvalidResponse,
        )
    })
}

fn kind_of(status: StatusCode) -> ErrorKind {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ErrorKind::Unauthorized
        }
        StatusCode::NOT_FOUND => ErrorKind::NotFound,
        s if s.is_client_error() => ErrorKind::Rejected,
        _ => ErrorKind::Server,
    }
}
