use chrono::{DateTime, Utc};
use parley_model::{
    Conversation, Delivery, FileContext, Message, MessageId, Role,
    SendReceipt, SourceCitation,
};
use serde::{Deserialize, Serialize};

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub id: String,
    pub conversation_id: String,
    pub content: String,
    pub role: Role,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub sources: Option<Vec<SourceCitation>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationPayload {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<MessagePayload>,
    #[serde(default)]
    pub file_context: Option<FileContext>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EchoedPayload {
    pub user_message: MessagePayload,
    pub assistant_message: MessagePayload,
}

/// Servers either return the reply alone, or the confirmed user message
/// together with the reply.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SendMessageResponse {
    Echoed(EchoedPayload),
    Single(MessagePayload),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationBody<'a> {
    pub title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_context: Option<&'a FileContext>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageBody<'a> {
    pub content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_context: Option<&'a FileContext>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContextBody<'a> {
    pub file_context: &'a FileContext,
}

// -----------
// Conversions
// -----------

impl From<MessagePayload> for Message {
    fn from(payload: MessagePayload) -> Self {
        Message {
            id: MessageId::Confirmed(payload.id),
            conversation_id: payload.conversation_id,
            role: payload.role,
            content: payload.content,
            timestamp: payload.timestamp,
            sources: payload.sources.unwrap_or_default(),
            delivery: Delivery::Confirmed,
        }
    }
}

impl From<ConversationPayload> for Conversation {
    fn from(payload: ConversationPayload) -> Self {
        Conversation {
            id: payload.id,
            title: payload.title,
            created_at: payload.created_at,
            // Servers are not trusted to keep the ordering invariant.
            updated_at: payload.updated_at.max(payload.created_at),
            messages: payload.messages.into_iter().map(Into::into).collect(),
            file_context: payload.file_context.unwrap_or_default(),
        }
    }
}

impl From<SendMessageResponse> for SendReceipt {
    fn from(resp: SendMessageResponse) -> Self {
        match resp {
            SendMessageResponse::Echoed(EchoedPayload {
                user_message,
                assistant_message,
            }) => SendReceipt {
                echoed: Some(user_message.into()),
                reply: assistant_message.into(),
            },
            SendMessageResponse::Single(reply) => {
                SendReceipt::reply(reply.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_conversation() {
        let payload: ConversationPayload = serde_json::from_value(json!({
            "id": "c1",
            "title": "Quarterly report",
            "createdAt": "2024-03-01T10:00:00Z",
            "updatedAt": "2024-03-01T11:00:00Z",
            "fileContext": ["f1", "f2"],
            "messages": [{
                "id": "m1",
                "conversationId": "c1",
                "content": "Revenue grew 12%.",
                "role": "assistant",
                "timestamp": "2024-03-01T10:30:00Z",
                "sources": [{
                    "fileId": "f1",
                    "fileName": "report.pdf",
                    "snippet": "grew 12%",
                    "page": 4
                }]
            }]
        }))
        .unwrap();

        let conversation = Conversation::from(payload);
        assert_eq!(conversation.id, "c1");
        assert_eq!(conversation.file_context.len(), 2);
        let msg = &conversation.messages[0];
        assert_eq!(msg.id, MessageId::Confirmed("m1".to_owned()));
        assert_eq!(msg.delivery, Delivery::Confirmed);
        assert_eq!(msg.sources[0].page, Some(4));
        assert_eq!(msg.sources[0].file_name.as_deref(), Some("report.pdf"));
    }

    #[test]
    fn test_parse_listing_without_messages() {
        let payload: Vec<ConversationPayload> = serde_json::from_value(json!([{
            "id": "c1",
            "title": "Draft",
            "createdAt": "2024-03-01T10:00:00Z",
            "updatedAt": "2024-02-01T10:00:00Z"
        }]))
        .unwrap();
        let conversation = Conversation::from(payload[0].clone());
        assert!(conversation.messages.is_empty());
        assert!(conversation.file_context.is_empty());
        assert_eq!(conversation.updated_at, conversation.created_at);
    }

    #[test]
    fn test_parse_send_response() {
        let reply = json!({
            "id": "m2",
            "conversationId": "c1",
            "content": "Hi there",
            "role": "assistant",
            "timestamp": "2024-03-01T10:00:01Z"
        });
        let single: SendMessageResponse =
            serde_json::from_value(reply.clone()).unwrap();
        let receipt = SendReceipt::from(single);
        assert!(receipt.echoed.is_none());
        assert_eq!(receipt.reply.content, "Hi there");

        let echoed: SendMessageResponse = serde_json::from_value(json!({
            "userMessage": {
                "id": "m1",
                "conversationId": "c1",
                "content": "Hello",
                "role": "user",
                "timestamp": "2024-03-01T10:00:00Z"
            },
            "assistantMessage": reply
        }))
        .unwrap();
        let receipt = SendReceipt::from(echoed);
        let echo = receipt.echoed.unwrap();
        assert_eq!(echo.role, Role::User);
        assert_eq!(echo.id.as_confirmed(), Some("m1"));
        assert_eq!(receipt.reply.id.as_confirmed(), Some("m2"));
    }

    #[test]
    fn test_request_bodies() {
        let body = CreateConversationBody {
            title: "Notes",
            file_context: None,
        };
        assert_eq!(serde_json::to_value(&body).unwrap(), json!({"title": "Notes"}));

        let context: FileContext = ["f1"].into_iter().collect();
        let body = SendMessageBody {
            content: "Hello",
            file_context: Some(&context),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"content": "Hello", "fileContext": ["f1"]})
        );

        let body = UpdateContextBody {
            file_context: &context,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"fileContext": ["f1"]})
        );
    }

    #[test]
    fn test_error_body() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"message": "Title too long", "code": 42}"#)
                .unwrap();
        assert_eq!(body.message.as_deref(), Some("Title too long"));
        let body: ErrorBody = serde_json::from_str("{}").unwrap();
        assert_eq!(body.message, None);
    }
}
