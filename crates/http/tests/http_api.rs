use parley_http::{HttpApiConfigBuilder, HttpChatApi};
use parley_model::{
    ApiError, ChatApi, ContextUpdate, ErrorKind, NewConversation,
    OutgoingMessage, Role,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

struct Recorded {
    head: String,
    body: String,
}

impl Recorded {
    fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    fn has_header(&self, line: &str) -> bool {
        let line = line.to_ascii_lowercase();
        self.head
            .lines()
            .any(|l| l.to_ascii_lowercase() == line)
    }
}

struct Canned {
    status: u16,
    content_type: &'static str,
    body: String,
}

impl Canned {
    fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.to_string(),
        }
    }
}

/// Serves the canned responses in order, one connection each.
async fn serve(responses: Vec<Canned>) -> (HttpChatApi, mpsc::UnboundedReceiver<Recorded>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        for canned in responses {
            let (mut stream, _) = listener.accept().await.unwrap();
            let recorded = read_request(&mut stream).await;
            tx.send(recorded).ok();
            let resp = format!(
                "HTTP/1.1 {} Canned\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                canned.status,
                canned.content_type,
                canned.body.len(),
                canned.body
            );
            stream.write_all(resp.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
        }
    });

    let config = HttpApiConfigBuilder::with_base_url(format!("http://{addr}/api"))
        .with_token("t0ken")
        .build();
    (HttpChatApi::new(config), rx)
}

async fn read_request(stream: &mut TcpStream) -> Recorded {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let head_end = loop {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before the request head ended");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let content_length = head
        .lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < head_end + content_length {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before the body ended");
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[head_end..head_end + content_length])
        .into_owned();
    Recorded { head, body }
}

fn conversation_json(id: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "title": "Reports",
        "createdAt": "2024-03-01T10:00:00Z",
        "updatedAt": "2024-03-01T10:00:00Z",
        "messages": [],
        "fileContext": ["f1"]
    })
}

#[tokio::test]
async fn test_list_conversations() {
    let (api, mut requests) = serve(vec![Canned::json(
        200,
        serde_json::json!([conversation_json("c1"), conversation_json("c2")]),
    )])
    .await;

    let conversations = api.list_conversations().await.unwrap();
    assert_eq!(conversations.len(), 2);
    assert_eq!(conversations[1].id, "c2");

    let req = requests.recv().await.unwrap();
    assert_eq!(req.request_line(), "GET /api/conversations HTTP/1.1");
    assert!(req.has_header("authorization: Bearer t0ken"));
}

#[tokio::test]
async fn test_create_conversation() {
    let (api, mut requests) =
        serve(vec![Canned::json(201, conversation_json("c9"))]).await;

    let conversation = api
        .create_conversation(&NewConversation {
            title: "Reports".to_owned(),
            file_context: Some(["f1"].into_iter().collect()),
        })
        .await
        .unwrap();
    assert_eq!(conversation.id, "c9");

    let req = requests.recv().await.unwrap();
    assert_eq!(req.request_line(), "POST /api/conversations HTTP/1.1");
    let body: serde_json::Value = serde_json::from_str(&req.body).unwrap();
    assert_eq!(body, serde_json::json!({"title": "Reports", "fileContext": ["f1"]}));
}

#[tokio::test]
async fn test_send_message() {
    let (api, mut requests) = serve(vec![Canned::json(
        200,
        serde_json::json!({
            "id": "m1",
            "conversationId": "c1",
            "content": "Hi there",
            "role": "assistant",
            "timestamp": "2024-03-01T10:00:01Z",
            "sources": [{"fileId": "f1", "snippet": "hello"}]
        }),
    )])
    .await;

    let receipt = api
        .send_message(&OutgoingMessage {
            conversation_id: "c1".to_owned(),
            content: "Hello".to_owned(),
            file_context: None,
        })
        .await
        .unwrap();
    assert_eq!(receipt.reply.role, Role::Assistant);
    assert_eq!(receipt.reply.id.as_confirmed(), Some("m1"));
    assert_eq!(receipt.reply.sources.len(), 1);

    let req = requests.recv().await.unwrap();
    assert_eq!(req.request_line(), "POST /api/conversations/c1/messages HTTP/1.1");
    let body: serde_json::Value = serde_json::from_str(&req.body).unwrap();
    assert_eq!(body, serde_json::json!({"content": "Hello"}));
}

#[tokio::test]
async fn test_update_context_and_delete() {
    let (api, mut requests) = serve(vec![
        Canned::json(200, conversation_json("c1")),
        Canned {
            status: 204,
            content_type: "text/plain",
            body: String::new(),
        },
    ])
    .await;

    let conversation = api
        .update_context(&ContextUpdate {
            conversation_id: "c1".to_owned(),
            file_context: ["f1"].into_iter().collect(),
        })
        .await
        .unwrap();
    assert!(conversation.file_context.contains("f1"));
    let req = requests.recv().await.unwrap();
    assert_eq!(req.request_line(), "PUT /api/conversations/c1/context HTTP/1.1");

    api.delete_conversation("c1").await.unwrap();
    let req = requests.recv().await.unwrap();
    assert_eq!(req.request_line(), "DELETE /api/conversations/c1 HTTP/1.1");
}

#[tokio::test]
async fn test_error_payload() {
    let (api, _requests) = serve(vec![
        Canned::json(422, serde_json::json!({"message": "Title is required"})),
        Canned {
            status: 500,
            content_type: "text/html",
            body: "<h1>oops</h1>".to_owned(),
        },
        Canned::json(404, serde_json::json!({"message": ""})),
    ])
    .await;

    let err = api
        .create_conversation(&NewConversation {
            title: String::new(),
            file_context: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Rejected);
    assert_eq!(err.server_message(), Some("Title is required"));

    let err = api.list_conversations().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);
    assert_eq!(err.server_message(), None);

    let err = api.get_conversation("gone").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.server_message(), None);
}

#[tokio::test]
async fn test_unexpected_content_type() {
    let (api, _requests) = serve(vec![Canned {
        status: 200,
        content_type: "text/html",
        body: "<html></html>".to_owned(),
    }])
    .await;

    let err = api.get_conversation("c1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidResponse);
}
