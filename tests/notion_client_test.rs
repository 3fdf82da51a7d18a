use reqwest::{StatusCode, Url};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use shopping_reminder::model::SourceRecord;
use shopping_reminder::notion::{ItemFields, NotionClient, NotionError};

/// A request as the fake server saw it.
#[derive(Debug, Clone)]
struct Captured {
    path: String,
    authorization: Option<String>,
    body: Value,
}

/// Local HTTP server answering each connection with the next scripted
/// `(status, body)` pair and recording what it was sent.
struct FakeNotion {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Captured>>>,
    _task: tokio::task::JoinHandle<()>,
}

impl FakeNotion {
    async fn start(responses: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let log = requests.clone();
        let task = tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                serve_one(stream, status, &body, &log).await;
            }
        });

        Self {
            addr,
            requests,
            _task: task,
        }
    }

    fn client(&self) -> NotionClient {
        let base = Url::parse(&format!("http://{}/", self.addr)).unwrap();
        NotionClient::with_base_url(
            "secret_token".into(),
            "2022-06-28".into(),
            ItemFields {
                title: "名前".into(),
                checkbox: "完了".into(),
            },
            base,
        )
        .unwrap()
    }

    async fn requests(&self) -> Vec<Captured> {
        self.requests.lock().await.clone()
    }
}

async fn serve_one(mut stream: TcpStream, status: u16, body: &str, log: &Mutex<Vec<Captured>>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let path = lines
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or_default()
        .to_string();
    let mut content_length = 0usize;
    let mut authorization = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.parse().unwrap();
            } else if name.eq_ignore_ascii_case("authorization") {
                authorization = Some(value.to_string());
            }
        }
    }

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let request_body = &buf[header_end..header_end + content_length];
    log.lock().await.push(Captured {
        path,
        authorization,
        body: serde_json::from_slice(request_body).unwrap_or(Value::Null),
    });

    let reason = StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown");
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await.unwrap();
    stream.shutdown().await.ok();
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn row(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "properties": {
            "名前": { "title": [ { "text": { "content": name } } ] },
            "完了": { "checkbox": false }
        }
    })
}

fn source() -> SourceRecord {
    SourceRecord::create_new("買い物リスト", "db-1", "page-1", None)
}

#[tokio::test]
async fn follows_cursor_across_pages() {
    let first = json!({ "results": [row("a", "x")], "has_more": true, "next_cursor": "c1" });
    let second = json!({ "results": [row("b", "y")], "has_more": false, "next_cursor": null });
    let server = FakeNotion::start(vec![(200, first.to_string()), (200, second.to_string())]).await;

    let items = server
        .client()
        .query_unchecked_items(&source())
        .await
        .unwrap();

    let got: Vec<_> = items
        .iter()
        .map(|i| (i.id.as_str(), i.name.as_str()))
        .collect();
    assert_eq!(got, vec![("a", "x"), ("b", "y")]);

    let requests = server.requests().await;
    assert_eq!(requests.len(), 2);
    for req in &requests {
        assert_eq!(req.path, "/v1/databases/db-1/query");
        assert_eq!(req.authorization.as_deref(), Some("Bearer secret_token"));
        assert_eq!(req.body["filter"]["property"], "完了");
    }
    assert!(requests[0].body.get("start_cursor").is_none());
    assert_eq!(requests[1].body["start_cursor"], "c1");
}

#[tokio::test]
async fn unauthorized_maps_to_status_error() {
    let server = FakeNotion::start(vec![(
        401,
        r#"{"object":"error","message":"unauthorized"}"#.to_string(),
    )])
    .await;

    let err = server
        .client()
        .query_unchecked_items(&source())
        .await
        .unwrap_err();

    match err {
        NotionError::Status { status, body } => {
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert!(body.contains("unauthorized"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_success_body_is_a_decode_error() {
    let server = FakeNotion::start(vec![(200, "not json".to_string())]).await;

    let err = server
        .client()
        .create_comment("page-1", "hello")
        .await
        .unwrap_err();

    assert!(matches!(err, NotionError::Decode(_)), "got {err:?}");
    let requests = server.requests().await;
    assert_eq!(requests[0].path, "/v1/comments");
    assert_eq!(requests[0].body["parent"]["page_id"], "page-1");
}

#[tokio::test]
async fn comment_is_accepted_when_notion_returns_an_id() {
    let server = FakeNotion::start(vec![(200, r#"{"object":"comment","id":"cm-1"}"#.to_string())]).await;

    server
        .client()
        .create_comment("page-1", "牛乳を買う")
        .await
        .unwrap();

    let requests = server.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].body["rich_text"][0]["text"]["content"], "牛乳を買う");
}
