use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use inception_api::{
    ChatStreamEvent, CompletionsRequest, InceptionApiClient, InceptionApiConfig,
    InceptionApiError, WireMessage,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration};

fn allow_local_integration() -> bool {
    std::env::var("INCEPTION_API_ALLOW_LOCAL_INTEGRATION")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

#[derive(Clone)]
struct ResponseChunk {
    delay_ms: u64,
    bytes: Vec<u8>,
}

#[derive(Clone)]
struct ScriptedResponse {
    status: u16,
    content_type: &'static str,
    chunks: Vec<ResponseChunk>,
}

struct ScriptedServer {
    base_url: String,
    request_count: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl ScriptedServer {
    async fn new(scripts: Vec<ScriptedResponse>) -> Self {
        let scripts = Arc::new(scripts);
        let request_count = Arc::new(AtomicUsize::new(0));
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("local TCP listener should bind");
        let addr = listener
            .local_addr()
            .expect("resolved local listener address");
        let base_url = format!("http://{addr}");

        let handle = tokio::spawn({
            let scripts = Arc::clone(&scripts);
            let request_count = Arc::clone(&request_count);

            async move {
                loop {
                    let (socket, _) = match listener.accept().await {
                        Ok(pair) => pair,
                        Err(_) => break,
                    };
                    let scripts = Arc::clone(&scripts);
                    let request_count = Arc::clone(&request_count);
                    tokio::spawn(async move {
                        serve_one(socket, scripts, request_count).await;
                    });
                }
            }
        });

        Self {
            base_url,
            request_count,
            handle,
        }
    }

    fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Acquire)
    }

    fn shutdown(&self) {
        self.handle.abort();
    }
}

fn response_sse(status: u16, frames: &[&str]) -> ScriptedResponse {
    ScriptedResponse {
        status,
        content_type: "text/event-stream",
        chunks: vec![ResponseChunk {
            delay_ms: 0,
            bytes: sse_frames(frames),
        }],
    }
}

fn response_json(status: u16, body: &str) -> ScriptedResponse {
    ScriptedResponse {
        status,
        content_type: "application/json",
        chunks: vec![ResponseChunk {
            delay_ms: 0,
            bytes: body.as_bytes().to_vec(),
        }],
    }
}

fn sse_frames(frames: &[&str]) -> Vec<u8> {
    let mut body = String::new();

    for frame in frames {
        body.push_str("data: ");
        body.push_str(frame);
        body.push_str("\n\n");
    }

    body.into_bytes()
}

fn chat_request() -> CompletionsRequest {
    CompletionsRequest::new("mercury-coder", vec![WireMessage::user("hi")])
}

fn client_for(server: &ScriptedServer) -> InceptionApiClient {
    let config = InceptionApiConfig::new("sk-test-key-123").with_base_url(&server.base_url);
    InceptionApiClient::new(config).expect("client should build")
}

#[tokio::test]
async fn stream_integration_successful_completion() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![response_sse(
        200,
        &[
            r##"{"content":"Hello"}"##,
            r##"{"content":" world"}"##,
            "[DONE]",
        ],
    )])
    .await;

    let client = client_for(&server);
    let events = client
        .stream(&chat_request(), None)
        .await
        .expect("stream should succeed");

    let text: String = events
        .iter()
        .filter_map(|event| match event {
            ChatStreamEvent::Content { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(text, "Hello world");
    assert_eq!(server.request_count(), 1);

    server.shutdown();
}

#[tokio::test]
async fn stream_integration_malformed_lines_are_skipped_not_fatal() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![response_sse(
        200,
        &["not-json", r##"{"content":"after"}"##, "[DONE]"],
    )])
    .await;

    let client = client_for(&server);
    let events = client
        .stream(&chat_request(), None)
        .await
        .expect("malformed lines should not abort the stream");

    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], ChatStreamEvent::Invalid { .. }));
    assert!(matches!(
        &events[1],
        ChatStreamEvent::Content { text } if text == "after"
    ));

    server.shutdown();
}

#[tokio::test]
async fn stream_integration_error_frame_fails_the_turn() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![response_sse(
        200,
        &[
            r##"{"content":"partial"}"##,
            r##"{"error":"API request failed with status 500"}"##,
            r##"{"content":"never delivered"}"##,
        ],
    )])
    .await;

    let client = client_for(&server);
    let mut observed = Vec::new();
    let result = client
        .stream_with_handler(&chat_request(), None, |event| observed.push(event))
        .await
        .expect_err("error frame should fail the stream");

    assert!(matches!(
        result,
        InceptionApiError::StreamFailed { message } if message.contains("status 500")
    ));
    // Consumption stops at the error frame; nothing after it is delivered.
    assert_eq!(observed.len(), 1);
    assert!(matches!(
        &observed[0],
        ChatStreamEvent::Content { text } if text == "partial"
    ));

    server.shutdown();
}

#[tokio::test]
async fn stream_integration_http_status_surfaces_with_parsed_message() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![response_json(
        401,
        r##"{"error":{"message":"invalid api key"}}"##,
    )])
    .await;

    let client = client_for(&server);
    let result = client
        .stream(&chat_request(), None)
        .await
        .expect_err("401 should fail the request");

    assert!(matches!(
        result,
        InceptionApiError::Status(status, message)
            if status.as_u16() == 401 && message == "invalid api key"
    ));

    server.shutdown();
}

#[tokio::test]
async fn stream_integration_cancellation_during_stream() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![ScriptedResponse {
        status: 200,
        content_type: "text/event-stream",
        chunks: vec![
            ResponseChunk {
                delay_ms: 0,
                bytes: sse_frames(&[r##"{"content":"partial"}"##]),
            },
            ResponseChunk {
                delay_ms: 200,
                bytes: sse_frames(&[r##"{"content":"late"}"##, "[DONE]"]),
            },
        ],
    }])
    .await;

    let config = InceptionApiConfig::new("sk-test-key-123").with_base_url(&server.base_url);
    let client = Arc::new(InceptionApiClient::new(config).expect("client should build"));

    let cancellation = Arc::new(AtomicBool::new(false));
    let stream_task = tokio::spawn({
        let client = Arc::clone(&client);
        let request = chat_request();
        let cancellation = Arc::clone(&cancellation);
        async move { client.stream(&request, Some(&cancellation)).await }
    });

    sleep(Duration::from_millis(100)).await;
    cancellation.store(true, Ordering::Release);

    let result = timeout(Duration::from_secs(5), stream_task)
        .await
        .expect("stream task should resolve")
        .expect("join handle should resolve")
        .expect_err("cancellation should abort the stream");

    assert!(matches!(result, InceptionApiError::Cancelled));
    server.shutdown();
}

#[tokio::test]
async fn validate_key_reports_valid_on_success_and_message_on_failure() {
    if !allow_local_integration() {
        return;
    }

    let ok_server = ScriptedServer::new(vec![response_json(
        200,
        r##"{"choices":[{"message":{"content":"Hi"}}]}"##,
    )])
    .await;
    let validation = client_for(&ok_server).validate_key().await;
    assert!(validation.valid);
    assert!(validation.error.is_none());
    ok_server.shutdown();

    let bad_server = ScriptedServer::new(vec![response_json(
        401,
        r##"{"error":{"message":"invalid api key"}}"##,
    )])
    .await;
    let validation = client_for(&bad_server).validate_key().await;
    assert!(!validation.valid);
    assert_eq!(validation.error.as_deref(), Some("invalid api key"));
    bad_server.shutdown();
}

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        429 => "Too Many Requests",
        503 => "Service Unavailable",
        _ => "Error",
    }
}

async fn serve_one(
    mut socket: TcpStream,
    scripts: Arc<Vec<ScriptedResponse>>,
    request_count: Arc<AtomicUsize>,
) {
    if read_request_headers(&mut socket).await.is_err() {
        return;
    }

    let index = request_count.fetch_add(1, Ordering::AcqRel);
    let response = scripts
        .get(index)
        .cloned()
        .unwrap_or_else(|| response_json(500, r##"{"error":"unexpected request"}"##));

    let headers = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: {content_type}\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
        status = response.status,
        reason = status_reason(response.status),
        content_type = response.content_type,
    );

    if socket.write_all(headers.as_bytes()).await.is_err() {
        return;
    }

    for chunk in response.chunks {
        if chunk.delay_ms > 0 {
            sleep(Duration::from_millis(chunk.delay_ms)).await;
        }
        let prefix = format!("{:X}\r\n", chunk.bytes.len());
        if socket.write_all(prefix.as_bytes()).await.is_err() {
            return;
        }
        if socket.write_all(&chunk.bytes).await.is_err() {
            return;
        }
        if socket.write_all(b"\r\n").await.is_err() {
            return;
        }
    }

    let _ = socket.write_all(b"0\r\n\r\n").await;
    let _ = socket.shutdown().await;
}

async fn read_request_headers(socket: &mut TcpStream) -> std::io::Result<()> {
    let mut request = Vec::new();
    let mut buffer = [0_u8; 2048];

    loop {
        let n = socket.read(&mut buffer).await?;
        if n == 0 {
            return Ok(());
        }
        request.extend_from_slice(&buffer[..n]);
        if request.windows(4).any(|window| window == b"\r\n\r\n") {
            return Ok(());
        }
    }
}
