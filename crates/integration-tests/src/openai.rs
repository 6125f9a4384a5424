use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;

/// Builder for a server impersonating the OpenAI chat completions API.
///
/// By default every prompt is answered with `Echo: <prompt>`.
#[derive(Default)]
pub struct OpenAIMock {
    error: Option<(StatusCode, String)>,
    delay: Option<Duration>,
}

impl OpenAIMock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every request with the given status and body.
    pub fn with_error(mut self, status: StatusCode, message: impl Into<String>) -> Self {
        self.error = Some((status, message.into()));
        self
    }

    /// Waits before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn spawn(self) -> OpenAIServer {
        let state = Arc::new(MockState {
            error: self.error,
            delay: self.delay,
            calls: AtomicUsize::new(0),
            last_authorization: std::sync::Mutex::new(None),
        });

        let app = Router::new()
            .route("/v1/chat/completions", post(chat_completions))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        OpenAIServer { address, state }
    }
}

/// A running mock.
pub struct OpenAIServer {
    address: SocketAddr,
    state: Arc<MockState>,
}

impl OpenAIServer {
    /// Base URL to configure as `llm.base_url`.
    pub fn url(&self) -> String {
        format!("http://{}/v1", self.address)
    }

    /// Number of chat completion requests received.
    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    /// The `Authorization` header of the most recent request.
    pub fn last_authorization(&self) -> Option<String> {
        self.state.last_authorization.lock().unwrap().clone()
    }
}

struct MockState {
    error: Option<(StatusCode, String)>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_authorization: std::sync::Mutex<Option<String>>,
}

#[derive(Deserialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

async fn chat_completions(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(request): Json<ChatCompletionRequest>,
) -> Response {
    state.calls.fetch_add(1, Ordering::SeqCst);

    *state.last_authorization.lock().unwrap() = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    if let Some(delay) = state.delay {
        tokio::time::sleep(delay).await;
    }

    if let Some((status, message)) = &state.error {
        return (*status, message.clone()).into_response();
    }

    let prompt = request
        .messages
        .last()
        .map(|message| message.content.as_str())
        .unwrap_or_default();

    Json(json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": request.model,
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": format!("Echo: {prompt}") },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 1, "completion_tokens": 2, "total_tokens": 3 }
    }))
    .into_response()
}
