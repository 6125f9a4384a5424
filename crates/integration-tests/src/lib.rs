//! Test harness booting the gatekeeper against a mocked OpenAI API.

mod openai;

use std::{net::SocketAddr, time::Duration};

use config::Config;
use jwt_compact::{
    AlgorithmExt, Claims, Header,
    alg::{Hs256, Hs256Key},
};
use serde::Serialize;
use serde_json::{Value, json};
use server::ServeConfig;
use tokio::net::{TcpListener, TcpStream};

pub use openai::{OpenAIMock, OpenAIServer};

/// Secret configured by [`config_with_users`], for minting tokens in tests.
pub const TEST_SECRET: &str = "integration-test-secret";

/// A configuration with two users: `alice` (`user` class) and `bob` (`premium` class), pointing at `llm_url`.
///
/// `extra` is appended verbatim and may add tables such as `[server.health]`.
pub fn config_with_users(llm_url: &str, extra: &str) -> String {
    indoc::formatdoc! {
        r#"
            [server.auth]
            secret = "{secret}"
            token_ttl = "1h"

            [[server.auth.users]]
            id = "1"
            username = "alice"
            password = "wonderland"
            class = "user"

            [[server.auth.users]]
            id = "2"
            username = "bob"
            password = "builder"
            type = "premium"

            [server.quotas]
            window = "1h"
            limits = {{ guest = 5, user = 20, premium = 50 }}

            [llm]
            api_key = "sk-test"
            base_url = "{llm_url}"
            timeout = "2s"

            {extra}
        "#,
        secret = TEST_SECRET,
    }
}

/// Signs arbitrary principal claims with `secret`.
pub fn mint_token(secret: &str, claims: &Claims<Value>) -> String {
    Hs256
        .token(&Header::empty(), claims, &Hs256Key::new(secret))
        .unwrap()
}

/// Claims the way the gatekeeper issues them, without timestamps.
pub fn principal_claims(id: &str, class: &str) -> Claims<Value> {
    Claims::new(json!({ "id": id, "class": class }))
}

/// Test client for making HTTP requests to the test server
pub struct TestClient {
    base_url: String,
    client: reqwest::Client,
}

impl TestClient {
    fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(format!("{}{}", self.base_url, path))
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(format!("{}{}", self.base_url, path))
    }

    /// Sends a chat message, optionally with a bearer token, and returns status and body.
    pub async fn chat(&self, message: &str, token: Option<&str>) -> (u16, Value) {
        let mut request = self.post("/api/chat").json(&json!({ "message": message }));

        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        send(request).await
    }

    /// Reads the status endpoint, optionally with a bearer token.
    pub async fn status(&self, token: Option<&str>) -> (u16, Value) {
        let mut request = self.get("/api/status");

        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        send(request).await
    }

    pub async fn login<T: Serialize + ?Sized>(&self, body: &T) -> (u16, Value) {
        send(self.post("/api/login").json(body)).await
    }

    /// Logs in and returns the token, failing the test on any other outcome.
    pub async fn token(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .login(&json!({ "username": username, "password": password }))
            .await;

        assert_eq!(status, 200, "{body}");

        body["token"].as_str().unwrap().to_string()
    }
}

/// Sends the request and decodes the JSON body.
pub async fn send(request: reqwest::RequestBuilder) -> (u16, Value) {
    let response = request.send().await.unwrap();
    let status = response.status().as_u16();
    let body = response.json().await.unwrap_or(Value::Null);

    (status, body)
}

/// Test server that manages the lifecycle of a server instance
pub struct TestServer {
    pub client: TestClient,
    pub address: SocketAddr,
    handle: tokio::task::JoinHandle<anyhow::Result<()>>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl TestServer {
    /// Start a new test server with the given TOML configuration, failing the test if it does not come up.
    pub async fn start(config_toml: &str) -> Self {
        match Self::try_start(config_toml).await {
            Ok(server) => server,
            Err(e) => unreachable!("Server failed to start: {e:#}"),
        }
    }

    /// Start a new test server, returning the startup error if serving fails.
    pub async fn try_start(config_toml: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(config_toml)?;
        config.validate()?;

        // Find an available port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;
        drop(listener);

        let serve_config = ServeConfig {
            listen_address: address,
            config,
        };

        let handle = tokio::spawn(server::serve(serve_config));

        for _ in 0..50 {
            if handle.is_finished() {
                return match handle.await? {
                    Ok(()) => Err(anyhow::anyhow!("server stopped before accepting connections")),
                    Err(e) => Err(e),
                };
            }

            if TcpStream::connect(address).await.is_ok() {
                return Ok(Self {
                    client: TestClient::new(format!("http://{address}")),
                    address,
                    handle,
                });
            }

            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        handle.abort();
        Err(anyhow::anyhow!("server did not start listening on {address}"))
    }
}
