use chrono::Utc;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tarot_api::auth::sign_request;
use tarot_api::dto::ReadingRequest;
use tarot_api::models::{CardsResponse, Reading};

/// Client id sent with signed requests
const CLIENT_ID: &str = "tarot-cli";

/// Error type for CLI client operations
#[derive(Debug)]
pub enum ClientError {
    /// Server returned an error status with a message body
    Server { status: reqwest::StatusCode, message: String },
    /// Network/connection/request error
    Request(reqwest::Error),
    /// Request body could not be serialized
    Encode(serde_json::Error),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Server { status, message } => {
                write!(f, "Server error ({}): {}", status.as_u16(), message)
            }
            ClientError::Request(err) => write!(f, "{}", err),
            ClientError::Encode(err) => write!(f, "Failed to encode request: {}", err),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientError::Request(err) => Some(err),
            ClientError::Encode(err) => Some(err),
            ClientError::Server { .. } => None,
        }
    }
}

/// Extension trait for checking HTTP responses and extracting server error messages
trait ResponseExt {
    /// Checks for error status and extracts the server's error message body
    async fn check(self) -> Result<reqwest::Response, ClientError>;
}

impl ResponseExt for reqwest::Response {
    async fn check(self) -> Result<reqwest::Response, ClientError> {
        if self.status().is_success() {
            return Ok(self);
        }
        let status = self.status();
        let message = match self.json::<Value>().await {
            Ok(body) => body["error"]["message"]
                .as_str()
                .unwrap_or("Unknown error")
                .to_string(),
            Err(_) => format!("HTTP {}", status),
        };
        Err(ClientError::Server { status, message })
    }
}

/// Credentials for servers running with `AUTH_REQUIRED`
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub api_key: Option<String>,
    pub hmac_secret: Option<String>,
}

/// HTTP client wrapper for communicating with a Tarot API server
pub struct TarotClient {
    /// The base URL of the server (e.g. "http://localhost:8008")
    base_url: String,
    /// The underlying HTTP client
    client: Client,
    credentials: Credentials,
}

impl TarotClient {
    /// Creates a new TarotClient
    ///
    /// ### Arguments
    ///
    /// * `base_url` - The base URL of the Tarot API server
    /// * `credentials` - API key and/or HMAC secret for protected routes
    pub fn new(base_url: String, credentials: Credentials) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
            credentials,
        }
    }

    /// Adds the API key or an HMAC signature over `body`
    fn authenticate(&self, builder: RequestBuilder, method: &str, path: &str, body: &[u8]) -> RequestBuilder {
        if let Some(key) = &self.credentials.api_key {
            return builder.header("x-api-key", key);
        }
        match &self.credentials.hmac_secret {
            Some(secret) => {
                let timestamp = Utc::now().timestamp_millis().to_string();
                let signature = sign_request(secret, method, path, &timestamp, body);
                builder
                    .header("x-client-id", CLIENT_ID)
                    .header("x-timestamp", timestamp)
                    .header("x-signature", signature)
            }
            None => builder,
        }
    }

    /// Checks that the server is up
    pub async fn health(&self) -> Result<Value, ClientError> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await.map_err(ClientError::Request)?.check().await?;
        response.json().await.map_err(ClientError::Request)
    }

    /// Lists every card
    pub async fn list_cards(&self) -> Result<CardsResponse, ClientError> {
        let url = format!("{}/cards", self.base_url);
        let response = self.client.get(&url).send().await.map_err(ClientError::Request)?.check().await?;
        response.json().await.map_err(ClientError::Request)
    }

    /// Draws a new reading
    pub async fn draw(&self, request: &ReadingRequest) -> Result<Reading, ClientError> {
        let path = "/reading";
        let body = serde_json::to_vec(request).map_err(ClientError::Encode)?;
        let builder = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        let response = self
            .authenticate(builder, "POST", path, &body)
            .body(body)
            .send()
            .await
            .map_err(ClientError::Request)?
            .check()
            .await?;
        response.json().await.map_err(ClientError::Request)
    }
}
