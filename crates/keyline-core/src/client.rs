//! HTTP client for the authentication backend.
//!
//! One request per operation. Non-2xx responses become [`AuthError::Server`] with the
//! most readable message the body offers; transport failures become
//! [`AuthError::Network`] so callers can tell "the server said no" from "no answer".

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::models::{
    LoginRequest, LoginResponse, MessageResponse, ProfileResponse, RegisterRequest, UserProfile,
};
use crate::validation::ValidationError;

/// Standard User-Agent header for keyline requests.
pub const USER_AGENT: &str = concat!("keyline/", env!("CARGO_PKG_VERSION"));

const REGISTER_FALLBACK: &str = "Registration failed";
const LOGIN_FALLBACK: &str = "Login failed";
const PROFILE_FALLBACK: &str = "Failed to fetch profile";
const LOGOUT_FALLBACK: &str = "Logout failed";

/// Categories of auth errors for consistent handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// Rejected on the client, never reached the network
    Validation,
    /// Non-2xx response from the backend
    Server,
    /// Transport failure, no response received
    Network,
    /// 2xx with a missing or unparseable body
    EmptyResponse,
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthErrorKind::Validation => write!(f, "validation"),
            AuthErrorKind::Server => write!(f, "server"),
            AuthErrorKind::Network => write!(f, "network"),
            AuthErrorKind::EmptyResponse => write!(f, "empty_response"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{message}")]
    Server { status: u16, message: String },
    #[error("{0}")]
    Network(String),
    #[error("Empty response body")]
    EmptyResponse,
}

impl AuthError {
    /// Builds a server error from a non-2xx status and its raw body.
    pub fn server(status: u16, body: &str, fallback: &str) -> Self {
        AuthError::Server {
            status,
            message: extract_error_message(body, fallback),
        }
    }

    pub fn kind(&self) -> AuthErrorKind {
        match self {
            AuthError::Validation(_) => AuthErrorKind::Validation,
            AuthError::Server { .. } => AuthErrorKind::Server,
            AuthError::Network(_) => AuthErrorKind::Network,
            AuthError::EmptyResponse => AuthErrorKind::EmptyResponse,
        }
    }

    /// True when the backend rejected the credentials or token (HTTP 401).
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AuthError::Server { status: 401, .. })
    }
}

pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Picks the message to show for a failed response body.
///
/// Order: the `message` field of a JSON object, then the raw body text,
/// then `fallback` when the body is empty.
pub fn extract_error_message(body: &str, fallback: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body)
        && let Some(message) = map.get("message").and_then(Value::as_str)
        && !message.trim().is_empty()
    {
        return message.trim().to_string();
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

fn classify_reqwest_error(e: &reqwest::Error) -> AuthError {
    if e.is_timeout() {
        AuthError::Network(format!("Request timed out: {e}"))
    } else if e.is_connect() {
        AuthError::Network(format!("Connection failed: {e}"))
    } else {
        AuthError::Network(format!("Network error: {e}"))
    }
}

/// Client for the four `/auth` endpoints.
#[derive(Debug, Clone)]
pub struct AuthClient {
    base_url: String,
    http: reqwest::Client,
}

impl AuthClient {
    /// Creates a client for `base_url` (e.g. `http://localhost:8080/api`).
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Creates a client from resolved configuration.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.effective_api_url()?, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `POST /auth/register`. Returns the server's message.
    ///
    /// # Errors
    /// Returns a server, network or empty-response error.
    pub async fn register(&self, request: &RegisterRequest<'_>) -> AuthResult<MessageResponse> {
        let builder = self.http.post(self.endpoint("/auth/register")).json(request);
        let response = self.send(builder, REGISTER_FALLBACK).await?;
        decode(response).await
    }

    /// `POST /auth/login`.
    ///
    /// # Errors
    /// Returns a server, network or empty-response error.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<LoginResponse> {
        let builder = self
            .http
            .post(self.endpoint("/auth/login"))
            .json(&LoginRequest { email, password });
        let response = self.send(builder, LOGIN_FALLBACK).await?;
        decode(response).await
    }

    /// `GET /auth/profile` with the bearer token.
    ///
    /// # Errors
    /// Returns a server, network or empty-response error.
    pub async fn get_profile(&self, token: &str) -> AuthResult<UserProfile> {
        let builder = self
            .http
            .get(self.endpoint("/auth/profile"))
            .bearer_auth(token);
        let response = self.send(builder, PROFILE_FALLBACK).await?;
        decode::<ProfileResponse>(response).await.map(Into::into)
    }

    /// `POST /auth/logout` with the bearer token. The response body is ignored.
    ///
    /// # Errors
    /// Returns a server or network error.
    pub async fn logout(&self, token: &str) -> AuthResult<()> {
        let builder = self
            .http
            .post(self.endpoint("/auth/logout"))
            .bearer_auth(token);
        self.send(builder, LOGOUT_FALLBACK).await?;
        Ok(())
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        fallback: &str,
    ) -> AuthResult<reqwest::Response> {
        let response = builder
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        debug!(url = %response.url(), status = status.as_u16(), "auth request completed");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::server(status.as_u16(), &body, fallback));
        }

        Ok(response)
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> AuthResult<T> {
    let body = response
        .text()
        .await
        .map_err(|e| classify_reqwest_error(&e))?;

    serde_json::from_str(&body).map_err(|e| {
        debug!(error = %e, "unusable success body");
        AuthError::EmptyResponse
    })
}
