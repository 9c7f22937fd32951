//! HTTP client for the user administration backend.
//!
//! This module provides the `ApiClient` struct, the production
//! [`UserGateway`] implementation. Every endpoint answers with the
//! `{success, data, message}` envelope, which is unwrapped here so callers see
//! either the payload or an [`ApiError`].

use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::{ApiError, UserGateway};
use crate::models::{ApiEnvelope, LoginData, RegisterRequest, User, UserDraft, UserPage};
use crate::query::PageRequest;

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

const LOGIN_PATH: &str = "/user/login";
const CREATE_PATH: &str = "/user/create";
const PAGE_PATH: &str = "/user/page";
const UPDATE_PATH: &str = "/user/update";

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// API client for the user service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling,
/// and clones share the bearer token.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
    initial_backoff: Duration,
}

impl ApiClient {
    /// Create a new API client for the given base URL
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: Arc::new(RwLock::new(None)),
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    #[cfg(test)]
    fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Set or clear the bearer token for authenticated requests
    pub fn set_token(&self, token: Option<String>) {
        let mut slot = self.token.write().unwrap_or_else(|e| e.into_inner());
        *slot = token;
    }

    pub fn has_token(&self) -> bool {
        self.token
            .read()
            .map(|t| t.is_some())
            .unwrap_or(false)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        let token = self.token.read().ok().and_then(|t| t.clone());
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send a request and parse the envelope, retrying on rate limits.
    async fn send<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<ApiEnvelope<T>, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let mut request = self
                .with_auth(self.client.request(method.clone(), &url))
                .header(header::ACCEPT, "application/json");
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    let text = response.text().await?;
                    debug!(url = %url, bytes = text.len(), "Response received");
                    return parse_envelope(&text);
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(
                        url = %url,
                        retry = retries,
                        backoff_ms = backoff.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2; // Exponential backoff
                }
            }
        }
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiEnvelope<T>, ApiError> {
        self.send(Method::POST, path, Some(body)).await
    }
}

fn parse_envelope<T: DeserializeOwned>(text: &str) -> Result<ApiEnvelope<T>, ApiError> {
    serde_json::from_str(text)
        .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response: {}", e)))
}

/// Payload of a successful envelope; `success: false` becomes `Rejected`.
fn into_data<T>(envelope: ApiEnvelope<T>, fallback: &str) -> Result<T, ApiError> {
    if !envelope.success {
        return Err(ApiError::rejected(envelope.message, fallback));
    }
    envelope
        .data
        .ok_or_else(|| ApiError::InvalidResponse("Response is missing data".to_string()))
}

fn into_unit(envelope: ApiEnvelope<serde_json::Value>, fallback: &str) -> Result<(), ApiError> {
    if envelope.success {
        Ok(())
    } else {
        Err(ApiError::rejected(envelope.message, fallback))
    }
}

#[async_trait]
impl UserGateway for ApiClient {
    async fn login(&self, username: &str, password: &str) -> Result<LoginData, ApiError> {
        let body = LoginRequest { username, password };
        let envelope = self.post(LOGIN_PATH, &body).await?;
        into_data(envelope, "Login failed")
    }

    async fn register(&self, request: &RegisterRequest) -> Result<(), ApiError> {
        let envelope = self.post(CREATE_PATH, request).await?;
        into_unit(envelope, "Registration failed")
    }

    async fn page(&self, request: &PageRequest) -> Result<UserPage, ApiError> {
        debug!(current = request.current, page_size = request.page_size, "Fetching user page");
        let envelope = self.post(PAGE_PATH, request).await?;
        into_data(envelope, "Failed to load users")
    }

    async fn fetch_user(&self, id: i64) -> Result<User, ApiError> {
        let envelope = self
            .send::<User, ()>(Method::GET, &format!("/user/{}", id), None)
            .await?;
        into_data(envelope, "Failed to load user")
    }

    async fn create_user(&self, draft: &UserDraft) -> Result<(), ApiError> {
        let envelope = self.post(CREATE_PATH, draft).await?;
        into_unit(envelope, "Failed to create user")
    }

    async fn update_user(&self, draft: &UserDraft) -> Result<(), ApiError> {
        let envelope = self.post(UPDATE_PATH, draft).await?;
        into_unit(envelope, "Failed to update user")
    }

    async fn logic_delete(&self, id: i64) -> Result<(), ApiError> {
        let envelope = self
            .send::<serde_json::Value, ()>(Method::POST, &format!("/user/logicDelete/{}", id), None)
            .await?;
        into_unit(envelope, "Failed to delete user")
    }
}
