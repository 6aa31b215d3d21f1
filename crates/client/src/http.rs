//! Typed REST client for the chat gateway.
//!
//! One async method per endpoint. The bearer token lives in shared state
//! and is attached to every request; a 401 clears it and surfaces
//! [`Error::Unauthorized`] so callers can route the user back to login.
//! Every other non-2xx response is normalized into the uniform
//! [`ApiErrorBody`] shape and surfaced as [`Error::Api`].

use std::sync::Arc;

use palaver_protocol::ApiErrorBody;
use palaver_protocol::api::*;
use parking_lot::RwLock;
use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Client for the REST gateway. Cheap to clone; clones share the token.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: Arc::new(RwLock::new(None)),
        }
    }

    /// Stores the bearer token attached to subsequent requests.
    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
    }

    pub fn clear_token(&self) {
        self.token.write().take();
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    // -- auth ---------------------------------------------------------------

    pub async fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse> {
        self.post("/api/auth/register", request).await
    }

    /// Logs in and stores the returned token on success.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let response: LoginResponse = self
            .post(
                "/api/auth/login",
                &LoginRequest {
                    email: email.to_string(),
                    password: password.to_string(),
                },
            )
            .await?;
        self.set_token(response.token.clone());
        Ok(response)
    }

    pub async fn auth_me(&self) -> Result<AuthMeResponse> {
        self.get("/api/auth/me").await
    }

    // -- guilds -------------------------------------------------------------

    pub async fn my_guilds(&self) -> Result<ListMyGuildsResponse> {
        self.get("/api/users/me/guilds").await
    }

    pub async fn create_guild(&self, request: &CreateGuildRequest) -> Result<CreateGuildResponse> {
        self.post("/api/guilds", request).await
    }

    /// Full overview: guild with nested categories and channels.
    pub async fn guild_overview(&self, guild_id: &str) -> Result<GuildOverviewResponse> {
        self.get(&format!("/api/guilds/{guild_id}/overview")).await
    }

    pub async fn create_category(
        &self,
        guild_id: &str,
        name: &str,
    ) -> Result<CreateCategoryResponse> {
        self.post(
            &format!("/api/guilds/{guild_id}/categories"),
            &CreateCategoryRequest {
                name: name.to_string(),
            },
        )
        .await
    }

    pub async fn create_channel(
        &self,
        category_id: &str,
        name: &str,
    ) -> Result<CreateChannelResponse> {
        self.post(
            &format!("/api/categories/{category_id}/channels"),
            &CreateChannelRequest {
                name: name.to_string(),
            },
        )
        .await
    }

    // -- invites ------------------------------------------------------------

    pub async fn create_invite(
        &self,
        guild_id: &str,
        request: &CreateInviteRequest,
    ) -> Result<CreateInviteResponse> {
        self.post(&format!("/api/guilds/{guild_id}/invites"), request)
            .await
    }

    pub async fn invites(&self, guild_id: &str) -> Result<ListInvitesResponse> {
        self.get(&format!("/api/guilds/{guild_id}/invites")).await
    }

    pub async fn invite(&self, code: &str) -> Result<GetInviteResponse> {
        self.get(&format!("/api/invites/{code}")).await
    }

    pub async fn join_guild(&self, code: &str) -> Result<JoinGuildResponse> {
        self.post(&format!("/api/invites/{code}/join"), &serde_json::json!({}))
            .await
    }

    // -- messages -----------------------------------------------------------

    pub async fn messages(&self, channel_id: &str) -> Result<ListMessagesResponse> {
        self.get(&format!("/api/channels/{channel_id}/messages"))
            .await
    }

    pub async fn send_message(
        &self,
        channel_id: &str,
        request: &CreateMessageRequest,
    ) -> Result<CreateMessageResponse> {
        self.post(&format!("/api/channels/{channel_id}/messages"), request)
            .await
    }

    // -- profile and media --------------------------------------------------

    pub async fn me(&self) -> Result<ProfileResponse> {
        self.get("/api/users/me").await
    }

    pub async fn update_me(&self, request: &UpdateProfileRequest) -> Result<ProfileResponse> {
        self.put("/api/users/me", request).await
    }

    pub async fn upload_url(&self, request: &UploadUrlRequest) -> Result<UploadUrlResponse> {
        self.post("/api/media/upload-url", request).await
    }

    // -- plumbing -----------------------------------------------------------

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.execute(self.http.get(self.url(path))).await
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(self.http.post(self.url(path)).json(body))
            .await
    }

    async fn put<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(self.http.put(self.url(path)).json(body)).await
    }

    async fn execute<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let request = match self.token.read().as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let bytes = response.bytes().await.unwrap_or_default();
        let body = serde_json::from_slice::<ApiErrorBody>(&bytes)
            .ok()
            .filter(|body| body.code.is_some() || !body.message.is_empty())
            .unwrap_or_else(|| {
                if bytes.is_empty() {
                    ApiErrorBody::opaque(status.to_string())
                } else {
                    ApiErrorBody::opaque(String::from_utf8_lossy(&bytes).into_owned())
                }
            });

        if status == StatusCode::UNAUTHORIZED {
            // Stored token is no longer valid; callers route to login.
            self.clear_token();
            return Err(Error::Unauthorized(body));
        }
        Err(Error::Api {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://localhost:8000/");
        assert_eq!(client.url("/api/auth/me"), "http://localhost:8000/api/auth/me");
    }

    #[test]
    fn token_is_shared_across_clones() {
        let client = ApiClient::new("http://localhost:8000");
        let clone = client.clone();

        client.set_token("tok");
        assert_eq!(clone.token().as_deref(), Some("tok"));

        clone.clear_token();
        assert!(client.token().is_none());
    }
}
