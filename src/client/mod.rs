//! HTTP client for the Tripmate API.
//!
//! The session token lives in a `TokenStore` the caller hands to the client,
//! so a process can keep it in memory, persist it to disk, or share one store
//! between several clients.

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;

use crate::api::error::ErrorResponse;
use crate::db::{
    AuthResponse, InviteListResponse, MessageResponse, TripListResponse, TripResponse,
    UserResponse,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{status}: {message}")]
    Api { status: StatusCode, message: String },
    #[error("not logged in")]
    NotLoggedIn,
    #[error("token store: {0}")]
    Store(#[from] std::io::Error),
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::NotLoggedIn => Some(StatusCode::UNAUTHORIZED),
            _ => None,
        }
    }
}

/// Where the client keeps the bearer token between calls
pub trait TokenStore: Send + Sync {
    fn token(&self) -> Option<String>;
    fn set_token(&self, token: &str) -> std::io::Result<()>;
    fn clear_token(&self) -> std::io::Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|t| t.clone())
    }

    fn set_token(&self, token: &str) -> std::io::Result<()> {
        if let Ok(mut slot) = self.token.write() {
            *slot = Some(token.to_string());
        }
        Ok(())
    }

    fn clear_token(&self) -> std::io::Result<()> {
        if let Ok(mut slot) = self.token.write() {
            *slot = None;
        }
        Ok(())
    }
}

/// Token persisted as a single line in a file
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$HOME/.tripmate/token`, or `./.tripmate-token` without a home dir
    pub fn default_location() -> Self {
        match std::env::var_os("HOME") {
            Some(home) => Self::new(PathBuf::from(home).join(".tripmate").join("token")),
            None => Self::new(".tripmate-token"),
        }
    }
}

impl TokenStore for FileTokenStore {
    fn token(&self) -> Option<String> {
        std::fs::read_to_string(&self.path)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }

    fn set_token(&self, token: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;

        // A file left by an older version may still be world-readable
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(token.as_bytes())
    }

    fn clear_token(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

pub struct ApiClient {
    http: Client,
    base_url: String,
    tokens: Arc<dyn TokenStore>,
}

impl ApiClient {
    pub fn new(base_url: &str, tokens: Arc<dyn TokenStore>) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    pub fn is_logged_in(&self) -> bool {
        self.tokens.token().is_some()
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/api{}", self.base_url, path))
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let token = self.tokens.token().ok_or(ClientError::NotLoggedIn)?;
        Ok(self.request(method, path).bearer_auth(token))
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.message)
            .unwrap_or(body);
        Err(ClientError::Api { status, message })
    }

    async fn post_authed<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        Self::send(self.authed(Method::POST, path)?.json(body)).await
    }

    pub async fn health(&self) -> Result<bool, ClientError> {
        let response = self.request(Method::GET, "/health").send().await?;
        Ok(response.status().is_success())
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<UserResponse, ClientError> {
        let auth: AuthResponse = Self::send(
            self.request(Method::POST, "/users/register")
                .json(&json!({ "name": name, "email": email, "password": password })),
        )
        .await?;
        self.tokens.set_token(&auth.token)?;
        Ok(auth.user)
    }

    /// Log in and remember the session token
    pub async fn login(&self, email: &str, password: &str) -> Result<UserResponse, ClientError> {
        let auth: AuthResponse = Self::send(
            self.request(Method::POST, "/users/login")
                .json(&json!({ "email": email, "password": password })),
        )
        .await?;
        self.tokens.set_token(&auth.token)?;
        Ok(auth.user)
    }

    pub fn logout(&self) -> Result<(), ClientError> {
        self.tokens.clear_token()?;
        Ok(())
    }

    pub async fn me(&self) -> Result<UserResponse, ClientError> {
        Self::send(self.authed(Method::GET, "/users/me")?).await
    }

    pub async fn my_trips(&self) -> Result<TripListResponse, ClientError> {
        Self::send(self.authed(Method::GET, "/trips/my")?).await
    }

    pub async fn trip(&self, trip_id: &str) -> Result<TripResponse, ClientError> {
        Self::send(self.authed(Method::GET, &format!("/trips/{}", trip_id))?).await
    }

    pub async fn my_invites(&self) -> Result<InviteListResponse, ClientError> {
        Self::send(self.authed(Method::GET, "/trips/invites/my")?).await
    }

    pub async fn accept_invite(&self, invite_id: &str) -> Result<TripResponse, ClientError> {
        self.post_authed(&format!("/trips/invites/{}/accept", invite_id), &json!({}))
            .await
    }

    pub async fn decline_invite(&self, invite_id: &str) -> Result<MessageResponse, ClientError> {
        self.post_authed(&format!("/trips/invites/{}/decline", invite_id), &json!({}))
            .await
    }

    pub async fn add_chat_message(
        &self,
        trip_id: &str,
        message: &str,
    ) -> Result<TripResponse, ClientError> {
        self.post_authed(
            &format!("/trips/{}/chat", trip_id),
            &json!({ "message": message }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let store = MemoryTokenStore::new();
        assert!(store.token().is_none());
        store.set_token("abc").unwrap();
        assert_eq!(store.token().as_deref(), Some("abc"));
        store.clear_token().unwrap();
        assert!(store.token().is_none());
    }

    #[test]
    fn test_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("token");

        let store = FileTokenStore::new(&path);
        assert!(store.token().is_none());
        store.set_token("abc").unwrap();

        let reopened = FileTokenStore::new(&path);
        assert_eq!(reopened.token().as_deref(), Some("abc"));

        reopened.clear_token().unwrap();
        assert!(store.token().is_none());
        // Clearing twice is fine
        reopened.clear_token().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_token_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, "old").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        FileTokenStore::new(&path).set_token("fresh").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "fresh");

        let other = dir.path().join("new-token");
        FileTokenStore::new(&other).set_token("abc").unwrap();
        let mode = std::fs::metadata(&other).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_authed_call_without_token() {
        let client = ApiClient::new("http://127.0.0.1:9", Arc::new(MemoryTokenStore::new())).unwrap();
        assert!(!client.is_logged_in());
        let err = client.my_trips().await.unwrap_err();
        assert!(matches!(err, ClientError::NotLoggedIn));
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    }
}
