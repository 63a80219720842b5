//! Supabase implementation of the backend traits.
//!
//! - `auth`: GoTrue endpoints under `/auth/v1`
//! - `rest`: PostgREST table access under `/rest/v1`
//! - `realtime`: Phoenix-channel change feed under `/realtime/v1/websocket`
//!
//! Every request carries the project's anon key in the `apikey` header and a
//! bearer token: the user's access token when signed in, the anon key
//! otherwise.

mod auth;
pub mod realtime;
mod rest;

use std::sync::RwLock;

use log::{debug, warn};

pub use realtime::RealtimeClient;

use crate::backend::error::{BackendError, error_message};

/// HTTP client for the auth and table APIs of one Supabase project.
pub struct SupabaseClient {
    base_url: String,
    anon_key: String,
    http: reqwest::Client,
    access_token: RwLock<Option<String>>,
}

impl SupabaseClient {
    /// Creates a client for the project at `base_url` (e.g.
    /// `https://abc.supabase.co`). A trailing slash is ignored.
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self::with_http(base_url, anon_key, reqwest::Client::new())
    }

    pub fn with_http(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        http: reqwest::Client,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            anon_key: anon_key.into(),
            http,
            access_token: RwLock::new(None),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn bearer(&self) -> String {
        self.access_token
            .read()
            .ok()
            .and_then(|guard| guard.clone())
            .unwrap_or_else(|| self.anon_key.clone())
    }

    fn store_token(&self, token: Option<String>) {
        match self.access_token.write() {
            Ok(mut guard) => *guard = token,
            Err(_) => warn!("Access token lock poisoned; keeping previous token"),
        }
    }

    /// Attaches the project key and the current bearer token.
    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer())
    }

    /// Attaches the project key and an explicit bearer token.
    fn authorize_with(
        &self,
        builder: reqwest::RequestBuilder,
        token: &str,
    ) -> reqwest::RequestBuilder {
        builder.header("apikey", &self.anon_key).bearer_auth(token)
    }
}

/// Which API produced a response; decides how error statuses are classified.
#[derive(Clone, Copy, Debug)]
enum Api {
    Auth,
    Rest,
}

/// Passes successful responses through and converts failures into
/// `BackendError`, reading the error body for a message.
async fn check(response: reqwest::Response, api: Api) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    debug!("{:?} response status: {}", api, status);
    if status.is_success() {
        return Ok(response);
    }

    let code = status.as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);
    warn!("{:?} API error: {} - {}", api, code, message);

    Err(match (api, code) {
        (Api::Auth, 400 | 401 | 403 | 422) => BackendError::Auth(message),
        (Api::Rest, 401) => BackendError::Auth(message),
        (Api::Rest, 404 | 406) => BackendError::NotFound(message),
        _ => BackendError::Api {
            status: code,
            message,
        },
    })
}
