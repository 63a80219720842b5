//! GoTrue (`/auth/v1`) endpoints.

use async_trait::async_trait;
use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};

use super::{Api, SupabaseClient, check};
use crate::backend::{
    AuthService, AuthSession, AuthUser, BackendError, SignUpOutcome, SignUpProfile,
};

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct SignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
    data: &'a SignUpProfile,
}

/// Token endpoint response. `expires_at` is missing on older servers.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self) -> AuthSession {
        let expires_at = self
            .expires_at
            .unwrap_or_else(|| Utc::now().timestamp() + self.expires_in);
        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// Sign-up answers with a session when the project auto-confirms, and with
/// the bare user (or `{user, session: null}`) when email confirmation is on.
fn parse_sign_up(value: serde_json::Value) -> Result<SignUpOutcome, BackendError> {
    if value.get("access_token").is_some() {
        let token: TokenResponse = serde_json::from_value(value)?;
        return Ok(SignUpOutcome::SignedIn(token.into_session()));
    }
    if let Some(session) = value.get("session").filter(|s| !s.is_null()) {
        let token: TokenResponse = serde_json::from_value(session.clone())?;
        return Ok(SignUpOutcome::SignedIn(token.into_session()));
    }
    let user_value = value.get("user").cloned().unwrap_or(value);
    let user: AuthUser = serde_json::from_value(user_value)?;
    Ok(SignUpOutcome::ConfirmationRequired(user))
}

#[async_trait]
impl AuthService for SupabaseClient {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, BackendError> {
        info!("Signing in {}", email);
        let response = self
            .http
            .post(self.auth_url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&PasswordGrant { email, password })
            .send()
            .await?;
        let token: TokenResponse = check(response, Api::Auth).await?.json().await?;
        let session = token.into_session();
        self.store_token(Some(session.access_token.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: &SignUpProfile,
    ) -> Result<SignUpOutcome, BackendError> {
        info!("Signing up {} as {}", email, profile.username);
        let response = self
            .http
            .post(self.auth_url("signup"))
            .header("apikey", &self.anon_key)
            .json(&SignUpRequest {
                email,
                password,
                data: profile,
            })
            .send()
            .await?;
        let value: serde_json::Value = check(response, Api::Auth).await?.json().await?;
        let outcome = parse_sign_up(value)?;
        if let SignUpOutcome::SignedIn(session) = &outcome {
            self.store_token(Some(session.access_token.clone()));
        }
        Ok(outcome)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        info!("Signing out");
        let response = self
            .authorize_with(self.http.post(self.auth_url("logout")), access_token)
            .send()
            .await;
        // The local session is dropped whatever the server says.
        self.store_token(None);
        check(response?, Api::Auth).await?;
        Ok(())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, BackendError> {
        info!("Refreshing session");
        let response = self
            .http
            .post(self.auth_url("token"))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.anon_key)
            .json(&RefreshGrant { refresh_token })
            .send()
            .await?;
        let token: TokenResponse = check(response, Api::Auth).await?.json().await?;
        let session = token.into_session();
        self.store_token(Some(session.access_token.clone()));
        Ok(session)
    }

    async fn current_user(&self, access_token: &str) -> Result<AuthUser, BackendError> {
        let response = self
            .authorize_with(self.http.get(self.auth_url("user")), access_token)
            .send()
            .await?;
        Ok(check(response, Api::Auth).await?.json().await?)
    }
}
