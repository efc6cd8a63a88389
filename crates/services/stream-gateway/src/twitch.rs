//! Twitch OAuth / Helix client
//!
//! Implements the credential check and stream key lookup the session
//! manager depends on. Only the client-credentials flow is used.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use twitchcast_session::{
    CredentialVerifier, Credentials, ResolveError, StreamKey, StreamKeyResolver, VerifyError,
};

use crate::config::TwitchConfig;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HelixList<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct HelixUser {
    id: String,
}

#[derive(Debug, Deserialize)]
struct HelixStreamKey {
    stream_key: String,
}

/// HTTP client for the Twitch identity and Helix APIs
///
/// Every call runs on an app access token from the client-credentials flow.
/// Helix `streams/key` only answers a user access token carrying the
/// `channel:read:stream_key` scope, so against production Twitch automatic
/// key resolution is refused and a start without an explicit stream key
/// fails with `StartFailed`. Callers that need to stream should send the key.
#[derive(Debug, Clone)]
pub struct TwitchClient {
    /// HTTP client
    client: Client,

    /// Endpoints and account settings
    config: TwitchConfig,
}

impl TwitchClient {
    /// Create a client with the configured per-request timeout
    pub fn new(config: TwitchConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self { client, config })
    }

    /// Client-credentials token, or `None` when Twitch refuses to issue one
    async fn access_token(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<String>, reqwest::Error> {
        let response = self
            .client
            .post(&self.config.token_url)
            .form(&[
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            tracing::warn!(
                client_id = %credentials.client_id,
                status = response.status().as_u16(),
                "Failed to get access token"
            );
            return Ok(None);
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token.filter(|t| !t.is_empty()))
    }

    async fn broadcaster_id(
        &self,
        credentials: &Credentials,
        token: &str,
        login: &str,
    ) -> Result<String, ResolveError> {
        let response = self
            .client
            .get(&self.config.users_url)
            .bearer_auth(token)
            .header("Client-Id", &credentials.client_id)
            .query(&[("login", login)])
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(ResolveError::Transport(format!(
                "users lookup returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let users: HelixList<HelixUser> = response.json().await.map_err(transport)?;
        users
            .data
            .into_iter()
            .next()
            .map(|user| user.id)
            .ok_or(ResolveError::MissingData("broadcaster id"))
    }
}

fn transport(e: reqwest::Error) -> ResolveError {
    ResolveError::Transport(e.to_string())
}

#[async_trait]
impl CredentialVerifier for TwitchClient {
    async fn verify(&self, credentials: &Credentials) -> Result<bool, VerifyError> {
        let token = match self.access_token(credentials).await {
            Ok(Some(token)) => token,
            Ok(None) => return Ok(false),
            Err(e) if e.is_timeout() => return Err(VerifyError::Timeout),
            Err(e) if e.is_decode() => return Err(VerifyError::UnexpectedResponse(e.to_string())),
            Err(e) => return Err(VerifyError::Transport(e.to_string())),
        };

        let response = self
            .client
            .get(&self.config.validate_url)
            .bearer_auth(&token)
            .header("Client-Id", &credentials.client_id)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    VerifyError::Timeout
                } else {
                    VerifyError::Transport(e.to_string())
                }
            })?;

        let valid = response.status() == StatusCode::OK;
        tracing::debug!(
            client_id = %credentials.client_id,
            status = response.status().as_u16(),
            valid,
            "Validated access token"
        );
        Ok(valid)
    }
}

/// Users lookup, then `streams/key`
///
/// Limited by the app token; see [`TwitchClient`].
#[async_trait]
impl StreamKeyResolver for TwitchClient {
    async fn resolve(&self, credentials: &Credentials) -> Result<StreamKey, ResolveError> {
        let login = self
            .config
            .broadcaster_login
            .as_deref()
            .ok_or(ResolveError::NotConfigured)?;

        let token = self
            .access_token(credentials)
            .await
            .map_err(transport)?
            .ok_or(ResolveError::TokenRejected)?;

        let broadcaster_id = self.broadcaster_id(credentials, &token, login).await?;

        let response = self
            .client
            .get(&self.config.stream_key_url)
            .bearer_auth(&token)
            .header("Client-Id", &credentials.client_id)
            .query(&[("broadcaster_id", broadcaster_id.as_str())])
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(ResolveError::Transport(format!(
                "stream key lookup returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let keys: HelixList<HelixStreamKey> = response.json().await.map_err(transport)?;
        let key = keys
            .data
            .into_iter()
            .next()
            .map(|k| StreamKey::new(k.stream_key))
            .filter(|k| !k.is_empty())
            .ok_or(ResolveError::MissingData("stream key"))?;

        tracing::info!(login, broadcaster_id = %broadcaster_id, "Resolved stream key from Twitch");
        Ok(key)
    }
}
