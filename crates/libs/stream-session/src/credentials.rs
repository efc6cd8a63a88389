//! Credential types and the platform collaborators the manager depends on
//!
//! The concrete OAuth client lives in the gateway; this crate only needs
//! "is this principal valid?" and "what key should this principal stream to?".

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;

use crate::error::{ResolveError, VerifyError};

/// Secret ingest credential
///
/// Never serialized and never printed: `Debug` and `Display` are redacted.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct StreamKey(String);

impl StreamKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Raw key, only for building the destination URL
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StreamKey(***)")
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Client credentials supplied by a caller
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub stream_key: Option<StreamKey>,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            stream_key: None,
        }
    }

    pub fn with_stream_key(mut self, key: impl Into<String>) -> Self {
        self.stream_key = Some(StreamKey::new(key));
        self
    }

    /// Caller-supplied key, ignoring blank strings
    pub fn explicit_stream_key(&self) -> Option<&StreamKey> {
        self.stream_key.as_ref().filter(|k| !k.is_empty())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("stream_key", &self.stream_key)
            .finish()
    }
}

/// Checks client credentials against the remote platform
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// `Ok(false)` is a definitive rejection; `Err` means the platform could
    /// not be asked. Callers treat both as a failed verification.
    async fn verify(&self, credentials: &Credentials) -> Result<bool, VerifyError>;
}

/// Looks up the account's stream key when the caller did not supply one
#[async_trait]
pub trait StreamKeyResolver: Send + Sync {
    async fn resolve(&self, credentials: &Credentials) -> Result<StreamKey, ResolveError>;
}

/// Resolver used when automatic key lookup is not configured
///
/// Always fails, so a start without an explicit key fails closed.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredResolver;

#[async_trait]
impl StreamKeyResolver for UnconfiguredResolver {
    async fn resolve(&self, _credentials: &Credentials) -> Result<StreamKey, ResolveError> {
        Err(ResolveError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_key_is_redacted() {
        let key = StreamKey::new("live_123456_secret");
        assert_eq!(format!("{:?}", key), "StreamKey(***)");
        assert_eq!(key.to_string(), "***");
        assert_eq!(key.expose(), "live_123456_secret");
    }

    #[test]
    fn test_credentials_debug_hides_secrets() {
        let creds = Credentials::new("client", "very-secret").with_stream_key("live_key");
        let printed = format!("{:?}", creds);
        assert!(printed.contains("client"));
        assert!(!printed.contains("very-secret"));
        assert!(!printed.contains("live_key"));
    }

    #[test]
    fn test_credentials_from_wire() {
        let creds: Credentials = serde_json::from_str(
            r#"{"clientId":"abc","clientSecret":"def","streamKey":"live_1"}"#,
        )
        .unwrap();
        assert_eq!(creds.client_id, "abc");
        assert_eq!(creds.explicit_stream_key().map(|k| k.expose()), Some("live_1"));

        let creds: Credentials =
            serde_json::from_str(r#"{"clientId":"abc","clientSecret":"def"}"#).unwrap();
        assert!(creds.stream_key.is_none());
    }

    #[test]
    fn test_blank_stream_key_is_not_explicit() {
        let creds = Credentials::new("a", "b").with_stream_key("   ");
        assert!(creds.explicit_stream_key().is_none());
    }

    #[tokio::test]
    async fn test_unconfigured_resolver_fails() {
        let result = UnconfiguredResolver.resolve(&Credentials::new("a", "b")).await;
        assert!(matches!(result, Err(ResolveError::NotConfigured)));
    }
}
