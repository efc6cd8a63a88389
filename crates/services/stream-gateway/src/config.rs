//! Configuration for the stream gateway
//!
//! Configuration can be loaded from a TOML file and/or environment variables.
//! Environment variables (`STREAMER_*`) take precedence over the file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use twitchcast_session::ManagerSettings;

/// Main configuration for the stream gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Twitch API and ingest configuration
    #[serde(default)]
    pub twitch: TwitchConfig,

    /// Encoder process configuration
    #[serde(default)]
    pub encoder: EncoderConfig,

    /// Status feed configuration
    #[serde(default)]
    pub status: StatusConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP API port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8001
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Twitch endpoints and account settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitchConfig {
    /// OAuth client-credentials token endpoint
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// OAuth token validation endpoint
    #[serde(default = "default_validate_url")]
    pub validate_url: String,

    /// Helix users endpoint
    #[serde(default = "default_users_url")]
    pub users_url: String,

    /// Helix stream key endpoint
    #[serde(default = "default_stream_key_url")]
    pub stream_key_url: String,

    /// RTMP ingest base URL; the stream key is appended
    #[serde(default = "default_ingest_url")]
    pub ingest_url: String,

    /// Channel login used for stream key lookup and the public channel URL
    #[serde(default)]
    pub broadcaster_login: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_token_url() -> String {
    "https://id.twitch.tv/oauth2/token".to_string()
}

fn default_validate_url() -> String {
    "https://id.twitch.tv/oauth2/validate".to_string()
}

fn default_users_url() -> String {
    "https://api.twitch.tv/helix/users".to_string()
}

fn default_stream_key_url() -> String {
    "https://api.twitch.tv/helix/streams/key".to_string()
}

fn default_ingest_url() -> String {
    "rtmp://live.twitch.tv/live".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for TwitchConfig {
    fn default() -> Self {
        Self {
            token_url: default_token_url(),
            validate_url: default_validate_url(),
            users_url: default_users_url(),
            stream_key_url: default_stream_key_url(),
            ingest_url: default_ingest_url(),
            broadcaster_login: None,
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

/// Encoder process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Encoder executable, looked up on PATH when not absolute
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Forward encoder stdout/stderr to the debug log
    #[serde(default = "default_capture_output")]
    pub capture_output: bool,

    /// Seconds to wait after SIGTERM before killing the encoder
    #[serde(default = "default_grace_period")]
    pub grace_period_seconds: u64,
}

fn default_binary() -> String {
    "ffmpeg".to_string()
}

fn default_capture_output() -> bool {
    true
}

fn default_grace_period() -> u64 {
    5
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            capture_output: default_capture_output(),
            grace_period_seconds: default_grace_period(),
        }
    }
}

/// Status feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Seconds between status pushes to each observer
    #[serde(default = "default_broadcast_interval")]
    pub broadcast_interval_seconds: u64,
}

fn default_broadcast_interval() -> u64 {
    5
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            broadcast_interval_seconds: default_broadcast_interval(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config)
    }

    /// Load configuration from file if it exists, then apply environment overrides
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) if p.as_ref().exists() => Self::from_file(p)?,
            _ => Config::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        // Server
        if let Some(host) = lookup("STREAMER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("STREAMER_PORT").and_then(|p| p.trim().parse().ok()) {
            self.server.port = port;
        }

        // Twitch
        if let Some(url) = lookup("STREAMER_INGEST_URL") {
            self.twitch.ingest_url = url;
        }
        if let Some(login) = lookup("STREAMER_BROADCASTER_LOGIN") {
            let login = login.trim().to_string();
            self.twitch.broadcaster_login = (!login.is_empty()).then_some(login);
        }
        if let Some(timeout) = parsed("STREAMER_TWITCH_TIMEOUT") {
            self.twitch.request_timeout_seconds = timeout;
        }

        // Encoder
        if let Some(binary) = lookup("STREAMER_FFMPEG") {
            self.encoder.binary = binary;
        }
        if let Some(grace) = parsed("STREAMER_GRACE_PERIOD") {
            self.encoder.grace_period_seconds = grace;
        }

        // Status
        if let Some(interval) = parsed("STREAMER_BROADCAST_INTERVAL") {
            self.status.broadcast_interval_seconds = interval;
        }
    }

    /// Address the HTTP server binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Public channel URL reported to clients after a start
    pub fn channel_url(&self) -> String {
        match &self.twitch.broadcaster_login {
            Some(login) => format!("https://twitch.tv/{}", login),
            None => "https://twitch.tv".to_string(),
        }
    }

    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_secs(self.status.broadcast_interval_seconds.max(1))
    }

    /// Settings for the session lifecycle manager
    pub fn manager_settings(&self) -> ManagerSettings {
        ManagerSettings {
            ingest_url: self.twitch.ingest_url.clone(),
            grace_period: Duration::from_secs(self.encoder.grace_period_seconds),
            verify_timeout: Duration::from_secs(self.twitch.request_timeout_seconds.max(1)),
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8001);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.encoder.binary, "ffmpeg");
        assert_eq!(config.encoder.grace_period_seconds, 5);
        assert_eq!(config.status.broadcast_interval_seconds, 5);
        assert_eq!(config.twitch.ingest_url, "rtmp://live.twitch.tv/live");
        assert!(config.twitch.broadcaster_login.is_none());
    }

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
[server]
port = 9090

[twitch]
broadcaster_login = "somechannel"
request_timeout_seconds = 3

[encoder]
binary = "/usr/local/bin/ffmpeg"
grace_period_seconds = 2
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.twitch.broadcaster_login.as_deref(), Some("somechannel"));
        assert_eq!(config.twitch.token_url, "https://id.twitch.tv/oauth2/token");
        assert_eq!(config.encoder.binary, "/usr/local/bin/ffmpeg");
        assert_eq!(config.status.broadcast_interval_seconds, 5);

        let settings = config.manager_settings();
        assert_eq!(settings.grace_period, Duration::from_secs(2));
        assert_eq!(settings.verify_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[status]\nbroadcast_interval_seconds = 2").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.broadcast_interval(), Duration::from_secs(2));
    }

    #[test]
    fn test_from_file_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = \"not a number\"").unwrap();

        assert!(matches!(Config::from_file(file.path()), Err(ConfigError::Parse(_))));
        assert!(matches!(
            Config::from_file("/nonexistent/streamer.toml"),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("STREAMER_PORT", "8100"),
            ("STREAMER_FFMPEG", "/opt/ffmpeg"),
            ("STREAMER_GRACE_PERIOD", "7"),
            ("STREAMER_BROADCAST_INTERVAL", "abc"),
            ("STREAMER_BROADCASTER_LOGIN", "mychannel"),
            ("STREAMER_INGEST_URL", "rtmp://localhost/live"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 8100);
        assert_eq!(config.encoder.binary, "/opt/ffmpeg");
        assert_eq!(config.encoder.grace_period_seconds, 7);
        // Unparseable values keep the default
        assert_eq!(config.status.broadcast_interval_seconds, 5);
        assert_eq!(config.channel_url(), "https://twitch.tv/mychannel");
        assert_eq!(config.manager_settings().ingest_url, "rtmp://localhost/live");
    }

    #[test]
    fn test_channel_url_without_login() {
        assert_eq!(Config::default().channel_url(), "https://twitch.tv");
        assert_eq!(Config::default().bind_addr(), "0.0.0.0:8001");
    }
}
