//! Session records
//!
//! A record binds one session id to one encoder process. Status is never
//! trusted from a stored field: every read goes through [`SessionRecord::poll`],
//! which asks the OS whether the process is still running.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::config::StreamConfig;
use crate::credentials::StreamKey;
use crate::launcher::{EncoderProcess, TerminationOutcome};

/// Opaque, unique session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s).ok().map(Self)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Observed state of a session's encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Encoder was running at the last poll
    Active,
    /// Encoder exited cleanly or was stopped by us
    Stopped,
    /// Encoder exited with an error or could not be polled
    Failed,
}

impl SessionStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionStatus::Active)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Active => write!(f, "active"),
            SessionStatus::Stopped => write!(f, "stopped"),
            SessionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Point-in-time copy of a session, safe to hand to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub config: StreamConfig,
    pub pid: u32,
    pub created_at: DateTime<Utc>,
}

/// One streaming attempt and the encoder that serves it
pub struct SessionRecord {
    id: SessionId,
    stream_key: StreamKey,
    config: StreamConfig,
    pid: u32,
    created_at: DateTime<Utc>,
    /// Set once termination begins; polls stop waiting on the process lock
    stopping: AtomicBool,
    process: Mutex<EncoderProcess>,
}

impl SessionRecord {
    pub fn new(
        id: SessionId,
        stream_key: StreamKey,
        config: StreamConfig,
        process: EncoderProcess,
    ) -> Self {
        Self {
            id,
            stream_key,
            config,
            pid: process.pid(),
            created_at: Utc::now(),
            stopping: AtomicBool::new(false),
            process: Mutex::new(process),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Termination has begun; the record is on its way out of the store
    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    /// Ask the OS whether the encoder is still running
    ///
    /// A record being terminated reports `Stopped` right away instead of
    /// waiting out the grace period behind the process lock.
    pub async fn poll(&self) -> SessionStatus {
        if self.is_stopping() {
            return SessionStatus::Stopped;
        }
        let mut process = match self.process.try_lock() {
            Ok(process) => process,
            Err(_) if self.is_stopping() => return SessionStatus::Stopped,
            Err(_) => self.process.lock().await,
        };

        match process.try_wait() {
            Ok(None) => SessionStatus::Active,
            Ok(Some(exit)) if exit.success() => SessionStatus::Stopped,
            Ok(Some(exit)) => {
                tracing::debug!(
                    session_id = %self.id,
                    pid = self.pid,
                    %exit,
                    "Encoder exited with failure"
                );
                SessionStatus::Failed
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %self.id,
                    pid = self.pid,
                    error = %e,
                    "Failed to poll encoder"
                );
                SessionStatus::Failed
            }
        }
    }

    /// Poll and copy out a view
    pub async fn view(&self) -> SessionView {
        SessionView {
            session_id: self.id,
            status: self.poll().await,
            config: self.config,
            pid: self.pid,
            created_at: self.created_at,
        }
    }

    /// Graceful-then-forced termination of the encoder
    pub async fn terminate(&self, grace_period: Duration) -> std::io::Result<TerminationOutcome> {
        // Flag first so concurrent polls never queue behind the grace wait
        self.stopping.store(true, Ordering::Release);
        self.process.lock().await.terminate(grace_period).await
    }
}

impl fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRecord")
            .field("id", &self.id)
            .field("pid", &self.pid)
            .field("stream_key", &self.stream_key)
            .field("config", &self.config)
            .field("created_at", &self.created_at)
            .field("stopping", &self.is_stopping())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_roundtrips_through_display() {
        let id = SessionId::generate();
        assert_eq!(SessionId::parse(&id.to_string()), Some(id));
        assert_eq!(SessionId::parse("not-a-uuid"), None);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(serde_json::to_value(SessionStatus::Active).unwrap(), "active");
        assert_eq!(serde_json::to_value(SessionStatus::Failed).unwrap(), "failed");
        assert_eq!(SessionStatus::Stopped.to_string(), "stopped");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_poll_reflects_process_exit() {
        let child = tokio::process::Command::new("sh")
            .args(["-c", "sleep 0.2; exit 3"])
            .spawn()
            .unwrap();
        let process = EncoderProcess::from_child(child).unwrap();
        let record = SessionRecord::new(
            SessionId::generate(),
            StreamKey::new("k"),
            StreamConfig::default(),
            process,
        );

        assert_eq!(record.poll().await, SessionStatus::Active);
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(record.poll().await, SessionStatus::Failed);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_debug_does_not_leak_stream_key() {
        let child = tokio::process::Command::new("true").spawn().unwrap();
        let process = EncoderProcess::from_child(child).unwrap();
        let record = SessionRecord::new(
            SessionId::generate(),
            StreamKey::new("live_super_secret"),
            StreamConfig::default(),
            process,
        );
        let printed = format!("{:?}", record);
        assert!(printed.contains("StreamKey(***)"));
        assert!(!printed.contains("live_super_secret"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_poll_does_not_wait_for_termination() {
        let child = tokio::process::Command::new("sh")
            .args(["-c", "trap '' TERM; sleep 30"])
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        let process = EncoderProcess::from_child(child).unwrap();
        let record = std::sync::Arc::new(SessionRecord::new(
            SessionId::generate(),
            StreamKey::new("k"),
            StreamConfig::default(),
            process,
        ));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(record.poll().await, SessionStatus::Active);

        let stopping = record.clone();
        let stop = tokio::spawn(async move { stopping.terminate(Duration::from_secs(3)).await });
        tokio::time::sleep(Duration::from_millis(100)).await;

        let status = tokio::time::timeout(Duration::from_millis(500), record.poll())
            .await
            .expect("poll waited behind termination");
        assert_eq!(status, SessionStatus::Stopped);
        assert!(record.is_stopping());

        assert_eq!(stop.await.unwrap().unwrap(), TerminationOutcome::Forced);
    }
}
