//! Integration tests for the session lifecycle
//!
//! Real child processes stand in for the encoder so liveness polling,
//! termination and pruning run against the OS.

#![cfg(unix)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_test::assert_ok;
use twitchcast_session::{
    CredentialVerifier, Credentials, EncoderLauncher, EncoderProcess, LaunchError, ManagerSettings,
    SessionError, SessionManager, SessionStatus, StatusBroadcaster, StatusMessage, StreamConfig,
    VerifyError,
};

/// Test doubles for the platform and the encoder
mod doubles {
    use super::*;

    /// Accepts one fixed client id
    pub struct KnownClient(pub &'static str);

    #[async_trait]
    impl CredentialVerifier for KnownClient {
        async fn verify(&self, credentials: &Credentials) -> Result<bool, VerifyError> {
            Ok(credentials.client_id == self.0)
        }
    }

    /// Spawns `sh -c <script>` per launch and counts launches
    pub struct ScriptLauncher {
        pub script: &'static str,
        pub launches: AtomicUsize,
    }

    impl ScriptLauncher {
        pub fn new(script: &'static str) -> Arc<Self> {
            Arc::new(Self {
                script,
                launches: AtomicUsize::new(0),
            })
        }
    }

    impl EncoderLauncher for ScriptLauncher {
        fn launch(
            &self,
            destination: &str,
            config: &StreamConfig,
        ) -> Result<EncoderProcess, LaunchError> {
            config.validate()?;
            assert!(destination.starts_with("rtmp://"));
            self.launches.fetch_add(1, Ordering::SeqCst);
            let child = tokio::process::Command::new("sh")
                .args(["-c", self.script])
                .kill_on_drop(true)
                .spawn()?;
            EncoderProcess::from_child(child)
        }
    }
}

use doubles::{KnownClient, ScriptLauncher};

fn manager_with(script: &'static str) -> (Arc<SessionManager>, Arc<ScriptLauncher>) {
    let launcher = ScriptLauncher::new(script);
    let manager = SessionManager::new(
        Arc::new(KnownClient("good-client")),
        launcher.clone(),
        ManagerSettings {
            grace_period: Duration::from_secs(2),
            ..ManagerSettings::default()
        },
    );
    (Arc::new(manager), launcher)
}

fn good_credentials() -> Credentials {
    Credentials::new("good-client", "secret").with_stream_key("live_123")
}

fn process_exists(pid: u32) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    kill(Pid::from_raw(pid as i32), None::<Signal>).is_ok()
}

#[tokio::test]
async fn test_invalid_credentials_leave_store_empty() {
    let (manager, launcher) = manager_with("sleep 30");

    let result = manager
        .start(
            &Credentials::new("bad-client", "secret").with_stream_key("live_123"),
            StreamConfig::default(),
        )
        .await;

    assert!(matches!(result, Err(SessionError::InvalidCredentials)));
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);

    let report = manager.status().await;
    assert_eq!(report.active_streams, 0);
    assert_eq!(report.total_sessions, 0);
}

#[tokio::test]
async fn test_start_status_stop_all() {
    let (manager, _launcher) = manager_with("sleep 30");
    let config = StreamConfig::new(1280, 720, 30, 2500);

    let started = assert_ok!(manager.start(&good_credentials(), config).await);

    let report = manager.status().await;
    assert_eq!(report.active_streams, 1);
    assert_eq!(report.streams.len(), 1);
    assert_eq!(report.streams[0].status, SessionStatus::Active);
    assert_eq!(report.streams[0].config, config);
    assert_eq!(report.streams[0].session_id, started.session_id);

    assert_eq!(manager.stop_all().await, 1);

    let report = manager.status().await;
    assert_eq!(report.active_streams, 0);
    assert!(report.streams.is_empty());
}

#[tokio::test]
async fn test_stop_all_is_idempotent() {
    let (manager, _launcher) = manager_with("sleep 30");
    assert_ok!(manager.start(&good_credentials(), StreamConfig::default()).await);

    assert_eq!(manager.stop_all().await, 1);
    assert_eq!(manager.stop_all().await, 0);
    assert_eq!(manager.stop_all().await, 0);
}

#[tokio::test]
async fn test_no_encoder_survives_stop_all() {
    let (manager, _launcher) = manager_with("exec sleep 30");

    let mut pids = Vec::new();
    for _ in 0..3 {
        let started = assert_ok!(manager.start(&good_credentials(), StreamConfig::default()).await);
        pids.push(started.pid);
    }
    assert!(pids.iter().all(|pid| process_exists(*pid)));

    assert_eq!(manager.stop_all().await, 3);

    for pid in pids {
        assert!(!process_exists(pid), "encoder {} still running after stop_all", pid);
    }
}

#[tokio::test]
async fn test_stubborn_encoder_is_killed_within_bound() {
    let launcher = ScriptLauncher::new("trap '' TERM; while true; do sleep 1; done");
    let manager = SessionManager::new(
        Arc::new(KnownClient("good-client")),
        launcher,
        ManagerSettings {
            grace_period: Duration::from_millis(500),
            ..ManagerSettings::default()
        },
    );
    let started = assert_ok!(manager.start(&good_credentials(), StreamConfig::default()).await);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let stopped = tokio::time::timeout(Duration::from_secs(3), manager.stop_all()).await;
    assert_eq!(stopped, Ok(1));
    assert!(!process_exists(started.pid));
}

#[tokio::test]
async fn test_self_exiting_encoder_is_pruned() {
    let (manager, _launcher) = manager_with("sleep 1");
    let started = assert_ok!(manager.start(&good_credentials(), StreamConfig::default()).await);

    assert_eq!(manager.status().await.active_streams, 1);
    tokio::time::sleep(Duration::from_millis(1600)).await;

    let report = manager.status().await;
    assert_eq!(report.active_streams, 0);
    assert!(report.streams.iter().all(|s| s.session_id != started.session_id));
    assert_eq!(manager.status().await.total_sessions, 0);
}

#[tokio::test]
async fn test_concurrent_starts_are_independent() {
    let (manager, launcher) = manager_with("sleep 30");

    let (creds_a, creds_b) = (good_credentials(), good_credentials());
    let (a, b) = tokio::join!(
        manager.start(&creds_a, StreamConfig::new(1280, 720, 30, 2500)),
        manager.start(&creds_b, StreamConfig::new(1920, 1080, 60, 6000)),
    );
    let a = assert_ok!(a);
    let b = assert_ok!(b);
    assert_ne!(a.session_id, b.session_id);
    assert_ne!(a.pid, b.pid);
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 2);

    let report = manager.status().await;
    assert_eq!(report.active_streams, 2);

    assert_eq!(manager.shutdown().await, 2);
}

#[tokio::test]
async fn test_observer_sees_start_and_stop() {
    let (manager, _launcher) = manager_with("sleep 30");
    let broadcaster = StatusBroadcaster::new(manager.clone(), Duration::from_millis(50));
    let mut subscription = broadcaster.subscribe().await;

    assert_ok!(manager.start(&good_credentials(), StreamConfig::default()).await);
    let saw_active = tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(StatusMessage::StatusUpdate(report)) = subscription.next().await {
            if report.active_streams == 1 {
                return true;
            }
        }
        false
    })
    .await;
    assert_eq!(saw_active, Ok(true));

    manager.stop_all().await;
    let saw_idle = tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(StatusMessage::StatusUpdate(report)) = subscription.next().await {
            if report.active_streams == 0 {
                return true;
            }
        }
        false
    })
    .await;
    assert_eq!(saw_idle, Ok(true));

    broadcaster.shutdown();
}
