//! Lifecycle counters
//!
//! Cheap atomic counters describing what the manager has done since startup.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    /// Sessions that reached `active`
    sessions_started: AtomicU64,

    /// Sessions removed by an explicit stop or shutdown
    sessions_stopped: AtomicU64,

    /// Sessions removed because their encoder exited on its own
    sessions_pruned: AtomicU64,

    /// Starts rejected after passing credential checks
    start_failures: AtomicU64,

    /// Starts or validations rejected for bad credentials
    credential_rejections: AtomicU64,

    /// Termination attempts that returned an error
    termination_errors: AtomicU64,

    /// Startup timestamp (unix seconds)
    startup_time: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            startup_time: AtomicU64::new(unix_now()),
            ..Default::default()
        }
    }

    pub fn session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_stopped(&self) {
        self.sessions_stopped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_pruned(&self) {
        self.sessions_pruned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn start_failed(&self) {
        self.start_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn credentials_rejected(&self) {
        self.credential_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn termination_failed(&self) {
        self.termination_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            sessions_stopped: self.sessions_stopped.load(Ordering::Relaxed),
            sessions_pruned: self.sessions_pruned.load(Ordering::Relaxed),
            start_failures: self.start_failures.load(Ordering::Relaxed),
            credential_rejections: self.credential_rejections.load(Ordering::Relaxed),
            termination_errors: self.termination_errors.load(Ordering::Relaxed),
            uptime_secs: unix_now().saturating_sub(self.startup_time.load(Ordering::Relaxed)),
        }
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub sessions_started: u64,
    pub sessions_stopped: u64,
    pub sessions_pruned: u64,
    pub start_failures: u64,
    pub credential_rejections: u64,
    pub termination_errors: u64,
    pub uptime_secs: u64,
}
