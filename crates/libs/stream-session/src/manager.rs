//! Session lifecycle manager
//!
//! Orchestrates start / stop / status against the [`SessionStore`] and the
//! encoder launcher, and owns the termination escalation policy
//! (SIGTERM, bounded grace period, SIGKILL).
//!
//! Liveness is pull-based: status reads poll every encoder and prune the
//! records whose process has exited, so a status query doubles as garbage
//! collection for dead sessions.

use futures::future::join_all;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::{ManagerSettings, StreamConfig};
use crate::credentials::{CredentialVerifier, Credentials, StreamKeyResolver, UnconfiguredResolver};
use crate::error::SessionError;
use crate::launcher::{redact_destination, EncoderLauncher, TerminationOutcome};
use crate::metrics::Metrics;
use crate::session::{SessionId, SessionRecord, SessionStatus, SessionView};
use crate::store::SessionStore;

/// Result of a successful start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartedSession {
    pub session_id: SessionId,
    pub pid: u32,
}

/// One live stream as reported by a status query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamSummary {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub config: StreamConfig,
}

impl From<SessionView> for StreamSummary {
    fn from(view: SessionView) -> Self {
        Self {
            session_id: view.session_id,
            status: view.status,
            config: view.config,
        }
    }
}

/// Aggregate status snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    /// Sessions whose encoder is running right now
    pub active_streams: usize,
    pub streams: Vec<StreamSummary>,
    /// Records seen by this query, including any pruned during it
    pub total_sessions: usize,
}

pub struct SessionManager {
    store: SessionStore,
    verifier: Arc<dyn CredentialVerifier>,
    resolver: Arc<dyn StreamKeyResolver>,
    launcher: Arc<dyn EncoderLauncher>,
    settings: ManagerSettings,
    metrics: Arc<Metrics>,
    closed: AtomicBool,
}

impl SessionManager {
    /// Create a manager without automatic stream key resolution
    pub fn new(
        verifier: Arc<dyn CredentialVerifier>,
        launcher: Arc<dyn EncoderLauncher>,
        settings: ManagerSettings,
    ) -> Self {
        Self {
            store: SessionStore::new(),
            verifier,
            resolver: Arc::new(UnconfiguredResolver),
            launcher,
            settings,
            metrics: Arc::new(Metrics::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Resolve stream keys through the platform when callers omit one
    pub fn with_resolver(mut self, resolver: Arc<dyn StreamKeyResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Check credentials with the platform, failing closed
    ///
    /// Verifier errors and timeouts count as rejections.
    pub async fn verify(&self, credentials: &Credentials) -> Result<(), SessionError> {
        let outcome = tokio::time::timeout(
            self.settings.verify_timeout,
            self.verifier.verify(credentials),
        )
        .await;

        match outcome {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) => {
                tracing::info!(
                    client_id = %credentials.client_id,
                    "Credentials rejected by platform"
                );
                self.metrics.credentials_rejected();
                Err(SessionError::InvalidCredentials)
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    client_id = %credentials.client_id,
                    error = %e,
                    "Credential verification failed, treating as invalid"
                );
                self.metrics.credentials_rejected();
                Err(SessionError::InvalidCredentials)
            }
            Err(_) => {
                tracing::warn!(
                    client_id = %credentials.client_id,
                    timeout_ms = self.settings.verify_timeout.as_millis() as u64,
                    "Credential verification timed out, treating as invalid"
                );
                self.metrics.credentials_rejected();
                Err(SessionError::InvalidCredentials)
            }
        }
    }

    /// Validate, verify, resolve the stream key, spawn the encoder and register it
    pub async fn start(
        &self,
        credentials: &Credentials,
        config: StreamConfig,
    ) -> Result<StartedSession, SessionError> {
        if self.is_closed() {
            return Err(SessionError::ShuttingDown);
        }

        // Bad encoding parameters never cost a platform round-trip
        config.validate().map_err(|e| {
            self.metrics.start_failed();
            SessionError::from(e)
        })?;

        self.verify(credentials).await?;

        let stream_key = match credentials.explicit_stream_key() {
            Some(key) => key.clone(),
            None => self.resolver.resolve(credentials).await.map_err(|e| {
                tracing::warn!(
                    client_id = %credentials.client_id,
                    error = %e,
                    "Could not resolve stream key"
                );
                self.metrics.start_failed();
                SessionError::from(e)
            })?,
        };

        let destination = self.settings.destination_for(stream_key.expose());
        let process = self.launcher.launch(&destination, &config).map_err(|e| {
            tracing::error!(
                destination = %redact_destination(&destination),
                error = %e,
                "Failed to start encoder"
            );
            self.metrics.start_failed();
            SessionError::from(e)
        })?;

        let session_id = SessionId::generate();
        let pid = process.pid();
        let record = self
            .store
            .insert(SessionRecord::new(session_id, stream_key, config, process))
            .await?;

        // A shutdown that raced with this start has already drained the store
        if self.is_closed() {
            tracing::warn!(
                session_id = %session_id,
                "Start raced with shutdown, stopping encoder"
            );
            self.terminate_record(record).await;
            return Err(SessionError::ShuttingDown);
        }

        self.metrics.session_started();
        tracing::info!(session_id = %session_id, pid, "Stream started");

        Ok(StartedSession { session_id, pid })
    }

    /// Stop one session
    pub async fn stop(&self, id: &SessionId) -> Result<Option<TerminationOutcome>, SessionError> {
        let record = self.store.get(id).await?;
        Ok(self.terminate_record(record).await)
    }

    /// Stop every session, returning how many were attempted
    ///
    /// Sessions are terminated concurrently so the whole call is bounded by
    /// one grace period. A failure on one session is logged and does not
    /// affect the others.
    pub async fn stop_all(&self) -> usize {
        let records = self.store.snapshot().await;
        let count = records.len();

        join_all(records.into_iter().map(|record| self.terminate_record(record))).await;

        tracing::info!(count, "Stopped active streams");
        count
    }

    /// Poll every session, prune the dead ones, report the live ones
    pub async fn status(&self) -> StatusReport {
        let records = self.store.snapshot().await;
        let total_sessions = records.len();

        let mut live = Vec::with_capacity(records.len());
        for record in records {
            let view = record.view().await;
            if view.status.is_active() {
                live.push(view);
            } else {
                self.prune(&record, view.status).await;
            }
        }
        live.sort_by_key(|view| view.created_at);

        let streams: Vec<StreamSummary> = live.into_iter().map(StreamSummary::from).collect();
        StatusReport {
            active_streams: streams.len(),
            streams,
            total_sessions,
        }
    }

    /// Polled view of one session; a dead session is reported once and pruned
    pub async fn session(&self, id: &SessionId) -> Result<SessionView, SessionError> {
        let record = self.store.get(id).await?;
        let view = record.view().await;
        if !view.status.is_active() {
            self.prune(&record, view.status).await;
        }
        Ok(view)
    }

    /// Terminate everything and refuse further starts
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self) -> usize {
        if self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!("Session manager already shut down");
        }

        tracing::info!("Shutting down - stopping all active streams...");
        let stopped = self.stop_all().await;

        let leftover = self.store.drain().await;
        if !leftover.is_empty() {
            tracing::warn!(count = leftover.len(), "Dropping sessions registered during shutdown");
        }

        tracing::info!(stopped, "Session manager shutdown complete");
        stopped
    }

    async fn terminate_record(&self, record: Arc<SessionRecord>) -> Option<TerminationOutcome> {
        let session_id = record.id();
        let outcome = match record.terminate(self.settings.grace_period).await {
            Ok(outcome) => {
                tracing::info!(
                    session_id = %session_id,
                    pid = record.pid(),
                    ?outcome,
                    "Stopped stream"
                );
                Some(outcome)
            }
            Err(e) => {
                tracing::error!(
                    session_id = %session_id,
                    pid = record.pid(),
                    error = %e,
                    "Error stopping stream"
                );
                self.metrics.termination_failed();
                None
            }
        };

        if self.store.remove(&session_id).await.is_some() {
            self.metrics.session_stopped();
        }
        outcome
    }

    async fn prune(&self, record: &SessionRecord, status: SessionStatus) {
        // The stop in flight removes it and counts it as stopped
        if record.is_stopping() {
            return;
        }
        if self.store.remove(&record.id()).await.is_some() {
            tracing::info!(
                session_id = %record.id(),
                pid = record.pid(),
                %status,
                "Encoder exited, pruning session"
            );
            self.metrics.session_pruned();
        }
    }
}
