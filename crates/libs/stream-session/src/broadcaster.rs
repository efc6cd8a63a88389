//! Periodic status feed for observers
//!
//! Each subscriber gets its own feed task that sends a status report right
//! away and then once per interval. A feed ends when its subscription is
//! dropped, when delivery fails, or when the broadcaster shuts down; in all
//! three cases the observer is removed from the registry.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::manager::{SessionManager, StatusReport};

/// Message pushed to observers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StatusMessage {
    StatusUpdate(StatusReport),
}

#[derive(Debug, Clone, Copy)]
struct ObserverInfo {
    connected_at: DateTime<Utc>,
}

/// Receiving end of one observer's feed
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    rx: mpsc::Receiver<StatusMessage>,
    _cancel: oneshot::Sender<()>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next status message, or `None` once the feed has ended
    pub async fn next(&mut self) -> Option<StatusMessage> {
        self.rx.recv().await
    }
}

pub struct StatusBroadcaster {
    manager: Arc<SessionManager>,
    interval: Duration,
    observers: Arc<RwLock<HashMap<Uuid, ObserverInfo>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl StatusBroadcaster {
    pub fn new(manager: Arc<SessionManager>, interval: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            manager,
            interval,
            observers: Arc::new(RwLock::new(HashMap::new())),
            shutdown_tx,
        }
    }

    /// Register an observer and start its feed
    pub async fn subscribe(&self) -> Subscription {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(4);
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

        self.observers.write().await.insert(
            id,
            ObserverInfo {
                connected_at: Utc::now(),
            },
        );
        tracing::info!(observer_id = %id, "Status observer connected");

        let manager = self.manager.clone();
        let observers = self.observers.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = manager.status().await;
                        if tx.send(StatusMessage::StatusUpdate(report)).await.is_err() {
                            tracing::debug!(observer_id = %id, "Observer went away");
                            break;
                        }
                    }
                    _ = &mut cancel_rx => break,
                    _ = shutdown_rx.recv() => {
                        tracing::debug!(observer_id = %id, "Closing status feed for shutdown");
                        break;
                    }
                }
            }

            if let Some(info) = observers.write().await.remove(&id) {
                let connected_secs = (Utc::now() - info.connected_at).num_seconds();
                tracing::info!(observer_id = %id, connected_secs, "Status observer disconnected");
            }
        });

        Subscription {
            id,
            rx,
            _cancel: cancel_tx,
        }
    }

    /// Number of observers with a running feed
    pub async fn connection_count(&self) -> usize {
        self.observers.read().await.len()
    }

    /// End every feed
    pub fn shutdown(&self) {
        // No receivers simply means no feeds are running
        let _ = self.shutdown_tx.send(());
    }
}
