//! Stream session lifecycle core
//!
//! Owns the set of live streaming sessions. Each session is one encoder
//! process pushing a synthetic test pattern and tone to an RTMP ingest URL.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       twitchcast-session                         │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  ┌───────────────────┐  verify   ┌─────────────────────────────┐ │
//! │  │  SessionManager   │──────────▶│ CredentialVerifier (trait)  │ │
//! │  │  start / stop /   │  resolve  ├─────────────────────────────┤ │
//! │  │  status / shutdown│──────────▶│ StreamKeyResolver (trait)   │ │
//! │  └───┬──────────┬────┘           └─────────────────────────────┘ │
//! │      │ launch   │ insert / snapshot / remove                     │
//! │      ▼          ▼                                                │
//! │  ┌──────────┐ ┌──────────────┐        ┌───────────────────────┐  │
//! │  │ Encoder  │ │ SessionStore │◀─poll──│ StatusBroadcaster     │  │
//! │  │ Launcher │ │ (RwLock map) │        │ (per-observer feeds)  │  │
//! │  └──────────┘ └──────────────┘        └───────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Session status is always derived by polling the encoder, and dead
//! sessions are pruned by whichever status read notices them first.

pub mod broadcaster;
pub mod config;
pub mod credentials;
pub mod error;
pub mod launcher;
pub mod manager;
pub mod metrics;
pub mod session;
pub mod store;

pub use broadcaster::{StatusBroadcaster, StatusMessage, Subscription};
pub use config::{ManagerSettings, StreamConfig};
pub use credentials::{
    CredentialVerifier, Credentials, StreamKey, StreamKeyResolver, UnconfiguredResolver,
};
pub use error::{LaunchError, ResolveError, SessionError, VerifyError};
pub use launcher::{
    redact_destination, EncoderLauncher, EncoderProcess, FfmpegLauncher, TerminationOutcome,
};
pub use manager::{SessionManager, StartedSession, StatusReport, StreamSummary};
pub use metrics::{Metrics, MetricsSnapshot};
pub use session::{SessionId, SessionRecord, SessionStatus, SessionView};
pub use store::SessionStore;
