//! Twitch Stream Gateway
//!
//! HTTP/WebSocket front end that validates Twitch credentials, starts FFmpeg
//! test-pattern streams to Twitch ingest, and reports on them.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        twitchcast-gateway                         │
//! ├───────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────┐                                             │
//! │  │  HTTP API Server │ ← POST /api/stream/start, /api/stream/stop  │
//! │  │  (axum)          │ ← GET  /api/stream/status, /api/ws/stream   │
//! │  └────────┬─────────┘                                             │
//! │           │                                                       │
//! │           ▼                                                       │
//! │  ┌──────────────────┐   ┌──────────────────┐   ┌───────────────┐  │
//! │  │  SessionManager  │──▶│  TwitchClient    │   │ FfmpegLauncher│  │
//! │  │  (session core)  │   │  (reqwest)       │   │ (subprocess)  │  │
//! │  └──────────────────┘   └──────────────────┘   └───────────────┘  │
//! └───────────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod twitch;
