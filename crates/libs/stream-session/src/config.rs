//! Encoding configuration and manager settings

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::LaunchError;

/// Encoding parameters requested for one stream
///
/// Immutable once a session is created. Field names follow the public
/// wire format (`frameRate`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamConfig {
    /// Output width in pixels
    #[serde(default = "default_width")]
    pub width: u32,

    /// Output height in pixels
    #[serde(default = "default_height")]
    pub height: u32,

    /// Frames per second
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,

    /// Video bitrate in kbps
    #[serde(default = "default_bitrate")]
    pub bitrate: u32,
}

fn default_width() -> u32 {
    1920
}

fn default_height() -> u32 {
    1080
}

fn default_frame_rate() -> u32 {
    30
}

fn default_bitrate() -> u32 {
    2500
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            frame_rate: default_frame_rate(),
            bitrate: default_bitrate(),
        }
    }
}

impl StreamConfig {
    pub fn new(width: u32, height: u32, frame_rate: u32, bitrate: u32) -> Self {
        Self {
            width,
            height,
            frame_rate,
            bitrate,
        }
    }

    /// Reject zero-valued fields before anything is spawned
    pub fn validate(&self) -> Result<(), LaunchError> {
        let fields = [
            ("width", self.width),
            ("height", self.height),
            ("frameRate", self.frame_rate),
            ("bitrate", self.bitrate),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(LaunchError::InvalidInput(format!(
                    "{} must be a positive integer",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Keyframe interval in frames (two seconds of video)
    pub fn gop_size(&self) -> u32 {
        self.frame_rate.saturating_mul(2)
    }
}

/// Tunables for the session lifecycle manager
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    /// Base ingest URL; the stream key is appended as the last path segment
    pub ingest_url: String,

    /// Wait after SIGTERM before escalating to a forced kill
    pub grace_period: Duration,

    /// Upper bound on one credential verification round-trip
    pub verify_timeout: Duration,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            ingest_url: "rtmp://live.twitch.tv/live".to_string(),
            grace_period: Duration::from_secs(5),
            verify_timeout: Duration::from_secs(10),
        }
    }
}

impl ManagerSettings {
    /// Full destination URL for a stream key
    pub fn destination_for(&self, stream_key: &str) -> String {
        format!("{}/{}", self.ingest_url.trim_end_matches('/'), stream_key)
    }
}
