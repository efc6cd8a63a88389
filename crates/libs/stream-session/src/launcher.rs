//! Encoder process launching and control
//!
//! An [`EncoderProcess`] owns exactly one OS process. Captured output is
//! drained on background tasks so an unread pipe can never stall the encoder.

use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::config::StreamConfig;
use crate::error::LaunchError;

/// Longest captured output line kept before it is flushed to the log
const MAX_LINE_BYTES: usize = 4096;

/// How a termination request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationOutcome {
    /// Process had already exited before we signalled it
    AlreadyExited,
    /// Process exited within the grace period after SIGTERM
    Graceful,
    /// Process ignored SIGTERM and was killed
    Forced,
}

/// Handle to a spawned encoder
#[derive(Debug)]
pub struct EncoderProcess {
    pid: u32,
    child: Child,
    drains: Vec<JoinHandle<()>>,
}

impl EncoderProcess {
    /// Take ownership of a freshly spawned child
    ///
    /// Any piped stdout/stderr is handed to a drain task. Must be called from
    /// within a tokio runtime.
    pub fn from_child(mut child: Child) -> Result<Self, LaunchError> {
        let pid = child.id().ok_or(LaunchError::MissingPid)?;

        let mut drains = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            drains.push(drain_output(stdout, pid, "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            drains.push(drain_output(stderr, pid, "stderr"));
        }

        Ok(Self { pid, child, drains })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Non-blocking liveness poll; reaps the process if it has exited
    pub fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Ask the process to exit (SIGTERM on unix)
    pub fn signal_terminate(&mut self) -> io::Result<()> {
        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            match kill(Pid::from_raw(self.pid as i32), Signal::SIGTERM) {
                Ok(()) | Err(Errno::ESRCH) => Ok(()),
                Err(e) => Err(io::Error::from(e)),
            }
        }

        #[cfg(not(unix))]
        {
            // No SIGTERM equivalent
            self.child.start_kill()
        }
    }

    /// SIGTERM, wait up to `grace_period`, then SIGKILL
    ///
    /// The grace period is a hard bound: a process that ignores SIGTERM is
    /// always killed once it elapses.
    pub async fn terminate(&mut self, grace_period: Duration) -> io::Result<TerminationOutcome> {
        if self.child.try_wait()?.is_some() {
            return Ok(TerminationOutcome::AlreadyExited);
        }

        self.signal_terminate()?;

        match tokio::time::timeout(grace_period, self.child.wait()).await {
            Ok(Ok(_)) => Ok(TerminationOutcome::Graceful),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::warn!(
                    pid = self.pid,
                    grace_ms = grace_period.as_millis() as u64,
                    "Encoder did not terminate gracefully, forcing kill"
                );
                self.child.kill().await?;
                Ok(TerminationOutcome::Forced)
            }
        }
    }
}

impl Drop for EncoderProcess {
    fn drop(&mut self) {
        if matches!(self.child.try_wait(), Ok(None)) {
            tracing::warn!(pid = self.pid, "Encoder handle dropped while running, killing");
            let _ = self.child.start_kill();
        }
        for drain in &self.drains {
            drain.abort();
        }
    }
}

/// Forward a captured pipe to the log until EOF
///
/// Splits on both `\n` and `\r` since encoders redraw progress lines with a
/// bare carriage return.
fn drain_output<R>(mut reader: R, pid: u32, stream: &'static str) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        let mut line: Vec<u8> = Vec::with_capacity(256);

        loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            for &byte in &buf[..n] {
                if byte == b'\n' || byte == b'\r' || line.len() >= MAX_LINE_BYTES {
                    if !line.is_empty() {
                        tracing::debug!(pid, stream, "{}", String::from_utf8_lossy(&line));
                        line.clear();
                    }
                    if byte == b'\n' || byte == b'\r' {
                        continue;
                    }
                }
                line.push(byte);
            }
        }

        if !line.is_empty() {
            tracing::debug!(pid, stream, "{}", String::from_utf8_lossy(&line));
        }
    })
}

/// Spawns encoder processes for a destination
pub trait EncoderLauncher: Send + Sync {
    fn launch(
        &self,
        destination: &str,
        config: &StreamConfig,
    ) -> Result<EncoderProcess, LaunchError>;
}

/// Launcher that runs FFmpeg with a synthetic test pattern and tone
#[derive(Debug, Clone)]
pub struct FfmpegLauncher {
    binary: PathBuf,
    capture_output: bool,
}

impl Default for FfmpegLauncher {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegLauncher {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            capture_output: true,
        }
    }

    /// Capture stdout/stderr into the debug log instead of discarding them
    pub fn with_capture_output(mut self, capture: bool) -> Self {
        self.capture_output = capture;
        self
    }

    /// Argument list for one stream
    pub fn build_args(destination: &str, config: &StreamConfig) -> Vec<String> {
        let video_source = format!(
            "testsrc=size={}x{}:rate={}",
            config.width, config.height, config.frame_rate
        );
        let bitrate = format!("{}k", config.bitrate);
        let bufsize = format!("{}k", config.bitrate.saturating_mul(2));
        let gop = config.gop_size().to_string();

        [
            "-nostdin",
            "-f",
            "lavfi",
            "-i",
            video_source.as_str(),
            "-f",
            "lavfi",
            "-i",
            "sine=frequency=1000:sample_rate=48000",
            "-c:v",
            "libx264",
            "-preset",
            "ultrafast",
            "-tune",
            "zerolatency",
            "-b:v",
            bitrate.as_str(),
            "-maxrate",
            bitrate.as_str(),
            "-bufsize",
            bufsize.as_str(),
            "-pix_fmt",
            "yuv420p",
            "-g",
            gop.as_str(),
            "-c:a",
            "aac",
            "-b:a",
            "128k",
            "-ar",
            "48000",
            "-f",
            "flv",
            destination,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    /// Run `<binary> -version` and return the first output line
    pub async fn check_version(&self, timeout: Duration) -> Result<String, LaunchError> {
        let output = Command::new(&self.binary)
            .arg("-version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(timeout, output)
            .await
            .map_err(|_| {
                LaunchError::Spawn(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "encoder version check timed out",
                ))
            })?
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(LaunchError::Spawn(io::Error::new(
                io::ErrorKind::Other,
                format!("encoder version check exited with {}", output.status),
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or_default().to_string())
    }

    fn spawn_error(&self, e: io::Error) -> LaunchError {
        if e.kind() == io::ErrorKind::NotFound {
            LaunchError::EncoderNotFound {
                binary: self.binary.display().to_string(),
                source: e,
            }
        } else {
            LaunchError::Spawn(e)
        }
    }
}

impl EncoderLauncher for FfmpegLauncher {
    fn launch(
        &self,
        destination: &str,
        config: &StreamConfig,
    ) -> Result<EncoderProcess, LaunchError> {
        if destination.trim().is_empty() {
            return Err(LaunchError::InvalidInput(
                "destination URL must not be empty".to_string(),
            ));
        }
        config.validate()?;

        let output = || {
            if self.capture_output {
                Stdio::piped()
            } else {
                Stdio::null()
            }
        };

        let mut command = Command::new(&self.binary);
        command
            .args(Self::build_args(destination, config))
            .stdin(Stdio::null())
            .stdout(output())
            .stderr(output())
            .kill_on_drop(true);

        // Keep terminal signals (Ctrl+C) away from the encoder; shutdown
        // terminates it explicitly
        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn().map_err(|e| self.spawn_error(e))?;
        let process = EncoderProcess::from_child(child)?;

        tracing::info!(
            pid = process.pid(),
            destination = %redact_destination(destination),
            width = config.width,
            height = config.height,
            frame_rate = config.frame_rate,
            bitrate_kbps = config.bitrate,
            "Encoder started"
        );

        Ok(process)
    }
}

/// Destination URL with its final path segment (the stream key) masked
pub fn redact_destination(destination: &str) -> String {
    match destination.rsplit_once('/') {
        Some((base, key)) if !key.is_empty() => format!("{}/***", base),
        _ => "***".to_string(),
    }
}
