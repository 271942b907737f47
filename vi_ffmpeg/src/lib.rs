//! Async wrappers around the `ffmpeg` and `ffprobe` binaries.
//!
//! Everything here uses stream copy: segments are cut and joined without
//! re-encoding, so the output keeps the quality of the inputs.

use std::{
    path::PathBuf,
    process::ExitStatus,
    time::Duration,
};

use thiserror::Error;
use tokio::process::Command;

pub mod concat;
pub mod ffprobe;
pub mod trim;

mod runner;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("{program} timed out after {after:?}")]
    Timeout { program: String, after: Duration },
    #[error("failed to parse ffprobe output: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no decodable stream found in {0}")]
    NoStreams(String),
    #[error("no duration reported for {0}")]
    MissingDuration(String),
    #[error("nothing to concatenate")]
    NoSegments,
    #[error("manifest I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Locations of the ffmpeg binaries and the deadline applied to every
/// invocation.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub timeout: Option<Duration>,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            timeout: None,
        }
    }
}

impl Toolchain {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            timeout: None,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// An `ffmpeg` command with the banner suppressed and overwriting of the
    /// output enabled.
    pub(crate) fn ffmpeg_command(&self) -> Command {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.arg("-hide_banner").arg("-y");
        cmd
    }
}
