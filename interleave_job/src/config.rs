use std::{path::PathBuf, time::Duration};

use serde::Deserialize;
use vi_ffmpeg::Toolchain;

/// Job settings, read from the environment by [`vi_app::load_config`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Seconds per chunk.
    pub chunk_length: f64,
    /// Container extension of the intermediate segments.
    pub segment_extension: String,
    /// How many segments are cut at the same time. 1 cuts them one by one.
    pub cut_concurrency: usize,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    /// Deadline for every ffmpeg/ffprobe invocation.
    pub command_timeout_secs: Option<u64>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            chunk_length: 6.0,
            segment_extension: "mp4".to_string(),
            cut_concurrency: 1,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            command_timeout_secs: None,
        }
    }
}

impl JobConfig {
    pub fn toolchain(&self) -> Toolchain {
        Toolchain::new(&self.ffmpeg_path, &self.ffprobe_path)
            .with_timeout(self.command_timeout_secs.map(Duration::from_secs))
    }
}
