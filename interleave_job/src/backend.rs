use std::{
    future::Future,
    path::{Path, PathBuf},
};

use vi_ffmpeg::Toolchain;

use crate::Error;

/// The three media operations the pipeline needs. Implementations must copy
/// streams rather than re-encode them.
pub trait MediaBackend: Send + Sync + 'static {
    /// Playable duration of `path` in seconds. Fails with [`Error::Probe`].
    fn probe(&self, path: &Path) -> impl Future<Output = Result<f64, Error>> + Send;

    /// Writes `length` seconds of `input` starting at `start` to `output`,
    /// replacing it if present, with timestamps starting at zero. Fails with
    /// [`Error::Trim`].
    fn trim(
        &self,
        input: &Path,
        start: f64,
        length: f64,
        output: &Path,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Joins `segments` into `output` in the given order. Fails with
    /// [`Error::Concat`].
    fn concat(
        &self,
        segments: &[PathBuf],
        output: &Path,
    ) -> impl Future<Output = Result<(), Error>> + Send;
}

/// [`MediaBackend`] backed by the ffmpeg and ffprobe binaries.
#[derive(Debug, Clone, Default)]
pub struct FfmpegBackend {
    toolchain: Toolchain,
}

impl FfmpegBackend {
    pub const fn new(toolchain: Toolchain) -> Self {
        Self { toolchain }
    }

    pub const fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }
}

impl MediaBackend for FfmpegBackend {
    async fn probe(&self, path: &Path) -> Result<f64, Error> {
        vi_ffmpeg::ffprobe::duration(&self.toolchain, path)
            .await
            .map_err(|e| Error::Probe {
                path: path.to_path_buf(),
                diagnostic: e.to_string(),
            })
    }

    async fn trim(
        &self,
        input: &Path,
        start: f64,
        length: f64,
        output: &Path,
    ) -> Result<(), Error> {
        vi_ffmpeg::trim::trim(&self.toolchain, input, start, length, output)
            .await
            .map_err(|e| Error::Trim {
                input: input.to_path_buf(),
                start,
                length,
                output: output.to_path_buf(),
                diagnostic: e.to_string(),
            })
    }

    async fn concat(
        &self,
        segments: &[PathBuf],
        output: &Path,
    ) -> Result<(), Error> {
        vi_ffmpeg::concat::concat(&self.toolchain, segments, output)
            .await
            .map_err(|e| Error::Concat {
                output: output.to_path_buf(),
                diagnostic: e.to_string(),
            })
    }
}
