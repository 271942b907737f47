use std::path::PathBuf;

use thiserror::Error;

/// Every way an interleaving job can fail. None of them are retried.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to probe {}: {diagnostic}", .path.display())]
    Probe { path: PathBuf, diagnostic: String },

    #[error(
        "failed to cut {length}s at {start}s from {} into {}: {diagnostic}",
        .input.display(),
        .output.display()
    )]
    Trim {
        input: PathBuf,
        start: f64,
        length: f64,
        output: PathBuf,
        diagnostic: String,
    },

    #[error("failed to concatenate into {}: {diagnostic}", .output.display())]
    Concat { output: PathBuf, diagnostic: String },

    #[error(
        "no chunks were created: {sources} input(s) are too short for a {target_duration}s target with {chunk_length}s chunks"
    )]
    InsufficientContent {
        sources: usize,
        chunk_length: f64,
        target_duration: f64,
    },

    #[error("cut task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
