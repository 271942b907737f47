//! Interleaves several videos into one by cutting fixed-length chunks from
//! each input in round-robin order and joining them with stream copy.
//!
//! The flow is probe → schedule → cut → concatenate → clean up, driven by
//! [`Pipeline::process`].

pub mod backend;
pub mod config;
pub mod error;
pub mod observer;
pub mod pipeline;
pub mod schedule;

pub use backend::{FfmpegBackend, MediaBackend};
pub use config::JobConfig;
pub use error::Error;
pub use observer::{PipelineObserver, TracingObserver};
pub use pipeline::{Pipeline, ProcessReport};
pub use schedule::{ChunkDescriptor, Exhaustion, Schedule, VideoSource};
