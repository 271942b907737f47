use std::path::{Path, PathBuf};

use crate::schedule::{ChunkDescriptor, Exhaustion, Schedule, VideoSource};

/// Receives progress events from a [`crate::Pipeline`].
///
/// All methods default to doing nothing.
pub trait PipelineObserver: Send + Sync {
    fn started(&self, _sources: &[PathBuf], _target_duration: f64) {}

    fn source_probed(&self, _index: usize, _source: &VideoSource) {}

    fn scheduled(&self, _schedule: &Schedule) {}

    fn source_exhausted(&self, _skip: &Exhaustion) {}

    fn chunk_cut(&self, _chunk: &ChunkDescriptor) {}

    fn concatenated(&self, _output: &Path, _segments: usize) {}

    fn cleanup_failed(&self, _path: &Path, _error: &std::io::Error) {}
}

/// Reports pipeline progress as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn started(&self, sources: &[PathBuf], target_duration: f64) {
        tracing::info!(
            "Processing {} videos for {}s",
            sources.len(),
            target_duration
        );
    }

    fn source_probed(&self, index: usize, source: &VideoSource) {
        tracing::info!(
            "Video {} ({}) is {}s long",
            index,
            source.path.display(),
            source.duration
        );
    }

    fn scheduled(&self, schedule: &Schedule) {
        tracing::info!(
            "Will create {} rounds, {} chunks of {}s ({}s of output)",
            schedule.rounds(),
            schedule.len(),
            schedule.chunk_length(),
            schedule.output_duration()
        );
    }

    fn source_exhausted(&self, skip: &Exhaustion) {
        tracing::warn!(
            "Video {} exhausted at round {} (cursor {}s)",
            skip.source_index,
            skip.round,
            skip.cursor
        );
    }

    fn chunk_cut(&self, chunk: &ChunkDescriptor) {
        tracing::debug!(
            round = chunk.round,
            source = chunk.source_index,
            start = chunk.start,
            "Cut {}",
            chunk.output_path.display()
        );
    }

    fn concatenated(&self, output: &Path, segments: usize) {
        tracing::info!("Concatenated {} chunks to {}", segments, output.display());
    }

    fn cleanup_failed(&self, path: &Path, error: &std::io::Error) {
        tracing::warn!("Could not remove chunk {}: {}", path.display(), error);
    }
}
