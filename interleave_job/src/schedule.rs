use std::path::{Path, PathBuf};

/// One input video and its probed duration.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoSource {
    pub path: PathBuf,
    /// Seconds.
    pub duration: f64,
}

impl VideoSource {
    pub fn new(path: impl Into<PathBuf>, duration: f64) -> Self {
        Self {
            path: path.into(),
            duration,
        }
    }
}

/// A chunk to cut: `length` seconds of source `source_index` starting at
/// `start`, written to `output_path`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkDescriptor {
    pub source_index: usize,
    pub round: usize,
    pub start: f64,
    pub length: f64,
    pub output_path: PathBuf,
}

/// A source that had less than one chunk left when its turn came up.
#[derive(Debug, Clone, PartialEq)]
pub struct Exhaustion {
    pub round: usize,
    pub source_index: usize,
    pub cursor: f64,
}

/// The interleaving plan. Chunks are ordered by round, then source index,
/// which is exactly the order they appear in the output.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    rounds: usize,
    chunk_length: f64,
    chunks: Vec<ChunkDescriptor>,
    exhausted: Vec<Exhaustion>,
    cursors: Vec<f64>,
}

/// Number of full round-robin passes that fit in `target_duration`:
/// `floor(target / (chunk_length * source_count))`.
///
/// Degenerate input (no sources, a non-positive chunk length, a negative or
/// non-finite target) yields zero rounds.
#[allow(clippy::cast_precision_loss)]
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
pub fn rounds(
    chunk_length: f64,
    source_count: usize,
    target_duration: f64,
) -> usize {
    if source_count == 0
        || !chunk_length.is_finite()
        || chunk_length <= 0.0
        || !target_duration.is_finite()
        || target_duration <= 0.0
    {
        return 0;
    }

    let rounds = (target_duration / (chunk_length * source_count as f64)).floor();

    if rounds.is_finite() && rounds >= 1.0 {
        rounds as usize
    } else {
        0
    }
}

/// File name of the segment for a given round and source.
pub fn chunk_file_name(round: usize, source_index: usize, extension: &str) -> String {
    format!("chunk_r{round}_v{source_index}.{extension}")
}

impl Schedule {
    /// Plans the chunks for `sources`.
    ///
    /// Each round visits every source in order. A source contributes a chunk
    /// when a whole `chunk_length` fits between its cursor and its duration;
    /// otherwise it is skipped for that round and the skip is recorded. The
    /// number of rounds is not reduced when sources run out, so the planned
    /// length can fall short of `target_duration`.
    ///
    /// Segment paths are placed in `work_dir` with the given extension.
    pub fn plan(
        sources: &[VideoSource],
        chunk_length: f64,
        target_duration: f64,
        work_dir: &Path,
        extension: &str,
    ) -> Self {
        let rounds = rounds(chunk_length, sources.len(), target_duration);

        let mut cursors = vec![0.0; sources.len()];
        let mut chunks = Vec::new();
        let mut exhausted = Vec::new();

        for round in 0..rounds {
            for (source_index, source) in sources.iter().enumerate() {
                let cursor = cursors[source_index];

                if cursor + chunk_length <= source.duration {
                    chunks.push(ChunkDescriptor {
                        source_index,
                        round,
                        start: cursor,
                        length: chunk_length,
                        output_path: work_dir.join(chunk_file_name(
                            round,
                            source_index,
                            extension,
                        )),
                    });
                    cursors[source_index] = cursor + chunk_length;
                } else {
                    exhausted.push(Exhaustion {
                        round,
                        source_index,
                        cursor,
                    });
                }
            }
        }

        Self {
            rounds,
            chunk_length,
            chunks,
            exhausted,
            cursors,
        }
    }

    /// Rounds requested by the target duration, including any that ended up
    /// empty.
    pub const fn rounds(&self) -> usize {
        self.rounds
    }

    pub const fn chunk_length(&self) -> f64 {
        self.chunk_length
    }

    pub fn chunks(&self) -> &[ChunkDescriptor] {
        &self.chunks
    }

    pub fn exhausted(&self) -> &[Exhaustion] {
        &self.exhausted
    }

    /// Final cursor of each source, indexed like the sources.
    pub fn cursors(&self) -> &[f64] {
        &self.cursors
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Seconds of video the schedule will produce.
    #[allow(clippy::cast_precision_loss)]
    pub fn output_duration(&self) -> f64 {
        self.chunks.len() as f64 * self.chunk_length
    }

    pub fn segment_paths(&self) -> Vec<PathBuf> {
        self.chunks
            .iter()
            .map(|chunk| chunk.output_path.clone())
            .collect()
    }
}
