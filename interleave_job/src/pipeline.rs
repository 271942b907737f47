use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::task::JoinSet;

use crate::{
    backend::{FfmpegBackend, MediaBackend},
    config::JobConfig,
    error::Error,
    observer::{PipelineObserver, TracingObserver},
    schedule::{ChunkDescriptor, Schedule, VideoSource},
};

/// Outcome of a successful [`Pipeline::process`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessReport {
    pub output: PathBuf,
    pub chunks: usize,
    pub skipped: usize,
    /// Seconds of video written, which can be less than the target when
    /// inputs ran out.
    pub duration: f64,
}

/// Probes, schedules, cuts and concatenates.
///
/// A pipeline holds no per-run state, so one instance can serve any number
/// of concurrent [`Pipeline::process`] calls as long as each gets its own
/// work directory.
#[derive(Debug)]
pub struct Pipeline<B, O = TracingObserver> {
    backend: Arc<B>,
    observer: O,
    chunk_length: f64,
    segment_extension: String,
    cut_concurrency: usize,
}

impl Pipeline<FfmpegBackend, TracingObserver> {
    pub fn from_config(config: &JobConfig) -> Self {
        Self::new(FfmpegBackend::new(config.toolchain()), TracingObserver, config)
    }
}

impl<B: MediaBackend, O: PipelineObserver> Pipeline<B, O> {
    pub fn new(backend: B, observer: O, config: &JobConfig) -> Self {
        Self {
            backend: Arc::new(backend),
            observer,
            chunk_length: config.chunk_length,
            segment_extension: config.segment_extension.clone(),
            cut_concurrency: config.cut_concurrency.max(1),
        }
    }

    pub const fn chunk_length(&self) -> f64 {
        self.chunk_length
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub const fn observer(&self) -> &O {
        &self.observer
    }

    /// Interleaves `sources` into `output`, using `work_dir` for the
    /// intermediate segments.
    ///
    /// On success the segments have been removed (best effort) and only
    /// `output` remains. On failure nothing is cleaned up; the caller owns
    /// `work_dir` and is expected to discard it.
    ///
    /// # Errors
    /// - [`Error::Probe`] if any source cannot be probed; nothing is cut.
    /// - [`Error::InsufficientContent`] if no source can supply a chunk.
    /// - [`Error::Trim`] / [`Error::Concat`] from the backend.
    pub async fn process(
        &self,
        sources: &[PathBuf],
        target_duration: f64,
        output: &Path,
        work_dir: &Path,
    ) -> Result<ProcessReport, Error> {
        self.observer.started(sources, target_duration);

        let sources = self.probe_all(sources).await?;

        let schedule = Schedule::plan(
            &sources,
            self.chunk_length,
            target_duration,
            work_dir,
            &self.segment_extension,
        );

        for skip in schedule.exhausted() {
            self.observer.source_exhausted(skip);
        }
        self.observer.scheduled(&schedule);

        if schedule.is_empty() {
            return Err(Error::InsufficientContent {
                sources: sources.len(),
                chunk_length: self.chunk_length,
                target_duration,
            });
        }

        let segments = self.cut_all(&sources, &schedule).await?;

        self.backend.concat(&segments, output).await?;
        self.observer.concatenated(output, segments.len());

        for segment in &segments {
            if let Err(e) = tokio::fs::remove_file(segment).await {
                self.observer.cleanup_failed(segment, &e);
            }
        }

        Ok(ProcessReport {
            output: output.to_path_buf(),
            chunks: schedule.len(),
            skipped: schedule.exhausted().len(),
            duration: schedule.output_duration(),
        })
    }

    /// Probes every source in order, stopping at the first failure.
    async fn probe_all(&self, paths: &[PathBuf]) -> Result<Vec<VideoSource>, Error> {
        let mut sources = Vec::with_capacity(paths.len());

        for (index, path) in paths.iter().enumerate() {
            let duration = self.backend.probe(path).await?;
            let source = VideoSource::new(path.clone(), duration);
            self.observer.source_probed(index, &source);
            sources.push(source);
        }

        Ok(sources)
    }

    /// Cuts every scheduled chunk and returns the segment paths in schedule
    /// order, however the cuts were interleaved.
    async fn cut_all(
        &self,
        sources: &[VideoSource],
        schedule: &Schedule,
    ) -> Result<Vec<PathBuf>, Error> {
        if self.cut_concurrency == 1 {
            let mut segments = Vec::with_capacity(schedule.len());

            for chunk in schedule.chunks() {
                let input = &sources[chunk.source_index].path;
                self.backend
                    .trim(input, chunk.start, chunk.length, &chunk.output_path)
                    .await?;
                self.observer.chunk_cut(chunk);
                segments.push(chunk.output_path.clone());
            }

            return Ok(segments);
        }

        let mut pending = schedule.chunks().iter().cloned().enumerate();
        let mut realized: Vec<Option<PathBuf>> = vec![None; schedule.len()];
        let mut set = JoinSet::new();

        loop {
            while set.len() < self.cut_concurrency {
                let Some((position, chunk)) = pending.next() else {
                    break;
                };
                let backend = Arc::clone(&self.backend);
                let input = sources[chunk.source_index].path.clone();

                set.spawn(async move {
                    backend
                        .trim(&input, chunk.start, chunk.length, &chunk.output_path)
                        .await?;
                    Ok::<(usize, ChunkDescriptor), Error>((position, chunk))
                });
            }

            // dropping the set on error aborts the cuts still running
            let Some(joined) = set.join_next().await else {
                break;
            };
            let (position, chunk) = joined??;
            self.observer.chunk_cut(&chunk);
            realized[position] = Some(chunk.output_path);
        }

        Ok(realized.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        path::{Path, PathBuf},
        sync::Mutex,
    };

    use pretty_assertions::assert_eq;

    use super::{Pipeline, ProcessReport};
    use crate::{
        backend::MediaBackend,
        config::JobConfig,
        error::Error,
        observer::PipelineObserver,
        schedule::{ChunkDescriptor, Exhaustion},
    };

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Probe(PathBuf),
        Trim(PathBuf, f64, PathBuf),
        Concat(Vec<PathBuf>, PathBuf),
    }

    /// Writes a small text file per segment; the output lists the segment
    /// contents in order so concatenation order is observable.
    #[derive(Default)]
    struct FakeBackend {
        durations: HashMap<PathBuf, f64>,
        fail_trim_at: Option<usize>,
        fail_concat: bool,
        calls: Mutex<Vec<Call>>,
    }

    impl FakeBackend {
        fn with_durations(paths: &[PathBuf], durations: &[f64]) -> Self {
            Self {
                durations: paths.iter().cloned().zip(durations.iter().copied()).collect(),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn trims(&self) -> usize {
            self.calls()
                .iter()
                .filter(|call| matches!(call, Call::Trim(..)))
                .count()
        }
    }

    impl MediaBackend for FakeBackend {
        async fn probe(&self, path: &Path) -> Result<f64, Error> {
            self.calls.lock().unwrap().push(Call::Probe(path.to_path_buf()));
            self.durations
                .get(path)
                .copied()
                .ok_or_else(|| Error::Probe {
                    path: path.to_path_buf(),
                    diagnostic: "Invalid data found when processing input".to_string(),
                })
        }

        async fn trim(
            &self,
            input: &Path,
            start: f64,
            length: f64,
            output: &Path,
        ) -> Result<(), Error> {
            let position = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(Call::Trim(input.to_path_buf(), start, output.to_path_buf()));
                calls.iter().filter(|call| matches!(call, Call::Trim(..))).count() - 1
            };

            if self.fail_trim_at == Some(position) {
                return Err(Error::Trim {
                    input: input.to_path_buf(),
                    start,
                    length,
                    output: output.to_path_buf(),
                    diagnostic: "Error while seeking".to_string(),
                });
            }

            let name = input.file_name().unwrap().to_string_lossy();
            tokio::fs::write(output, format!("{name}@{start}+{length}"))
                .await
                .unwrap();
            Ok(())
        }

        async fn concat(
            &self,
            segments: &[PathBuf],
            output: &Path,
        ) -> Result<(), Error> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Concat(segments.to_vec(), output.to_path_buf()));

            if self.fail_concat {
                return Err(Error::Concat {
                    output: output.to_path_buf(),
                    diagnostic: "Non-monotonous DTS".to_string(),
                });
            }

            let mut joined = Vec::new();
            for segment in segments {
                joined.push(tokio::fs::read_to_string(segment).await.unwrap());
            }
            tokio::fs::write(output, joined.join("\n")).await.unwrap();
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        started: Mutex<Vec<(usize, f64)>>,
        exhausted: Mutex<Vec<Exhaustion>>,
        cut: Mutex<Vec<ChunkDescriptor>>,
        cleanup_failures: Mutex<Vec<PathBuf>>,
    }

    impl PipelineObserver for RecordingObserver {
        fn started(&self, sources: &[PathBuf], target_duration: f64) {
            self.started
                .lock()
                .unwrap()
                .push((sources.len(), target_duration));
        }

        fn source_exhausted(&self, skip: &Exhaustion) {
            self.exhausted.lock().unwrap().push(skip.clone());
        }

        fn chunk_cut(&self, chunk: &ChunkDescriptor) {
            self.cut.lock().unwrap().push(chunk.clone());
        }

        fn cleanup_failed(&self, path: &Path, _error: &std::io::Error) {
            self.cleanup_failures.lock().unwrap().push(path.to_path_buf());
        }
    }

    struct Session {
        dir: tempfile::TempDir,
        sources: Vec<PathBuf>,
    }

    impl Session {
        fn new(count: usize) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let sources = (0..count)
                .map(|i| dir.path().join(format!("video_{i}.mp4")))
                .collect();
            Self { dir, sources }
        }

        fn work_dir(&self) -> &Path {
            self.dir.path()
        }

        fn output(&self) -> PathBuf {
            self.dir.path().join("output.mp4")
        }

        fn chunk_files(&self) -> Vec<String> {
            let mut names: Vec<String> = std::fs::read_dir(self.dir.path())
                .unwrap()
                .filter_map(Result::ok)
                .map(|entry| entry.file_name().to_string_lossy().to_string())
                .filter(|name| name.starts_with("chunk_"))
                .collect();
            names.sort();
            names
        }
    }

    fn pipeline(
        backend: FakeBackend,
        cut_concurrency: usize,
    ) -> Pipeline<FakeBackend, RecordingObserver> {
        let config = JobConfig {
            cut_concurrency,
            ..JobConfig::default()
        };
        Pipeline::new(backend, RecordingObserver::default(), &config)
    }

    #[tokio::test]
    async fn test_three_sources_two_rounds() {
        let session = Session::new(3);
        let pipeline = pipeline(
            FakeBackend::with_durations(&session.sources, &[20.0, 15.0, 12.0]),
            1,
        );

        let report = pipeline
            .process(&session.sources, 36.0, &session.output(), session.work_dir())
            .await
            .unwrap();

        assert_eq!(
            report,
            ProcessReport {
                output: session.output(),
                chunks: 6,
                skipped: 0,
                duration: 36.0,
            }
        );
        assert_eq!(
            std::fs::read_to_string(session.output()).unwrap(),
            [
                "video_0.mp4@0+6",
                "video_1.mp4@0+6",
                "video_2.mp4@0+6",
                "video_0.mp4@6+6",
                "video_1.mp4@6+6",
                "video_2.mp4@6+6",
            ]
            .join("\n")
        );
        // intermediates are gone, only the output is left
        assert!(session.chunk_files().is_empty());
    }

    #[tokio::test]
    async fn test_probe_happens_before_any_cut() {
        let session = Session::new(2);
        let pipeline = pipeline(
            FakeBackend::with_durations(&session.sources, &[12.0, 12.0]),
            1,
        );

        pipeline
            .process(&session.sources, 24.0, &session.output(), session.work_dir())
            .await
            .unwrap();

        let calls = pipeline.backend().calls();
        assert_eq!(calls[0], Call::Probe(session.sources[0].clone()));
        assert_eq!(calls[1], Call::Probe(session.sources[1].clone()));
        assert!(calls[2..].iter().all(|call| !matches!(call, Call::Probe(_))));
        assert!(matches!(calls.last(), Some(Call::Concat(segments, _)) if segments.len() == 4));
    }

    #[tokio::test]
    async fn test_short_source_shortens_output() {
        let session = Session::new(3);
        let pipeline = pipeline(
            FakeBackend::with_durations(&session.sources, &[5.0, 20.0, 20.0]),
            1,
        );

        let report = pipeline
            .process(&session.sources, 18.0, &session.output(), session.work_dir())
            .await
            .unwrap();

        assert_eq!(report.chunks, 2);
        assert_eq!(report.skipped, 1);
        assert!((report.duration - 12.0).abs() < f64::EPSILON);
        assert_eq!(
            std::fs::read_to_string(session.output()).unwrap(),
            "video_1.mp4@0+6\nvideo_2.mp4@0+6"
        );
        assert_eq!(
            pipeline.observer().exhausted.lock().unwrap().clone(),
            vec![Exhaustion {
                round: 0,
                source_index: 0,
                cursor: 0.0,
            }]
        );
    }

    #[tokio::test]
    async fn test_all_sources_too_short() {
        let session = Session::new(3);
        let pipeline = pipeline(
            FakeBackend::with_durations(&session.sources, &[5.0, 5.0, 5.0]),
            1,
        );

        let result = pipeline
            .process(&session.sources, 36.0, &session.output(), session.work_dir())
            .await;

        assert!(matches!(result, Err(Error::InsufficientContent { sources: 3, .. })));
        assert!(!session.output().exists());
        assert_eq!(pipeline.backend().trims(), 0);
        assert_eq!(
            pipeline.observer().started.lock().unwrap().clone(),
            vec![(3, 36.0)]
        );
        // both rounds report all three sources as exhausted
        assert_eq!(
            pipeline
                .observer()
                .exhausted
                .lock()
                .unwrap()
                .iter()
                .map(|skip| (skip.round, skip.source_index))
                .collect::<Vec<_>>(),
            vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]
        );
    }

    #[tokio::test]
    async fn test_target_below_one_round() {
        let session = Session::new(2);
        let pipeline = pipeline(
            FakeBackend::with_durations(&session.sources, &[60.0, 60.0]),
            1,
        );

        let result = pipeline
            .process(&session.sources, 11.0, &session.output(), session.work_dir())
            .await;

        assert!(matches!(result, Err(Error::InsufficientContent { .. })));
    }

    #[tokio::test]
    async fn test_no_sources() {
        let session = Session::new(0);
        let pipeline = pipeline(FakeBackend::default(), 1);

        let result = pipeline
            .process(&[], 36.0, &session.output(), session.work_dir())
            .await;

        assert!(matches!(
            result,
            Err(Error::InsufficientContent { sources: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_probe_failure_stops_everything() {
        let session = Session::new(3);
        // the last source is unknown to the backend
        let pipeline = pipeline(
            FakeBackend::with_durations(&session.sources[..2], &[20.0, 20.0]),
            1,
        );

        let result = pipeline
            .process(&session.sources, 36.0, &session.output(), session.work_dir())
            .await;

        match result {
            Err(Error::Probe { path, .. }) => assert_eq!(path, session.sources[2]),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(pipeline.backend().trims(), 0);
    }

    #[tokio::test]
    async fn test_trim_failure_leaves_cleanup_to_caller() {
        let session = Session::new(2);
        let backend = FakeBackend {
            fail_trim_at: Some(2),
            ..FakeBackend::with_durations(&session.sources, &[30.0, 30.0])
        };
        let pipeline = pipeline(backend, 1);

        let result = pipeline
            .process(&session.sources, 24.0, &session.output(), session.work_dir())
            .await;

        assert!(matches!(result, Err(Error::Trim { .. })));
        assert_eq!(pipeline.backend().trims(), 3);
        assert_eq!(
            session.chunk_files(),
            vec!["chunk_r0_v0.mp4".to_string(), "chunk_r0_v1.mp4".to_string()]
        );
        assert!(!session.output().exists());
    }

    #[tokio::test]
    async fn test_concat_failure_keeps_segments() {
        let session = Session::new(2);
        let backend = FakeBackend {
            fail_concat: true,
            ..FakeBackend::with_durations(&session.sources, &[12.0, 12.0])
        };
        let pipeline = pipeline(backend, 1);

        let result = pipeline
            .process(&session.sources, 12.0, &session.output(), session.work_dir())
            .await;

        assert!(matches!(result, Err(Error::Concat { .. })));
        assert_eq!(session.chunk_files().len(), 2);
    }

    #[tokio::test]
    async fn test_parallel_cuts_keep_schedule_order() {
        let session = Session::new(3);
        let pipeline = pipeline(
            FakeBackend::with_durations(&session.sources, &[30.0, 13.0, 30.0]),
            4,
        );

        let report = pipeline
            .process(&session.sources, 72.0, &session.output(), session.work_dir())
            .await
            .unwrap();

        assert_eq!(report.chunks, 10);

        let concat_order = pipeline
            .backend()
            .calls()
            .into_iter()
            .find_map(|call| match call {
                Call::Concat(segments, _) => Some(segments),
                _ => None,
            })
            .unwrap();
        let names: Vec<String> = concat_order
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(
            names,
            vec![
                "chunk_r0_v0.mp4",
                "chunk_r0_v1.mp4",
                "chunk_r0_v2.mp4",
                "chunk_r1_v0.mp4",
                "chunk_r1_v1.mp4",
                "chunk_r1_v2.mp4",
                "chunk_r2_v0.mp4",
                "chunk_r2_v2.mp4",
                "chunk_r3_v0.mp4",
                "chunk_r3_v2.mp4",
            ]
        );
        assert_eq!(pipeline.observer().cut.lock().unwrap().len(), 10);
        assert!(session.chunk_files().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_failure_is_not_fatal() {
        struct VanishingBackend(FakeBackend);

        impl MediaBackend for VanishingBackend {
            async fn probe(&self, path: &Path) -> Result<f64, Error> {
                self.0.probe(path).await
            }

            async fn trim(
                &self,
                input: &Path,
                start: f64,
                length: f64,
                output: &Path,
            ) -> Result<(), Error> {
                self.0.trim(input, start, length, output).await
            }

            async fn concat(
                &self,
                segments: &[PathBuf],
                output: &Path,
            ) -> Result<(), Error> {
                self.0.concat(segments, output).await?;
                // something else removed the first segment already
                tokio::fs::remove_file(&segments[0]).await.unwrap();
                Ok(())
            }
        }

        let session = Session::new(2);
        let config = JobConfig::default();
        let pipeline = Pipeline::new(
            VanishingBackend(FakeBackend::with_durations(
                &session.sources,
                &[12.0, 12.0],
            )),
            RecordingObserver::default(),
            &config,
        );

        let report = pipeline
            .process(&session.sources, 12.0, &session.output(), session.work_dir())
            .await
            .unwrap();

        assert_eq!(report.chunks, 2);
        assert!(session.output().exists());
        assert_eq!(
            pipeline.observer().cleanup_failures.lock().unwrap().clone(),
            vec![session.work_dir().join("chunk_r0_v0.mp4")]
        );
    }
}
