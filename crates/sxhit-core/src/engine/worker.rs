use super::cancel::CancellationToken;
use super::config::FramePolicy;
use super::error::{EngineError, WorkerError};
use super::progress::{Progress, ProgressReporter};
use super::resolver::{ContainerLayout, ContainerSpan};
use super::transform::prepare_frame;
use crate::core::io::container::{ContainerSource, FrameContainer};
use crate::core::models::mask::Mask;
use crate::core::models::range::FrameRange;
use crate::core::scoring::config::ScoringConfig;
use crate::core::scoring::engine::{FrameScore, ScoringContext, ScoringEngine};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, trace, warn};

pub fn output_file_name(worker_id: usize) -> String {
    format!("sxhit_res_{}.txt", worker_id)
}

/// Everything one worker needs. Built once by the coordinator and never mutated.
#[derive(Debug, Clone)]
pub struct Job {
    pub worker_id: usize,
    pub range: Option<FrameRange>,
    pub layout: ContainerLayout,
    pub scoring: Arc<ScoringConfig>,
    pub mask: Option<Arc<Mask>>,
    pub cutoff: f64,
    pub frame_policy: FramePolicy,
    pub output_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug)]
pub enum WorkerStatus {
    Completed,
    Failed(WorkerError),
    Cancelled,
    /// No completion signal arrived before the supervisor deadline.
    Unresponsive,
}

#[derive(Debug)]
pub struct WorkerResult {
    pub worker_id: usize,
    pub range: Option<FrameRange>,
    pub hit_count: u64,
    pub frames_scored: u64,
    pub frames_skipped: u64,
    pub status: WorkerStatus,
}

impl WorkerResult {
    pub fn failed(worker_id: usize, range: Option<FrameRange>, error: WorkerError) -> Self {
        Self::empty(worker_id, range, WorkerStatus::Failed(error))
    }

    pub fn unresponsive(worker_id: usize, range: Option<FrameRange>) -> Self {
        Self::empty(worker_id, range, WorkerStatus::Unresponsive)
    }

    fn empty(worker_id: usize, range: Option<FrameRange>, status: WorkerStatus) -> Self {
        Self {
            worker_id,
            range,
            hit_count: 0,
            frames_scored: 0,
            frames_skipped: 0,
            status,
        }
    }

    /// Frames the worker got to, whether scored or skipped.
    pub fn frames_attempted(&self) -> u64 {
        self.frames_scored + self.frames_skipped
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.status, WorkerStatus::Completed)
    }

    /// Why the worker did not complete, or `None` if it did.
    pub fn failure_reason(&self) -> Option<String> {
        match &self.status {
            WorkerStatus::Completed => None,
            WorkerStatus::Failed(err) => Some(err.to_string()),
            WorkerStatus::Cancelled => Some("cancelled before finishing its range".to_string()),
            WorkerStatus::Unresponsive => {
                Some("did not report completion before the deadline".to_string())
            }
        }
    }
}

#[derive(Debug, Default)]
struct Tally {
    hits: u64,
    scored: u64,
    skipped: u64,
}

/// Runs one job to a terminal state.
///
/// The scoring context is created here, on the calling thread, and lives only as
/// long as this call. Containers are opened one span at a time and dropped before the
/// next is opened.
#[instrument(skip_all, name = "worker", fields(id = job.worker_id))]
pub fn run_worker<S, E>(
    job: &Job,
    source: &S,
    engine: &E,
    cancel: &CancellationToken,
    reporter: &ProgressReporter,
) -> WorkerResult
where
    S: ContainerSource,
    E: ScoringEngine,
{
    let mut worker = Worker::new(job);
    worker.transition(WorkerState::Running);

    let outcome = worker.execute(source, engine, cancel, reporter);
    let status = match outcome {
        Ok(()) => {
            worker.transition(WorkerState::Completed);
            info!(
                hits = worker.tally.hits,
                scored = worker.tally.scored,
                skipped = worker.tally.skipped,
                "Worker completed."
            );
            WorkerStatus::Completed
        }
        Err(EngineError::Cancelled) => {
            worker.transition(WorkerState::Cancelled);
            warn!(frame = ?worker.current_frame, "Worker stopped on cancellation.");
            WorkerStatus::Cancelled
        }
        Err(source) => {
            worker.transition(WorkerState::Failed);
            let error = WorkerError {
                worker_id: job.worker_id,
                frame: worker.current_frame,
                source,
            };
            warn!(error = %error, "Worker failed.");
            WorkerStatus::Failed(error)
        }
    };

    reporter.report(Progress::WorkerFinished {
        worker_id: job.worker_id,
        succeeded: matches!(status, WorkerStatus::Completed),
    });

    WorkerResult {
        worker_id: job.worker_id,
        range: job.range,
        hit_count: worker.tally.hits,
        frames_scored: worker.tally.scored,
        frames_skipped: worker.tally.skipped,
        status,
    }
}

struct Worker<'a> {
    job: &'a Job,
    state: WorkerState,
    tally: Tally,
    current_frame: Option<u64>,
}

impl<'a> Worker<'a> {
    fn new(job: &'a Job) -> Self {
        Self {
            job,
            state: WorkerState::Idle,
            tally: Tally::default(),
            current_frame: None,
        }
    }

    fn transition(&mut self, next: WorkerState) {
        debug_assert!(matches!(
            (self.state, next),
            (WorkerState::Idle, WorkerState::Running)
                | (
                    WorkerState::Running,
                    WorkerState::Completed | WorkerState::Failed | WorkerState::Cancelled
                )
        ));
        debug!(from = ?self.state, to = ?next, "Worker state change.");
        self.state = next;
    }

    fn execute<S, E>(
        &mut self,
        source: &S,
        engine: &E,
        cancel: &CancellationToken,
        reporter: &ProgressReporter,
    ) -> Result<(), EngineError>
    where
        S: ContainerSource,
        E: ScoringEngine,
    {
        let job = self.job;
        let path = job.output_path.as_path();
        let file = File::create(path).map_err(|e| output_error(path, e))?;
        let mut out = BufWriter::new(file);

        if let Some(range) = job.range {
            debug!(range = %range, "Initializing scoring context.");
            let mut context = engine
                .initialize(&job.scoring)
                .map_err(EngineError::EngineInit)?;

            for span in job.layout.spans(range) {
                self.process_span(span, source, &mut context, &mut out, cancel, reporter)?;
            }
            self.current_frame = None;
        } else {
            debug!("Empty assignment; nothing to score.");
        }

        out.flush().map_err(|e| output_error(path, e))
    }

    fn process_span<S, C>(
        &mut self,
        span: ContainerSpan,
        source: &S,
        context: &mut C,
        out: &mut impl Write,
        cancel: &CancellationToken,
        reporter: &ProgressReporter,
    ) -> Result<(), EngineError>
    where
        S: ContainerSource,
        C: ScoringContext,
    {
        let layout = self.job.layout;
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        self.current_frame = Some(layout.global_index(span.container_index, span.local_start));
        let mut container = source.open(span.container_index)?;
        debug!(
            container = span.container_index,
            frames = span.len(),
            "Opened container."
        );

        for offset in span.offsets() {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            let frame_index = layout.global_index(span.container_index, offset);
            self.current_frame = Some(frame_index);

            let line = self.score_frame(&mut container, context, offset as usize, frame_index)?;
            writeln!(out, "{}", line).map_err(|e| output_error(&self.job.output_path, e))?;
            reporter.report(Progress::TaskIncrement);
        }

        drop(container);
        debug!(container = span.container_index, "Released container.");
        Ok(())
    }

    fn score_frame<F, C>(
        &mut self,
        container: &mut F,
        context: &mut C,
        offset: usize,
        frame_index: u64,
    ) -> Result<String, EngineError>
    where
        F: FrameContainer,
        C: ScoringContext,
    {
        let raw = match container.read_frame(offset) {
            Ok(raw) => raw,
            Err(e) => return self.skip_or_abort(frame_index, EngineError::ContainerAccess(e)),
        };
        let frame = prepare_frame(raw, self.job.scoring.pixel_max, self.job.mask.as_deref())?;

        match context.process(&frame) {
            Ok(score) => {
                trace!(
                    frame = frame_index,
                    spots = score.spots.len(),
                    score3 = score.score3,
                    "Frame scored."
                );
                self.tally.scored += 1;
                if score.is_hit(self.job.cutoff) {
                    self.tally.hits += 1;
                }
                Ok(format_record(frame_index, &score))
            }
            Err(source) => self.skip_or_abort(
                frame_index,
                EngineError::Scoring {
                    frame: frame_index,
                    source,
                },
            ),
        }
    }

    fn skip_or_abort(
        &mut self,
        frame_index: u64,
        error: EngineError,
    ) -> Result<String, EngineError> {
        match self.job.frame_policy {
            FramePolicy::Skip => {
                warn!(frame = frame_index, error = %error, "Skipping frame.");
                self.tally.skipped += 1;
                Ok(format_skipped(frame_index, &error))
            }
            FramePolicy::Abort => Err(error),
        }
    }
}

fn output_error(path: &Path, source: std::io::Error) -> EngineError {
    EngineError::Output {
        path: path.to_path_buf(),
        source,
    }
}

pub fn format_record(frame_index: u64, score: &FrameScore) -> String {
    format!(
        "img {} {} {:.6} {:.6}",
        frame_index, score.spot_count, score.score3, score.resolution_limit
    )
}

fn format_skipped(frame_index: u64, error: &EngineError) -> String {
    let reason = error.to_string().replace(['\n', '\r'], " ");
    format!("img {} skipped {}", frame_index, reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::frame::Shape;
    use crate::test_utils::{MemorySource, ScriptedEngine, test_scoring_config};
    use tempfile::{TempDir, tempdir};

    fn job(dir: &TempDir, worker_id: usize, range: Option<(u64, u64)>, capacity: u64) -> Job {
        Job {
            worker_id,
            range: range.map(|(s, e)| FrameRange::new(s, e).unwrap()),
            layout: ContainerLayout::new(capacity).unwrap(),
            scoring: Arc::new(test_scoring_config()),
            mask: None,
            cutoff: 5.0,
            frame_policy: FramePolicy::Skip,
            output_path: dir.path().join(output_file_name(worker_id)),
        }
    }

    fn lines(job: &Job) -> Vec<String> {
        std::fs::read_to_string(&job.output_path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn run(job: &Job, source: &MemorySource, engine: &ScriptedEngine) -> WorkerResult {
        run_worker(
            job,
            source,
            engine,
            &CancellationToken::new(),
            &ProgressReporter::new(),
        )
    }

    #[test]
    fn record_format_matches_the_result_file_layout() {
        let score = FrameScore {
            spot_count: 42,
            score3: 12.5,
            resolution_limit: 2.25,
            spots: Vec::new(),
        };
        assert_eq!(format_record(7, &score), "img 7 42 12.500000 2.250000");
    }

    #[test]
    fn worker_scores_its_range_across_containers_in_order() {
        let dir = tempdir().unwrap();
        let job = job(&dir, 0, Some((3, 8)), 4);
        let source = MemorySource::sequential(4, 10);
        let engine = ScriptedEngine::with_hits(&[4, 7]);

        let result = run(&job, &source, &engine);

        assert!(result.is_completed());
        assert_eq!(result.hit_count, 2);
        assert_eq!(result.frames_scored, 6);
        assert_eq!(result.frames_skipped, 0);
        assert_eq!(source.opened(), vec![0, 1]);
        assert_eq!(engine.initializations(), 1);

        let indices: Vec<u64> = lines(&job)
            .iter()
            .map(|l| l.split_whitespace().nth(1).unwrap().parse().unwrap())
            .collect();
        assert_eq!(indices, vec![3, 4, 5, 6, 7, 8]);
        assert_eq!(lines(&job)[1], "img 4 10 10.000000 2.500000");
    }

    #[test]
    fn empty_assignment_completes_with_an_empty_file() {
        let dir = tempdir().unwrap();
        let job = job(&dir, 3, None, 4);
        let source = MemorySource::sequential(4, 10);
        let engine = ScriptedEngine::default();

        let result = run(&job, &source, &engine);

        assert!(result.is_completed());
        assert_eq!(result.frames_attempted(), 0);
        assert!(lines(&job).is_empty());
        assert_eq!(engine.initializations(), 0);
    }

    #[test]
    fn scoring_failures_are_skipped_and_recorded_by_default() {
        let dir = tempdir().unwrap();
        let job = job(&dir, 0, Some((1, 4)), 10);
        let source = MemorySource::sequential(10, 4);
        let engine = ScriptedEngine::with_hits(&[1]).failing_on(&[2]);

        let result = run(&job, &source, &engine);

        assert!(result.is_completed());
        assert_eq!(result.frames_scored, 3);
        assert_eq!(result.frames_skipped, 1);
        assert_eq!(result.frames_attempted(), 4);
        assert_eq!(result.hit_count, 1);
        assert!(lines(&job)[1].starts_with("img 2 skipped "));
    }

    #[test]
    fn abort_policy_fails_the_worker_at_the_bad_frame() {
        let dir = tempdir().unwrap();
        let mut job = job(&dir, 1, Some((1, 4)), 10);
        job.frame_policy = FramePolicy::Abort;
        let source = MemorySource::sequential(10, 4);
        let engine = ScriptedEngine::default().failing_on(&[3]);

        let result = run(&job, &source, &engine);

        match result.status {
            WorkerStatus::Failed(err) => {
                assert_eq!(err.worker_id, 1);
                assert_eq!(err.frame, Some(3));
                assert!(matches!(err.source, EngineError::Scoring { frame: 3, .. }));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn missing_container_fails_the_worker() {
        let dir = tempdir().unwrap();
        let job = job(&dir, 2, Some((5, 8)), 4);
        let source = MemorySource::sequential(4, 12).without_container(1);
        let engine = ScriptedEngine::default();

        let result = run(&job, &source, &engine);

        match &result.status {
            WorkerStatus::Failed(err) => {
                assert_eq!(err.frame, Some(5));
                assert!(matches!(err.source, EngineError::ContainerAccess(_)));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(result.failure_reason().unwrap().contains("missing"));
    }

    #[test]
    fn short_container_frames_are_skipped() {
        let dir = tempdir().unwrap();
        let job = job(&dir, 0, Some((1, 6)), 4);
        // Container 1 only holds frame 5.
        let source = MemorySource::sequential(4, 5);
        let engine = ScriptedEngine::default();

        let result = run(&job, &source, &engine);

        assert!(result.is_completed());
        assert_eq!(result.frames_scored, 5);
        assert_eq!(result.frames_skipped, 1);
        assert!(lines(&job)[5].starts_with("img 6 skipped "));
    }

    #[test]
    fn engine_initialization_failure_fails_the_worker() {
        let dir = tempdir().unwrap();
        let job = job(&dir, 0, Some((1, 2)), 4);
        let source = MemorySource::sequential(4, 2);
        let engine = ScriptedEngine::default().refusing_init();

        let result = run(&job, &source, &engine);

        assert!(matches!(
            result.status,
            WorkerStatus::Failed(WorkerError {
                source: EngineError::EngineInit(_),
                ..
            })
        ));
    }

    #[test]
    fn mask_of_another_shape_fails_the_worker() {
        let dir = tempdir().unwrap();
        let mut job = job(&dir, 0, Some((1, 2)), 4);
        job.mask = Some(Arc::new(Mask::empty(Shape::new(3, 3))));
        let source = MemorySource::sequential(4, 2);
        let engine = ScriptedEngine::default();

        let result = run(&job, &source, &engine);

        assert!(matches!(
            result.status,
            WorkerStatus::Failed(WorkerError {
                frame: Some(1),
                source: EngineError::ShapeMismatch { .. },
                ..
            })
        ));
    }

    #[test]
    fn tripped_token_cancels_before_the_first_frame() {
        let dir = tempdir().unwrap();
        let job = job(&dir, 0, Some((1, 4)), 4);
        let source = MemorySource::sequential(4, 4);
        let engine = ScriptedEngine::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = run_worker(&job, &source, &engine, &cancel, &ProgressReporter::new());

        assert!(matches!(result.status, WorkerStatus::Cancelled));
        assert_eq!(result.frames_attempted(), 0);
        assert!(source.opened().is_empty());
    }
}
