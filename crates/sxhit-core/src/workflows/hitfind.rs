use crate::core::io::container::ContainerSource;
use crate::core::models::frame::Shape;
use crate::core::models::mask::Mask;
use crate::core::models::range::FrameRange;
use crate::core::scoring::config::ScoringConfig;
use crate::core::scoring::engine::ScoringEngine;
use crate::engine::aggregate::{ResultCollector, RunReport};
use crate::engine::cancel::CancellationToken;
use crate::engine::config::RunConfig;
use crate::engine::error::{EngineError, WorkerError};
use crate::engine::partition::partition;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::resolver::ContainerLayout;
use crate::engine::worker::{self, Job, WorkerResult};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

pub const SCORING_CONFIG_FILE: &str = "sxhit.dat";

/// Loaded inputs shared read-only by every worker of a run.
pub struct RunInputs<S, E> {
    pub source: Arc<S>,
    pub engine: Arc<E>,
    pub scoring: ScoringConfig,
    pub mask: Option<Mask>,
}

/// Writes the scoring configuration artifact into `output_dir`.
pub fn write_scoring_config(
    output_dir: &Path,
    scoring: &ScoringConfig,
) -> Result<PathBuf, EngineError> {
    let path = output_dir.join(SCORING_CONFIG_FILE);
    scoring
        .write_to_path(&path)
        .map_err(|source| EngineError::Output {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

/// Builds one immutable job per worker from the static partition of the range.
pub fn plan_jobs(
    config: &RunConfig,
    layout: ContainerLayout,
    scoring: &Arc<ScoringConfig>,
    mask: Option<&Arc<Mask>>,
) -> Vec<Job> {
    partition(config.range, config.nproc)
        .into_iter()
        .map(|assignment| Job {
            worker_id: assignment.worker_id,
            range: assignment.range,
            layout,
            scoring: Arc::clone(scoring),
            mask: mask.cloned(),
            cutoff: config.cutoff,
            frame_policy: config.frame_policy,
            output_path: config
                .output_dir
                .join(worker::output_file_name(assignment.worker_id)),
        })
        .collect()
}

/// Runs a complete hit-finding pass and returns its report.
///
/// Worker failures do not make this return `Err`; they show up in the report's status.
/// `Err` is reserved for problems that stop the run before or outside the workers.
#[instrument(
    skip_all,
    name = "hitfind_workflow",
    fields(range = %config.range, nproc = config.nproc)
)]
pub fn run<S, E>(
    inputs: RunInputs<S, E>,
    config: &RunConfig,
    reporter: Arc<ProgressReporter<'static>>,
    cancel: &CancellationToken,
) -> Result<RunReport, EngineError>
where
    S: ContainerSource + 'static,
    E: ScoringEngine + 'static,
{
    reporter.report(Progress::PhaseStart {
        name: "Preparation",
    });
    let layout = ContainerLayout::new(inputs.source.capacity())?;

    std::fs::create_dir_all(&config.output_dir).map_err(|source| EngineError::Output {
        path: config.output_dir.clone(),
        source,
    })?;
    let config_path = write_scoring_config(&config.output_dir, &inputs.scoring)?;
    info!(path = %config_path.display(), "Scoring configuration written.");

    if let Some(mask) = &inputs.mask {
        let detector = Shape::new(inputs.scoring.nx as usize, inputs.scoring.ny as usize);
        if mask.shape() != detector {
            warn!(
                mask = %mask.shape(),
                detector = %detector,
                "Mask shape differs from the detector; workers will reject it."
            );
        }
    }

    let scoring = Arc::new(inputs.scoring);
    let mask = inputs.mask.map(Arc::new);
    let jobs = plan_jobs(config, layout, &scoring, mask.as_ref());
    info!(
        workers = jobs.len(),
        capacity = layout.capacity(),
        frames = config.range.len(),
        "Planned worker assignments."
    );
    for job in &jobs {
        debug!(worker = job.worker_id, range = ?job.range, "Assignment.");
    }
    reporter.report(Progress::PhaseFinish);

    reporter.report(Progress::PhaseStart {
        name: "Hit finding",
    });
    reporter.report(Progress::TaskStart {
        total_steps: config.range.len(),
    });

    let (tx, rx) = crossbeam_channel::unbounded();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.len())
        .thread_name(|i| format!("sxhit-worker-{}", i))
        .panic_handler(|_| error!("A worker panicked; its result is recorded as failed."))
        .build()
        .map_err(|e| EngineError::Internal(format!("Failed to build worker pool: {}", e)))?;

    let outstanding: Vec<(usize, Option<FrameRange>)> =
        jobs.iter().map(|j| (j.worker_id, j.range)).collect();
    for job in jobs {
        let source = Arc::clone(&inputs.source);
        let engine = Arc::clone(&inputs.engine);
        let reporter = Arc::clone(&reporter);
        let cancel = cancel.clone();
        let signal = CompletionSignal::new(tx.clone(), job.worker_id, job.range);
        pool.spawn(move || {
            let result = worker::run_worker(&job, &*source, &*engine, &cancel, &reporter);
            signal.send(result);
        });
    }
    drop(tx);

    let collector = supervise(&rx, &outstanding, config, cancel)?;
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    let report = collector.finish();
    info!(
        hits = report.hit_count(),
        attempted = report.frames_attempted(),
        skipped = report.frames_skipped(),
        status = ?report.status(),
        "{}",
        report.summary_line()
    );
    Ok(report)
}

/// Collects one completion per worker, up to the optional deadline.
fn supervise(
    rx: &Receiver<WorkerResult>,
    outstanding: &[(usize, Option<FrameRange>)],
    config: &RunConfig,
    cancel: &CancellationToken,
) -> Result<ResultCollector, EngineError> {
    let mut collector = ResultCollector::new();
    let deadline = config.supervisor_timeout.map(|t| Instant::now() + t);

    while collector.len() < outstanding.len() {
        let received = match deadline {
            Some(deadline) => rx.recv_deadline(deadline),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(result) => {
                debug!(worker = result.worker_id, "Worker reported completion.");
                collector.record(result)?;
            }
            Err(RecvTimeoutError::Timeout) => {
                let stragglers: Vec<usize> = outstanding
                    .iter()
                    .filter(|(id, _)| !collector.contains(*id))
                    .map(|(id, _)| *id)
                    .collect();
                warn!(workers = ?stragglers, "Supervisor deadline passed; cancelling the run.");
                cancel.cancel();
                for &(id, range) in outstanding {
                    if !collector.contains(id) {
                        collector.record(WorkerResult::unresponsive(id, range))?;
                    }
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(EngineError::Internal(format!(
                    "completion channel closed with {} of {} worker(s) unaccounted for",
                    outstanding.len() - collector.len(),
                    outstanding.len()
                )));
            }
        }
    }
    Ok(collector)
}

/// Delivers exactly one result per worker, even if the worker unwinds.
struct CompletionSignal {
    tx: Option<Sender<WorkerResult>>,
    worker_id: usize,
    range: Option<FrameRange>,
}

impl CompletionSignal {
    fn new(tx: Sender<WorkerResult>, worker_id: usize, range: Option<FrameRange>) -> Self {
        Self {
            tx: Some(tx),
            worker_id,
            range,
        }
    }

    fn send(mut self, result: WorkerResult) {
        if let Some(tx) = self.tx.take() {
            // The coordinator may have stopped listening after its deadline.
            let _ = tx.send(result);
        }
    }
}

impl Drop for CompletionSignal {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let error = WorkerError {
                worker_id: self.worker_id,
                frame: None,
                source: EngineError::Internal("worker exited without reporting".to_string()),
            };
            let _ = tx.send(WorkerResult::failed(self.worker_id, self.range, error));
        }
    }
}
