use super::error::{EngineError, WorkerFailure};
use super::worker::WorkerResult;
use std::collections::BTreeMap;

/// Gathers exactly one result per worker.
#[derive(Debug, Default)]
pub struct ResultCollector {
    results: BTreeMap<usize, WorkerResult>,
}

impl ResultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a worker's result. A second result for the same worker is a logic error.
    pub fn record(&mut self, result: WorkerResult) -> Result<(), EngineError> {
        if self.results.contains_key(&result.worker_id) {
            return Err(EngineError::Internal(format!(
                "worker {} reported a result twice",
                result.worker_id
            )));
        }
        self.results.insert(result.worker_id, result);
        Ok(())
    }

    pub fn contains(&self, worker_id: usize) -> bool {
        self.results.contains_key(&worker_id)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn finish(self) -> RunReport {
        RunReport::from_results(self.results.into_values().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Complete,
    PartialFailure,
}

/// The outcome of a run. Totals only count workers that completed.
#[derive(Debug)]
pub struct RunReport {
    results: Vec<WorkerResult>,
    hit_count: u64,
    frames_attempted: u64,
    frames_skipped: u64,
}

impl RunReport {
    fn from_results(mut results: Vec<WorkerResult>) -> Self {
        results.sort_by_key(|r| r.worker_id);
        let completed = || results.iter().filter(|r| r.is_completed());
        let hit_count = completed().map(|r| r.hit_count).sum();
        let frames_attempted = completed().map(WorkerResult::frames_attempted).sum();
        let frames_skipped = completed().map(|r| r.frames_skipped).sum();
        Self {
            results,
            hit_count,
            frames_attempted,
            frames_skipped,
        }
    }

    pub fn results(&self) -> &[WorkerResult] {
        &self.results
    }

    pub fn hit_count(&self) -> u64 {
        self.hit_count
    }

    pub fn frames_attempted(&self) -> u64 {
        self.frames_attempted
    }

    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped
    }

    /// Percentage of attempted frames that were hits; 0 when nothing was attempted.
    pub fn hit_rate(&self) -> f64 {
        if self.frames_attempted == 0 {
            0.0
        } else {
            self.hit_count as f64 / self.frames_attempted as f64 * 100.0
        }
    }

    pub fn status(&self) -> RunStatus {
        if self.results.iter().all(WorkerResult::is_completed) {
            RunStatus::Complete
        } else {
            RunStatus::PartialFailure
        }
    }

    pub fn failures(&self) -> Vec<WorkerFailure> {
        self.results
            .iter()
            .filter_map(|r| {
                r.failure_reason().map(|reason| WorkerFailure {
                    worker_id: r.worker_id,
                    reason,
                })
            })
            .collect()
    }

    pub fn ensure_complete(&self) -> Result<(), EngineError> {
        match self.status() {
            RunStatus::Complete => Ok(()),
            RunStatus::PartialFailure => Err(EngineError::PartialFailure {
                failed: self.failures(),
                total: self.results.len(),
            }),
        }
    }

    pub fn summary_line(&self) -> String {
        format!(
            "Found bragg spots in {} out of {} images and the hit rate is {:.1} %",
            self.hit_count,
            self.frames_attempted,
            self.hit_rate()
        )
    }

    /// One line per worker that did not complete, for printing under the summary.
    pub fn failure_lines(&self) -> Vec<String> {
        self.failures()
            .into_iter()
            .map(|f| format!("worker {}: {}", f.worker_id, f.reason))
            .collect()
    }
}
