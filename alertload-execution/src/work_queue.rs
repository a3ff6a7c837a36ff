//! Bounded-concurrency work queue
//!
//! Items are dealt round-robin onto `min(concurrency, len)` lanes. Each lane
//! runs its items one after another; lanes run concurrently on the calling
//! task. At most `concurrency` units of work are ever in flight.

use futures::future::join_all;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// What a lane does after one of its items fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Log the failure and keep going
    #[default]
    Continue,
    /// Log the failure and skip the rest of that lane
    AbortLane,
    /// Stop every lane from starting new items
    FailFast,
}

/// Outcome of one item
#[derive(Debug)]
pub enum WorkOutcome<T, E> {
    Completed(T),
    Failed(E),
    /// Never started because of the error policy
    Skipped,
}

/// Result for the item at `index` of the input
#[derive(Debug)]
pub struct WorkResult<T, E> {
    pub index: usize,
    pub outcome: WorkOutcome<T, E>,
}

impl<T, E> WorkResult<T, E> {
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, WorkOutcome::Completed(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, WorkOutcome::Failed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, WorkOutcome::Skipped)
    }
}

/// Outcome counts of a finished queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkSummary {
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl WorkSummary {
    pub fn of<T, E>(results: &[WorkResult<T, E>]) -> Self {
        results.iter().fold(Self::default(), |mut summary, result| {
            match result.outcome {
                WorkOutcome::Completed(_) => summary.completed += 1,
                WorkOutcome::Failed(_) => summary.failed += 1,
                WorkOutcome::Skipped => summary.skipped += 1,
            }
            summary
        })
    }

    pub fn attempted(&self) -> usize {
        self.completed + self.failed
    }
}

#[derive(Debug, Clone)]
pub struct WorkQueue {
    concurrency: usize,
    error_policy: ErrorPolicy,
    label: String,
}

impl WorkQueue {
    /// A queue running at most `concurrency` items at once; zero is treated as one
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            error_policy: ErrorPolicy::default(),
            label: "work queue".to_string(),
        }
    }

    pub fn with_error_policy(mut self, error_policy: ErrorPolicy) -> Self {
        self.error_policy = error_policy;
        self
    }

    /// Name used in failure log lines
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run `unit_of_work(item, index)` for every item.
    ///
    /// Returns one result per input item, in input order.
    pub async fn run<I, T, E, F, Fut>(&self, items: Vec<I>, unit_of_work: F) -> Vec<WorkResult<T, E>>
    where
        F: Fn(I, usize) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let total = items.len();
        if total == 0 {
            return Vec::new();
        }

        let lane_count = self.concurrency.min(total);
        let mut lanes: Vec<Vec<(usize, I)>> = (0..lane_count).map(|_| Vec::new()).collect();
        for (index, item) in items.into_iter().enumerate() {
            lanes[index % lane_count].push((index, item));
        }

        debug!("{}: {} item(s) on {} lane(s)", self.label, total, lane_count);

        let halted = AtomicBool::new(false);
        let lane_runs = lanes
            .into_iter()
            .map(|lane| self.run_lane(lane, &unit_of_work, &halted));

        let mut results: Vec<WorkResult<T, E>> =
            join_all(lane_runs).await.into_iter().flatten().collect();
        results.sort_by_key(|result| result.index);
        results
    }

    async fn run_lane<I, T, E, F, Fut>(
        &self,
        lane: Vec<(usize, I)>,
        unit_of_work: &F,
        halted: &AtomicBool,
    ) -> Vec<WorkResult<T, E>>
    where
        F: Fn(I, usize) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut results = Vec::with_capacity(lane.len());
        let mut lane_aborted = false;

        for (index, item) in lane {
            if lane_aborted || halted.load(Ordering::SeqCst) {
                results.push(WorkResult {
                    index,
                    outcome: WorkOutcome::Skipped,
                });
                continue;
            }

            let outcome = match unit_of_work(item, index).await {
                Ok(value) => WorkOutcome::Completed(value),
                Err(error) => {
                    warn!("{}: item {} failed: {}", self.label, index, error);
                    match self.error_policy {
                        ErrorPolicy::Continue => {}
                        ErrorPolicy::AbortLane => lane_aborted = true,
                        ErrorPolicy::FailFast => halted.store(true, Ordering::SeqCst),
                    }
                    WorkOutcome::Failed(error)
                }
            };
            results.push(WorkResult { index, outcome });
        }

        results
    }
}
