//! Bounded worker pool with per-worker job budgets and fault isolation.
//!
//! Workers pull jobs from a shared queue one at a time and report each
//! terminal outcome over a bounded channel to the calling thread, which is
//! the only place counters and progress callbacks are touched. A worker
//! exits after `max_jobs_per_worker` jobs and is replaced while work
//! remains, which caps whatever per-job buffers a long-lived thread would
//! otherwise accumulate. A panicking job is caught and reported as a
//! failure; it never takes its siblings down.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, warn};

/// A unit of work the executor can run on a worker thread.
pub trait PoolJob: Send + 'static {
    type Id: Clone + fmt::Display + Send + 'static;
    type Output: Send + 'static;
    type Error: fmt::Display + Send + 'static;

    fn id(&self) -> Self::Id;
    fn run(self) -> Result<Self::Output, Self::Error>;
}

/// Terminal failure of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum JobFailure {
    /// The job returned an error.
    Failed(String),
    /// The job panicked.
    Panicked(String),
    /// No worker could be started to run the job.
    NotRun(String),
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobFailure::Failed(msg) => f.write_str(msg),
            JobFailure::Panicked(msg) => write!(f, "panicked: {msg}"),
            JobFailure::NotRun(msg) => write!(f, "not run: {msg}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("failed to spawn any worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorOptions {
    /// Worker threads; `None` uses the available parallelism.
    pub workers: Option<usize>,
    /// Jobs a worker runs before it exits; 0 means no limit.
    pub max_jobs_per_worker: usize,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            workers: None,
            max_jobs_per_worker: 1,
        }
    }
}

/// Aggregate counters, reported after every terminal job outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ExecutorProgress {
    /// Jobs that reached a terminal outcome, failures included.
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

#[derive(Debug)]
pub struct JobOutcome<Id, Output> {
    pub id: Id,
    pub result: Result<Output, JobFailure>,
}

enum WorkerEvent<J: PoolJob> {
    Finished {
        id: J::Id,
        result: Result<J::Output, JobFailure>,
    },
    /// The job panicked before it could name itself.
    Lost {
        message: String,
    },
    Retired {
        worker: usize,
    },
}

type Queue<J> = Arc<Mutex<VecDeque<J>>>;

#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelExecutor {
    options: ExecutorOptions,
}

impl ParallelExecutor {
    pub fn new(options: ExecutorOptions) -> Self {
        Self { options }
    }

    /// `min(workers or available parallelism, jobs)`, at least one.
    pub fn worker_count(&self, jobs: usize) -> usize {
        let wanted = self
            .options
            .workers
            .filter(|&n| n > 0)
            .unwrap_or_else(|| thread::available_parallelism().map_or(1, |n| n.get()));
        wanted.min(jobs).max(1)
    }

    /// Run every job to a terminal outcome. Outcomes arrive in completion
    /// order, not submission order. A job whose `id` panics is counted as
    /// failed in progress but has no outcome entry.
    pub fn run<J: PoolJob>(
        &self,
        jobs: Vec<J>,
        progress: Option<&dyn Fn(&ExecutorProgress)>,
    ) -> Result<Vec<JobOutcome<J::Id, J::Output>>, ExecutorError> {
        let total = jobs.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        let workers = self.worker_count(total);
        let budget = match self.options.max_jobs_per_worker {
            0 => usize::MAX,
            n => n,
        };
        let queue: Queue<J> = Arc::new(Mutex::new(jobs.into_iter().collect()));
        let (tx, rx) = mpsc::sync_channel::<WorkerEvent<J>>(workers);

        let mut handles: HashMap<usize, JoinHandle<()>> = HashMap::with_capacity(workers);
        let mut next_worker = 0usize;
        for _ in 0..workers {
            match spawn_worker(next_worker, Arc::clone(&queue), tx.clone(), budget) {
                Ok(handle) => {
                    handles.insert(next_worker, handle);
                    next_worker += 1;
                }
                Err(e) if handles.is_empty() => return Err(ExecutorError::Spawn(e)),
                Err(e) => {
                    warn!(error = %e, started = handles.len(), "could not start all workers");
                    break;
                }
            }
        }
        debug!(workers = handles.len(), jobs = total, budget, "executor started");

        let mut state = ExecutorProgress {
            total,
            ..ExecutorProgress::default()
        };
        let mut outcomes = Vec::with_capacity(total);

        while state.completed < total {
            let Some(event) = next_event(&rx, handles.is_empty()) else {
                break;
            };
            match event {
                WorkerEvent::Finished { id, result } => {
                    state.completed += 1;
                    if let Err(failure) = &result {
                        state.failed += 1;
                        warn!(job = %id, %failure, "job failed");
                    }
                    if let Some(report) = progress {
                        report(&state);
                    }
                    outcomes.push(JobOutcome { id, result });
                }
                WorkerEvent::Lost { message } => {
                    state.completed += 1;
                    state.failed += 1;
                    warn!(panic = %message, "job panicked before reporting its id");
                    if let Some(report) = progress {
                        report(&state);
                    }
                }
                WorkerEvent::Retired { worker } => {
                    if let Some(handle) = handles.remove(&worker) {
                        let _ = handle.join();
                    }
                    if queue_len(&queue) == 0 {
                        continue;
                    }
                    match spawn_worker(next_worker, Arc::clone(&queue), tx.clone(), budget) {
                        Ok(handle) => {
                            handles.insert(next_worker, handle);
                            next_worker += 1;
                        }
                        Err(e) => {
                            warn!(error = %e, live = handles.len(), "could not replace retired worker");
                            if handles.is_empty() {
                                for job in drain(&queue) {
                                    state.completed += 1;
                                    state.failed += 1;
                                    if let Some(report) = progress {
                                        report(&state);
                                    }
                                    outcomes.push(JobOutcome {
                                        id: job.id(),
                                        result: Err(JobFailure::NotRun(e.to_string())),
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }

        drop(tx);
        for (_, handle) in handles {
            let _ = handle.join();
        }
        Ok(outcomes)
    }
}

fn next_event<J: PoolJob>(rx: &Receiver<WorkerEvent<J>>, no_workers: bool) -> Option<WorkerEvent<J>> {
    if no_workers {
        // nothing can send any more; pick up whatever is still buffered
        return rx.try_recv().ok();
    }
    rx.recv().ok()
}

fn spawn_worker<J: PoolJob>(
    index: usize,
    queue: Queue<J>,
    tx: SyncSender<WorkerEvent<J>>,
    budget: usize,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("bdms-worker-{index}"))
        .spawn(move || worker_loop(index, queue, tx, budget))
}

fn worker_loop<J: PoolJob>(index: usize, queue: Queue<J>, tx: SyncSender<WorkerEvent<J>>, budget: usize) {
    let mut ran = 0usize;
    while ran < budget {
        let Some(job) = pop(&queue) else {
            break;
        };
        ran += 1;
        let id = match panic::catch_unwind(AssertUnwindSafe(|| job.id())) {
            Ok(id) => id,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                if tx.send(WorkerEvent::Lost { message }).is_err() {
                    return;
                }
                continue;
            }
        };
        let result = match panic::catch_unwind(AssertUnwindSafe(|| job.run())) {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(JobFailure::Failed(e.to_string())),
            Err(payload) => Err(JobFailure::Panicked(panic_message(payload.as_ref()))),
        };
        if tx.send(WorkerEvent::Finished { id, result }).is_err() {
            return;
        }
    }
    let _ = tx.send(WorkerEvent::Retired { worker: index });
}

fn pop<J>(queue: &Mutex<VecDeque<J>>) -> Option<J> {
    match queue.lock() {
        Ok(mut q) => q.pop_front(),
        Err(poisoned) => poisoned.into_inner().pop_front(),
    }
}

fn queue_len<J>(queue: &Mutex<VecDeque<J>>) -> usize {
    match queue.lock() {
        Ok(q) => q.len(),
        Err(poisoned) => poisoned.into_inner().len(),
    }
}

fn drain<J>(queue: &Mutex<VecDeque<J>>) -> Vec<J> {
    match queue.lock() {
        Ok(mut q) => q.drain(..).collect(),
        Err(poisoned) => poisoned.into_inner().drain(..).collect(),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
