//! Property tests for the worker pool.
//!
//! Uses proptest to verify:
//! 1. Every submitted job is reported exactly once, whatever the pool shape
//! 2. Progress ends at the job total with the right failure count

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Mutex;

use bdms_runner::{ExecutorOptions, ExecutorProgress, JobFailure, ParallelExecutor, PoolJob};

/// Fails when its id is divisible by `fail_every`.
struct Countdown {
    id: usize,
    fail_every: usize,
}

impl PoolJob for Countdown {
    type Id = usize;
    type Output = usize;
    type Error = String;

    fn id(&self) -> usize {
        self.id
    }

    fn run(self) -> Result<usize, String> {
        if self.id % self.fail_every == 0 {
            Err(format!("job {} failed", self.id))
        } else {
            Ok(self.id * 2)
        }
    }
}

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_options() -> impl Strategy<Value = ExecutorOptions> {
    (1usize..6, 0usize..4).prop_map(|(workers, budget)| ExecutorOptions {
        workers: Some(workers),
        max_jobs_per_worker: budget,
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Each job id appears once in the outcomes, with its own result.
    #[test]
    fn every_job_is_reported_once(jobs in 0usize..40, options in arb_options(), fail_every in 2usize..7) {
        let tasks: Vec<Countdown> = (0..jobs).map(|id| Countdown { id, fail_every }).collect();
        let last = Mutex::new(ExecutorProgress::default());
        let report = |p: &ExecutorProgress| *last.lock().unwrap() = *p;

        let outcomes = ParallelExecutor::new(options).run(tasks, Some(&report)).unwrap();

        prop_assert_eq!(outcomes.len(), jobs);
        let ids: HashSet<usize> = outcomes.iter().map(|o| o.id).collect();
        prop_assert_eq!(ids.len(), jobs);
        for outcome in &outcomes {
            if outcome.id % fail_every == 0 {
                prop_assert!(matches!(outcome.result, Err(JobFailure::Failed(_))));
            } else {
                prop_assert_eq!(&outcome.result, &Ok(outcome.id * 2));
            }
        }

        let expected_failures = (0..jobs).filter(|id| id % fail_every == 0).count();
        let last = *last.lock().unwrap();
        if jobs > 0 {
            prop_assert_eq!(last, ExecutorProgress { completed: jobs, failed: expected_failures, total: jobs });
        }
    }
}
