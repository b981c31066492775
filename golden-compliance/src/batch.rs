//! Parallel evaluation of many records.

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{error, info, warn};

use crate::dispatch::{Dispatcher, EvaluationJob};
use crate::error::EvaluationError;
use crate::model::ComplianceRecord;

pub type JobOutcome = Result<ComplianceRecord, EvaluationError>;

/// Evaluate `jobs` on up to `workers` threads (0 for one per CPU).
///
/// Outcomes come back in job order. A failing job is logged and reported in
/// its own slot; the rest of the batch is unaffected.
pub fn evaluate_batch(dispatcher: &Dispatcher, jobs: &[EvaluationJob], workers: usize) -> Vec<JobOutcome> {
    let run = || {
        jobs.par_iter()
            .map(|job| run_job(dispatcher, job))
            .collect::<Vec<_>>()
    };

    let outcomes = match ThreadPoolBuilder::new().num_threads(workers).build() {
        Ok(pool) => pool.install(run),
        Err(err) => {
            warn!(error = %err, "failed to build worker pool, evaluating sequentially");
            jobs.iter().map(|job| run_job(dispatcher, job)).collect()
        }
    };

    let failed = outcomes.iter().filter(|o| o.is_err()).count();
    info!(total = outcomes.len(), failed, "batch evaluation finished");
    outcomes
}

fn run_job(dispatcher: &Dispatcher, job: &EvaluationJob) -> JobOutcome {
    let outcome = dispatcher.evaluate(job);
    if let Err(err) = &outcome {
        error!(
            device = %job.device.name,
            feature = %job.feature,
            error = %err,
            "compliance evaluation failed"
        );
    }
    outcome
}
