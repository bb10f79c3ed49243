use crate::error::{RenderError, RenderResult};
use crate::pipeline::JobRunner;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Log a progress line every this many finished jobs.
const PROGRESS_EVERY: usize = 5;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub succeeded: BTreeSet<String>,
    pub failed: BTreeSet<String>,
    pub paths: BTreeMap<String, PathBuf>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    /// Finished projects per second.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total() as f64 / secs
        } else {
            0.0
        }
    }
}

/// Run `runner` once per project id on a pool of `workers` threads.
///
/// Jobs are independent: a failure (or a panic) is recorded against its
/// project id and never stops the rest of the batch.
pub fn run_batch<R>(runner: &R, project_ids: &[String], workers: usize) -> Result<BatchReport, rayon::ThreadPoolBuildError>
where
    R: JobRunner + ?Sized,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|idx| format!("snapshot-worker-{idx}"))
        .build()?;

    tracing::info!(projects = project_ids.len(), workers = workers.max(1), "starting thumbnail generation");
    let started = Instant::now();
    let finished = AtomicUsize::new(0);
    let total = project_ids.len();

    let outcomes: Vec<(String, RenderResult<PathBuf>)> = pool.install(|| {
        project_ids
            .par_iter()
            .with_max_len(1)
            .map(|id| {
                let outcome = run_isolated(runner, id);
                let done = finished.fetch_add(1, Ordering::Relaxed) + 1;
                if done % PROGRESS_EVERY == 0 {
                    tracing::info!("{done}/{total} completed");
                }
                (id.clone(), outcome)
            })
            .collect()
    });

    let mut report = BatchReport::default();
    for (id, outcome) in outcomes {
        match outcome {
            Ok(path) => {
                report.paths.insert(id.clone(), path);
                report.succeeded.insert(id);
            }
            Err(err) => {
                tracing::warn!(project = %id, error = %err, "thumbnail failed");
                report.failed.insert(id);
            }
        }
    }
    report.elapsed = started.elapsed();

    tracing::info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        elapsed_secs = report.elapsed.as_secs_f64(),
        "batch finished"
    );
    Ok(report)
}

fn run_isolated<R>(runner: &R, project_id: &str) -> RenderResult<PathBuf>
where
    R: JobRunner + ?Sized,
{
    panic::catch_unwind(AssertUnwindSafe(|| runner.run_job(project_id))).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(RenderError::Panicked(message))
    })
}
