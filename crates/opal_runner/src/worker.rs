//! Mapper Worker (C4): one OS thread per configured worker count, each
//! pulling subjects off the shared File Queue until it's exhausted or the
//! run is cancelled. Grounded on
//! `casparian_sentinel::catalog_executor::run_catalog_thread`'s
//! "spawn a thread, loop on recv_timeout, stop on cancel or disconnect"
//! shape.

use crate::error::SubjectOutcome;
use crate::queue::FileQueue;
use crate::validator::validate;
use opal_protocol::{AlgorithmBundle, ParameterBundle, SubjectFile, WeightMap};
use opal_sandbox::SandboxExecutor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use tracing::{info, warn};

/// Message a worker sends the Collector for one subject.
pub struct WorkerMessage {
    pub subject_id: String,
    pub outcome: SubjectOutcome,
}

/// Shared, read-only inputs every worker thread needs. Cheap to clone
/// (everything behind `Arc`), so each spawned thread gets its own copy.
pub struct WorkerContext {
    pub queue: Arc<FileQueue>,
    pub executor: Arc<dyn SandboxExecutor>,
    pub bundle: Arc<AlgorithmBundle>,
    pub params: Arc<ParameterBundle>,
    pub weights: Arc<WeightMap>,
    pub dev_mode: bool,
    pub cancelled: Arc<AtomicBool>,
    pub results: Sender<WorkerMessage>,
}

/// Run one worker's loop to completion: pop, sandbox-execute, validate,
/// scale, report. Returns when the queue is drained or cancellation is
/// observed between subjects (a subject already in flight always finishes).
pub fn run_worker(worker_id: usize, ctx: WorkerContext) {
    loop {
        if ctx.cancelled.load(Ordering::Relaxed) {
            info!(worker_id, "worker stopping: run cancelled");
            return;
        }

        let Some(subject) = ctx.queue.try_pop() else {
            if ctx.cancelled.load(Ordering::Relaxed) {
                return;
            }
            // try_pop already waited out its own timeout; None here with no
            // cancellation means the queue is exhausted and closed.
            return;
        };

        let subject_id = subject.id.as_str().to_string();
        let outcome = process_subject(
            ctx.executor.as_ref(),
            &ctx.bundle,
            &ctx.params,
            &ctx.weights,
            ctx.dev_mode,
            &subject,
        );

        if let SubjectOutcome::Failed { reason } = &outcome {
            warn!(worker_id, subject = %subject_id, %reason, "subject failed, skipping");
        }

        let _ = ctx.results.send(WorkerMessage {
            subject_id,
            outcome,
        });
    }
}

/// Sandbox-execute, validate, and scale one subject. Shared by both
/// dispatch modes: pool workers call it per popped subject, and the
/// `multiprocess = false` inline path calls it directly in the calling
/// thread.
pub(crate) fn process_subject(
    executor: &dyn SandboxExecutor,
    bundle: &AlgorithmBundle,
    params: &ParameterBundle,
    weights: &WeightMap,
    dev_mode: bool,
    subject: &SubjectFile,
) -> SubjectOutcome {
    let raw = match executor.execute(bundle, params, subject, dev_mode) {
        Ok(value) => value,
        Err(err) => {
            return SubjectOutcome::Failed {
                reason: err.to_string(),
            }
        }
    };

    let partial = match validate(raw) {
        Ok(partial) => partial,
        Err(err) => {
            return SubjectOutcome::Failed {
                reason: err.to_string(),
            }
        }
    };

    if partial.is_empty() {
        return SubjectOutcome::Dropped {
            reason: "empty partial".to_string(),
        };
    }

    let weight = weights.weight_for(&subject.id);
    SubjectOutcome::Scaled(partial.scale(weight))
}
