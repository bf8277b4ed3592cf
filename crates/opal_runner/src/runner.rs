//! Runner (C9): wires the other components together and drives one
//! end-to-end run. The state machine and SIGINT/SIGTERM handling are
//! grounded on `casparian::main::run_unified`: a `signal_hook`-backed
//! `Arc<AtomicBool>` flag, an `mpsc` channel per worker, and plain
//! `std::thread::spawn` rather than an async runtime.

use crate::collector::{handle_message, run_collector, CollectorMode, CollectorSummary};
use crate::error::{RunnerError, SubjectOutcome};
use crate::queue::FileQueue;
use crate::worker::{process_subject, run_worker, WorkerContext, WorkerMessage};
use opal_aggregator::AggregatorClient;
use opal_protocol::{discover_subjects, AlgorithmBundle, ParameterBundle, SubjectFile, WeightMap};
use opal_sandbox::{ProcessSandbox, SandboxEnv, SandboxExecutor, UnsafeSandbox};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use tracing::{info, warn};

/// States the Runner passes through in one execution, per spec §4.9. Only
/// the forward transitions the Runner actually performs are represented;
/// there is no API to move backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Starting,
    Running,
    Draining,
    Interrupted,
    Joined,
    Done,
    Failed,
}

pub struct RunnerConfig {
    pub data_dir: PathBuf,
    pub workers: usize,
    pub weights_path: Option<PathBuf>,
    pub bundle: AlgorithmBundle,
    pub params: ParameterBundle,
    pub dev_mode: bool,
    pub unsafe_mode: bool,
    pub aggregation_url: Option<String>,
    /// If false, subjects are processed one at a time in the calling
    /// thread (no File Queue, no worker pool, no Results Queue) instead of
    /// being fanned out across `workers` threads. Defaults to `true`
    /// everywhere this config is constructed from user input.
    pub multiprocess: bool,
}

/// A run only returns successfully when every subject has been fully
/// drained by the Collector with no aggregator failure and no interrupt —
/// `Runner::run` surfaces both of those as errors instead, with no partial
/// `RunOutcome` to inspect.
pub struct RunOutcome {
    pub summary: CollectorSummary,
}

pub struct Runner {
    config: RunnerConfig,
    state: RunnerState,
}

impl Runner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            state: RunnerState::Idle,
        }
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Resolve the sandbox policy from the environment (or `--unsafe`),
    /// install signal handlers, and run to completion.
    pub fn run(self) -> Result<RunOutcome, RunnerError> {
        let executor: Arc<dyn SandboxExecutor> = if self.config.unsafe_mode {
            warn!("running with --unsafe: no privilege drop, no CPU limit");
            Arc::new(UnsafeSandbox::new())
        } else {
            let env = SandboxEnv::from_env()?;
            Arc::new(ProcessSandbox::new(env))
        };

        let cancelled = Arc::new(AtomicBool::new(false));
        install_signal_handlers(Arc::clone(&cancelled))?;
        self.execute(executor, cancelled)
    }

    /// Run with a caller-supplied executor and no signal handling. Used by
    /// tests to substitute a fake sandbox for a real interpreter.
    pub fn run_with_executor(
        self,
        executor: Arc<dyn SandboxExecutor>,
    ) -> Result<RunOutcome, RunnerError> {
        self.execute(executor, Arc::new(AtomicBool::new(false)))
    }

    /// Same as `run_with_executor`, but the caller also controls the
    /// cancellation flag directly, so a test can flip it mid-run from
    /// another thread to exercise interrupt handling.
    pub fn run_with_executor_and_cancel(
        self,
        executor: Arc<dyn SandboxExecutor>,
        cancelled: Arc<AtomicBool>,
    ) -> Result<RunOutcome, RunnerError> {
        self.execute(executor, cancelled)
    }

    fn execute(
        mut self,
        executor: Arc<dyn SandboxExecutor>,
        cancelled: Arc<AtomicBool>,
    ) -> Result<RunOutcome, RunnerError> {
        self.state = RunnerState::Starting;
        info!("starting run");

        let subjects = discover_subjects(&self.config.data_dir).map_err(|source| {
            RunnerError::DataDirUnreadable {
                path: self.config.data_dir.clone(),
                source,
            }
        })?;
        info!(subjects = subjects.len(), "discovered subject files");

        let weights = Arc::new(WeightMap::load(self.config.weights_path.as_deref())?);

        let mode = if self.config.dev_mode {
            CollectorMode::Dev
        } else {
            let url = self
                .config
                .aggregation_url
                .clone()
                .or_else(|| {
                    self.config
                        .params
                        .aggregation_service_url()
                        .map(str::to_string)
                })
                .ok_or(RunnerError::MissingAggregationUrl)?;
            CollectorMode::Production(AggregatorClient::new(url))
        };

        if self.config.multiprocess {
            self.execute_pooled(subjects, weights, mode, executor, cancelled)
        } else {
            self.execute_inline(subjects, weights, mode, executor, cancelled)
        }
    }

    /// Dispatch mode: a File Queue, N Mapper Worker threads, and one
    /// Collector draining their shared Results Queue.
    fn execute_pooled(
        mut self,
        subjects: Vec<SubjectFile>,
        weights: Arc<WeightMap>,
        mode: CollectorMode,
        executor: Arc<dyn SandboxExecutor>,
        cancelled: Arc<AtomicBool>,
    ) -> Result<RunOutcome, RunnerError> {
        let queue = Arc::new(FileQueue::from_subjects(subjects));

        let (results_tx, results_rx) = mpsc::channel();
        let bundle = Arc::new(self.config.bundle.clone());
        let params = Arc::new(self.config.params.clone());

        self.state = RunnerState::Running;
        let worker_count = self.config.workers.max(1);
        let mut handles = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let ctx = WorkerContext {
                queue: Arc::clone(&queue),
                executor: Arc::clone(&executor),
                bundle: Arc::clone(&bundle),
                params: Arc::clone(&params),
                weights: Arc::clone(&weights),
                dev_mode: self.config.dev_mode,
                cancelled: Arc::clone(&cancelled),
                results: results_tx.clone(),
            };
            handles.push(std::thread::spawn(move || run_worker(worker_id, ctx)));
        }
        // The Runner's own handle must be dropped too, or the channel never
        // closes once every worker finishes.
        drop(results_tx);

        self.state = RunnerState::Draining;
        let collector_result = run_collector(mode, results_rx);

        for handle in handles {
            let _ = handle.join();
        }
        self.state = RunnerState::Joined;

        self.finish(collector_result, cancelled)
    }

    /// Dispatch mode: no worker pool at all. Subjects run
    /// Sandbox -> Validate -> Scale -> Collect inline, one at a time, in
    /// the calling thread.
    fn execute_inline(
        mut self,
        subjects: Vec<SubjectFile>,
        weights: Arc<WeightMap>,
        mode: CollectorMode,
        executor: Arc<dyn SandboxExecutor>,
        cancelled: Arc<AtomicBool>,
    ) -> Result<RunOutcome, RunnerError> {
        info!("running inline: multiprocess disabled");
        self.state = RunnerState::Running;
        self.state = RunnerState::Draining;

        let mut summary = CollectorSummary::default();
        let mut collector_result = Ok(());
        for subject in &subjects {
            if cancelled.load(Ordering::Relaxed) {
                break;
            }

            let subject_id = subject.id.as_str().to_string();
            let outcome = process_subject(
                executor.as_ref(),
                &self.config.bundle,
                &self.config.params,
                &weights,
                self.config.dev_mode,
                subject,
            );

            if let SubjectOutcome::Failed { reason } = &outcome {
                warn!(subject = %subject_id, %reason, "subject failed, skipping");
            }

            let message = WorkerMessage {
                subject_id,
                outcome,
            };
            if let Err(err) = handle_message(&mode, message, &mut summary) {
                collector_result = Err(err);
                break;
            }
        }
        self.state = RunnerState::Joined;

        let collector_result = collector_result.map(|()| summary);
        self.finish(collector_result, cancelled)
    }

    /// Shared tail of both dispatch modes: interpret the Collector's
    /// outcome and the cancellation flag into the Runner's final state and
    /// result, per the failure semantics in spec §4.9/§7 — an aggregator
    /// failure or an interrupt both fail the whole run with no partial
    /// results, they never return a truncated `RunOutcome`.
    fn finish(
        mut self,
        collector_result: Result<CollectorSummary, opal_aggregator::AggregatorError>,
        cancelled: Arc<AtomicBool>,
    ) -> Result<RunOutcome, RunnerError> {
        let summary = match collector_result {
            Ok(summary) => summary,
            Err(err) => {
                self.state = RunnerState::Failed;
                info!(state = ?self.state, "run finished");
                return Err(RunnerError::Aggregator(err));
            }
        };

        if cancelled.load(Ordering::Relaxed) {
            self.state = RunnerState::Interrupted;
            info!(state = ?self.state, "run interrupted");
            self.state = RunnerState::Failed;
            info!(state = ?self.state, "run finished");
            return Err(RunnerError::Interrupted);
        }

        self.state = RunnerState::Done;
        info!(state = ?self.state, "run finished");
        Ok(RunOutcome { summary })
    }
}

#[cfg(unix)]
fn install_signal_handlers(cancelled: Arc<AtomicBool>) -> Result<(), RunnerError> {
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&cancelled))?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, cancelled)?;
    Ok(())
}

#[cfg(not(unix))]
fn install_signal_handlers(cancelled: Arc<AtomicBool>) -> Result<(), RunnerError> {
    // signal_hook::flag is Unix-only; Windows runs uninterruptible for now.
    let _ = cancelled;
    Ok(())
}
