use thiserror::Error;

/// Errors that abort an entire run (as opposed to per-subject failures,
/// which the Mapper Worker logs and skips — see spec §6's error taxonomy).
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("sandbox configuration is invalid: {0}")]
    Config(#[from] opal_sandbox::ConfigError),

    #[error("failed to read data directory {path}: {source}")]
    DataDirUnreadable {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load subject weights: {0}")]
    Weights(#[from] opal_protocol::ProtocolError),

    #[error("production mode requires an aggregation URL (pass --aggregation-url or set it in params)")]
    MissingAggregationUrl,

    #[error("failed to install signal handler: {0}")]
    SignalHandler(#[from] std::io::Error),

    #[error("aggregator rejected an update, aborting run: {0}")]
    Aggregator(#[from] opal_aggregator::AggregatorError),

    #[error("run was interrupted")]
    Interrupted,
}

/// Outcome of processing a single subject, reported by the Mapper Worker to
/// the Collector. Per-subject failures never abort the run.
#[derive(Debug)]
pub enum SubjectOutcome {
    Scaled(opal_protocol::Partial),
    Dropped { reason: String },
    Failed { reason: String },
}
