use std::path::PathBuf;
use thiserror::Error;

/// Failures from a single sandboxed invocation (spec §6: sandbox errors are
/// single-attempt, no retry — a subject that fails here is simply skipped).
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to spawn interpreter at {interpreter}: {source}")]
    Spawn {
        interpreter: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snippet for subject {subject} exceeded its CPU time limit")]
    CpuLimitExceeded { subject: String },

    #[error("snippet for subject {subject} exited with status {status}: {stderr}")]
    NonZeroExit {
        subject: String,
        status: i32,
        stderr: String,
    },

    #[error("snippet for subject {subject} terminated by signal {signal}")]
    Signaled { subject: String, signal: i32 },

    #[error("snippet for subject {subject} printed no result marker")]
    MissingResultMarker { subject: String },

    #[error("snippet for subject {subject} produced malformed JSON result: {source}")]
    MalformedResult {
        subject: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("snippet for subject {subject} returned a JSON value that is not an object")]
    ResultNotAnObject { subject: String },

    #[cfg(unix)]
    #[error("failed to apply sandbox policy for subject {subject}: {source}")]
    PolicyDenied {
        subject: String,
        #[source]
        source: nix::Error,
    },
}
