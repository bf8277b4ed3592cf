//! Collector (C7): the single consumer of the Results Queue. Runs in
//! either Dev mode (accumulate Partials for the CLI to print) or
//! Production mode (POST each Partial to the Aggregator Client).
//! Grounded on `casparian::runner::{DevRunner, QueuedRunner}`'s trait
//! split — here expressed as one enum rather than two trait impls, since
//! the two modes share nearly all of their loop body and differ only in
//! what happens to a successfully scaled Partial.

use crate::error::SubjectOutcome;
use crate::queue::POP_TIMEOUT;
use crate::worker::WorkerMessage;
use opal_aggregator::{AggregatorClient, AggregatorError};
use opal_protocol::Partial;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use tracing::{error, info, warn};

pub enum CollectorMode {
    /// No aggregation service: every scaled Partial is kept in memory so
    /// the caller (the CLI, in `--dev` mode) can inspect or print it.
    Dev,
    /// Each scaled Partial is forwarded to the aggregation service; none
    /// are retained.
    Production(AggregatorClient),
}

#[derive(Debug, Default)]
pub struct CollectorSummary {
    pub scaled: Vec<(String, Partial)>,
    pub dropped: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Drain the Results Queue until every worker's Sender handle has been
/// dropped (i.e. every worker thread has returned), or until an Aggregator
/// Client post fails. A post failure aborts the drain immediately: no
/// further messages are consumed and no partials already collected are
/// returned, matching the fail-fast aggregation policy.
pub fn run_collector(
    mode: CollectorMode,
    results: Receiver<WorkerMessage>,
) -> Result<CollectorSummary, AggregatorError> {
    let mut summary = CollectorSummary::default();

    loop {
        match results.recv_timeout(POP_TIMEOUT) {
            Ok(message) => handle_message(&mode, message, &mut summary)?,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    info!(
        scaled = summary.scaled.len(),
        dropped = summary.dropped.len(),
        failed = summary.failed.len(),
        "collector finished draining results"
    );
    Ok(summary)
}

pub(crate) fn handle_message(
    mode: &CollectorMode,
    message: WorkerMessage,
    summary: &mut CollectorSummary,
) -> Result<(), AggregatorError> {
    let WorkerMessage {
        subject_id,
        outcome,
    } = message;

    match outcome {
        SubjectOutcome::Dropped { reason } => {
            warn!(subject = %subject_id, %reason, "dropped empty partial");
            summary.dropped.push(subject_id);
        }
        SubjectOutcome::Failed { reason } => {
            summary.failed.push((subject_id, reason));
        }
        SubjectOutcome::Scaled(partial) => match mode {
            CollectorMode::Dev => {
                summary.scaled.push((subject_id, partial));
            }
            CollectorMode::Production(client) => {
                client.post(&partial).map_err(|err| {
                    error!(subject = %subject_id, error = %err, "aggregator rejected update, aborting collector");
                    err
                })?;
                summary.scaled.push((subject_id, partial));
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use opal_protocol::Number;
    use std::collections::BTreeMap;
    use std::sync::mpsc;

    fn scaled_message(id: &str, value: i64) -> WorkerMessage {
        let mut fields = BTreeMap::new();
        fields.insert("calls".to_string(), Number::Int(value));
        WorkerMessage {
            subject_id: id.to_string(),
            outcome: SubjectOutcome::Scaled(Partial::new(fields)),
        }
    }

    #[test]
    fn dev_mode_accumulates_scaled_partials() {
        let (tx, rx) = mpsc::channel();
        tx.send(scaled_message("a", 3)).unwrap();
        tx.send(scaled_message("b", 4)).unwrap();
        drop(tx);

        let summary = run_collector(CollectorMode::Dev, rx).expect("dev mode never fails");
        assert_eq!(summary.scaled.len(), 2);
        assert!(summary.failed.is_empty());
    }

    #[test]
    fn dropped_and_failed_outcomes_are_tallied_separately() {
        let (tx, rx) = mpsc::channel();
        tx.send(WorkerMessage {
            subject_id: "a".to_string(),
            outcome: SubjectOutcome::Dropped {
                reason: "empty partial".to_string(),
            },
        })
        .unwrap();
        tx.send(WorkerMessage {
            subject_id: "b".to_string(),
            outcome: SubjectOutcome::Failed {
                reason: "boom".to_string(),
            },
        })
        .unwrap();
        drop(tx);

        let summary = run_collector(CollectorMode::Dev, rx).expect("dev mode never fails");
        assert_eq!(summary.dropped, vec!["a".to_string()]);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "b");
    }

    #[test]
    fn production_mode_aborts_on_first_post_failure() {
        let (tx, rx) = mpsc::channel();
        tx.send(scaled_message("a", 1)).unwrap();
        tx.send(scaled_message("b", 2)).unwrap();
        drop(tx);

        // Nothing is listening on this port, so every post fails fast.
        let client = AggregatorClient::with_timeout(
            "http://127.0.0.1:1",
            std::time::Duration::from_millis(200),
        );
        let err = run_collector(CollectorMode::Production(client), rx).unwrap_err();
        assert!(matches!(err, AggregatorError::Transport { .. }));
    }
}
