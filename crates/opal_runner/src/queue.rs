//! File Queue (C3): hands out subject files to worker threads exactly
//! once each. Grounded on `casparian_sentinel::catalog_executor`'s
//! `mpsc::channel` + `recv_timeout` pattern, shared behind a `Mutex` since
//! here multiple worker threads pop from the same receiver rather than one
//! dedicated thread owning it.

use opal_protocol::SubjectFile;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Mutex;
use std::time::Duration;

/// Poll interval workers use while waiting for either more work or a
/// cancellation signal.
pub const POP_TIMEOUT: Duration = Duration::from_millis(200);

pub struct FileQueue {
    receiver: Mutex<Receiver<SubjectFile>>,
}

impl FileQueue {
    /// Load every subject up front and close the sending half immediately:
    /// the queue is a fixed work list, not a live feed.
    pub fn from_subjects(subjects: Vec<SubjectFile>) -> Self {
        let (tx, rx): (Sender<SubjectFile>, Receiver<SubjectFile>) = mpsc::channel();
        for subject in subjects {
            // Unbounded channel with no other sender alive: this never blocks
            // and the receiver outlives this loop, so send() cannot fail.
            let _ = tx.send(subject);
        }
        drop(tx);
        Self {
            receiver: Mutex::new(rx),
        }
    }

    /// Pop the next subject, waiting up to `POP_TIMEOUT` for either new
    /// work or the queue to close. Returns `None` once the queue is
    /// exhausted and closed.
    pub fn try_pop(&self) -> Option<SubjectFile> {
        let receiver = self.receiver.lock().expect("file queue mutex poisoned");
        match receiver.recv_timeout(POP_TIMEOUT) {
            Ok(subject) => Some(subject),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opal_protocol::SubjectId;
    use std::path::PathBuf;

    fn subject(name: &str) -> SubjectFile {
        let path = PathBuf::from(format!("/data/{name}.csv"));
        SubjectFile {
            id: SubjectId::from_path(&path).unwrap(),
            path,
        }
    }

    #[test]
    fn yields_every_subject_then_none() {
        let queue = FileQueue::from_subjects(vec![subject("a"), subject("b")]);
        let mut seen = Vec::new();
        while let Some(s) = queue.try_pop() {
            seen.push(s.id.as_str().to_string());
        }
        seen.sort();
        assert_eq!(seen, vec!["a".to_string(), "b".to_string()]);
        assert!(queue.try_pop().is_none());
    }

    #[test]
    fn empty_queue_yields_none_immediately() {
        let queue = FileQueue::from_subjects(vec![]);
        assert!(queue.try_pop().is_none());
    }
}
