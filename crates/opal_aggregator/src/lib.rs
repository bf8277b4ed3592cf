//! Aggregator Client (C8): posts one scaled Partial per subject to the
//! remote aggregation service. Grounded on
//! `client-engine::backend::{fetch_work, submit_job}`'s shape (build a
//! `reqwest::Client`, POST JSON, treat any non-success status as failure
//! and surface the response body in the error) but blocking rather than
//! async, since the Runner drives the Collector from a plain OS thread.

use opal_protocol::Partial;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("failed to reach aggregation service at {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("aggregation service at {url} rejected the update: http {status}: {body}")]
    Rejected {
        url: String,
        status: u16,
        body: String,
    },
}

#[derive(Serialize)]
struct UpdateRequest<'a> {
    update: &'a Partial,
}

/// Thin wrapper over a blocking `reqwest::Client`. Stateless beyond the
/// underlying connection pool, so it's cheap to clone and share across
/// worker threads.
#[derive(Clone)]
pub struct AggregatorClient {
    http: reqwest::blocking::Client,
    url: String,
}

impl AggregatorClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client with a fixed timeout always builds");
        Self {
            http,
            url: url.into(),
        }
    }

    /// POST one scaled Partial. Succeeds iff the service returns a 2xx
    /// status. No retry: per spec, aggregator failures are surfaced to the
    /// Runner and do not reattempt the subject.
    pub fn post(&self, partial: &Partial) -> Result<(), AggregatorError> {
        tracing::debug!(url = %self.url, "posting update to aggregation service");
        let response = self
            .http
            .post(&self.url)
            .json(&UpdateRequest { update: partial })
            .send()
            .map_err(|source| AggregatorError::Transport {
                url: self.url.clone(),
                source,
            })?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status().as_u16();
        let body = response.text().unwrap_or_default();
        tracing::warn!(url = %self.url, status, "aggregation service rejected update");
        Err(AggregatorError::Rejected {
            url: self.url.clone(),
            status,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    /// Spawn a one-shot HTTP server on localhost that replies with a fixed
    /// status line and body to the first request it receives, then exits.
    fn spawn_one_shot_server(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                let response = format!(
                    "{status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{addr}/ingest")
    }

    #[test]
    fn post_succeeds_on_2xx() {
        let url = spawn_one_shot_server("HTTP/1.1 200 OK", "{}");
        let client = AggregatorClient::new(url);
        let partial = Partial::default();
        assert!(client.post(&partial).is_ok());
    }

    #[test]
    fn post_fails_on_5xx_with_body_surfaced() {
        let url = spawn_one_shot_server("HTTP/1.1 500 Internal Server Error", "boom");
        let client = AggregatorClient::new(url);
        let partial = Partial::default();
        let err = client.post(&partial).unwrap_err();
        match err {
            AggregatorError::Rejected { status, body, .. } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn post_fails_on_connection_refused() {
        // Nothing is listening on this port.
        let client = AggregatorClient::with_timeout(
            "http://127.0.0.1:1",
            Duration::from_millis(200),
        );
        let partial = Partial::default();
        assert!(matches!(
            client.post(&partial),
            Err(AggregatorError::Transport { .. })
        ));
    }
}
