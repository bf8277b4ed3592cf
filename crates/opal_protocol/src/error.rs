use thiserror::Error;

/// Errors raised while parsing the inputs the runner is handed before any
/// subject is dispatched (weights file, parameter bundle).
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to read weights file {path}: {source}")]
    WeightsRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("weights file {path} is not valid JSON: {source}")]
    WeightsParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("parameter bundle must be a JSON object")]
    ParamsNotAnObject,
}
