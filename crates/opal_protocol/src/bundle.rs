use crate::error::ProtocolError;
use serde_json::{Map, Value};

/// Immutable pair of snippet source code and the entry class it defines.
/// `source` defines a class named `entry_name` exposing `map(params, subject)`.
#[derive(Debug, Clone)]
pub struct AlgorithmBundle {
    pub source: String,
    pub entry_name: String,
}

impl AlgorithmBundle {
    pub fn new(source: impl Into<String>, entry_name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            entry_name: entry_name.into(),
        }
    }
}

/// Well-known key carrying the aggregator's URL in production mode.
pub const AGGREGATION_SERVICE_URL_KEY: &str = "aggregationServiceUrl";

/// Arbitrary JSON object passed unmodified into every map invocation.
#[derive(Debug, Clone)]
pub struct ParameterBundle {
    params: Map<String, Value>,
}

impl ParameterBundle {
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        match value {
            Value::Object(params) => Ok(Self { params }),
            _ => Err(ProtocolError::ParamsNotAnObject),
        }
    }

    pub fn empty() -> Self {
        Self {
            params: Map::new(),
        }
    }

    pub fn aggregation_service_url(&self) -> Option<&str> {
        self.params.get(AGGREGATION_SERVICE_URL_KEY)?.as_str()
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.params.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_aggregation_url() {
        let params =
            ParameterBundle::from_value(serde_json::json!({"aggregationServiceUrl": "http://x"}))
                .unwrap();
        assert_eq!(params.aggregation_service_url(), Some("http://x"));
    }

    #[test]
    fn rejects_non_object() {
        let err = ParameterBundle::from_value(serde_json::json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, ProtocolError::ParamsNotAnObject));
    }
}
