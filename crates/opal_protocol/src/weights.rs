use crate::error::ProtocolError;
use crate::number::Number;
use crate::subject::SubjectId;
use std::collections::HashMap;
use std::path::Path;

/// Mapping from subject id to a positive real weight. Subjects absent from
/// the map default to weight 1. Immutable once constructed.
#[derive(Debug, Clone, Default)]
pub struct WeightMap {
    weights: HashMap<String, Number>,
}

impl WeightMap {
    pub fn empty() -> Self {
        Self {
            weights: HashMap::new(),
        }
    }

    /// Load from an optional weights JSON file. `None` yields the empty map
    /// (every subject defaults to weight 1).
    pub fn load(weights_file: Option<&Path>) -> Result<Self, ProtocolError> {
        let Some(path) = weights_file else {
            return Ok(Self::empty());
        };

        let text = std::fs::read_to_string(path).map_err(|source| ProtocolError::WeightsRead {
            path: path.display().to_string(),
            source,
        })?;

        let weights: HashMap<String, Number> =
            serde_json::from_str(&text).map_err(|source| ProtocolError::WeightsParse {
                path: path.display().to_string(),
                source,
            })?;

        Ok(Self { weights })
    }

    /// Weight for a subject id, defaulting to 1 when absent.
    pub fn weight_for(&self, id: &SubjectId) -> Number {
        self.weights
            .get(id.as_str())
            .copied()
            .unwrap_or(Number::ONE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_subject_defaults_to_one() {
        let map = WeightMap::empty();
        let id = SubjectId::from_path(Path::new("c.csv")).unwrap();
        assert_eq!(map.weight_for(&id), Number::ONE);
    }

    #[test]
    fn loads_mixed_int_and_float_weights() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.json");
        std::fs::write(&path, r#"{"a": 2, "b": 0.5}"#).unwrap();

        let map = WeightMap::load(Some(&path)).unwrap();
        let a = SubjectId::from_path(Path::new("a.csv")).unwrap();
        let b = SubjectId::from_path(Path::new("b.csv")).unwrap();
        let c = SubjectId::from_path(Path::new("c.csv")).unwrap();

        assert_eq!(map.weight_for(&a), Number::Int(2));
        assert_eq!(map.weight_for(&b), Number::Float(0.5));
        assert_eq!(map.weight_for(&c), Number::ONE);
    }

    #[test]
    fn rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.json");
        std::fs::write(&path, "not json").unwrap();

        let err = WeightMap::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ProtocolError::WeightsParse { .. }));
    }
}
