//! Shared data model for the OPAL algorithm runner: subjects, weights,
//! algorithm/parameter bundles, and the Partial type that flows from a
//! sandboxed snippet through validation and scaling to the aggregator.

pub mod bundle;
pub mod error;
pub mod number;
pub mod partial;
pub mod subject;
pub mod weights;

pub use bundle::{AlgorithmBundle, ParameterBundle, AGGREGATION_SERVICE_URL_KEY};
pub use error::ProtocolError;
pub use number::Number;
pub use partial::Partial;
pub use subject::{discover_subjects, SubjectFile, SubjectId};
pub use weights::WeightMap;
