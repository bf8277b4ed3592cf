use crate::number::Number;
use std::collections::BTreeMap;

/// A validated mapping from string key to number, produced by a snippet's
/// `map` call. Ordered so dev-mode output and tests are deterministic per
/// partial (the Collector's overall ordering is arrival order, not this).
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Partial(BTreeMap<String, Number>);

impl Partial {
    pub fn new(map: BTreeMap<String, Number>) -> Self {
        Self(map)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Number)> {
        self.0.iter()
    }

    pub fn get(&self, key: &str) -> Option<Number> {
        self.0.get(key).copied()
    }

    /// Multiply every value by `weight`, producing a new Partial. The
    /// source Partial is never mutated (invariant 5 in the data model).
    pub fn scale(&self, weight: Number) -> Partial {
        let scaled = self
            .0
            .iter()
            .map(|(k, v)| (k.clone(), v.mul(weight)))
            .collect();
        Partial(scaled)
    }
}

impl IntoIterator for Partial {
    type Item = (String, Number);
    type IntoIter = std::collections::btree_map::IntoIter<String, Number>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
