//! Value types shared by every stage of a sweep.
//!
//! A sweep is described by an ordered list of [`RangeSpec`]s, one per level.
//! Each level maps parameter names to a [`RangeDescriptor`] which a
//! [`RangeResolver`](crate::resolver::RangeResolver) turns into concrete values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One index per level identifying a point in the cartesian product
pub type IndexTuple = Vec<usize>;

/// Parameter context handed to resolvers and masks
pub type Context = BTreeMap<String, ParamValue>;

/// Decoded parameter values for a single grid point
pub type Params = BTreeMap<String, f64>;

/// Fixed keyword arguments passed to the user function on every call
pub type Kwargs = serde_json::Map<String, serde_json::Value>;

/// Describes how a parameter's values are generated for one level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RangeDescriptor {
    /// `count` evenly spaced values from `start` to `stop` inclusive
    Linear { start: f64, stop: f64, count: usize },
    /// `count` geometrically spaced values from `start` to `stop` inclusive
    Log { start: f64, stop: f64, count: usize },
    /// An explicit sequence of values
    Values { values: Vec<f64> },
    /// `count` samples drawn uniformly from `[low, high)`
    Uniform { low: f64, high: f64, count: usize },
    /// `count` samples drawn from a normal distribution
    Normal { mean: f64, std_dev: f64, count: usize },
}

impl RangeDescriptor {
    pub fn linear(start: f64, stop: f64, count: usize) -> Self {
        Self::Linear { start, stop, count }
    }

    pub fn log(start: f64, stop: f64, count: usize) -> Self {
        Self::Log { start, stop, count }
    }

    pub fn values(values: impl Into<Vec<f64>>) -> Self {
        Self::Values {
            values: values.into(),
        }
    }

    pub fn uniform(low: f64, high: f64, count: usize) -> Self {
        Self::Uniform { low, high, count }
    }

    pub fn normal(mean: f64, std_dev: f64, count: usize) -> Self {
        Self::Normal {
            mean,
            std_dev,
            count,
        }
    }
}

/// A context entry: either a fixed scalar or a range still to be resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Scalar(f64),
    Range(RangeDescriptor),
}

impl ParamValue {
    #[must_use]
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            ParamValue::Scalar(v) => Some(*v),
            ParamValue::Range(_) => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Scalar(value)
    }
}

impl From<RangeDescriptor> for ParamValue {
    fn from(descriptor: RangeDescriptor) -> Self {
        ParamValue::Range(descriptor)
    }
}

/// The ranges swept together at one level of the cartesian product.
///
/// All parameters in a level advance in lockstep, so they must resolve to the
/// same number of values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RangeSpec(BTreeMap<String, RangeDescriptor>);

impl RangeSpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, descriptor: RangeDescriptor) -> Self {
        self.0.insert(name.into(), descriptor);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, descriptor: RangeDescriptor) {
        self.0.insert(name.into(), descriptor);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RangeDescriptor> {
        self.0.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RangeDescriptor)> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, RangeDescriptor)> for RangeSpec {
    fn from_iter<I: IntoIterator<Item = (S, RangeDescriptor)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_spec_names_sorted() {
        let spec = RangeSpec::new()
            .with("k", RangeDescriptor::linear(1.0, 2.0, 3))
            .with("a", RangeDescriptor::linear(0.0, 1.0, 3));
        let names: Vec<&str> = spec.names().collect();
        assert_eq!(names, vec!["a", "k"]);
        assert_eq!(spec.len(), 2);
        assert!(spec.contains("k"));
    }

    #[test]
    fn test_param_value_json_forms() {
        let scalar: ParamValue = serde_json::from_str("2.5").unwrap();
        assert_eq!(scalar, ParamValue::Scalar(2.5));

        let range: ParamValue =
            serde_json::from_str(r#"{"kind":"linear","start":0.0,"stop":1.0,"count":2}"#).unwrap();
        assert_eq!(range, ParamValue::Range(RangeDescriptor::linear(0.0, 1.0, 2)));
    }
}
