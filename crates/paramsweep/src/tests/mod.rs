//! Integration tests for the sweep engine
//!
//! Tests are organized by topic:
//! - `expansion` - Level expansion, ordering and resolver errors
//! - `masks` - Leaf filtering through the engine
//! - `caching` - Grid reuse, invalidation and stochastic replay
//! - `iteration` - Sequential, parallel and custom dispatch passes
//! - `config` - Loading sweeps from YAML and JSON


use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::Result;
use crate::model::{Context, RangeDescriptor, RangeSpec};
use crate::resolver::{RangeResolver, StandardResolver};

/// Standard resolver that counts how often it is asked for values
pub(super) struct CountingResolver {
    inner: StandardResolver,
    calls: AtomicUsize,
}

impl CountingResolver {
    pub(super) fn seeded(seed: u64) -> Arc<Self> {
        Arc::new(Self {
            inner: StandardResolver::seeded(seed),
            calls: AtomicUsize::new(0),
        })
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RangeResolver for CountingResolver {
    fn resolve(&self, names: &[String], context: &Context) -> Result<BTreeMap<String, Vec<f64>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.resolve(names, context)
    }
}

pub(super) fn values(name: &str, values: &[f64]) -> RangeSpec {
    RangeSpec::new().with(name, RangeDescriptor::values(values.to_vec()))
}

/// The two-level grid used throughout: x in {0, 1}, y in {3, 4}
pub(super) fn xy_ranges() -> Vec<RangeSpec> {
    vec![values("x", &[0.0, 1.0]), values("y", &[3.0, 4.0])]
}
