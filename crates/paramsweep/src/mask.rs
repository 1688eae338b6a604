//! Leaf filtering predicates.
//!
//! Masks see the full index tuple, every level's ranges, and the context
//! accumulated down to the leaf. When several masks are configured a leaf is
//! kept if *any* of them accepts it.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::error::Result;
use crate::model::{Context, IndexTuple, RangeSpec};

pub trait Mask: Send + Sync {
    fn accept(&self, index: &[usize], ranges: &[RangeSpec], params: &Context) -> Result<bool>;
}

impl<F> Mask for F
where
    F: Fn(&[usize], &[RangeSpec], &Context) -> bool + Send + Sync,
{
    fn accept(&self, index: &[usize], ranges: &[RangeSpec], params: &Context) -> Result<bool> {
        Ok(self(index, ranges, params))
    }
}

/// Wrap an infallible closure as a shareable mask.
pub fn predicate<F>(f: F) -> Arc<dyn Mask>
where
    F: Fn(&[usize], &[RangeSpec], &Context) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Mask rejecting the given leaves, e.g. those already computed by an
/// earlier, interrupted run.
pub fn exclude(indices: impl IntoIterator<Item = IndexTuple>) -> Arc<dyn Mask> {
    let done: FxHashSet<IndexTuple> = indices.into_iter().collect();
    predicate(move |index, _, _| !done.contains(index))
}

/// Mask accepting only the given leaves.
pub fn only(indices: impl IntoIterator<Item = IndexTuple>) -> Arc<dyn Mask> {
    let keep: FxHashSet<IndexTuple> = indices.into_iter().collect();
    predicate(move |index, _, _| keep.contains(index))
}

/// The configured masks, combined with inclusive OR.
#[derive(Clone, Default)]
pub struct MaskSet {
    masks: Vec<Arc<dyn Mask>>,
}

impl MaskSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mask: Arc<dyn Mask>) {
        self.masks.push(mask);
    }

    #[must_use]
    pub fn with(mut self, mask: Arc<dyn Mask>) -> Self {
        self.masks.push(mask);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.masks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// Whether a leaf is retained.
    ///
    /// With no masks every leaf is kept. Otherwise every mask is evaluated and
    /// the leaf survives if at least one accepts; the first error wins.
    pub fn accepts(&self, index: &[usize], ranges: &[RangeSpec], params: &Context) -> Result<bool> {
        if self.masks.is_empty() {
            return Ok(true);
        }
        let mut accepted = false;
        for mask in &self.masks {
            accepted |= mask.accept(index, ranges, params)?;
        }
        Ok(accepted)
    }
}

impl fmt::Debug for MaskSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaskSet")
            .field("len", &self.masks.len())
            .finish()
    }
}

impl FromIterator<Arc<dyn Mask>> for MaskSet {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Mask>>>(iter: I) -> Self {
        Self {
            masks: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SweepError;

    struct Failing;

    impl Mask for Failing {
        fn accept(&self, _: &[usize], _: &[RangeSpec], _: &Context) -> Result<bool> {
            Err(SweepError::Mask("boom".to_string()))
        }
    }

    #[test]
    fn test_empty_set_accepts() {
        assert!(MaskSet::new().accepts(&[0], &[], &Context::new()).unwrap());
    }

    #[test]
    fn test_or_composition() {
        let set = MaskSet::new()
            .with(predicate(|_, _, _| false))
            .with(predicate(|index, _, _| index[0] == 1));
        let ctx = Context::new();
        assert!(!set.accepts(&[0], &[], &ctx).unwrap());
        assert!(set.accepts(&[1], &[], &ctx).unwrap());
    }

    #[test]
    fn test_errors_propagate_even_after_acceptance() {
        let set = MaskSet::new()
            .with(predicate(|_, _, _| true))
            .with(Arc::new(Failing));
        assert!(matches!(
            set.accepts(&[0], &[], &Context::new()),
            Err(SweepError::Mask(_))
        ));
    }

    #[test]
    fn test_exclude_and_only() {
        let ctx = Context::new();
        let skip = exclude([vec![0, 1]]);
        assert!(!skip.accept(&[0, 1], &[], &ctx).unwrap());
        assert!(skip.accept(&[1, 1], &[], &ctx).unwrap());

        let keep = only([vec![1, 0]]);
        assert!(keep.accept(&[1, 0], &[], &ctx).unwrap());
        assert!(!keep.accept(&[0, 0], &[], &ctx).unwrap());
    }
}
