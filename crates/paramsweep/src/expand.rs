//! Recursive range expansion.
//!
//! Levels are walked depth-first. At each level the resolver produces one
//! value sequence per parameter, the values are written into a [`ParamGrid`]
//! (which grows one dimension per level), and the walk recurses once per
//! value. Leaves that pass the masks are collected in outer-slowest order.
//!
//! A previously computed grid may be supplied. Any parameter whose slice under
//! the current prefix is fully computed is fed back to the resolver as an
//! explicit [`RangeDescriptor::Values`] override, so stochastic ranges replay
//! exactly. When every parameter of a level is cached the resolver is skipped.

use std::collections::BTreeMap;

use tracing::{debug, trace, warn};

use crate::error::{Result, SweepError};
use crate::grid::ParamGrid;
use crate::mask::MaskSet;
use crate::model::{Context, IndexTuple, ParamValue, RangeDescriptor, RangeSpec};
use crate::resolver::RangeResolver;

/// A populated grid together with the retained leaf indices.
#[derive(Debug, Clone, PartialEq)]
pub struct Expansion {
    pub grid: ParamGrid,
    pub indices: Vec<IndexTuple>,
}

pub struct RangeExpander<'a> {
    resolver: &'a dyn RangeResolver,
    ranges: &'a [RangeSpec],
    masks: &'a MaskSet,
}

impl<'a> RangeExpander<'a> {
    pub fn new(resolver: &'a dyn RangeResolver, ranges: &'a [RangeSpec], masks: &'a MaskSet) -> Self {
        Self {
            resolver,
            ranges,
            masks,
        }
    }

    /// Expand every level on top of the background `params`.
    ///
    /// `cached` is reused where it fits the ranges; a grid that cannot fit is
    /// discarded.
    pub fn expand(&self, params: &Context, cached: Option<ParamGrid>) -> Result<Expansion> {
        if self.ranges.is_empty() {
            return Err(SweepError::Config("at least one range level is required".to_string()));
        }

        let mut grid = match cached {
            Some(grid) if self.fits(&grid) => grid,
            Some(grid) => {
                warn!(
                    ndim = grid.ndim(),
                    levels = self.ranges.len(),
                    "Supplied grid does not match ranges, discarding"
                );
                ParamGrid::new()
            }
            None => ParamGrid::new(),
        };

        let mut prefix = IndexTuple::with_capacity(self.ranges.len());
        let mut indices = Vec::new();
        let mut stats = ExpandStats::default();

        self.expand_level(
            0,
            &mut prefix,
            params,
            &mut grid,
            &mut indices,
            &mut stats,
        )?;

        debug!(
            levels = self.ranges.len(),
            shape = ?grid.shape(),
            points = grid.total_points(),
            retained = indices.len(),
            resolver_calls = stats.resolver_calls,
            cached_lanes = stats.cached_lanes,
            "Expanded ranges"
        );

        Ok(Expansion { grid, indices })
    }

    /// Whether a supplied grid can be extended to these ranges.
    fn fits(&self, grid: &ParamGrid) -> bool {
        grid.is_consistent()
            && grid.ndim() <= self.ranges.len()
            && self.ranges[..grid.ndim()]
                .iter()
                .all(|spec| spec.names().all(|name| grid.has_field(name)))
    }

    fn expand_level(
        &self,
        level: usize,
        prefix: &mut IndexTuple,
        context: &Context,
        grid: &mut ParamGrid,
        indices: &mut Vec<IndexTuple>,
        stats: &mut ExpandStats,
    ) -> Result<()> {
        let spec = &self.ranges[level];
        let names: Vec<String> = spec.names().map(str::to_owned).collect();
        if names.is_empty() {
            return Err(SweepError::Config(format!("range level {level} has no parameters")));
        }

        let mut cached: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        if grid.ndim() == self.ranges.len() {
            for name in &names {
                if let Some(values) = grid.cached_lane(name, prefix) {
                    trace!(level, parameter = %name, ?prefix, "Reusing cached values");
                    cached.insert(name.clone(), values);
                }
            }
        }
        stats.cached_lanes += cached.len();

        let resolved = if cached.len() == names.len() {
            cached
        } else {
            let mut level_context = context.clone();
            level_context.extend(
                spec.iter()
                    .map(|(name, d)| (name.clone(), ParamValue::Range(d.clone()))),
            );
            level_context.extend(
                cached
                    .into_iter()
                    .map(|(name, values)| (name, ParamValue::Range(RangeDescriptor::Values { values }))),
            );
            stats.resolver_calls += 1;
            self.resolver.resolve(&names, &level_context)?
        };

        let columns = level_columns(level, &names, &resolved)?;
        let count = columns.first().map_or(0, |values| values.len());

        if grid.ndim() <= level {
            grid.extend(&names, count);
        } else if grid.shape()[level] != count {
            return Err(SweepError::GridMismatch {
                level,
                expected: count,
                found: grid.shape()[level],
            });
        }

        let is_leaf = level + 1 == self.ranges.len();
        for i in 0..count {
            prefix.push(i);

            // Each branch gets its own copy so siblings never see deeper values
            let mut branch = context.clone();
            for (name, values) in names.iter().zip(&columns) {
                let value = values[i];
                if value.is_nan() {
                    return Err(SweepError::InvalidValue {
                        parameter: name.clone(),
                        index: prefix.clone(),
                    });
                }
                grid.write(name, prefix, value)?;
                branch.insert(name.clone(), ParamValue::Scalar(value));
            }

            if !is_leaf {
                self.expand_level(level + 1, prefix, &branch, grid, indices, stats)?;
            } else if self.masks.accepts(prefix, self.ranges, &branch)? {
                indices.push(prefix.clone());
            }

            prefix.pop();
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
struct ExpandStats {
    resolver_calls: usize,
    cached_lanes: usize,
}

/// Resolved sequences in `names` order, checked for equal length.
fn level_columns<'r>(
    level: usize,
    names: &[String],
    resolved: &'r BTreeMap<String, Vec<f64>>,
) -> Result<Vec<&'r [f64]>> {
    let mut columns: Vec<&[f64]> = Vec::with_capacity(names.len());
    for name in names {
        let values = resolved.get(name).ok_or_else(|| {
            SweepError::Resolve(format!("resolver returned no values for `{name}` at level {level}"))
        })?;
        if let Some(first) = columns.first()
            && first.len() != values.len()
        {
            return Err(SweepError::InconsistentRange {
                level,
                parameter: name.clone(),
                expected: first.len(),
                found: values.len(),
            });
        }
        columns.push(values);
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::StandardResolver;

    fn level(name: &str, values: &[f64]) -> RangeSpec {
        RangeSpec::new().with(name, RangeDescriptor::values(values.to_vec()))
    }

    #[test]
    fn test_single_level() {
        let resolver = StandardResolver::seeded(0);
        let ranges = vec![RangeSpec::new().with("x", RangeDescriptor::linear(0.0, 10.0, 3))];
        let masks = MaskSet::new();
        let expansion = RangeExpander::new(&resolver, &ranges, &masks)
            .expand(&Context::new(), None)
            .unwrap();

        assert_eq!(expansion.indices, vec![vec![0], vec![1], vec![2]]);
        assert_eq!(expansion.grid.shape(), &[3]);
        assert_eq!(expansion.grid.get("x", &[1]), Some(5.0));
    }

    #[test]
    fn test_two_levels_cartesian() {
        let resolver = StandardResolver::seeded(0);
        let ranges = vec![level("x", &[0.0, 1.0]), level("y", &[3.0, 4.0])];
        let masks = MaskSet::new();
        let expansion = RangeExpander::new(&resolver, &ranges, &masks)
            .expand(&Context::new(), None)
            .unwrap();

        assert_eq!(
            expansion.indices,
            vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]
        );
        assert_eq!(expansion.grid.get("x", &[1, 0]), Some(1.0));
        assert_eq!(expansion.grid.get("y", &[1, 0]), Some(3.0));
        assert!(expansion.grid.is_complete());
    }

    #[test]
    fn test_inconsistent_level() {
        let resolver = StandardResolver::seeded(0);
        let ranges = vec![
            RangeSpec::new()
                .with("a", RangeDescriptor::linear(0.0, 1.0, 3))
                .with("b", RangeDescriptor::linear(0.0, 1.0, 2)),
        ];
        let masks = MaskSet::new();
        let err = RangeExpander::new(&resolver, &ranges, &masks)
            .expand(&Context::new(), None)
            .unwrap_err();

        match err {
            SweepError::InconsistentRange {
                level,
                parameter,
                expected,
                found,
            } => {
                assert_eq!(level, 0);
                assert_eq!(parameter, "b");
                assert_eq!(expected, 3);
                assert_eq!(found, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_ranges_rejected() {
        let resolver = StandardResolver::seeded(0);
        let masks = MaskSet::new();
        let err = RangeExpander::new(&resolver, &[], &masks)
            .expand(&Context::new(), None)
            .unwrap_err();
        assert!(matches!(err, SweepError::Config(_)));
    }

    #[test]
    fn test_level_sees_outer_values_in_context() {
        let resolver = StandardResolver::seeded(0);
        let ranges = vec![level("x", &[1.0, 2.0]), level("y", &[0.0])];
        let masks = MaskSet::new().with(crate::mask::predicate(|_, _, params| {
            params.get("x").and_then(ParamValue::as_scalar) == Some(2.0)
                && params.get("bg").and_then(ParamValue::as_scalar) == Some(9.0)
        }));
        let background = Context::from([("bg".to_string(), ParamValue::Scalar(9.0))]);
        let expansion = RangeExpander::new(&resolver, &ranges, &masks)
            .expand(&background, None)
            .unwrap();
        assert_eq!(expansion.indices, vec![vec![1, 0]]);
        assert!(!expansion.grid.has_field("bg"));
    }

    #[test]
    fn test_mismatched_cached_grid_discarded() {
        let resolver = StandardResolver::seeded(0);
        let masks = MaskSet::new();
        let other = vec![level("q", &[1.0, 2.0])];
        let stale = RangeExpander::new(&resolver, &other, &masks)
            .expand(&Context::new(), None)
            .unwrap()
            .grid;

        let ranges = vec![level("x", &[0.0, 1.0, 2.0])];
        let expansion = RangeExpander::new(&resolver, &ranges, &masks)
            .expand(&Context::new(), Some(stale))
            .unwrap();
        assert_eq!(expansion.grid.fields(), &["x".to_string()]);
        assert_eq!(expansion.indices.len(), 3);
    }
}
