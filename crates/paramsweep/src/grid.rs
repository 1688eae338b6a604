//! Growable N-dimensional storage for resolved sweep values.
//!
//! [`SweepGrid<T>`] is a dense row-major array with stride-based indexing.
//! [`ParamGrid`] layers named fields on top of it (one `SweepGrid<Option<f64>>`
//! per parameter), gaining a dimension each time a sweep level is expanded.
//! A `None` cell has not been computed yet.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SweepError};
use crate::model::{IndexTuple, Params};

/// N-dimensional grid storage with flat backing array and stride-based indexing.
///
/// Stores values in row-major order where the last dimension varies fastest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepGrid<T> {
    /// The data stored in row-major order
    data: Vec<T>,
    /// Shape of each dimension (e.g., [5, 10, 3] for a 5x10x3 grid)
    shape: Vec<usize>,
    /// Precomputed strides for index calculation
    strides: Vec<usize>,
}

impl<T: Clone> SweepGrid<T> {
    /// Create a new grid with the given shape, filled with `fill`.
    pub fn new(shape: Vec<usize>, fill: T) -> Self {
        let total_size: usize = shape.iter().product();
        let strides = compute_strides(&shape);
        Self {
            data: vec![fill; total_size],
            shape,
            strides,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Convert multi-dimensional indices to flat index
    pub fn flat_index(&self, indices: &[usize]) -> Option<usize> {
        if indices.len() != self.shape.len() {
            return None;
        }
        let mut flat = 0;
        for (i, (&idx, &size)) in indices.iter().zip(&self.shape).enumerate() {
            if idx >= size {
                return None;
            }
            flat += idx * self.strides[i];
        }
        Some(flat)
    }

    pub fn get(&self, indices: &[usize]) -> Option<&T> {
        self.flat_index(indices).map(|i| &self.data[i])
    }

    /// Flat range covered by every cell whose leading indices equal `prefix`.
    ///
    /// Row-major layout makes this block contiguous.
    pub fn block_range(&self, prefix: &[usize]) -> Option<Range<usize>> {
        if prefix.len() > self.shape.len() {
            return None;
        }
        let mut start = 0;
        for (i, (&idx, &size)) in prefix.iter().zip(&self.shape).enumerate() {
            if idx >= size {
                return None;
            }
            start += idx * self.strides[i];
        }
        let extent: usize = self.shape[prefix.len()..].iter().product();
        Some(start..start + extent)
    }

    /// The cells sharing `prefix`, in row-major order.
    pub fn block(&self, prefix: &[usize]) -> Option<&[T]> {
        self.block_range(prefix).map(|r| &self.data[r])
    }

    /// Assign `value` to every cell under `prefix`, broadcasting over the
    /// remaining dimensions.
    pub fn fill_block(&mut self, prefix: &[usize], value: T) -> bool {
        match self.block_range(prefix) {
            Some(range) => {
                self.data[range].fill(value);
                true
            }
            None => false,
        }
    }

    /// Values along the axis following `prefix`, with every deeper index at 0.
    pub fn lane(&self, prefix: &[usize]) -> Option<Vec<T>> {
        let axis = prefix.len();
        let extent = *self.shape.get(axis)?;
        let mut indices = prefix.to_vec();
        indices.resize(self.shape.len(), 0);
        (0..extent)
            .map(|i| {
                indices[axis] = i;
                self.get(&indices).cloned()
            })
            .collect()
    }

    /// Append a trailing dimension of `size`, replicating every existing
    /// cell across it.
    #[must_use]
    pub fn extend_axis(&self, size: usize) -> Self {
        let data = self
            .data
            .iter()
            .flat_map(|v| std::iter::repeat_n(v.clone(), size))
            .collect();
        let mut shape = self.shape.clone();
        shape.push(size);
        let strides = compute_strides(&shape);
        Self {
            data,
            shape,
            strides,
        }
    }

    /// Whether the backing data and strides agree with the shape, e.g. after
    /// deserializing an edited file.
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.shape.iter().product::<usize>()
            && self.strides == compute_strides(&self.shape)
    }
}

/// Compute strides for row-major order
fn compute_strides(shape: &[usize]) -> Vec<usize> {
    if shape.is_empty() {
        return Vec::new();
    }
    let mut strides = vec![1; shape.len()];
    for i in (0..shape.len() - 1).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

/// Structured cache of resolved parameter values, one dimension per level.
///
/// Every field shares the same shape. Fields are added when the level that
/// introduces them is expanded, starting out uncomputed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    shape: Vec<usize>,
    fields: Vec<String>,
    columns: Vec<SweepGrid<Option<f64>>>,
}

impl ParamGrid {
    /// An empty, zero-dimensional grid
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&SweepGrid<Option<f64>>> {
        self.position(name).map(|i| &self.columns[i])
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }

    /// Number of leaf cells
    #[must_use]
    pub fn total_points(&self) -> usize {
        if self.shape.is_empty() {
            0
        } else {
            self.shape.iter().product()
        }
    }

    /// Value of `field` at a full-depth `index`
    #[must_use]
    pub fn get(&self, field: &str, index: &[usize]) -> Option<f64> {
        self.column(field)?.get(index).copied().flatten()
    }

    /// Add a dimension of `size` for a new level.
    ///
    /// Existing columns are replicated across the new extent; columns for
    /// `labels` are (re)initialised to uncomputed.
    pub fn extend(&mut self, labels: &[String], size: usize) {
        for column in &mut self.columns {
            *column = column.extend_axis(size);
        }
        self.shape.push(size);

        for label in labels {
            let blank = SweepGrid::new(self.shape.clone(), None);
            match self.position(label) {
                Some(i) => self.columns[i] = blank,
                None => {
                    self.fields.push(label.clone());
                    self.columns.push(blank);
                }
            }
        }
    }

    /// Write `value` for `field` at `prefix`, broadcasting across the deeper
    /// dimensions.
    pub fn write(&mut self, field: &str, prefix: &[usize], value: f64) -> Result<()> {
        let i = self.position(field).ok_or_else(|| {
            SweepError::Config(format!("grid has no field `{field}`"))
        })?;
        if self.columns[i].fill_block(prefix, Some(value)) {
            Ok(())
        } else {
            Err(SweepError::Config(format!(
                "cannot write `{field}` at {prefix:?}: outside grid shape {:?}",
                self.shape
            )))
        }
    }

    /// Whether every column is well formed and matches the grid's shape.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.fields.len() == self.columns.len()
            && self
                .columns
                .iter()
                .all(|c| c.shape() == self.shape.as_slice() && c.is_well_formed())
    }

    /// Previously computed values of `field` along the axis after `prefix`.
    ///
    /// Returns `None` unless every cell under `prefix` has been computed.
    #[must_use]
    pub fn cached_lane(&self, field: &str, prefix: &[usize]) -> Option<Vec<f64>> {
        let column = self.column(field)?;
        if prefix.len() >= column.ndim() {
            return None;
        }
        if column.block(prefix)?.iter().any(Option::is_none) {
            return None;
        }
        column.lane(prefix)?.into_iter().collect()
    }

    /// Whether every cell of every field has been computed
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.columns
            .iter()
            .all(|c| c.data().iter().all(Option::is_some))
    }

    /// Parameter values at a full-depth `index`, one entry per field.
    pub fn decode(&self, index: &[usize]) -> Result<Params> {
        if index.len() != self.ndim() {
            return Err(SweepError::Config(format!(
                "index {index:?} has {} entries but the grid has {} dimensions",
                index.len(),
                self.ndim()
            )));
        }
        self.fields
            .iter()
            .zip(&self.columns)
            .map(|(name, column)| match column.get(index).copied().flatten() {
                Some(v) => Ok((name.clone(), v)),
                None => Err(SweepError::Uncomputed {
                    parameter: name.clone(),
                    index: IndexTuple::from(index),
                }),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_range_is_contiguous() {
        let grid = SweepGrid::new(vec![2, 3, 4], 0u8);
        assert_eq!(grid.block_range(&[]), Some(0..24));
        assert_eq!(grid.block_range(&[1]), Some(12..24));
        assert_eq!(grid.block_range(&[1, 2]), Some(20..24));
        assert_eq!(grid.block_range(&[1, 2, 3]), Some(23..24));
        assert_eq!(grid.block_range(&[2]), None);
    }

    #[test]
    fn test_extend_axis_repeats_each_cell() {
        let mut grid = SweepGrid::new(vec![2], 1);
        grid.fill_block(&[1], 2);
        let extended = grid.extend_axis(3);
        assert_eq!(extended.shape(), &[2, 3]);
        assert_eq!(extended.data(), &[1, 1, 1, 2, 2, 2]);
        assert_eq!(extended.get(&[1, 0]), Some(&2));
    }

    #[test]
    fn test_lane_reads_first_deeper_slice() {
        let mut grid = SweepGrid::new(vec![2, 3, 2], 0u32);
        for i in 0..2 {
            for j in 0..3 {
                for k in 0..2 {
                    grid.fill_block(&[i, j, k], (i * 6 + j * 2 + k) as u32);
                }
            }
        }
        assert_eq!(grid.lane(&[]), Some(vec![0, 6]));
        assert_eq!(grid.lane(&[1]), Some(vec![6, 8, 10]));
        assert_eq!(grid.lane(&[1, 2]), Some(vec![10, 11]));
    }

    #[test]
    fn test_param_grid_extend_and_write() {
        let mut grid = ParamGrid::new();
        grid.extend(&["x".to_string()], 2);
        grid.write("x", &[0], 0.0).unwrap();
        grid.write("x", &[1], 1.0).unwrap();
        grid.extend(&["y".to_string()], 2);

        assert_eq!(grid.shape(), &[2, 2]);
        assert_eq!(grid.get("x", &[1, 1]), Some(1.0));
        assert_eq!(grid.get("y", &[1, 1]), None);
        assert!(!grid.is_complete());

        grid.write("y", &[0, 0], 3.0).unwrap();
        grid.write("y", &[0, 1], 4.0).unwrap();
        grid.write("y", &[1, 0], 3.0).unwrap();
        grid.write("y", &[1, 1], 4.0).unwrap();
        assert!(grid.is_complete());

        let params = grid.decode(&[1, 0]).unwrap();
        assert_eq!(params, Params::from([("x".into(), 1.0), ("y".into(), 3.0)]));
    }

    #[test]
    fn test_write_broadcasts_over_deeper_dims() {
        let mut grid = ParamGrid::new();
        grid.extend(&["x".to_string()], 2);
        grid.extend(&["y".to_string()], 3);
        grid.write("x", &[1], 7.0).unwrap();
        for j in 0..3 {
            assert_eq!(grid.get("x", &[1, j]), Some(7.0));
            assert_eq!(grid.get("x", &[0, j]), None);
        }
    }

    #[test]
    fn test_cached_lane_requires_complete_block() {
        let mut grid = ParamGrid::new();
        grid.extend(&["x".to_string()], 2);
        grid.extend(&["y".to_string()], 2);
        grid.write("x", &[0], 0.5).unwrap();
        assert_eq!(grid.cached_lane("x", &[]), None);

        grid.write("x", &[1], 1.5).unwrap();
        assert_eq!(grid.cached_lane("x", &[]), Some(vec![0.5, 1.5]));

        grid.write("y", &[0, 0], 3.0).unwrap();
        assert_eq!(grid.cached_lane("y", &[0]), None);
        grid.write("y", &[0, 1], 4.0).unwrap();
        assert_eq!(grid.cached_lane("y", &[0]), Some(vec![3.0, 4.0]));
        assert_eq!(grid.cached_lane("y", &[1]), None);
    }

    #[test]
    fn test_decode_uncomputed_errors() {
        let mut grid = ParamGrid::new();
        grid.extend(&["x".to_string()], 2);
        let err = grid.decode(&[0]).unwrap_err();
        assert!(matches!(err, SweepError::Uncomputed { ref parameter, .. } if parameter == "x"));
    }

    #[test]
    fn test_write_outside_grid_errors() {
        let mut grid = ParamGrid::new();
        grid.extend(&["x".to_string()], 2);
        assert!(matches!(grid.write("y", &[0], 1.0), Err(SweepError::Config(_))));
        assert!(matches!(grid.write("x", &[2], 1.0), Err(SweepError::Config(_))));
    }

    #[test]
    fn test_edited_grid_is_inconsistent() {
        let json = r#"{"shape":[2],"fields":["x"],"columns":[{"data":[1.0],"shape":[1],"strides":[1]}]}"#;
        let grid: ParamGrid = serde_json::from_str(json).unwrap();
        assert!(!grid.is_consistent());

        let mut fresh = ParamGrid::new();
        fresh.extend(&["x".to_string()], 2);
        assert!(fresh.is_consistent());
    }
}
