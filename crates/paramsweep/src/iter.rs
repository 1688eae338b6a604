//! The lazy result sequence produced by [`Sweep::iter`](crate::Sweep::iter).

use std::sync::Arc;

use crate::dispatch::{ResultStream, SweepFn};
use crate::error::Result;
use crate::grid::ParamGrid;
use crate::model::{IndexTuple, Kwargs, Params};
use crate::progress::SweepProgress;

/// What a sweep yields for one retained point.
#[derive(Debug, Clone, PartialEq)]
pub enum SweepOutput<T> {
    /// Decoded parameters, when no function is configured
    Params(Params),
    /// The function's return value
    Value(T),
}

impl<T> SweepOutput<T> {
    #[must_use]
    pub fn params(&self) -> Option<&Params> {
        match self {
            SweepOutput::Params(p) => Some(p),
            SweepOutput::Value(_) => None,
        }
    }

    #[must_use]
    pub fn value(&self) -> Option<&T> {
        match self {
            SweepOutput::Params(_) => None,
            SweepOutput::Value(v) => Some(v),
        }
    }

    #[must_use]
    pub fn into_params(self) -> Option<Params> {
        match self {
            SweepOutput::Params(p) => Some(p),
            SweepOutput::Value(_) => None,
        }
    }

    #[must_use]
    pub fn into_value(self) -> Option<T> {
        match self {
            SweepOutput::Params(_) => None,
            SweepOutput::Value(v) => Some(v),
        }
    }
}

/// Execution model chosen when a pass starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Sequential,
    Parallel { workers: usize },
}

/// A single forward-only pass over a sweep.
///
/// Start a fresh pass with another call to `Sweep::iter`.
pub struct SweepIter<T> {
    inner: Pass<T>,
    mode: ExecutionMode,
    total: usize,
    progress: SweepProgress,
}

enum Pass<T> {
    Sequential(SequentialPass<T>),
    Dispatched(ResultStream<T>),
}

/// Decodes and evaluates one index at a time on the calling thread.
struct SequentialPass<T> {
    grid: Arc<ParamGrid>,
    indices: std::vec::IntoIter<IndexTuple>,
    function: Option<SweepFn<T>>,
    kwargs: Arc<Kwargs>,
    failed: bool,
}

impl<T> SweepIter<T> {
    pub(crate) fn sequential(
        grid: Arc<ParamGrid>,
        indices: Vec<IndexTuple>,
        function: Option<SweepFn<T>>,
        kwargs: Arc<Kwargs>,
    ) -> Self {
        let total = indices.len();
        Self {
            inner: Pass::Sequential(SequentialPass {
                grid,
                indices: indices.into_iter(),
                function,
                kwargs,
                failed: false,
            }),
            mode: ExecutionMode::Sequential,
            total,
            progress: SweepProgress::new(total),
        }
    }

    pub(crate) fn dispatched(
        stream: ResultStream<T>,
        workers: usize,
        total: usize,
        progress: SweepProgress,
    ) -> Self {
        Self {
            inner: Pass::Dispatched(stream),
            mode: ExecutionMode::Parallel { workers },
            total,
            progress,
        }
    }

    #[must_use]
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Number of retained points in this pass
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    #[must_use]
    pub fn progress(&self) -> &SweepProgress {
        &self.progress
    }
}

impl<T> Iterator for SweepIter<T> {
    type Item = Result<(IndexTuple, SweepOutput<T>)>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            Pass::Sequential(pass) => {
                // The first error ends the pass
                if pass.failed {
                    return None;
                }
                let index = pass.indices.next()?;
                let item = pass.evaluate(index);
                self.progress.increment();
                pass.failed = item.is_err();
                Some(item)
            }
            Pass::Dispatched(stream) => stream
                .next()
                .map(|r| r.map(|(index, value)| (index, SweepOutput::Value(value)))),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.inner {
            Pass::Sequential(pass) if pass.failed => (0, Some(0)),
            Pass::Sequential(pass) => (0, Some(pass.indices.len())),
            Pass::Dispatched(_) => (0, Some(self.total)),
        }
    }
}

impl<T> SequentialPass<T> {
    fn evaluate(&self, index: IndexTuple) -> Result<(IndexTuple, SweepOutput<T>)> {
        let params = self.grid.decode(&index)?;
        match &self.function {
            None => Ok((index, SweepOutput::Params(params))),
            Some(function) => {
                let value = function(&params, &*self.kwargs)?;
                Ok((index, SweepOutput::Value(value)))
            }
        }
    }
}
