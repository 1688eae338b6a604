//! The sweep engine: configuration, collaborators, cached grid and passes.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::config::{SweepConfig, WorkerCount, validate_ranges};
use crate::dispatch::{DispatchJob, Dispatcher, SweepFn, Task};
use crate::error::Result;
use crate::expand::{Expansion, RangeExpander};
use crate::grid::ParamGrid;
use crate::iter::SweepIter;
use crate::mask::{Mask, MaskSet};
use crate::model::{Context, Kwargs, Params, RangeSpec};
use crate::progress::SweepProgress;
use crate::resolver::RangeResolver;

/// A multi-level parameter sweep.
///
/// Expansion is lazy: the grid is built on the first call to [`Sweep::iter`]
/// or [`Sweep::grid`] and kept until a change to the ranges or background
/// parameters invalidates it. Cached values are reused on later expansions,
/// which keeps stochastic ranges stable across passes.
pub struct Sweep<T = ()> {
    resolver: Arc<dyn RangeResolver>,
    config: SweepConfig,
    masks: MaskSet,
    function: Option<SweepFn<T>>,
    dispatcher: Option<Arc<dyn Dispatcher<T>>>,
    grid: Option<Arc<ParamGrid>>,
}

impl Sweep<()> {
    /// Create a sweep with no function; passes yield decoded parameters.
    pub fn new(resolver: Arc<dyn RangeResolver>, config: impl Into<SweepConfig>) -> Result<Self> {
        let config = config.into();
        config.validate()?;
        Ok(Self {
            resolver,
            config,
            masks: MaskSet::new(),
            function: None,
            dispatcher: None,
            grid: None,
        })
    }
}

impl<T> Sweep<T> {
    /// Attach the function evaluated at every retained point.
    ///
    /// A custom dispatcher is typed by the function's output, so it is
    /// dropped and must be set again afterwards.
    pub fn with_function<U, F>(self, function: F) -> Sweep<U>
    where
        F: Fn(&Params, &Kwargs) -> Result<U> + Send + Sync + 'static,
    {
        Sweep {
            resolver: self.resolver,
            config: self.config,
            masks: self.masks,
            function: Some(Arc::new(function)),
            dispatcher: None,
            grid: self.grid,
        }
    }

    #[must_use]
    pub fn with_mask(mut self, mask: Arc<dyn Mask>) -> Self {
        self.masks.push(mask);
        self
    }

    #[must_use]
    pub fn with_masks(mut self, masks: MaskSet) -> Self {
        self.masks = masks;
        self
    }

    /// Seed the cache with a previously computed grid
    #[must_use]
    pub fn with_grid(mut self, grid: ParamGrid) -> Self {
        self.grid = Some(Arc::new(grid));
        self
    }

    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn Dispatcher<T>>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn ranges(&self) -> &[RangeSpec] {
        &self.config.ranges
    }

    pub fn params(&self) -> &Context {
        &self.config.params
    }

    pub fn masks(&self) -> &MaskSet {
        &self.masks
    }

    pub fn function(&self) -> Option<&SweepFn<T>> {
        self.function.as_ref()
    }

    pub fn function_kwargs(&self) -> &Kwargs {
        &self.config.function_kwargs
    }

    pub fn nprocs(&self) -> Option<i64> {
        self.config.nprocs
    }

    pub fn resolver(&self) -> &Arc<dyn RangeResolver> {
        &self.resolver
    }

    pub fn dispatcher(&self) -> Option<&Arc<dyn Dispatcher<T>>> {
        self.dispatcher.as_ref()
    }

    /// The cached grid, if one has been built or supplied
    pub fn cached_grid(&self) -> Option<&Arc<ParamGrid>> {
        self.grid.as_ref()
    }

    /// Replace the ranges. The cached grid is discarded.
    pub fn set_ranges(&mut self, ranges: Vec<RangeSpec>) -> Result<()> {
        validate_ranges(&ranges)?;
        self.config.ranges = ranges;
        self.invalidate();
        Ok(())
    }

    /// Replace the background parameters. The cached grid is discarded.
    pub fn set_params(&mut self, params: Context) {
        self.config.params = params;
        self.invalidate();
    }

    pub fn set_masks(&mut self, masks: MaskSet) {
        self.masks = masks;
    }

    pub fn set_function(&mut self, function: Option<SweepFn<T>>) {
        self.function = function;
    }

    pub fn set_function_kwargs(&mut self, kwargs: Kwargs) {
        self.config.function_kwargs = kwargs;
    }

    pub fn set_nprocs(&mut self, nprocs: Option<i64>) {
        self.config.nprocs = nprocs;
    }

    pub fn set_grid(&mut self, grid: Option<ParamGrid>) {
        self.grid = grid.map(Arc::new);
    }

    pub fn set_dispatcher(&mut self, dispatcher: Option<Arc<dyn Dispatcher<T>>>) {
        self.dispatcher = dispatcher;
    }

    /// Swap the resolver. Cached values stay in use.
    pub fn set_resolver(&mut self, resolver: Arc<dyn RangeResolver>) {
        self.resolver = resolver;
    }

    /// Drop the cached grid so the next pass expands from scratch
    pub fn invalidate(&mut self) {
        if self.grid.take().is_some() {
            debug!("Discarded cached parameter grid");
        }
    }

    /// Expand the ranges on top of the cached grid without storing the result.
    pub fn expand(&self) -> Result<Expansion> {
        let cached = self.grid.as_deref().cloned();
        RangeExpander::new(self.resolver.as_ref(), &self.config.ranges, &self.masks)
            .expand(&self.config.params, cached)
    }

    /// The populated grid, expanding first if nothing is cached.
    pub fn grid(&mut self) -> Result<Arc<ParamGrid>> {
        if let Some(grid) = &self.grid {
            return Ok(Arc::clone(grid));
        }
        self.rebuild()
    }

    /// Expand again, reusing whatever the cache holds, and store the result.
    pub fn rebuild(&mut self) -> Result<Arc<ParamGrid>> {
        let Expansion { grid, .. } = self.expand()?;
        let grid = Arc::new(grid);
        self.grid = Some(Arc::clone(&grid));
        Ok(grid)
    }
}

impl<T: Send + 'static> Sweep<T> {
    /// Start a pass over every retained point.
    ///
    /// Expansion runs eagerly, so resolver and mask errors surface here.
    /// Function errors surface lazily as items of the returned iterator.
    pub fn iter(&mut self) -> Result<SweepIter<T>> {
        let Expansion { grid, indices } = self.expand()?;
        let grid = Arc::new(grid);
        self.grid = Some(Arc::clone(&grid));

        let kwargs = Arc::new(self.config.function_kwargs.clone());
        let workers = self.config.worker_count();

        let parallel = match (&self.function, workers) {
            (Some(function), WorkerCount::Pool(n)) => {
                self.effective_dispatcher().map(|d| (Arc::clone(function), n, d))
            }
            _ => None,
        };

        let Some((function, workers, dispatcher)) = parallel else {
            info!(points = indices.len(), "Starting sequential sweep pass");
            return Ok(SweepIter::sequential(
                grid,
                indices,
                self.function.clone(),
                kwargs,
            ));
        };

        let tasks = indices
            .into_iter()
            .map(|index| {
                let params = grid.decode(&index)?;
                Ok(Task { index, params })
            })
            .collect::<Result<Vec<_>>>()?;
        let total = tasks.len();
        let progress = SweepProgress::new(total);

        info!(points = total, workers, "Starting parallel sweep pass");
        let stream = dispatcher.iterate(DispatchJob {
            function,
            tasks,
            count_offset: 0,
            count_total: total,
            start_time: Instant::now(),
            base_kwargs: kwargs,
            workers,
            progress: progress.clone(),
        })?;

        Ok(SweepIter::dispatched(stream, workers, total, progress))
    }

    fn effective_dispatcher(&self) -> Option<Arc<dyn Dispatcher<T>>> {
        #[cfg(feature = "parallel")]
        let fallback: Option<Arc<dyn Dispatcher<T>>> =
            Some(Arc::new(crate::dispatch::RayonDispatcher));
        #[cfg(not(feature = "parallel"))]
        let fallback: Option<Arc<dyn Dispatcher<T>>> = None;

        self.dispatcher.clone().or(fallback)
    }
}

impl<T> std::fmt::Debug for Sweep<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sweep")
            .field("config", &self.config)
            .field("masks", &self.masks)
            .field("has_function", &self.function.is_some())
            .field("has_dispatcher", &self.dispatcher.is_some())
            .field("grid_shape", &self.grid.as_ref().map(|g| g.shape().to_vec()))
            .finish()
    }
}
