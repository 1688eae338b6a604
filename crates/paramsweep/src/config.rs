//! Serializable sweep configuration and worker-count policy.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SweepError};
use crate::model::{Context, Kwargs, ParamValue, RangeSpec};

/// Declarative part of a sweep: what to expand and how to evaluate it.
///
/// Runtime collaborators (resolver, masks, function) live on
/// [`Sweep`](crate::Sweep).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Levels of the cartesian product, outermost first
    pub ranges: Vec<RangeSpec>,
    /// Background context the ranges are superimposed on
    #[serde(default)]
    pub params: Context,
    /// Extra keyword arguments for every function call
    #[serde(default)]
    pub function_kwargs: Kwargs,
    /// Worker count: positive fixes it, 0 or 1 disables parallelism,
    /// negative leaves that many cores free, unset uses every core
    #[serde(default)]
    pub nprocs: Option<i64>,
}

impl SweepConfig {
    pub fn new(ranges: Vec<RangeSpec>) -> Self {
        Self {
            ranges,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: Context) -> Self {
        self.params = params;
        self
    }

    /// Builder-style insert of a single background parameter
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_function_kwargs(mut self, kwargs: Kwargs) -> Self {
        self.function_kwargs = kwargs;
        self
    }

    #[must_use]
    pub fn with_nprocs(mut self, nprocs: Option<i64>) -> Self {
        self.nprocs = nprocs;
        self
    }

    #[must_use]
    pub fn levels(&self) -> usize {
        self.ranges.len()
    }

    /// Reject configurations that cannot be expanded.
    pub fn validate(&self) -> Result<()> {
        validate_ranges(&self.ranges)
    }

    #[must_use]
    pub fn worker_count(&self) -> WorkerCount {
        WorkerCount::from_nprocs(self.nprocs, WorkerCount::available())
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_saphyr::from_str(yaml)
            .map_err(|e| SweepError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_saphyr::to_string(self).map_err(|e| SweepError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl From<RangeSpec> for SweepConfig {
    fn from(spec: RangeSpec) -> Self {
        Self::new(vec![spec])
    }
}

impl From<Vec<RangeSpec>> for SweepConfig {
    fn from(ranges: Vec<RangeSpec>) -> Self {
        Self::new(ranges)
    }
}

/// Checks shared by construction and `set_ranges`.
pub(crate) fn validate_ranges(ranges: &[RangeSpec]) -> Result<()> {
    if ranges.is_empty() {
        return Err(SweepError::Config(
            "at least one range level is required".to_string(),
        ));
    }

    let mut seen: FxHashSet<&str> = FxHashSet::default();
    for (level, spec) in ranges.iter().enumerate() {
        if spec.is_empty() {
            return Err(SweepError::Config(format!(
                "range level {level} has no parameters"
            )));
        }
        for name in spec.names() {
            if !seen.insert(name) {
                return Err(SweepError::Config(format!(
                    "parameter `{name}` appears in more than one level (again at level {level})"
                )));
            }
        }
    }
    Ok(())
}

/// How many workers a pass may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerCount {
    /// Evaluate on the calling thread
    Sequential,
    /// Evaluate on a pool of this many workers
    Pool(usize),
}

impl WorkerCount {
    /// Apply the `nprocs` policy against `available` cores.
    #[must_use]
    pub fn from_nprocs(nprocs: Option<i64>, available: usize) -> Self {
        match nprocs {
            None => WorkerCount::Pool(available.max(1)),
            Some(0 | 1) => WorkerCount::Sequential,
            Some(n) if n > 1 => WorkerCount::Pool(usize::try_from(n).unwrap_or(usize::MAX)),
            Some(n) => {
                let reserved = usize::try_from(n.unsigned_abs()).unwrap_or(usize::MAX);
                WorkerCount::Pool(available.saturating_sub(reserved).max(1))
            }
        }
    }

    /// Cores reported by the OS, or 1 if unknown
    #[must_use]
    pub fn available() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}
