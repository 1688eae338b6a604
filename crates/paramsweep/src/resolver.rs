//! Turning range descriptors into concrete values.

use std::collections::BTreeMap;
use std::sync::Mutex;

use rand::SeedableRng;
use rand::distr::{Distribution, Uniform};
use rand::rngs::StdRng;

use crate::error::{Result, SweepError};
use crate::model::{Context, ParamValue, RangeDescriptor};

/// Resolves the named parameters of one level into value sequences.
///
/// Every sequence returned from a single call must have the same length, and
/// no value may be NaN for valid input.
pub trait RangeResolver: Send + Sync {
    fn resolve(&self, names: &[String], context: &Context) -> Result<BTreeMap<String, Vec<f64>>>;
}

/// Resolver for the built-in [`RangeDescriptor`] variants.
///
/// Stochastic descriptors draw from an internal RNG; use [`StandardResolver::seeded`]
/// for reproducible sampling.
#[derive(Debug)]
pub struct StandardResolver {
    rng: Mutex<StdRng>,
}

impl StandardResolver {
    /// Resolver seeded from the operating system
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn sample(&self, name: &str, descriptor: &RangeDescriptor) -> Result<Vec<f64>> {
        match descriptor {
            RangeDescriptor::Linear { start, stop, count } => Ok(linspace(*start, *stop, *count)),
            RangeDescriptor::Log { start, stop, count } => {
                if *start <= 0.0 || *stop <= 0.0 {
                    return Err(SweepError::Resolve(format!(
                        "log range for `{name}` needs positive bounds, got {start}..{stop}"
                    )));
                }
                Ok(linspace(start.ln(), stop.ln(), *count)
                    .into_iter()
                    .map(f64::exp)
                    .collect())
            }
            RangeDescriptor::Values { values } => Ok(values.clone()),
            RangeDescriptor::Uniform { low, high, count } => {
                let dist = Uniform::new(*low, *high).map_err(|e| {
                    SweepError::Resolve(format!("uniform range for `{name}`: {e}"))
                })?;
                let mut rng = self.lock_rng()?;
                Ok((0..*count).map(|_| dist.sample(&mut *rng)).collect())
            }
            RangeDescriptor::Normal {
                mean,
                std_dev,
                count,
            } => {
                let dist = rand_distr::Normal::new(*mean, *std_dev).map_err(|e| {
                    SweepError::Resolve(format!("normal range for `{name}`: {e}"))
                })?;
                let mut rng = self.lock_rng()?;
                Ok((0..*count).map(|_| dist.sample(&mut *rng)).collect())
            }
        }
    }

    fn lock_rng(&self) -> Result<std::sync::MutexGuard<'_, StdRng>> {
        self.rng
            .lock()
            .map_err(|_| SweepError::Resolve("resolver rng lock poisoned".to_string()))
    }
}

impl Default for StandardResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl RangeResolver for StandardResolver {
    fn resolve(&self, names: &[String], context: &Context) -> Result<BTreeMap<String, Vec<f64>>> {
        names
            .iter()
            .map(|name| {
                let values = match context.get(name) {
                    Some(ParamValue::Scalar(v)) => vec![*v],
                    Some(ParamValue::Range(descriptor)) => self.sample(name, descriptor)?,
                    None => {
                        return Err(SweepError::Resolve(format!(
                            "no range or value for parameter `{name}`"
                        )));
                    }
                };
                Ok((name.clone(), values))
            })
            .collect()
    }
}

/// `count` evenly spaced values from `start` to `stop` inclusive
fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (count - 1) as f64;
            (0..count).map(|i| start + step * i as f64).collect()
        }
    }
}
