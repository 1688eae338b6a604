//! Multi-level parameter sweeps
//!
//! This crate expands nested parameter ranges into a cartesian product and
//! evaluates a function over the retained points. It supports:
//! - Linear, logarithmic, explicit and stochastic range descriptors
//! - Levels whose ranges depend on values chosen at outer levels
//! - A cached value grid, so stochastic draws replay across passes and runs
//! - Leaf masks combined with inclusive OR
//! - Sequential or worker-pool evaluation behind the same iterator
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use paramsweep::{RangeDescriptor, RangeSpec, StandardResolver, Sweep, SweepConfig};
//!
//! let config = SweepConfig::new(vec![
//!     RangeSpec::new().with("x", RangeDescriptor::values([0.0, 1.0])),
//!     RangeSpec::new().with("y", RangeDescriptor::linear(3.0, 4.0, 2)),
//! ])
//! .with_nprocs(Some(1));
//!
//! let mut sweep = Sweep::new(Arc::new(StandardResolver::new()), config)?
//!     .with_function(|params, _kwargs| Ok(params["x"] + params["y"]));
//!
//! for item in sweep.iter()? {
//!     let (index, output) = item?;
//!     println!("{index:?} -> {:?}", output.value());
//! }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod expand;
pub mod grid;
pub mod iter;
pub mod logging;
pub mod mask;
pub mod model;
pub mod progress;
pub mod resolver;
pub mod sweep;

#[cfg(test)]
mod tests;

pub use config::{SweepConfig, WorkerCount};
#[cfg(feature = "parallel")]
pub use dispatch::RayonDispatcher;
pub use dispatch::{DispatchJob, Dispatcher, ResultStream, SweepFn, Task, sweep_fn};
pub use error::{Result, SweepError};
pub use expand::{Expansion, RangeExpander};
pub use grid::{ParamGrid, SweepGrid};
pub use iter::{ExecutionMode, SweepIter, SweepOutput};
pub use logging::{LogConfig, LogRotation, init_logging};
pub use mask::{Mask, MaskSet};
pub use model::{Context, IndexTuple, Kwargs, ParamValue, Params, RangeDescriptor, RangeSpec};
pub use progress::SweepProgress;
pub use resolver::{RangeResolver, StandardResolver};
pub use sweep::Sweep;
