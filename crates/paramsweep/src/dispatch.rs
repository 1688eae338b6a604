//! Evaluating the user function over retained points on a worker pool.
//!
//! The engine hands a [`Dispatcher`] one [`Task`] per retained leaf. Each task
//! owns its decoded parameters, so workers share nothing mutable. Results come
//! back in completion order; no reordering is attempted.

use std::sync::Arc;
use std::time::Instant;

use crate::error::Result;
use crate::model::{IndexTuple, Kwargs, Params};
use crate::progress::SweepProgress;

/// User function evaluated at every retained point
pub type SweepFn<T> = Arc<dyn Fn(&Params, &Kwargs) -> Result<T> + Send + Sync>;

/// Wrap a closure as a [`SweepFn`].
pub fn sweep_fn<T, F>(f: F) -> SweepFn<T>
where
    F: Fn(&Params, &Kwargs) -> Result<T> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Stream of `(index, value)` results in the order the dispatcher emits them
pub type ResultStream<T> = Box<dyn Iterator<Item = Result<(IndexTuple, T)>> + Send>;

/// One unit of parallel work.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub index: IndexTuple,
    pub params: Params,
}

/// Everything a dispatcher needs to evaluate a pass.
pub struct DispatchJob<T> {
    pub function: SweepFn<T>,
    pub tasks: Vec<Task>,
    /// Points completed before this job, for progress reporting
    pub count_offset: usize,
    /// Total points across the whole sweep
    pub count_total: usize,
    pub start_time: Instant,
    /// Keyword arguments passed to every call
    pub base_kwargs: Arc<Kwargs>,
    /// Maximum concurrent workers
    pub workers: usize,
    pub progress: SweepProgress,
}

pub trait Dispatcher<T>: Send + Sync {
    fn iterate(&self, job: DispatchJob<T>) -> Result<ResultStream<T>>;
}

#[cfg(feature = "parallel")]
pub use rayon_pool::RayonDispatcher;

#[cfg(feature = "parallel")]
mod rayon_pool {
    use std::any::Any;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::mpsc::{Receiver, channel};

    use rayon::prelude::*;

    use super::{DispatchJob, Dispatcher, ResultStream, Task};
    use crate::error::{Result, SweepError};
    use crate::model::IndexTuple;
    use crate::progress::SweepProgress;

    /// Runs tasks on a dedicated rayon pool sized to the job's worker count.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct RayonDispatcher;

    impl<T: Send + 'static> Dispatcher<T> for RayonDispatcher {
        fn iterate(&self, job: DispatchJob<T>) -> Result<ResultStream<T>> {
            let DispatchJob {
                function,
                tasks,
                count_offset,
                count_total,
                start_time,
                base_kwargs,
                workers,
                progress,
            } = job;

            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers.max(1))
                .thread_name(|i| format!("paramsweep-worker-{i}"))
                .build()
                .map_err(|e| SweepError::Dispatch(e.to_string()))?;

            let (tx, rx) = channel();
            let worker_progress = progress.clone();
            pool.spawn(move || {
                tasks.into_par_iter().for_each_with(tx, |tx, task| {
                    if worker_progress.is_cancelled() {
                        return;
                    }
                    let Task { index, params } = task;
                    // A panicking call becomes an error item instead of aborting the pool
                    let call =
                        panic::catch_unwind(AssertUnwindSafe(|| function(&params, &*base_kwargs)));
                    let result = match call {
                        Ok(result) => result.map(|v| (index, v)),
                        Err(payload) => Err(SweepError::Function(format!(
                            "function panicked at {index:?}: {}",
                            panic_message(payload.as_ref())
                        ))),
                    };
                    worker_progress.record(count_offset, count_total, start_time);
                    if tx.send(result).is_err() {
                        worker_progress.cancel();
                    }
                });
            });

            Ok(Box::new(DispatchStream {
                rx,
                progress,
                _pool: pool,
            }))
        }
    }

    fn panic_message(payload: &(dyn Any + Send)) -> &str {
        payload
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("non-string panic payload")
    }

    /// Receiving end of a dispatched pass. Dropping it cancels pending tasks.
    struct DispatchStream<T> {
        rx: Receiver<Result<(IndexTuple, T)>>,
        progress: SweepProgress,
        _pool: rayon::ThreadPool,
    }

    impl<T> Iterator for DispatchStream<T> {
        type Item = Result<(IndexTuple, T)>;

        fn next(&mut self) -> Option<Self::Item> {
            self.rx.recv().ok()
        }
    }

    impl<T> Drop for DispatchStream<T> {
        fn drop(&mut self) {
            self.progress.cancel();
        }
    }
}
