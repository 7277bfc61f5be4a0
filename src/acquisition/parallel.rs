//! Batch evaluation over a fixed pool of scoped worker threads.

use crate::error::Result;

/// Distributes per-point work for one hyperparameter sample over workers.
///
/// The batch is split into contiguous chunks, one per worker, and every
/// worker processes its points in index order. Results come back in point
/// order. All workers finish before [`map_points`](Self::map_points)
/// returns, so switching to the next hyperparameter sample is a
/// synchronization point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParallelEvaluation {
    n_workers: usize,
}

impl ParallelEvaluation {
    /// Creates a pool description with `n_workers` threads (at least one).
    #[must_use]
    pub fn new(n_workers: usize) -> Self {
        Self {
            n_workers: n_workers.max(1),
        }
    }

    /// Number of worker threads.
    #[must_use]
    pub fn n_workers(&self) -> usize {
        self.n_workers
    }

    /// Apply `f` to every index in `0..n_points`, returning results in order.
    ///
    /// A batch of one point (or a single worker) runs on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns the error of the lowest-indexed chunk that failed.
    ///
    /// # Panics
    ///
    /// Re-raises a panic from any worker.
    pub fn map_points<R, F>(&self, n_points: usize, f: F) -> Result<Vec<R>>
    where
        R: Send,
        F: Fn(usize) -> Result<R> + Sync,
    {
        if n_points <= 1 || self.n_workers == 1 {
            return (0..n_points).map(f).collect();
        }

        let chunk = n_points.div_ceil(self.n_workers);
        trace_debug!(
            n_points,
            n_workers = self.n_workers,
            chunk,
            "dispatching batch to worker pool"
        );

        let f = &f;
        let chunks: Vec<Result<Vec<R>>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..n_points)
                .step_by(chunk)
                .map(|start| {
                    let end = (start + chunk).min(n_points);
                    s.spawn(move || (start..end).map(f).collect::<Result<Vec<R>>>())
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect()
        });

        let mut results = Vec::with_capacity(n_points);
        for part in chunks {
            results.extend(part?);
        }
        Ok(results)
    }
}

impl Default for ParallelEvaluation {
    fn default() -> Self {
        Self::new(4)
    }
}
