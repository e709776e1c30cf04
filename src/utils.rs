//! Parallelism configuration and thread pool setup.
//!
//! Kernels receive a [`Parallelism`] hint from the stream they are launched
//! on and downgrade it for small partitions, where spawning work on the pool
//! costs more than the element loop itself.

use rayon::prelude::*;

use crate::error::CtrError;

/// Minimum number of elements a worker should process before an elementwise
/// kernel goes parallel.
pub const MIN_ITEMS_PER_THREAD: usize = 4096;

// =============================================================================
// Parallelism Configuration
// =============================================================================

/// Parallelism strategy for kernel execution.
///
/// This is a *hint*: an elementwise kernel over a 100-element partition runs
/// sequentially even on a `Parallel(8)` stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Parallelism {
    /// Strictly sequential execution (no work is sent to the pool).
    #[default]
    Sequential,
    /// Allow parallel execution with up to `n` threads.
    ///
    /// If `n <= 1`, this is equivalent to `Sequential`.
    Parallel(usize),
}

impl Parallelism {
    /// Create a parallelism hint from a thread count.
    ///
    /// - `0` → rayon's current thread count
    /// - `1` → sequential
    /// - `n > 1` → parallel with n threads
    #[inline]
    pub fn from_threads(n_threads: usize) -> Self {
        match n_threads {
            0 => Self::Parallel(rayon::current_num_threads()),
            1 => Self::Sequential,
            n => Self::Parallel(n),
        }
    }

    /// Returns `true` if parallel execution is allowed.
    #[inline]
    pub fn allows_parallel(self) -> bool {
        matches!(self, Self::Parallel(n) if n > 1)
    }

    /// Returns the thread count hint (1 for sequential).
    #[inline]
    pub fn n_threads(self) -> usize {
        match self {
            Self::Sequential => 1,
            Self::Parallel(n) => n.max(1),
        }
    }

    /// Downgrade to sequential (or fewer threads) when the workload is small.
    #[inline]
    pub fn correct_for_workload(self, n_items: usize, min_items_per_thread: usize) -> Self {
        match self {
            Self::Sequential => Self::Sequential,
            Self::Parallel(n) => {
                let effective_threads = n.min(n_items / min_items_per_thread.max(1)).max(1);
                if effective_threads <= 1 {
                    Self::Sequential
                } else {
                    Self::Parallel(effective_threads)
                }
            }
        }
    }

    /// Consume `iter`, calling `f` on every item, on the pool if allowed.
    #[inline]
    pub fn maybe_par_for_each<T, I, F>(self, iter: I, f: F)
    where
        T: Send,
        I: IntoIterator<Item = T> + IntoParallelIterator<Item = T>,
        F: Fn(T) + Sync + Send,
    {
        if self.allows_parallel() {
            iter.into_par_iter().for_each(f);
        } else {
            iter.into_iter().for_each(f);
        }
    }

    /// Overwrite every element of `dst` with `f(position, &mut element)`.
    ///
    /// This is the shape of almost every CTR kernel: one output element per
    /// position, computed from read-only inputs at that position (and its
    /// immediate neighbours).
    #[inline]
    pub fn for_each_indexed_mut<T, F>(self, dst: &mut [T], f: F)
    where
        T: Send,
        F: Fn(usize, &mut T) + Sync + Send,
    {
        if self.allows_parallel() {
            dst.par_iter_mut()
                .enumerate()
                .for_each(|(i, out)| f(i, out));
        } else {
            dst.iter_mut().enumerate().for_each(|(i, out)| f(i, out));
        }
    }
}

// =============================================================================
// Thread Pool Setup
// =============================================================================

/// Run a closure inside a thread pool sized for `n_threads`.
///
/// Thread count semantics:
/// - `0` = auto (use all available cores)
/// - `1` = sequential (no thread pool)
/// - `n > 1` = use exactly `n` threads
///
/// The closure receives the [`Parallelism`] to put on its streams.
///
/// # Errors
///
/// Returns [`CtrError::ThreadPool`] if rayon cannot build the pool.
pub fn run_with_threads<T: Send>(
    n_threads: usize,
    f: impl FnOnce(Parallelism) -> T + Send,
) -> Result<T, CtrError> {
    match Parallelism::from_threads(n_threads) {
        Parallelism::Sequential => Ok(f(Parallelism::Sequential)),
        parallelism => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n_threads)
                .build()?;
            Ok(pool.install(|| f(parallelism)))
        }
    }
}
