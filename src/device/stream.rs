//! Execution streams.

use crate::utils::Parallelism;

/// Execution context for a launch.
///
/// Operations issued on one stream run in submission order. On the host a
/// launch completes before it returns, so results are visible immediately.
/// The stream id only tags log output; the [`Parallelism`] decides how the
/// partitions and their elements are scheduled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stream {
    id: u32,
    parallelism: Parallelism,
}

impl Default for Stream {
    /// Stream 0 with automatic parallelism.
    fn default() -> Self {
        Self::new(0)
    }
}

impl Stream {
    /// Stream `id` with automatic parallelism.
    pub fn new(id: u32) -> Self {
        Self {
            id,
            parallelism: Parallelism::from_threads(0),
        }
    }

    /// Stream `id` that never uses the thread pool.
    pub fn sequential(id: u32) -> Self {
        Self {
            id,
            parallelism: Parallelism::Sequential,
        }
    }

    /// Replace the parallelism hint.
    pub fn with_parallelism(self, parallelism: Parallelism) -> Self {
        Self {
            parallelism,
            ..self
        }
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn parallelism(&self) -> Parallelism {
        self.parallelism
    }
}
