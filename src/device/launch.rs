//! Broadcasting kernels to partitions.

use super::Stream;
use crate::utils::{Parallelism, MIN_ITEMS_PER_THREAD};

/// One operation bound to the arguments of a single partition.
///
/// Kernels borrow their partition slices: inputs shared, outputs exclusive.
/// A kernel reads nothing outside its own partition besides scalar
/// parameters and per-device tables passed in explicitly.
pub trait Kernel: Send {
    /// Name used in launch logs.
    const NAME: &'static str;

    /// Number of elements the kernel iterates over.
    fn size(&self) -> usize;

    /// Execute on the current thread, using the pool if `parallelism` allows.
    fn run(self, parallelism: Parallelism);
}

/// Run one kernel per `(device, kernel)` pair on `stream`.
///
/// Callers build kernels only for non-empty partitions. Partitions are
/// independent, so they are run concurrently when the stream allows it;
/// each kernel additionally gets a parallelism hint corrected for its own
/// partition size.
pub fn launch_kernels<K, I>(stream: &Stream, kernels: I)
where
    K: Kernel,
    I: IntoIterator<Item = (usize, K)>,
{
    let kernels: Vec<(usize, K)> = kernels.into_iter().collect();
    if kernels.is_empty() {
        log::trace!("{}: no non-empty partitions on stream {}", K::NAME, stream.id());
        return;
    }

    let parallelism = stream.parallelism();
    let across_devices = parallelism.correct_for_workload(kernels.len(), 1);
    across_devices.maybe_par_for_each(kernels, |(device, kernel)| {
        let size = kernel.size();
        log::trace!(
            "{} on device {} (stream {}, {} elements)",
            K::NAME,
            device,
            stream.id(),
            size
        );
        kernel.run(parallelism.correct_for_workload(size, MIN_ITEMS_PER_THREAD));
    });
}
