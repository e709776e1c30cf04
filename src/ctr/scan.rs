//! Segmented scans and reductions.
//!
//! Segments are delimited by the segment-start flags of a tagged index
//! buffer (see [`update_borders_mask`](super::update_borders_mask)). Sums
//! are accumulated in `f64` and stored as `f32`, so long segments do not
//! drift.
//!
//! ```text
//! values:      [1, 2, 3, 4, 5]
//! flags:       [S, -, S, -, -]
//! inclusive:   [1, 3, 3, 7, 12]
//! exclusive:   [0, 1, 0, 3, 7]
//! totals:      [3, 3, 12, 12, 12]
//! segment ids: [0, 0, 1, 1, 1]
//! sums:        [3, 12]
//! ```

use super::borders::segments;
use crate::device::{launch_kernels, DistributedBuffer, Kernel, Stream};
use crate::utils::Parallelism;

#[inline]
fn segment_total(values: &[f32]) -> f64 {
    values.iter().map(|&v| f64::from(v)).sum()
}

// =============================================================================
// Kernels
// =============================================================================

struct SegmentedScanKernel<'a> {
    values: &'a [f32],
    indices: &'a [u32],
    dst: &'a mut [f32],
    inclusive: bool,
}

impl Kernel for SegmentedScanKernel<'_> {
    const NAME: &'static str = "SegmentedScan";

    fn size(&self) -> usize {
        self.indices.len()
    }

    fn run(self, _parallelism: Parallelism) {
        for range in segments(self.indices) {
            let mut acc = 0.0f64;
            for i in range {
                let value = f64::from(self.values[i]);
                if self.inclusive {
                    acc += value;
                    self.dst[i] = acc as f32;
                } else {
                    self.dst[i] = acc as f32;
                    acc += value;
                }
            }
        }
    }
}

struct SegmentedTotalsKernel<'a> {
    values: &'a [f32],
    indices: &'a [u32],
    dst: &'a mut [f32],
}

impl Kernel for SegmentedTotalsKernel<'_> {
    const NAME: &'static str = "SegmentedTotals";

    fn size(&self) -> usize {
        self.indices.len()
    }

    fn run(self, _parallelism: Parallelism) {
        for range in segments(self.indices) {
            let total = segment_total(&self.values[range.clone()]) as f32;
            self.dst[range].fill(total);
        }
    }
}

struct SegmentIdsKernel<'a> {
    indices: &'a [u32],
    dst: &'a mut [u32],
}

impl Kernel for SegmentIdsKernel<'_> {
    const NAME: &'static str = "SegmentIds";

    fn size(&self) -> usize {
        self.indices.len()
    }

    fn run(self, _parallelism: Parallelism) {
        for (id, range) in segments(self.indices).enumerate() {
            self.dst[range].fill(id as u32);
        }
    }
}

struct SegmentSumsKernel<'a> {
    values: &'a [f32],
    indices: &'a [u32],
    dst: &'a mut [f32],
}

impl Kernel for SegmentSumsKernel<'_> {
    const NAME: &'static str = "SegmentSums";

    fn size(&self) -> usize {
        self.dst.len()
    }

    fn run(self, _parallelism: Parallelism) {
        for (slot, range) in self.dst.iter_mut().zip(segments(self.indices)) {
            *slot = segment_total(&self.values[range]) as f32;
        }
    }
}

// =============================================================================
// Operations
// =============================================================================

/// Prefix sums of `values` restarting at every segment start.
///
/// The inclusive scan includes position `i`; the exclusive scan sums only
/// the positions of the segment strictly before `i` (0 at segment starts).
///
/// # Panics
///
/// Panics if a `values` or `dst` partition is shorter than the matching
/// `indices` one.
pub fn segmented_scan(
    values: &DistributedBuffer<f32>,
    indices: &DistributedBuffer<u32>,
    dst: &mut DistributedBuffer<f32>,
    inclusive: bool,
    stream: &Stream,
) {
    let kernels = dst
        .partitions_mut()
        .enumerate()
        .filter(|(device, _)| !indices.partition(*device).is_empty())
        .map(|(device, dst)| {
            (
                device,
                SegmentedScanKernel {
                    values: values.partition(device),
                    indices: indices.partition(device),
                    dst,
                    inclusive,
                },
            )
        });
    launch_kernels(stream, kernels);
}

/// Write the total of its segment to every position.
pub fn segmented_totals(
    values: &DistributedBuffer<f32>,
    indices: &DistributedBuffer<u32>,
    dst: &mut DistributedBuffer<f32>,
    stream: &Stream,
) {
    let kernels = dst
        .partitions_mut()
        .enumerate()
        .filter(|(device, _)| !indices.partition(*device).is_empty())
        .map(|(device, dst)| {
            (
                device,
                SegmentedTotalsKernel {
                    values: values.partition(device),
                    indices: indices.partition(device),
                    dst,
                },
            )
        });
    launch_kernels(stream, kernels);
}

/// Write the 0-based, partition-local segment id of every position.
pub fn segment_ids(
    indices: &DistributedBuffer<u32>,
    dst: &mut DistributedBuffer<u32>,
    stream: &Stream,
) {
    let kernels = dst
        .partitions_mut()
        .enumerate()
        .filter(|(device, _)| !indices.partition(*device).is_empty())
        .map(|(device, dst)| {
            (
                device,
                SegmentIdsKernel {
                    indices: indices.partition(device),
                    dst,
                },
            )
        });
    launch_kernels(stream, kernels);
}

/// Compact per-segment totals of `values`.
///
/// `dst` partitions are sized by
/// [`count_segment_borders`](super::count_segment_borders); like
/// [`extract_mask`](super::extract_mask), the size is not checked.
pub fn segment_sums(
    values: &DistributedBuffer<f32>,
    indices: &DistributedBuffer<u32>,
    dst: &mut DistributedBuffer<f32>,
    stream: &Stream,
) {
    let kernels = dst
        .partitions_mut()
        .enumerate()
        .filter(|(device, _)| !indices.partition(*device).is_empty())
        .map(|(device, dst)| {
            (
                device,
                SegmentSumsKernel {
                    values: values.partition(device),
                    indices: indices.partition(device),
                    dst,
                },
            )
        });
    launch_kernels(stream, kernels);
}
