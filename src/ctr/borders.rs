//! Segment borders over sorted bin streams.
//!
//! After the caller sorts samples by bin, equal bins form contiguous runs
//! (segments). This module marks where segments start and extracts their
//! positions:
//!
//! 1. **Mark**: [`update_borders_mask`] sets the segment-start flag of each
//!    tagged index whose bin differs from its predecessor
//! 2. **Count**: [`count_segment_borders`] counts starts (or ends) per
//!    device, which sizes the destination of the next step
//! 3. **Extract**: [`extract_mask`] compacts the border positions
//!
//! ```text
//! bins:     [3, 3, 5, 5, 5, 9]
//! flags:    [S, -, S, -, -, S]
//! starts:   [0, 2, 5]
//! ends:     [1, 4, 5]
//! ```

use std::ops::Range;

use super::index::{index_of, is_segment_start, tag};
use crate::device::{launch_kernels, DistributedBuffer, Kernel, Mapping, Stream};
use crate::utils::Parallelism;

// =============================================================================
// Device kernels
// =============================================================================

/// Whether position `i` is a segment start (or end) under the flags of `indices`.
#[inline]
pub(crate) fn is_border(indices: &[u32], i: usize, start_segment: bool) -> bool {
    if start_segment {
        is_segment_start(indices[i])
    } else {
        i + 1 == indices.len() || is_segment_start(indices[i + 1])
    }
}

/// Ranges of the segments delimited by the flags of `indices`.
///
/// Position 0 always opens a segment, flagged or not.
pub(crate) fn segments(indices: &[u32]) -> impl Iterator<Item = Range<usize>> + '_ {
    let n = indices.len();
    let mut start = 0;
    std::iter::from_fn(move || {
        if start >= n {
            return None;
        }
        let end = (start + 1..n)
            .find(|&i| is_segment_start(indices[i]))
            .unwrap_or(n);
        let range = start..end;
        start = end;
        Some(range)
    })
}

struct UpdateBordersMaskKernel<'a> {
    bins: &'a [u32],
    prev_bins: Option<&'a [u32]>,
    indices: &'a mut [u32],
}

impl Kernel for UpdateBordersMaskKernel<'_> {
    const NAME: &'static str = "UpdateBordersMask";

    fn size(&self) -> usize {
        self.indices.len()
    }

    fn run(self, parallelism: Parallelism) {
        let bins = self.bins;
        let prev_bins = self.prev_bins;
        parallelism.for_each_indexed_mut(self.indices, |i, word| {
            let start = i == 0
                || bins[i] != bins[i - 1]
                || prev_bins.is_some_and(|prev| prev[i] != prev[i - 1]);
            *word = tag(index_of(*word), start);
        });
    }
}

struct CountBordersKernel<'a> {
    indices: &'a [u32],
    start_segment: bool,
    count: &'a mut usize,
}

impl Kernel for CountBordersKernel<'_> {
    const NAME: &'static str = "CountBorders";

    fn size(&self) -> usize {
        self.indices.len()
    }

    fn run(self, _parallelism: Parallelism) {
        let indices = self.indices;
        *self.count = (0..indices.len())
            .filter(|&i| is_border(indices, i, self.start_segment))
            .count();
    }
}

struct ExtractBorderMasksKernel<'a> {
    indices: &'a [u32],
    dst: &'a mut [u32],
    start_segment: bool,
}

impl Kernel for ExtractBorderMasksKernel<'_> {
    const NAME: &'static str = "ExtractBorderMasks";

    fn size(&self) -> usize {
        self.dst.len()
    }

    fn run(self, _parallelism: Parallelism) {
        let indices = self.indices;
        let positions = (0..indices.len())
            .filter(|&i| is_border(indices, i, self.start_segment))
            .map(|i| i as u32);
        for (slot, position) in self.dst.iter_mut().zip(positions) {
            *slot = position;
        }
    }
}

// =============================================================================
// Operations
// =============================================================================

fn launch_update_borders_mask(
    bins: &DistributedBuffer<u32>,
    prev_bins: Option<&DistributedBuffer<u32>>,
    indices: &mut DistributedBuffer<u32>,
    stream: &Stream,
) {
    let kernels = indices
        .partitions_mut()
        .enumerate()
        .filter(|(_, part)| !part.is_empty())
        .map(|(device, part)| {
            (
                device,
                UpdateBordersMaskKernel {
                    bins: bins.partition(device),
                    prev_bins: prev_bins.map(|prev| prev.partition(device)),
                    indices: part,
                },
            )
        });
    launch_kernels(stream, kernels);
}

/// Flag every position of `indices` that starts a new run of `bins`.
///
/// Position `i` gets the segment-start flag iff it is the first element of
/// its partition or `bins[i] != bins[i - 1]`; every other position has the
/// flag cleared. Index bits are preserved.
///
/// # Panics
///
/// Panics if a `bins` partition is shorter than the matching `indices` one.
pub fn update_borders_mask(
    bins: &DistributedBuffer<u32>,
    indices: &mut DistributedBuffer<u32>,
    stream: &Stream,
) {
    launch_update_borders_mask(bins, None, indices, stream);
}

/// Two-stream form of [`update_borders_mask`].
///
/// A position also starts a segment when `prev_bins[i] != prev_bins[i - 1]`,
/// so segments of a compound key are found without merging the keys first.
pub fn update_borders_mask_merged(
    bins: &DistributedBuffer<u32>,
    prev_bins: &DistributedBuffer<u32>,
    indices: &mut DistributedBuffer<u32>,
    stream: &Stream,
) {
    launch_update_borders_mask(bins, Some(prev_bins), indices, stream);
}

/// Number of segment starts (`start_segment = true`) or ends per device.
///
/// This is the counting phase for [`extract_mask`]; the result has one entry
/// per device, zero for empty partitions.
pub fn count_segment_borders(
    indices: &DistributedBuffer<u32>,
    start_segment: bool,
    stream: &Stream,
) -> Vec<usize> {
    let mut counts = vec![0usize; indices.device_count()];
    let kernels = counts
        .iter_mut()
        .enumerate()
        .filter(|(device, _)| !indices.partition(*device).is_empty())
        .map(|(device, count)| {
            (
                device,
                CountBordersKernel {
                    indices: indices.partition(device),
                    start_segment,
                    count,
                },
            )
        });
    launch_kernels(stream, kernels);
    counts
}

/// Mapping sized for the output of [`extract_mask`].
pub fn border_mapping(
    indices: &DistributedBuffer<u32>,
    start_segment: bool,
    stream: &Stream,
) -> Mapping {
    Mapping::from_sizes(count_segment_borders(indices, start_segment, stream))
}

/// Write the partition-local positions of segment starts or ends into `dst`.
///
/// With `start_segment = true` position `i` is emitted iff `indices[i]` is
/// flagged; otherwise iff it is the last position or `indices[i + 1]` is
/// flagged. Positions are written compactly in increasing order.
///
/// `dst` partitions must be sized by [`count_segment_borders`]. This is not
/// checked: surplus positions are dropped and surplus slots left untouched.
pub fn extract_mask(
    indices: &DistributedBuffer<u32>,
    dst: &mut DistributedBuffer<u32>,
    start_segment: bool,
    stream: &Stream,
) {
    let kernels = dst
        .partitions_mut()
        .enumerate()
        .filter(|(device, _)| !indices.partition(*device).is_empty())
        .map(|(device, dst)| {
            (
                device,
                ExtractBorderMasksKernel {
                    indices: indices.partition(device),
                    dst,
                    start_segment,
                },
            )
        });
    launch_kernels(stream, kernels);
}
