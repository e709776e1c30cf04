//! Accumulation of binarized-target statistics.
//!
//! For `Borders` and `Buckets` CTRs the target is discretized to a byte. For
//! one border/bucket index at a time, each sample's weight is added to the
//! accumulator when its target matches. The accumulator is in sorted
//! order, so a sample's position identifies its segment; segment totals
//! are taken afterwards with [`segmented_totals`](super::segmented_totals)
//! or [`segmented_scan`](super::segmented_scan).

use super::CtrType;
use crate::device::{launch_kernels, DistributedBuffer, Kernel, Stream};
use crate::error::CtrError;
use crate::utils::Parallelism;

struct FillBinarizedTargetsStatsKernel<'a> {
    sample: &'a [u8],
    weights: &'a [f32],
    sums: &'a mut [f32],
    bin_index: u32,
    borders: bool,
}

impl Kernel for FillBinarizedTargetsStatsKernel<'_> {
    const NAME: &'static str = "FillBinarizedTargetsStats";

    fn size(&self) -> usize {
        self.weights.len()
    }

    fn run(self, parallelism: Parallelism) {
        let (sample, weights) = (self.sample, self.weights);
        let (bin_index, borders) = (self.bin_index, self.borders);
        let n = weights.len();
        parallelism.for_each_indexed_mut(&mut self.sums[..n], |i, sum| {
            let target = u32::from(sample[i]);
            let hit = if borders {
                target == bin_index
            } else {
                target >= bin_index
            };
            if hit {
                *sum += weights[i];
            }
        });
    }
}

/// Add `weights[i]` to `dst[i]` for every sample whose target matches `bin_index`.
///
/// Borders-based types match `target[i] == bin_index`; buckets-based types
/// match `target[i] >= bin_index`. `dst` accumulates: zero it before the
/// first call.
///
/// # Errors
///
/// Returns [`CtrError::NotBinarizedTargetCtr`] before dispatching anything if
/// `ctr_type` is not a binarized-target type.
///
/// # Panics
///
/// Panics if a `target` or `dst` partition is shorter than the matching
/// `weights` partition.
pub fn fill_binarized_targets_stats(
    target: &DistributedBuffer<u8>,
    weights: &DistributedBuffer<f32>,
    dst: &mut DistributedBuffer<f32>,
    bin_index: u32,
    ctr_type: CtrType,
    stream: &Stream,
) -> Result<(), CtrError> {
    if !ctr_type.is_binarized_target() {
        return Err(CtrError::NotBinarizedTargetCtr(ctr_type));
    }
    let borders = ctr_type.is_borders_based();

    let kernels = dst
        .partitions_mut()
        .enumerate()
        .filter(|(_, part)| !part.is_empty())
        .map(|(device, sums)| {
            (
                device,
                FillBinarizedTargetsStatsKernel {
                    sample: target.partition(device),
                    weights: weights.partition(device),
                    sums,
                    bin_index,
                    borders,
                },
            )
        });
    launch_kernels(stream, kernels);
    Ok(())
}
