//! Frequency CTRs.
//!
//! Two paths compute a smoothed frequency-of-occurrence per output position:
//!
//! - **Weighted**: per-bin accumulated weights `bin_sums` against a total
//!   weight
//! - **Unweighted**: per-bin counts read from CSR offsets
//!   (`offsets[bin + 1] - offsets[bin]`) against the total sample count
//!
//! Both optionally gather the bin through an index map first. Whether they
//! do is decided by the [`IndexSource`] type at compile time.

use super::index::{Identity, IndexSource, IndexView};
use super::Prior;
use crate::device::{launch_kernels, DistributedBuffer, Kernel, Stream};
use crate::utils::Parallelism;

// =============================================================================
// Kernels
// =============================================================================

/// Weighted bin frequency over one partition.
pub(crate) struct ComputeWeightedBinFreqCtrKernel<'a, I: IndexView> {
    pub(crate) indices: I,
    pub(crate) bins: &'a [u32],
    pub(crate) bin_sums: &'a [f32],
    pub(crate) total_weight: f32,
    pub(crate) prior: Prior,
    pub(crate) dst: &'a mut [f32],
}

impl<I: IndexView> Kernel for ComputeWeightedBinFreqCtrKernel<'_, I> {
    const NAME: &'static str = "ComputeWeightedBinFreqCtr";

    fn size(&self) -> usize {
        self.dst.len()
    }

    fn run(self, parallelism: Parallelism) {
        let (indices, bins, bin_sums) = (self.indices, self.bins, self.bin_sums);
        let (total_weight, prior) = (self.total_weight, self.prior);
        parallelism.for_each_indexed_mut(self.dst, |i, out| {
            let bin = bins[indices.gather(i)] as usize;
            *out = prior.smooth(bin_sums[bin], total_weight);
        });
    }
}

struct ComputeNonWeightedBinFreqCtrKernel<'a, I: IndexView> {
    indices: I,
    bins: &'a [u32],
    offsets: &'a [u32],
    prior: Prior,
    dst: &'a mut [f32],
}

impl<I: IndexView> Kernel for ComputeNonWeightedBinFreqCtrKernel<'_, I> {
    const NAME: &'static str = "ComputeNonWeightedBinFreqCtr";

    fn size(&self) -> usize {
        self.dst.len()
    }

    fn run(self, parallelism: Parallelism) {
        let (indices, bins, offsets, prior) = (self.indices, self.bins, self.offsets, self.prior);
        let total = offsets.last().copied().unwrap_or(0) as f32;
        parallelism.for_each_indexed_mut(self.dst, |i, out| {
            let bin = bins[indices.gather(i)] as usize;
            let count = offsets[bin + 1] - offsets[bin];
            *out = prior.smooth(count as f32, total);
        });
    }
}

// =============================================================================
// Operations
// =============================================================================

/// Weighted frequency CTR, gathering bins through `indices`.
///
/// For each `i < dst.len()`: `bin = bins[gather(i)]` and
/// `dst[i] = (bin_sums[bin] + prior.shift()) / (total_weight + prior_observations)`.
///
/// `bin_sums` is a per-bin table on every device that holds output, usually
/// with a mirrored [`Mapping`](crate::device::Mapping).
///
/// # Panics
///
/// Panics if a gathered position or a bin is outside its table.
pub fn compute_weighted_bin_freq_ctr<S: IndexSource>(
    indices: &S,
    bins: &DistributedBuffer<u32>,
    bin_sums: &DistributedBuffer<f32>,
    total_weight: f32,
    prior: Prior,
    dst: &mut DistributedBuffer<f32>,
    stream: &Stream,
) {
    let kernels = dst
        .partitions_mut()
        .enumerate()
        .filter(|(_, part)| !part.is_empty())
        .map(|(device, dst)| {
            (
                device,
                ComputeWeightedBinFreqCtrKernel {
                    indices: indices.view(device),
                    bins: bins.partition(device),
                    bin_sums: bin_sums.partition(device),
                    total_weight,
                    prior,
                    dst,
                },
            )
        });
    launch_kernels(stream, kernels);
}

/// Weighted frequency CTR without an index map: `bin = bins[i]`.
pub fn compute_bin_freq_ctr(
    bins: &DistributedBuffer<u32>,
    bin_sums: &DistributedBuffer<f32>,
    total_weight: f32,
    prior: Prior,
    dst: &mut DistributedBuffer<f32>,
    stream: &Stream,
) {
    compute_weighted_bin_freq_ctr(&Identity, bins, bin_sums, total_weight, prior, dst, stream);
}

/// Unweighted frequency CTR from CSR bin offsets.
///
/// For each `i < dst.len()`: `bin = bins[gather(i)]`,
/// `count = offsets[bin + 1] - offsets[bin]` and
/// `dst[i] = (count + prior.shift()) / (total + prior_observations)`, where
/// `total` is the last offset of the device's table (the sample count).
///
/// # Panics
///
/// Panics if a gathered position or `bin + 1` is outside its table.
pub fn compute_non_weighted_bin_freq_ctr<S: IndexSource>(
    indices: &S,
    bins: &DistributedBuffer<u32>,
    bin_offsets: &DistributedBuffer<u32>,
    prior: Prior,
    dst: &mut DistributedBuffer<f32>,
    stream: &Stream,
) {
    let kernels = dst
        .partitions_mut()
        .enumerate()
        .filter(|(_, part)| !part.is_empty())
        .map(|(device, dst)| {
            (
                device,
                ComputeNonWeightedBinFreqCtrKernel {
                    indices: indices.view(device),
                    bins: bins.partition(device),
                    offsets: bin_offsets.partition(device),
                    prior,
                    dst,
                },
            )
        });
    launch_kernels(stream, kernels);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_weighted_identity() {
        let bins = DistributedBuffer::from_partitions(vec![vec![0u32, 1]]);
        let bin_sums = DistributedBuffer::from_partitions(vec![vec![3.0f32, 1.0]]);
        let mut dst = DistributedBuffer::zeros(bins.mapping());
        compute_bin_freq_ctr(
            &bins,
            &bin_sums,
            10.0,
            Prior::new(0.0, 2.0),
            &mut dst,
            &Stream::sequential(0),
        );
        let dst = dst.to_vec();
        assert_abs_diff_eq!(dst[0], 0.25, epsilon = 1e-7);
        assert_abs_diff_eq!(dst[1], 1.0 / 12.0, epsilon = 1e-7);
    }

    #[test]
    fn test_weighted_gather() {
        let bins = DistributedBuffer::from_partitions(vec![vec![0u32, 1, 1]]);
        let indices = DistributedBuffer::from_partitions(vec![vec![2u32, 0]]);
        let bin_sums = DistributedBuffer::from_partitions(vec![vec![1.0f32, 2.0]]);
        let mut dst = DistributedBuffer::from_partitions(vec![vec![0.0f32; 2]]);
        compute_weighted_bin_freq_ctr(
            &indices,
            &bins,
            &bin_sums,
            3.0,
            Prior::new(0.0, 1.0),
            &mut dst,
            &Stream::sequential(0),
        );
        assert_eq!(dst.to_vec(), vec![0.5, 0.25]);
    }

    #[test]
    fn test_non_weighted_offsets() {
        let bins = DistributedBuffer::from_partitions(vec![vec![0u32, 1]]);
        let offsets = DistributedBuffer::from_partitions(vec![vec![0u32, 2, 5]]);
        let mut dst = DistributedBuffer::zeros(bins.mapping());
        compute_non_weighted_bin_freq_ctr(
            &Identity,
            &bins,
            &offsets,
            Prior::new(0.0, 1.0),
            &mut dst,
            &Stream::sequential(0),
        );
        let dst = dst.to_vec();
        assert_abs_diff_eq!(dst[0], 2.0 / 6.0, epsilon = 1e-7);
        assert_abs_diff_eq!(dst[1], 0.5, epsilon = 1e-7);
    }

    #[test]
    fn test_non_weighted_per_sample_gather() {
        // Sorted bins [0, 0, 1, 1, 1]; samples in original order point into them.
        let bins = DistributedBuffer::from_partitions(vec![vec![0u32, 0, 1, 1, 1]]);
        let offsets = DistributedBuffer::from_partitions(vec![vec![0u32, 2, 5]]);
        let inverse = DistributedBuffer::from_partitions(vec![vec![4u32, 0, 2, 1, 3]]);
        let mut dst = DistributedBuffer::zeros(bins.mapping());
        compute_non_weighted_bin_freq_ctr(
            &inverse,
            &bins,
            &offsets,
            Prior::new(0.5, 2.0),
            &mut dst,
            &Stream::sequential(0),
        );
        let expected_small = (2.0 + 1.0) / 7.0;
        let expected_large = (3.0 + 1.0) / 7.0;
        let dst = dst.to_vec();
        for (value, expected) in dst.iter().zip([
            expected_large,
            expected_small,
            expected_large,
            expected_small,
            expected_large,
        ]) {
            assert_abs_diff_eq!(*value, expected, epsilon = 1e-6);
        }
    }
}
