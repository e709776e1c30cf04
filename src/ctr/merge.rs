//! Compound keys from several categorical features.
//!
//! A compound key packs the bins of several features into disjoint bit
//! ranges of one `u32`:
//!
//! ```text
//! bins      = 0b0000_0101          (feature A, 3 bits)
//! prev_bins = 0b0000_0010          (feature B, shifted by 3)
//! merged    = 0b0001_0101
//! ```
//!
//! The caller keeps the total bit width within 32 bits. Overflow is not
//! detected: bits shifted past bit 31 are lost and keys silently collide.

use crate::device::{launch_kernels, DistributedBuffer, Kernel, Stream};
use crate::utils::Parallelism;

struct MergeBitsKernel<'a> {
    bins: &'a mut [u32],
    current: &'a [u32],
    shift: u32,
}

impl Kernel for MergeBitsKernel<'_> {
    const NAME: &'static str = "MergeBits";

    fn size(&self) -> usize {
        self.bins.len()
    }

    fn run(self, parallelism: Parallelism) {
        let current = self.current;
        let shift = self.shift;
        parallelism.for_each_indexed_mut(self.bins, |i, bin| {
            *bin |= current[i].checked_shl(shift).unwrap_or(0);
        });
    }
}

/// `bins[i] |= prev_bins[i] << bit_shift` for every position.
///
/// A shift of 32 or more contributes nothing.
///
/// # Panics
///
/// Panics if a `prev_bins` partition is shorter than the matching `bins` one.
pub fn update_ctr_bins(
    bins: &mut DistributedBuffer<u32>,
    prev_bins: &DistributedBuffer<u32>,
    bit_shift: u32,
    stream: &Stream,
) {
    let kernels = bins
        .partitions_mut()
        .enumerate()
        .filter(|(_, part)| !part.is_empty())
        .map(|(device, part)| {
            (
                device,
                MergeBitsKernel {
                    bins: part,
                    current: prev_bins.partition(device),
                    shift: bit_shift,
                },
            )
        });
    launch_kernels(stream, kernels);
}

/// Bits needed to store bins `0..n_bins`.
///
/// The shift for the next feature of a compound key is the running sum of
/// this over the features already merged.
#[inline]
pub fn bits_for_bins(n_bins: u32) -> u32 {
    match n_bins {
        0 | 1 => 0,
        n => u32::BITS - (n - 1).leading_zeros(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_packs_bits() {
        let mut bins = DistributedBuffer::from_partitions(vec![vec![0b101, 0b001], vec![0b010]]);
        let prev = DistributedBuffer::from_partitions(vec![vec![0b10, 0b01], vec![0b11]]);
        update_ctr_bins(&mut bins, &prev, 3, &Stream::sequential(0));
        assert_eq!(bins.to_vec(), vec![0b10_101, 0b01_001, 0b11_010]);
    }

    #[test]
    fn test_merge_shift_zero_is_plain_or() {
        let mut bins = DistributedBuffer::from_partitions(vec![vec![0b1100, 0b0001]]);
        let prev = DistributedBuffer::from_partitions(vec![vec![0b0011, 0b0001]]);
        update_ctr_bins(&mut bins, &prev, 0, &Stream::sequential(0));
        assert_eq!(bins.to_vec(), vec![0b1111, 0b0001]);
    }

    #[test]
    fn test_merge_overflow_loses_bits() {
        let mut bins = DistributedBuffer::from_partitions(vec![vec![1, 1]]);
        let prev = DistributedBuffer::from_partitions(vec![vec![0b11, 5]]);
        update_ctr_bins(&mut bins, &prev, 31, &Stream::sequential(0));
        assert_eq!(bins.to_vec(), vec![1 | (1 << 31), 1 | (1 << 31)]);

        update_ctr_bins(&mut bins, &prev, 32, &Stream::sequential(0));
        assert_eq!(bins.to_vec(), vec![1 | (1 << 31), 1 | (1 << 31)]);
    }

    #[test]
    fn test_bits_for_bins() {
        assert_eq!(bits_for_bins(0), 0);
        assert_eq!(bits_for_bins(1), 0);
        assert_eq!(bits_for_bins(2), 1);
        assert_eq!(bits_for_bins(5), 3);
        assert_eq!(bits_for_bins(8), 3);
        assert_eq!(bits_for_bins(9), 4);
    }
}
