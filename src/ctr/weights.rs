//! Synthetic weights for unweighted datasets.
//!
//! When no per-sample weight is supplied every sample weighs 1, except an
//! optional tail of samples (ids `>= first_zero_index`) that receive CTR
//! values but must not contribute to the statistics.
//!
//! With the segment-start mask requested, the flag rides in the sign bit of
//! the weight (bit 31, as for tagged indices): `|w|` is the weight and
//! `is_sign_negative()` the flag.
//!
//! ```text
//! indices:  [S0, 1, S2, S5]    first_zero_index = 3
//! weights:  [-1,  1, -1, +0]
//! ```

use super::index::{index_of, is_segment_start, SEGMENT_START_FLAG};
use crate::device::{launch_kernels, DistributedBuffer, Kernel, Stream};
use crate::utils::Parallelism;

#[inline]
fn float_flag(flag: bool) -> f32 {
    if flag {
        1.0
    } else {
        0.0
    }
}

struct GatherTrivialWeightsKernel<'a> {
    indices: &'a [u32],
    dst: &'a mut [f32],
    first_zero_index: u32,
    write_segment_start_float_mask: bool,
}

impl Kernel for GatherTrivialWeightsKernel<'_> {
    const NAME: &'static str = "GatherTrivialWeights";

    fn size(&self) -> usize {
        self.indices.len()
    }

    fn run(self, parallelism: Parallelism) {
        let indices = self.indices;
        let first_zero_index = self.first_zero_index;
        let write_mask = self.write_segment_start_float_mask;
        parallelism.for_each_indexed_mut(&mut self.dst[..indices.len()], |i, out| {
            let word = indices[i];
            let weight = float_flag(index_of(word) < first_zero_index);
            *out = if write_mask {
                f32::from_bits(weight.to_bits() | (word & SEGMENT_START_FLAG))
            } else {
                weight
            };
        });
    }
}

struct WriteMaskKernel<'a> {
    indices: &'a [u32],
    dst: &'a mut [f32],
}

impl Kernel for WriteMaskKernel<'_> {
    const NAME: &'static str = "WriteMask";

    fn size(&self) -> usize {
        self.indices.len()
    }

    fn run(self, parallelism: Parallelism) {
        let indices = self.indices;
        parallelism.for_each_indexed_mut(&mut self.dst[..indices.len()], |i, out| {
            *out = float_flag(is_segment_start(indices[i]));
        });
    }
}

/// Unit weights gathered through `indices`, zero from `first_zero_index` on.
///
/// `dst[i]` is `1.0` if `indices[i] & INDEX_MASK < first_zero_index` and
/// `0.0` otherwise. With `write_segment_start_float_mask` the sign bit of
/// `dst[i]` is additionally set where `indices[i]` starts a segment, so
/// `dst[i].abs()` is still the weight and `dst[i].is_sign_negative()` the
/// flag (`-0.0` for a flagged sample in the zero tail).
///
/// # Panics
///
/// Panics if a `dst` partition is shorter than the matching `indices` one.
pub fn gather_trivial_weights(
    dst: &mut DistributedBuffer<f32>,
    indices: &DistributedBuffer<u32>,
    first_zero_index: u32,
    write_segment_start_float_mask: bool,
    stream: &Stream,
) {
    let kernels = dst
        .partitions_mut()
        .enumerate()
        .filter(|(device, _)| !indices.partition(*device).is_empty())
        .map(|(device, dst)| {
            (
                device,
                GatherTrivialWeightsKernel {
                    indices: indices.partition(device),
                    dst,
                    first_zero_index,
                    write_segment_start_float_mask,
                },
            )
        });
    launch_kernels(stream, kernels);
}

/// `dst[i] = 1.0` where `indices[i]` starts a segment, `0.0` elsewhere.
///
/// # Panics
///
/// Panics if a `dst` partition is shorter than the matching `indices` one.
pub fn write_float_mask(
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
                WriteMaskKernel {
                    indices: indices.partition(device),
                    dst,
                },
            )
        });
    launch_kernels(stream, kernels);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctr::index::tag;

    #[test]
    fn test_unit_weights_with_zero_tail() {
        let indices = DistributedBuffer::from_partitions(vec![vec![0u32, 1, 2, 3]]);
        let mut dst = DistributedBuffer::zeros(indices.mapping());
        gather_trivial_weights(&mut dst, &indices, 2, false, &Stream::sequential(0));
        assert_eq!(dst.to_vec(), vec![1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_unit_weights_ignore_flags() {
        let indices = DistributedBuffer::from_partitions(vec![vec![tag(3, true), tag(0, false)]]);
        let mut dst = DistributedBuffer::zeros(indices.mapping());
        gather_trivial_weights(&mut dst, &indices, 1, false, &Stream::sequential(0));
        assert_eq!(dst.to_vec(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_segment_start_mask_in_sign_bit() {
        let indices = DistributedBuffer::from_partitions(vec![vec![
            tag(0, true),
            tag(1, false),
            tag(5, true),
            tag(2, true),
        ]]);
        let mut dst = DistributedBuffer::zeros(indices.mapping());
        gather_trivial_weights(&mut dst, &indices, 3, true, &Stream::sequential(0));
        let dst = dst.to_vec();

        let weights: Vec<f32> = dst.iter().map(|w| w.abs()).collect();
        assert_eq!(weights, vec![1.0, 1.0, 0.0, 1.0]);
        let flags: Vec<bool> = dst.iter().map(|w| w.is_sign_negative()).collect();
        assert_eq!(flags, vec![true, false, true, true]);
    }

    #[test]
    fn test_segment_start_mask_keeps_unflagged_weights() {
        let indices = DistributedBuffer::from_partitions(vec![vec![
            tag(0, true),
            tag(1, false),
            tag(2, false),
        ]]);
        let mut dst = DistributedBuffer::zeros(indices.mapping());
        gather_trivial_weights(&mut dst, &indices, 10, true, &Stream::sequential(0));
        assert_eq!(dst.to_vec(), vec![-1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_write_float_mask() {
        let indices =
            DistributedBuffer::from_partitions(vec![vec![tag(0, true), tag(1, false)], vec![tag(0, true)]]);
        let mut dst = DistributedBuffer::filled(indices.mapping(), 7.0f32);
        write_float_mask(&indices, &mut dst, &Stream::sequential(0));
        assert_eq!(dst.to_vec(), vec![1.0, 0.0, 1.0]);
    }
}
