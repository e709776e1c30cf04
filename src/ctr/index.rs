//! Tagged indices and index sources.
//!
//! # Tagged index convention
//!
//! Index words carry a segment-start flag in bit 31; bits 0..=30 hold the
//! real (partition-local) index:
//!
//! ```text
//!  31 30                                   0
//! +--+--------------------------------------+
//! |S |               index                  |
//! +--+--------------------------------------+
//! ```
//!
//! The flag lives in bits no real index uses, so `word & INDEX_MASK`
//! recovers the index without a shift. This is what the `mask` argument of
//! [`divide_with_priors_and_scatter`](super::divide_with_priors_and_scatter)
//! is for.
//!
//! # Index sources
//!
//! Frequency kernels optionally gather through an index map. The choice is
//! made at compile time through [`IndexSource`]: a `DistributedBuffer<u32>`
//! gathers, [`Identity`] does not.

use crate::device::{launch_kernels, DistributedBuffer, Kernel, Mapping, Stream};
use crate::utils::Parallelism;

/// Segment-start flag bit of a tagged index.
pub const SEGMENT_START_FLAG: u32 = 1 << 31;

/// Mask selecting the real index of a tagged index.
pub const INDEX_MASK: u32 = !SEGMENT_START_FLAG;

/// Returns `true` if the word carries the segment-start flag.
#[inline]
pub fn is_segment_start(word: u32) -> bool {
    word & SEGMENT_START_FLAG != 0
}

/// Strip the flag bits from a tagged index.
#[inline]
pub fn index_of(word: u32) -> u32 {
    word & INDEX_MASK
}

/// Build a tagged index.
#[inline]
pub fn tag(index: u32, segment_start: bool) -> u32 {
    index_of(index) | if segment_start { SEGMENT_START_FLAG } else { 0 }
}

// =============================================================================
// Index sources
// =============================================================================

/// Per-partition index lookup.
pub trait IndexView: Copy + Send + Sync {
    /// Position to read for output position `i`.
    fn gather(&self, i: usize) -> usize;
}

/// No index map: output position `i` reads input position `i`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Identity;

impl IndexView for Identity {
    #[inline]
    fn gather(&self, i: usize) -> usize {
        i
    }
}

impl IndexView for &[u32] {
    #[inline]
    fn gather(&self, i: usize) -> usize {
        index_of(self[i]) as usize
    }
}

/// Something that yields an [`IndexView`] per device.
pub trait IndexSource {
    type View<'a>: IndexView
    where
        Self: 'a;

    fn view(&self, device: usize) -> Self::View<'_>;
}

impl IndexSource for Identity {
    type View<'a> = Identity;

    #[inline]
    fn view(&self, _device: usize) -> Identity {
        Identity
    }
}

impl IndexSource for DistributedBuffer<u32> {
    type View<'a> = &'a [u32];

    #[inline]
    fn view(&self, device: usize) -> &[u32] {
        self.partition(device)
    }
}

// =============================================================================
// Permutation helpers
// =============================================================================

/// Partition-local identity permutation `0..size` for every device.
pub fn sequence(mapping: &Mapping) -> DistributedBuffer<u32> {
    DistributedBuffer::from_partitions(
        mapping
            .sizes()
            .iter()
            .map(|&size| (0..size as u32).collect())
            .collect(),
    )
}

struct InvertPermutationKernel<'a> {
    indices: &'a [u32],
    dst: &'a mut [u32],
}

impl Kernel for InvertPermutationKernel<'_> {
    const NAME: &'static str = "InvertPermutation";

    fn size(&self) -> usize {
        self.indices.len()
    }

    fn run(self, _parallelism: Parallelism) {
        // Scatter through an arbitrary map: no disjointness to exploit.
        for (position, &word) in self.indices.iter().enumerate() {
            self.dst[index_of(word) as usize] = position as u32;
        }
    }
}

/// Write `dst[indices[i] & INDEX_MASK] = i` on every partition.
///
/// Turns a "sorted position -> sample" map into "sample -> sorted position".
///
/// # Panics
///
/// Panics if an index is outside its `dst` partition.
pub fn invert_permutation(
    indices: &DistributedBuffer<u32>,
    dst: &mut DistributedBuffer<u32>,
    stream: &Stream,
) {
    let kernels = dst
        .partitions_mut()
        .enumerate()
        .filter(|(device, _)| indices.mapping().size(*device) > 0)
        .map(|(device, dst)| {
            (
                device,
                InvertPermutationKernel {
                    indices: indices.partition(device),
                    dst,
                },
            )
        });
    launch_kernels(stream, kernels);
}

struct GatherKernel<'a, T> {
    src: &'a [T],
    indices: &'a [u32],
    dst: &'a mut [T],
}

impl<T: Copy + Send + Sync> Kernel for GatherKernel<'_, T> {
    const NAME: &'static str = "Gather";

    fn size(&self) -> usize {
        self.indices.len()
    }

    fn run(self, parallelism: Parallelism) {
        let (src, indices) = (self.src, self.indices);
        parallelism.for_each_indexed_mut(&mut self.dst[..indices.len()], |i, out| {
            *out = src[index_of(indices[i]) as usize];
        });
    }
}

/// Write `dst[i] = src[indices[i] & INDEX_MASK]` on every partition.
///
/// With sort indices this moves per-sample data into sorted order.
///
/// # Panics
///
/// Panics if an index is outside its `src` partition, or a `dst` partition
/// is shorter than the matching `indices` one.
pub fn gather<T: Copy + Send + Sync>(
    src: &DistributedBuffer<T>,
    indices: &DistributedBuffer<u32>,
    dst: &mut DistributedBuffer<T>,
    stream: &Stream,
) {
    let kernels = dst
        .partitions_mut()
        .enumerate()
        .filter(|(device, _)| indices.mapping().size(*device) > 0)
        .map(|(device, dst)| {
            (
                device,
                GatherKernel {
                    src: src.partition(device),
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

    #[test]
    fn test_tag_round_trip() {
        let word = tag(42, true);
        assert!(is_segment_start(word));
        assert_eq!(index_of(word), 42);
        assert_eq!(word & INDEX_MASK, 42);

        let word = tag(word, false);
        assert!(!is_segment_start(word));
        assert_eq!(word, 42);
    }

    #[test]
    fn test_mask_is_complement_of_flag() {
        assert_eq!(INDEX_MASK | SEGMENT_START_FLAG, u32::MAX);
        assert_eq!(INDEX_MASK & SEGMENT_START_FLAG, 0);
    }

    #[test]
    fn test_views() {
        let map: &[u32] = &[2, tag(0, true), 1];
        assert_eq!(map.gather(1), 0);
        assert_eq!(map.gather(0), 2);
        assert_eq!(Identity.gather(7), 7);
    }

    #[test]
    fn test_sequence_and_invert() {
        let mapping = Mapping::from_sizes(vec![3, 0, 2]);
        assert_eq!(sequence(&mapping).to_vec(), vec![0, 1, 2, 0, 1]);

        let indices =
            DistributedBuffer::from_partitions(vec![vec![2, tag(0, true), 1], vec![], vec![1, 0]]);
        let mut inverse = DistributedBuffer::zeros(&mapping);
        invert_permutation(&indices, &mut inverse, &Stream::sequential(0));
        assert_eq!(inverse.to_vec(), vec![1, 2, 0, 1, 0]);
    }

    #[test]
    fn test_gather_strips_flags() {
        let src = DistributedBuffer::from_partitions(vec![vec![10u8, 20, 30], vec![40]]);
        let indices =
            DistributedBuffer::from_partitions(vec![vec![tag(2, true), 0, tag(1, true)], vec![0]]);
        let mut dst = DistributedBuffer::zeros(src.mapping());
        gather(&src, &indices, &mut dst, &Stream::sequential(0));
        assert_eq!(dst.to_vec(), vec![30, 10, 20, 40]);
    }
}
