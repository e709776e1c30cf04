//! Prior-smoothed means.
//!
//! Every entry becomes `(sum + prior * prior_observations) / (weight +
//! prior_observations)`. The result is written in place, positionally to a
//! destination, or scattered through an index map.

use super::Prior;
use crate::device::{launch_kernels, DistributedBuffer, Kernel, Stream};
use crate::utils::Parallelism;

fn log_degenerate_prior(prior: Prior) {
    if prior.prior_observations == 0.0 {
        log::debug!("prior_observations is 0: entries with zero weight divide by zero");
    }
}

// =============================================================================
// Kernels
// =============================================================================

struct MakeMeanKernel<'a> {
    sums: &'a mut [f32],
    weights: &'a [f32],
    prior: Prior,
}

impl Kernel for MakeMeanKernel<'_> {
    const NAME: &'static str = "MakeMean";

    fn size(&self) -> usize {
        self.sums.len()
    }

    fn run(self, parallelism: Parallelism) {
        let (weights, prior) = (self.weights, self.prior);
        parallelism.for_each_indexed_mut(self.sums, |i, sum| {
            *sum = prior.smooth(*sum, weights[i]);
        });
    }
}

struct MakeMeanAndScatterKernel<'a> {
    sums: &'a [f32],
    weights: &'a [f32],
    prior: Prior,
    map: Option<(&'a [u32], u32)>,
    dst: &'a mut [f32],
}

impl Kernel for MakeMeanAndScatterKernel<'_> {
    const NAME: &'static str = "MakeMeanAndScatter";

    fn size(&self) -> usize {
        self.sums.len()
    }

    fn run(self, parallelism: Parallelism) {
        let (sums, weights, prior) = (self.sums, self.weights, self.prior);
        match self.map {
            Some((map, mask)) => {
                for (i, (&sum, &weight)) in sums.iter().zip(weights).enumerate() {
                    self.dst[(map[i] & mask) as usize] = prior.smooth(sum, weight);
                }
            }
            None => {
                let n = sums.len();
                parallelism.for_each_indexed_mut(&mut self.dst[..n], |i, out| {
                    *out = prior.smooth(sums[i], weights[i]);
                });
            }
        }
    }
}

// =============================================================================
// Operations
// =============================================================================

/// In place: `sums[i] = (sums[i] + prior.shift()) / (weights[i] + prior_observations)`.
///
/// # Panics
///
/// Panics if a `weights` partition is shorter than the matching `sums` one.
pub fn divide_with_priors(
    sums: &mut DistributedBuffer<f32>,
    weights: &DistributedBuffer<f32>,
    prior: Prior,
    stream: &Stream,
) {
    log_degenerate_prior(prior);
    let kernels = sums
        .partitions_mut()
        .enumerate()
        .filter(|(_, part)| !part.is_empty())
        .map(|(device, sums)| {
            (
                device,
                MakeMeanKernel {
                    sums,
                    weights: weights.partition(device),
                    prior,
                },
            )
        });
    launch_kernels(stream, kernels);
}

fn launch_mean_and_scatter(
    sums: &DistributedBuffer<f32>,
    weights: &DistributedBuffer<f32>,
    prior: Prior,
    map: Option<(&DistributedBuffer<u32>, u32)>,
    dst: &mut DistributedBuffer<f32>,
    stream: &Stream,
) {
    log_degenerate_prior(prior);
    let kernels = dst
        .partitions_mut()
        .enumerate()
        .filter(|(device, _)| !sums.partition(*device).is_empty())
        .map(|(device, dst)| {
            (
                device,
                MakeMeanAndScatterKernel {
                    sums: sums.partition(device),
                    weights: weights.partition(device),
                    prior,
                    map: map.map(|(indices, mask)| (indices.partition(device), mask)),
                    dst,
                },
            )
        });
    launch_kernels(stream, kernels);
}

/// Smoothed mean of every entry of `sums`, written to `dst[i]`.
///
/// `sums` and `weights` are left untouched.
///
/// # Panics
///
/// Panics if a `weights` or `dst` partition is shorter than the matching
/// `sums` one.
pub fn divide_with_priors_to(
    sums: &DistributedBuffer<f32>,
    weights: &DistributedBuffer<f32>,
    prior: Prior,
    dst: &mut DistributedBuffer<f32>,
    stream: &Stream,
) {
    launch_mean_and_scatter(sums, weights, prior, None, dst, stream);
}

/// Smoothed mean of every entry of `sums`, written to `dst[indices[i] & mask]`.
///
/// The mask strips tag bits from the map; pass
/// [`INDEX_MASK`](super::INDEX_MASK) for indices flagged by
/// [`update_borders_mask`](super::update_borders_mask), or `u32::MAX` for
/// plain indices. Entries are iterated over `sums`; `dst` may be longer.
///
/// # Panics
///
/// Panics if a masked index falls outside its `dst` partition.
pub fn divide_with_priors_and_scatter(
    sums: &DistributedBuffer<f32>,
    weights: &DistributedBuffer<f32>,
    prior: Prior,
    indices: &DistributedBuffer<u32>,
    mask: u32,
    dst: &mut DistributedBuffer<f32>,
    stream: &Stream,
) {
    launch_mean_and_scatter(sums, weights, prior, Some((indices, mask)), dst, stream);
}
