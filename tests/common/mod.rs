//! Shared fixtures for integration tests.
//!
//! Datasets are generated per partition: each partition holds its own
//! samples with partition-local ids, sorted by category with a stable sort
//! so samples keep their relative order inside a category.

#![allow(dead_code)]

use boosters_ctr::device::{DistributedBuffer, Mapping};
use rand::prelude::*;

/// Absolute tolerance for smoothed values computed in `f32`.
pub const TOLERANCE: f32 = 1e-5;

/// One partition of a categorical dataset, in sample order.
#[derive(Debug, Clone)]
pub struct Partition {
    pub categories: Vec<u32>,
    pub weights: Vec<f32>,
    pub float_target: Vec<f32>,
    pub class_target: Vec<u8>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Stable sort permutation by category: sorted position -> sample id.
    pub fn sort_order(&self) -> Vec<u32> {
        let mut order: Vec<u32> = (0..self.len() as u32).collect();
        order.sort_by_key(|&s| self.categories[s as usize]);
        order
    }

    /// Categories in sorted order.
    pub fn sorted_bins(&self) -> Vec<u32> {
        self.sort_order()
            .into_iter()
            .map(|s| self.categories[s as usize])
            .collect()
    }
}

/// Random partitions of the given sizes.
pub fn random_partitions(sizes: &[usize], n_categories: u32, seed: u64) -> Vec<Partition> {
    let mut rng = StdRng::seed_from_u64(seed);
    sizes
        .iter()
        .map(|&size| Partition {
            categories: (0..size).map(|_| rng.gen_range(0..n_categories)).collect(),
            weights: (0..size).map(|_| rng.gen_range(0.1f32..2.0)).collect(),
            float_target: (0..size).map(|_| rng.gen_range(-1.0f32..1.0)).collect(),
            class_target: (0..size).map(|_| rng.gen_range(0u8..4)).collect(),
        })
        .collect()
}

/// Buffer with one partition per entry of `parts`, built by `f`.
pub fn buffer<T: Clone>(parts: &[Partition], f: impl Fn(&Partition) -> Vec<T>) -> DistributedBuffer<T> {
    DistributedBuffer::from_partitions(parts.iter().map(f).collect())
}

pub fn mapping(parts: &[Partition]) -> Mapping {
    Mapping::from_sizes(parts.iter().map(Partition::len).collect::<Vec<_>>())
}

/// Naive smoothed mean per sample, over samples of the same category.
///
/// `stat[s]` is the numerator contribution of sample `s` and `weight[s]` its
/// denominator contribution. With `ordered`, sample `s` only sees samples
/// that precede it in the stable sort order.
pub fn reference_mean(
    part: &Partition,
    stat: &[f32],
    weight: &[f32],
    prior: f32,
    prior_observations: f32,
    ordered: bool,
) -> Vec<f32> {
    let order = part.sort_order();
    let mut out = vec![0.0f32; part.len()];
    for (position, &sample) in order.iter().enumerate() {
        let category = part.categories[sample as usize];
        let (mut sum, mut total) = (0.0f64, 0.0f64);
        for (other_position, &other) in order.iter().enumerate() {
            if part.categories[other as usize] != category {
                continue;
            }
            if ordered && other_position >= position {
                continue;
            }
            sum += f64::from(stat[other as usize]);
            total += f64::from(weight[other as usize]);
        }
        out[sample as usize] = ((sum + f64::from(prior * prior_observations))
            / (total + f64::from(prior_observations))) as f32;
    }
    out
}

/// Naive frequency per sample: category weight over partition weight.
pub fn reference_frequency(
    part: &Partition,
    weight: &[f32],
    prior: f32,
    prior_observations: f32,
) -> Vec<f32> {
    let total: f64 = weight.iter().map(|&w| f64::from(w)).sum();
    (0..part.len())
        .map(|s| {
            let category = part.categories[s];
            let in_category: f64 = (0..part.len())
                .filter(|&o| part.categories[o] == category)
                .map(|o| f64::from(weight[o]))
                .sum();
            ((in_category + f64::from(prior * prior_observations))
                / (total + f64::from(prior_observations))) as f32
        })
        .collect()
}

/// Assert two slices are element-wise equal within [`TOLERANCE`].
pub fn assert_close(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len(), "length mismatch");
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() <= TOLERANCE * e.abs().max(1.0),
            "mismatch at {i}: got {a}, expected {e}"
        );
    }
}
