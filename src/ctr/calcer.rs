//! End-to-end CTR computation for one categorical key.
//!
//! [`CtrCalcer`] takes a bin stream already sorted by the caller together
//! with the sort permutation (sorted position -> sample id), marks the
//! segment borders once, and then evaluates any number of CTRs into
//! per-sample (original order) destinations.
//!
//! # Pipeline
//!
//! ```text
//! target/weights (sample order)
//!     │ gather through sort indices
//!     ▼
//! per-position stats (sorted order)
//!     │ segmented totals (full) or exclusive scan (ordered)
//!     ▼
//! per-position numerator / denominator
//!     │ divide with priors, scatter through sort indices
//!     ▼
//! CTR values (sample order)
//! ```
//!
//! Frequency CTRs take the per-segment weight (or count) instead and are
//! gathered back through the inverse permutation.
//!
//! Each partition is an independent dataset: segments, totals and sample
//! ids never cross a partition boundary.

use super::binarized::fill_binarized_targets_stats;
use super::borders::{count_segment_borders, extract_mask, update_borders_mask};
use super::freq::{compute_non_weighted_bin_freq_ctr, ComputeWeightedBinFreqCtrKernel};
use super::index::{gather, index_of, invert_permutation, INDEX_MASK};
use super::means::divide_with_priors_and_scatter;
use super::scan::{segment_ids, segment_sums, segmented_scan, segmented_totals};
use super::weights::gather_trivial_weights;
use super::{CtrConfig, CtrType, EstimationMode};
use crate::device::{launch_kernels, DistributedBuffer, Kernel, Mapping, Stream};
use crate::error::CtrError;
use crate::utils::Parallelism;

/// Target values passed to [`CtrCalcer::compute`], in sample order.
#[derive(Clone, Copy, Debug)]
pub enum CtrTarget<'a> {
    /// Discretized target for `Borders` and `Buckets`.
    Binarized(&'a DistributedBuffer<u8>),
    /// Raw target for `FloatTargetMeanValue`.
    Float(&'a DistributedBuffer<f32>),
    /// No target, for frequency CTRs.
    None,
}

impl CtrTarget<'_> {
    fn mapping(&self) -> Option<&Mapping> {
        match self {
            CtrTarget::Binarized(target) => Some(target.mapping()),
            CtrTarget::Float(target) => Some(target.mapping()),
            CtrTarget::None => None,
        }
    }
}

fn expected_target(ctr_type: CtrType) -> &'static str {
    if ctr_type.is_binarized_target() {
        "a binarized (u8) target"
    } else if ctr_type.is_frequency() {
        "no target"
    } else {
        "a float (f32) target"
    }
}

fn check_mapping(what: &'static str, expected: &Mapping, got: &Mapping) -> Result<(), CtrError> {
    if expected == got {
        return Ok(());
    }
    let devices = expected.device_count().max(got.device_count());
    let device = (0..devices)
        .find(|&d| expected.size(d) != got.size(d))
        .unwrap_or(0);
    Err(CtrError::LengthMismatch {
        what,
        expected: expected.size(device),
        got: got.size(device),
    })
}

fn check_indices_in_range(what: &'static str, indices: &DistributedBuffer<u32>) -> Result<(), CtrError> {
    for device in indices.non_empty_devices() {
        let part = indices.partition(device);
        let len = part.len();
        if let Some(index) = part
            .iter()
            .map(|&word| index_of(word) as usize)
            .find(|&index| index >= len)
        {
            return Err(CtrError::IndexOutOfRange {
                what,
                device,
                index,
                len,
            });
        }
    }
    Ok(())
}

struct WeightTargetKernel<'a> {
    target: &'a mut [f32],
    weights: &'a [f32],
}

impl Kernel for WeightTargetKernel<'_> {
    const NAME: &'static str = "WeightTarget";

    fn size(&self) -> usize {
        self.target.len()
    }

    fn run(self, parallelism: Parallelism) {
        let weights = self.weights;
        parallelism.for_each_indexed_mut(self.target, |i, value| {
            *value *= weights[i];
        });
    }
}

// =============================================================================
// CtrCalcer
// =============================================================================

/// CTR evaluator over one sorted categorical key.
///
/// # Example
///
/// ```
/// use boosters_ctr::ctr::{CtrCalcer, CtrConfig, CtrTarget, CtrType};
/// use boosters_ctr::device::{DistributedBuffer, Mapping, Stream};
///
/// // Samples 0..4 have categories [7, 3, 7, 3]; sorted by category:
/// let mapping = Mapping::stripe(4, 1);
/// let bins = DistributedBuffer::from_slice(&[3, 3, 7, 7], &mapping)?;
/// let order = DistributedBuffer::from_slice(&[1, 3, 0, 2], &mapping)?;
/// let target = DistributedBuffer::from_slice(&[1u8, 0, 1, 1], &mapping)?;
///
/// let calcer = CtrCalcer::new(&bins, order, &Stream::sequential(0))?;
/// let config = CtrConfig::builder().ctr_type(CtrType::Borders).target_border(1).build()?;
///
/// let mut ctr = DistributedBuffer::zeros(&mapping);
/// calcer.compute(&config, CtrTarget::Binarized(&target), &mut ctr)?;
/// // category 7: (2 + 0) / (2 + 1); category 3: (1 + 0) / (2 + 1)
/// assert_eq!(ctr.to_vec(), vec![2.0 / 3.0, 1.0 / 3.0, 2.0 / 3.0, 1.0 / 3.0]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct CtrCalcer<'a> {
    /// Sort permutation with segment-start flags.
    indices: DistributedBuffer<u32>,
    /// Sample id -> sorted position.
    inverse: DistributedBuffer<u32>,
    /// Segment id per sorted position.
    segment_ids: DistributedBuffer<u32>,
    segment_counts: Vec<usize>,
    weights: Option<&'a DistributedBuffer<f32>>,
    first_zero_index: Option<u32>,
    stream: Stream,
}

impl<'a> CtrCalcer<'a> {
    /// Prepare a calcer for `bins` (sorted order) and their sort permutation.
    ///
    /// `sort_indices[p]` is the partition-local sample id at sorted position
    /// `p`. Flag bits already present are overwritten.
    ///
    /// # Errors
    ///
    /// - [`CtrError::LengthMismatch`] if the two buffers are not laid out
    ///   identically
    /// - [`CtrError::IndexOutOfRange`] if a sample id is not below its
    ///   partition size
    pub fn new(
        bins: &DistributedBuffer<u32>,
        sort_indices: DistributedBuffer<u32>,
        stream: &Stream,
    ) -> Result<Self, CtrError> {
        check_mapping("sort indices", bins.mapping(), sort_indices.mapping())?;
        check_indices_in_range("sort indices", &sort_indices)?;

        let mut indices = sort_indices;
        update_borders_mask(bins, &mut indices, stream);

        let mut inverse = DistributedBuffer::zeros(indices.mapping());
        invert_permutation(&indices, &mut inverse, stream);

        let mut ids = DistributedBuffer::zeros(indices.mapping());
        segment_ids(&indices, &mut ids, stream);

        let segment_counts = count_segment_borders(&indices, true, stream);
        log::debug!(
            "ctr calcer: {} samples on {} devices, {} segments",
            indices.len(),
            indices.device_count(),
            segment_counts.iter().sum::<usize>()
        );

        Ok(Self {
            indices,
            inverse,
            segment_ids: ids,
            segment_counts,
            weights: None,
            first_zero_index: None,
            stream: *stream,
        })
    }

    /// Use per-sample weights (sample order) instead of unit weights.
    ///
    /// # Errors
    ///
    /// Returns [`CtrError::LengthMismatch`] if `weights` is laid out
    /// differently from the bins.
    pub fn with_weights(mut self, weights: &'a DistributedBuffer<f32>) -> Result<Self, CtrError> {
        check_mapping("weights", self.indices.mapping(), weights.mapping())?;
        self.weights = Some(weights);
        Ok(self)
    }

    /// Give samples with id `>= first_zero_index` zero weight.
    ///
    /// Such samples still receive CTR values but do not contribute to any
    /// statistic, except `Counter`, which counts every sample. Only applies
    /// to unit weights: with explicit weights, zero the tail in the weights
    /// themselves.
    pub fn with_first_zero_index(mut self, first_zero_index: u32) -> Self {
        self.first_zero_index = Some(first_zero_index);
        self
    }

    /// Tagged sort permutation (segment-start flags set).
    #[inline]
    pub fn indices(&self) -> &DistributedBuffer<u32> {
        &self.indices
    }

    /// Number of segments (distinct bins) per device.
    #[inline]
    pub fn segment_counts(&self) -> &[usize] {
        &self.segment_counts
    }

    /// Evaluate one CTR into `dst` (sample order).
    ///
    /// Frequency CTRs ignore `config.mode`: they are always computed over
    /// the full partition. `Counter` also ignores weights and
    /// `first_zero_index`, counting every sample.
    ///
    /// # Errors
    ///
    /// All checked before anything is written:
    /// - [`CtrError::Config`] if `config` fails validation
    /// - [`CtrError::TargetMismatch`] if `target` is not the kind the CTR
    ///   type expects
    /// - [`CtrError::LengthMismatch`] if `target` or `dst` is laid out
    ///   differently from the bins
    pub fn compute(
        &self,
        config: &CtrConfig,
        target: CtrTarget<'_>,
        dst: &mut DistributedBuffer<f32>,
    ) -> Result<(), CtrError> {
        config.validate()?;
        let ctr_type = config.ctr_type;
        let mapping = self.indices.mapping();
        check_mapping("ctr destination", mapping, dst.mapping())?;
        if let Some(target_mapping) = target.mapping() {
            check_mapping("target", mapping, target_mapping)?;
        }

        log::debug!(
            "computing {} ctr ({:?}, prior {}/{})",
            ctr_type,
            config.mode,
            config.prior,
            config.prior_observations
        );

        match (ctr_type, target) {
            (CtrType::Borders | CtrType::Buckets, CtrTarget::Binarized(target)) => {
                let weights = self.sorted_weights();
                let mut sorted_target = DistributedBuffer::zeros(mapping);
                gather(target, &self.indices, &mut sorted_target, &self.stream);

                let mut stats = DistributedBuffer::zeros(mapping);
                fill_binarized_targets_stats(
                    &sorted_target,
                    &weights,
                    &mut stats,
                    config.target_border,
                    ctr_type,
                    &self.stream,
                )?;
                self.smooth_and_scatter(&stats, &weights, config, dst);
            }
            (CtrType::FloatTargetMeanValue, CtrTarget::Float(target)) => {
                let weights = self.sorted_weights();
                let mut stats = DistributedBuffer::zeros(mapping);
                gather(target, &self.indices, &mut stats, &self.stream);
                self.weight_target(&mut stats, &weights);
                self.smooth_and_scatter(&stats, &weights, config, dst);
            }
            (CtrType::Counter | CtrType::FeatureFreq, CtrTarget::None) => {
                self.frequency(config, dst);
            }
            _ => {
                return Err(CtrError::TargetMismatch {
                    ctr_type,
                    expected: expected_target(ctr_type),
                })
            }
        }
        Ok(())
    }

    // =========================================================================
    // Phases
    // =========================================================================

    /// Weights in sorted order: explicit ones gathered, or unit weights.
    fn sorted_weights(&self) -> DistributedBuffer<f32> {
        let mut sorted = DistributedBuffer::zeros(self.indices.mapping());
        match self.weights {
            Some(weights) => gather(weights, &self.indices, &mut sorted, &self.stream),
            None => gather_trivial_weights(
                &mut sorted,
                &self.indices,
                self.first_zero_index.unwrap_or(u32::MAX),
                false,
                &self.stream,
            ),
        }
        sorted
    }

    fn weight_target(&self, target: &mut DistributedBuffer<f32>, weights: &DistributedBuffer<f32>) {
        let kernels = target
            .partitions_mut()
            .enumerate()
            .filter(|(_, part)| !part.is_empty())
            .map(|(device, target)| {
                (
                    device,
                    WeightTargetKernel {
                        target,
                        weights: weights.partition(device),
                    },
                )
            });
        launch_kernels(&self.stream, kernels);
    }

    /// Aggregate per-position stats per segment, smooth, scatter to samples.
    fn smooth_and_scatter(
        &self,
        stats: &DistributedBuffer<f32>,
        weights: &DistributedBuffer<f32>,
        config: &CtrConfig,
        dst: &mut DistributedBuffer<f32>,
    ) {
        let mapping = self.indices.mapping();
        let mut sums = DistributedBuffer::zeros(mapping);
        let mut totals = DistributedBuffer::zeros(mapping);
        match config.mode {
            EstimationMode::Full => {
                segmented_totals(stats, &self.indices, &mut sums, &self.stream);
                segmented_totals(weights, &self.indices, &mut totals, &self.stream);
            }
            EstimationMode::Ordered => {
                segmented_scan(stats, &self.indices, &mut sums, false, &self.stream);
                segmented_scan(weights, &self.indices, &mut totals, false, &self.stream);
            }
        }
        divide_with_priors_and_scatter(
            &sums,
            &totals,
            config.prior(),
            &self.indices,
            INDEX_MASK,
            dst,
            &self.stream,
        );
    }

    fn frequency(&self, config: &CtrConfig, dst: &mut DistributedBuffer<f32>) {
        let unit_weights = self.weights.is_none() && self.first_zero_index.is_none();
        if config.ctr_type == CtrType::Counter || unit_weights {
            self.non_weighted_frequency(config, dst);
        } else {
            self.weighted_frequency(config, dst);
        }
    }

    /// Counts from CSR offsets of the segment starts.
    fn non_weighted_frequency(&self, config: &CtrConfig, dst: &mut DistributedBuffer<f32>) {
        let mapping = self.indices.mapping();
        let offsets_mapping = Mapping::from_sizes(
            self.segment_counts
                .iter()
                .zip(mapping.sizes())
                .map(|(&count, &size)| if size > 0 { count + 1 } else { 0 })
                .collect::<Vec<_>>(),
        );
        let mut offsets = DistributedBuffer::zeros(&offsets_mapping);
        extract_mask(&self.indices, &mut offsets, true, &self.stream);
        for device in mapping.non_empty_devices() {
            if let Some(last) = offsets.partition_mut(device).last_mut() {
                *last = mapping.size(device) as u32;
            }
        }

        compute_non_weighted_bin_freq_ctr(
            &self.inverse,
            &self.segment_ids,
            &offsets,
            config.prior(),
            dst,
            &self.stream,
        );
    }

    /// Per-segment weights against the partition's total weight.
    fn weighted_frequency(&self, config: &CtrConfig, dst: &mut DistributedBuffer<f32>) {
        let weights = self.sorted_weights();
        let mut bin_sums = DistributedBuffer::zeros(&Mapping::from_sizes(self.segment_counts.clone()));
        segment_sums(&weights, &self.indices, &mut bin_sums, &self.stream);

        let totals: Vec<f32> = (0..bin_sums.device_count())
            .map(|device| {
                bin_sums
                    .partition(device)
                    .iter()
                    .map(|&w| f64::from(w))
                    .sum::<f64>() as f32
            })
            .collect();

        let prior = config.prior();
        let kernels = dst
            .partitions_mut()
            .enumerate()
            .filter(|(_, part)| !part.is_empty())
            .map(|(device, dst)| {
                (
                    device,
                    ComputeWeightedBinFreqCtrKernel {
                        indices: self.inverse.partition(device),
                        bins: self.segment_ids.partition(device),
                        bin_sums: bin_sums.partition(device),
                        total_weight: totals[device],
                        prior,
                        dst,
                    },
                )
            });
        launch_kernels(&self.stream, kernels);
    }
}
