//! Categorical target statistics.
//!
//! Samples are sorted by categorical bin externally. From there the
//! primitives of this module:
//!
//! 1. find bin boundaries ([`update_borders_mask`], [`extract_mask`])
//! 2. accumulate per-bin statistics ([`fill_binarized_targets_stats`],
//!    [`segmented_totals`], [`segmented_scan`])
//! 3. smooth them with a prior ([`divide_with_priors`] and friends,
//!    [`compute_weighted_bin_freq_ctr`], [`compute_non_weighted_bin_freq_ctr`])
//! 4. scatter results back to per-sample order
//!
//! [`CtrCalcer`] strings these together for the common CTR types.
//!
//! # Smoothing
//!
//! Every statistic is smoothed the same way:
//!
//! ```text
//! value = (sum + prior * prior_observations) / (weight + prior_observations)
//! ```
//!
//! With `prior_observations = 0` an entry with zero weight divides by zero;
//! the result is NaN or infinite and is not rejected.

mod binarized;
mod borders;
mod calcer;
mod config;
mod freq;
pub mod index;
mod means;
mod merge;
mod scan;
mod weights;

pub use binarized::fill_binarized_targets_stats;
pub use borders::{
    border_mapping, count_segment_borders, extract_mask, update_borders_mask,
    update_borders_mask_merged,
};
pub use calcer::{CtrCalcer, CtrTarget};
pub use config::{ConfigError, CtrConfig, CtrType, EstimationMode, Prior};
pub use freq::{compute_bin_freq_ctr, compute_non_weighted_bin_freq_ctr, compute_weighted_bin_freq_ctr};
pub use index::{
    gather, invert_permutation, sequence, Identity, IndexSource, IndexView, INDEX_MASK,
    SEGMENT_START_FLAG,
};
pub use means::{divide_with_priors, divide_with_priors_and_scatter, divide_with_priors_to};
pub use merge::{bits_for_bins, update_ctr_bins};
pub use scan::{segment_ids, segment_sums, segmented_scan, segmented_totals};
pub use weights::{gather_trivial_weights, write_float_mask};
