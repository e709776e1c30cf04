//! CTR kinds, priors, and the calcer configuration.
//!
//! [`CtrConfig`] uses the `bon` crate for builder generation with validation
//! at build time.
//!
//! # Example
//!
//! ```
//! use boosters_ctr::ctr::{CtrConfig, CtrType, EstimationMode};
//!
//! let config = CtrConfig::builder()
//!     .ctr_type(CtrType::Borders)
//!     .prior(0.5)
//!     .prior_observations(1.0)
//!     .mode(EstimationMode::Ordered)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.prior().shift(), 0.5);
//! ```

use std::fmt;

use bon::Builder;

// =============================================================================
// CtrType
// =============================================================================

/// Kind of categorical target statistic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CtrType {
    /// Share of (weighted) samples whose binarized target sits on a border.
    Borders,
    /// Share of (weighted) samples in or above a target bucket.
    Buckets,
    /// Weighted mean of a real-valued target.
    FloatTargetMeanValue,
    /// Sample count of the category over the partition's sample count.
    ///
    /// Counts every sample: weights and a zero-weight tail are ignored.
    Counter,
    /// Weight of the category over the partition's total weight.
    FeatureFreq,
}

impl CtrType {
    /// Types whose statistic is accumulated from a byte-valued target.
    #[inline]
    pub fn is_binarized_target(self) -> bool {
        matches!(self, Self::Borders | Self::Buckets)
    }

    /// Binarized-target types that compare the target against a border.
    #[inline]
    pub fn is_borders_based(self) -> bool {
        matches!(self, Self::Borders)
    }

    /// Types computed from category sizes alone (no target).
    #[inline]
    pub fn is_frequency(self) -> bool {
        matches!(self, Self::Counter | Self::FeatureFreq)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Borders => "Borders",
            Self::Buckets => "Buckets",
            Self::FloatTargetMeanValue => "FloatTargetMeanValue",
            Self::Counter => "Counter",
            Self::FeatureFreq => "FeatureFreq",
        }
    }
}

impl fmt::Display for CtrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Prior
// =============================================================================

/// Additive Bayesian prior used by every smoothed statistic.
///
/// A statistic with accumulated `sum` over `weight` becomes
/// `(sum + prior * prior_observations) / (weight + prior_observations)`:
/// it tends to `prior` as `weight -> 0` and to `sum / weight` as
/// `weight -> inf`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Prior {
    /// Numerator term (the value empty bins converge to).
    pub prior: f32,
    /// Denominator term (effective number of prior observations).
    pub prior_observations: f32,
}

impl Default for Prior {
    fn default() -> Self {
        Self {
            prior: 0.0,
            prior_observations: 1.0,
        }
    }
}

impl Prior {
    #[inline]
    pub fn new(prior: f32, prior_observations: f32) -> Self {
        Self {
            prior,
            prior_observations,
        }
    }

    /// The amount added to every numerator.
    #[inline]
    pub fn shift(self) -> f32 {
        self.prior * self.prior_observations
    }

    /// Smooth `sum / weight` towards the prior.
    #[inline]
    pub fn smooth(self, sum: f32, weight: f32) -> f32 {
        (sum + self.shift()) / (weight + self.prior_observations)
    }
}

// =============================================================================
// EstimationMode
// =============================================================================

/// Which samples contribute to a sample's own statistic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum EstimationMode {
    /// Every sample of the category contributes.
    #[default]
    Full,
    /// Only samples preceding it in the permutation contribute.
    Ordered,
}

// =============================================================================
// ConfigError
// =============================================================================

/// Errors that can occur during configuration validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be finite, got {value}")]
    NonFinitePrior { field: &'static str, value: f32 },

    #[error("prior_observations must be non-negative, got {0}")]
    NegativePriorObservations(f32),

    #[error("target_border {0} is outside the binarized target range 0..=255")]
    TargetBorderOutOfRange(u32),
}

// =============================================================================
// CtrConfig
// =============================================================================

/// Configuration of one CTR computed by [`CtrCalcer`](super::CtrCalcer).
#[derive(Debug, Clone, Builder)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
pub struct CtrConfig {
    /// Statistic to compute.
    pub ctr_type: CtrType,

    /// Prior numerator. Default: 0.0.
    #[builder(default = 0.0)]
    pub prior: f32,

    /// Prior denominator (pseudo-count). Default: 1.0.
    #[builder(default = 1.0)]
    pub prior_observations: f32,

    /// Border / bucket index for binarized-target types. Default: 0.
    #[builder(default = 0)]
    pub target_border: u32,

    /// Full or ordered estimation. Default: `Full`.
    #[builder(default)]
    pub mode: EstimationMode,
}

/// Custom finishing function that validates the config.
impl<S: ctr_config_builder::IsComplete> CtrConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if:
    /// - `prior` or `prior_observations` is not finite
    /// - `prior_observations < 0`
    /// - `target_border > 255`
    pub fn build(self) -> Result<CtrConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        if config.prior_observations == 0.0 {
            log::warn!(
                "{} ctr with prior_observations = 0: empty categories divide by zero",
                config.ctr_type
            );
        }
        Ok(config)
    }
}

impl CtrConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if !self.prior.is_finite() {
            return Err(ConfigError::NonFinitePrior {
                field: "prior",
                value: self.prior,
            });
        }
        if !self.prior_observations.is_finite() {
            return Err(ConfigError::NonFinitePrior {
                field: "prior_observations",
                value: self.prior_observations,
            });
        }
        if self.prior_observations < 0.0 {
            return Err(ConfigError::NegativePriorObservations(
                self.prior_observations,
            ));
        }
        if self.target_border > u32::from(u8::MAX) {
            return Err(ConfigError::TargetBorderOutOfRange(self.target_border));
        }
        Ok(())
    }

    /// The prior as a value pair.
    #[inline]
    pub fn prior(&self) -> Prior {
        Prior::new(self.prior, self.prior_observations)
    }
}
