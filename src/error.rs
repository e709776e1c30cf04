//! Error types for CTR computation.
//!
//! Only precondition violations are reported as errors. Contract violations
//! such as mis-sized destinations or bit-width overflow in merged keys are
//! not checked (see the individual operations).

use crate::ctr::{ConfigError, CtrType};

/// Errors raised before any kernel is dispatched.
#[derive(Debug, thiserror::Error)]
pub enum CtrError {
    #[error("{0} is not a binarized-target CTR type")]
    NotBinarizedTargetCtr(CtrType),

    #[error("{ctr_type} CTR expects {expected}")]
    TargetMismatch {
        ctr_type: CtrType,
        expected: &'static str,
    },

    #[error("length mismatch for {what}: mapping expects {expected} elements, got {got}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{what} index {index} on device {device} is outside its partition of {len} elements")]
    IndexOutOfRange {
        what: &'static str,
        device: usize,
        index: usize,
        len: usize,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
