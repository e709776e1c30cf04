//! boosters-ctr: categorical target statistics for gradient boosting.
//!
//! This crate computes CTRs (counter and target encodings of categorical
//! features) with data-parallel segmented primitives over partitioned
//! buffers. Each partition plays the role of one device; kernels run on the
//! host through rayon.
//!
//! # Modules
//!
//! - [`device`] - partition layouts, distributed buffers, streams and kernel launch
//! - [`ctr`] - segment borders, statistics accumulation, prior smoothing and
//!   the [`CtrCalcer`](ctr::CtrCalcer) pipeline
//! - [`utils`] - parallelism hints and thread pool setup
//!
//! # Logging
//!
//! The crate logs through the `log` facade and never installs a logger:
//! kernel launches at `trace`, calcer phases at `debug`, a config built
//! with zero prior observations at `warn`.

pub mod ctr;
pub mod device;
pub mod error;
pub mod utils;

pub use error::CtrError;
pub use utils::{run_with_threads, Parallelism};
