//! Host-side execution substrate for CTR kernels.
//!
//! A distributed array is split into contiguous partitions, one per device,
//! described by a [`Mapping`]. Operations are broadcast to every non-empty
//! partition with [`launch_kernels`]; partitions never read each other's
//! data within one operation.
//!
//! # Key Types
//!
//! - [`Mapping`] - partition sizes per device
//! - [`DistributedBuffer`] - partitioned storage for one element type
//! - [`Stream`] - execution context threaded through every call
//! - [`Kernel`] - one operation bound to one partition's arguments

mod buffer;
mod launch;
mod mapping;
mod stream;

pub use buffer::DistributedBuffer;
pub use launch::{launch_kernels, Kernel};
pub use mapping::Mapping;
pub use stream::Stream;
