//! Subgraph fusion for the graft compiler.
//!
//! - [`fuse`] - `try_fuse` feasibility check (including loop detection) and `fuse` extraction
//! - [`meta_def`] - Boundary descriptors of fused regions
//! - [`capability`] - Device-capability oracle and candidate grouping
//! - [`error`] - Error types

pub mod capability;
pub mod error;
pub mod fuse;
pub mod meta_def;

#[cfg(test)]
pub mod test;

pub use capability::{DeviceCapability, OpSetCapability, PartitionReport, find_candidates, partition};
pub use error::{Error, FuseError, LOOP_DETECTED, Result};
pub use fuse::{TAG_ATTR, fuse, try_fuse};
pub use meta_def::{DeviceParams, IndexedSubGraph, MetaDef};
