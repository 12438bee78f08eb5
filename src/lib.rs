//! GPU bitonic key/value sort on Vulkan compute.
//!
//! Sorts a pair of parallel buffers (`f32` keys, `u32` payload values) whose
//! live element count is only known on the GPU: the count is read from a
//! counter cell at dispatch time and the number of merge passes that actually
//! do work is decided by an argument-generation kernel writing indirect
//! dispatch arguments, so the CPU never reads the count back.
//!
//! The pipeline is the classic hybrid bitonic network: one shared-memory
//! kernel fully sorts each 2048-element block, then outer merge passes over
//! global memory alternate with an inner kernel that finishes all merge
//! distances fitting in one block. Slots past the live count are filled with
//! a sentinel pair that sorts to the tail.
//!
//! [`cpu_sort`] runs the identical pass schedule on slices and serves as the
//! portable fallback and as the oracle for the GPU tests.

pub mod cpu_sort;
pub mod device;
pub mod error;
pub mod plan;
pub mod shader;
pub mod sorter;

pub use error::SortError;
pub use sorter::{BitonicSorter, SortBuffers};

/// Direction of the sort, applied as a runtime sign multiplier inside the
/// comparator so ascending and descending share the same kernels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn sign(self) -> f32 {
        match self {
            SortDirection::Ascending => 1.0,
            SortDirection::Descending => -1.0,
        }
    }

    /// The key that sorts to the tail under this direction.
    pub fn null_key(self) -> f32 {
        match self {
            SortDirection::Ascending => f32::INFINITY,
            SortDirection::Descending => f32::NEG_INFINITY,
        }
    }
}

/// Per-sort configuration passed to every kernel as push constants.
///
/// The null key must sort to the tail under the chosen direction; the
/// constructor derives it from the direction, which is what callers want
/// unless they reserve a different sentinel encoding.
#[derive(Clone, Copy, Debug)]
pub struct SortConfig {
    pub direction: SortDirection,
    pub null_key: f32,
    pub null_value: u32,
    /// Element offset of the live-count cell inside the counter buffer.
    pub counter_offset: u32,
}

impl SortConfig {
    pub fn new(direction: SortDirection) -> SortConfig {
        SortConfig {
            direction,
            null_key: direction.null_key(),
            null_value: u32::MAX,
            counter_offset: 0,
        }
    }
}
