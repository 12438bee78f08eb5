//! Compute kernels, compiled at build time. Each submodule holds one GLSL
//! entry point and the generated `load` / push-constant types for it.
//!
//! The three sorting kernels share the comparator and the partner addressing
//! (`insert_one_bit` plus an XOR against `k - 1` on flip boundaries or `j`
//! otherwise) and read the live element count from a counter buffer, never
//! from the CPU. `indirect_args` turns that count into dispatch group counts
//! for every merge pass up front.

pub mod copy_indices;
pub mod indirect_args;
pub mod inner_sort;
pub mod outer_sort;
pub mod pre_sort;
