//! Host-side mirror of the merge-pass schedule and of the arithmetic the
//! argument-generation kernel performs on the GPU. The GPU kernel and this
//! module must agree slot for slot; the integration tests read the
//! GPU-written argument buffer back and compare it against [`dispatch_args`].

/// Threads per group. Every kernel uses this; each thread owns one
/// comparison, so a group covers [`BLOCK_SIZE`] elements per sub-stage.
pub const GROUP_SIZE: u32 = 1024;

/// Elements per shared-memory block; buffer capacities are always a multiple
/// of this.
pub const BLOCK_SIZE: u32 = 2 * GROUP_SIZE;

/// One merge pass of the top-level network, in dispatch order. The index of
/// a pass inside [`pass_schedule`] is also its slot in the indirect-argument
/// buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergePass {
    /// One global sub-stage at distance `j` of the merge of width `k`.
    Outer { k: u32, j: u32 },
    /// Shared-memory completion of all distances <= [`GROUP_SIZE`] for the
    /// merge of width `k`.
    Inner { k: u32 },
}

pub fn round_up_to_block(count: u32) -> u32 {
    (count + BLOCK_SIZE - 1) & !(BLOCK_SIZE - 1)
}

/// Number of top-level merge widths for a capacity: one per doubling above
/// the block size, up to the smallest power of two covering the capacity.
pub fn max_iterations(capacity: u32) -> u32 {
    let full = capacity.next_power_of_two().max(BLOCK_SIZE);
    full.trailing_zeros() - BLOCK_SIZE.trailing_zeros()
}

/// The full `(k, j)` dispatch sequence for a capacity. Iteration `i` covers
/// merge width `k = 2 * BLOCK_SIZE << i` with its outer sub-stages from
/// `k / 2` down to [`BLOCK_SIZE`], followed by one inner pass; iteration `i`
/// therefore begins at slot `i * (i + 3) / 2`.
pub fn pass_schedule(capacity: u32) -> Vec<MergePass> {
    let mut passes = Vec::new();
    for i in 0..max_iterations(capacity) {
        let k = (2 * BLOCK_SIZE) << i;
        let mut j = k / 2;
        while j > GROUP_SIZE {
            passes.push(MergePass::Outer { k, j });
            j /= 2;
        }
        passes.push(MergePass::Inner { k });
    }
    passes
}

/// Widen `value` by inserting a 1-bit at the mask position. The merge
/// network's partner addressing depends on this exact formula; the partner
/// of the produced index is found by XOR against `k - 1` on a flip boundary
/// (`k == 2 * j`) or against `j` otherwise.
pub fn insert_one_bit(value: u32, one_bit_mask: u32) -> u32 {
    let mask = one_bit_mask - 1;
    ((value & !mask) << 1) | (value & mask) | one_bit_mask
}

/// The single definition of ordering. `a` is the key at the higher index of
/// the candidate pair, `b` the key at the lower index; with a positive sign
/// the result is ascending order.
pub fn should_swap(a: f32, b: f32, sort_sign: f32) -> bool {
    a * sort_sign < b * sort_sign
}

/// Merge widths wider than the power of two covering the (block-padded) live
/// count have no work to do; their dispatches are emitted with a zero group
/// count by forcing the effective count to zero.
pub fn effective_count(count: u32, k: u32) -> u32 {
    if count == 0 || k > round_up_to_block(count).next_power_of_two() {
        0
    } else {
        count
    }
}

/// Group count for one outer sub-stage at distance `j`: the groups covering
/// the regions of size `2j` that are completely below the live count, plus
/// whatever partial tail still pairs elements below the count.
pub fn outer_group_count(count: u32, j: u32) -> u32 {
    let complete_groups = (count & !(2 * j - 1)) / BLOCK_SIZE;
    let partial_span = count.saturating_sub(complete_groups * BLOCK_SIZE + j);
    complete_groups + partial_span.div_ceil(GROUP_SIZE)
}

/// Group count for the inner pass: every block containing a live element.
pub fn inner_group_count(count: u32) -> u32 {
    count.div_ceil(BLOCK_SIZE)
}

/// The complete argument buffer contents for a live count, slot for slot as
/// the GPU kernel writes them.
pub fn dispatch_args(count: u32, capacity: u32) -> Vec<[u32; 3]> {
    pass_schedule(capacity)
        .iter()
        .map(|pass| match *pass {
            MergePass::Outer { k, j } => [outer_group_count(effective_count(count, k), j), 1, 1],
            MergePass::Inner { k } => [inner_group_count(effective_count(count, k)), 1, 1],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn single_block_needs_no_merge_passes() {
        assert_eq!(max_iterations(BLOCK_SIZE), 0);
        assert!(pass_schedule(BLOCK_SIZE).is_empty());
    }

    #[test]
    fn schedule_for_four_blocks() {
        assert_eq!(
            pass_schedule(8192),
            vec![
                MergePass::Outer { k: 4096, j: 2048 },
                MergePass::Inner { k: 4096 },
                MergePass::Outer { k: 8192, j: 4096 },
                MergePass::Outer { k: 8192, j: 2048 },
                MergePass::Inner { k: 8192 },
            ]
        );
    }

    #[test]
    fn slot_count_is_triangular_in_the_iteration_count() {
        for m in 0..10u32 {
            let capacity = BLOCK_SIZE << m;
            assert_eq!(max_iterations(capacity), m);
            assert_eq!(pass_schedule(capacity).len() as u32, m * (m + 3) / 2);
        }
    }

    #[test]
    fn non_power_of_two_capacity_rounds_up() {
        // 3 blocks -> merges up to the covering power of two, 8192
        assert_eq!(max_iterations(3 * BLOCK_SIZE), 2);
        assert_eq!(round_up_to_block(1), BLOCK_SIZE);
        assert_eq!(round_up_to_block(BLOCK_SIZE), BLOCK_SIZE);
        assert_eq!(round_up_to_block(BLOCK_SIZE + 1), 2 * BLOCK_SIZE);
    }

    #[test]
    fn insert_one_bit_sets_exactly_the_mask_bit() {
        assert_eq!(insert_one_bit(0, 1), 1);
        assert_eq!(insert_one_bit(1, 1), 3);
        assert_eq!(insert_one_bit(0b1011, 4), 0b10111);
        for value in 0..64u32 {
            for bit in [1u32, 2, 4, 8, 16] {
                let widened = insert_one_bit(value, bit);
                assert_ne!(widened & bit, 0);
                // removing the inserted bit recovers the value
                let low = widened & (bit - 1);
                let high = (widened & !(2 * bit - 1)) >> 1;
                assert_eq!(high | low, value);
            }
        }
    }

    #[test]
    fn partner_pairs_are_disjoint_within_a_dispatch() {
        // no two threads of one (k, j) dispatch may touch the same slot
        for (k, j) in [(4096u32, 2048u32), (8192, 4096), (8192, 2048)] {
            let mut touched = HashSet::new();
            for tid in 0..4096u32 {
                let index2 = insert_one_bit(tid, j);
                let index1 = index2 ^ if k == 2 * j { k - 1 } else { j };
                assert!(index1 < index2);
                assert!(touched.insert(index1));
                assert!(touched.insert(index2));
            }
        }
    }

    #[test]
    fn small_count_zeroes_every_slot() {
        let args = dispatch_args(100, 8192);
        assert_eq!(args.len(), 5);
        assert!(args.iter().all(|a| *a == [0, 1, 1]));
    }

    #[test]
    fn full_capacity_uses_every_group() {
        assert_eq!(
            dispatch_args(8192, 8192),
            vec![[4, 1, 1]; 5],
        );
    }

    #[test]
    fn partial_tail_gets_partial_groups() {
        // 5000 live elements in 4 blocks: the k = 8192, j = 4096 flip only
        // pairs the 904 elements above mid-span
        assert_eq!(
            dispatch_args(5000, 8192),
            vec![[2, 1, 1], [3, 1, 1], [1, 1, 1], [2, 1, 1], [3, 1, 1]],
        );
    }

    #[test]
    fn zero_count_produces_zero_work() {
        assert!(dispatch_args(0, 16384).iter().all(|a| a[0] == 0));
    }
}
