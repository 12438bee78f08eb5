//! Portable implementation of the same sorting network the GPU kernels run.
//! Every pass visits the same `(index1, index2)` pairs as its GPU counterpart
//! and the comparator is shared via [`plan::should_swap`], so for identical
//! inputs the two paths produce bit-identical buffers. The GPU integration
//! tests use this as their oracle.

use crate::{
    SortConfig,
    plan::{
        BLOCK_SIZE, GROUP_SIZE, MergePass, effective_count, inner_group_count, insert_one_bit,
        outer_group_count, pass_schedule, should_swap,
    },
};

/// Sorts the first `count` key/value pairs in place and fills the rest of the
/// buffers with the sentinel pair.
///
/// The slices must be the same length and a multiple of [`BLOCK_SIZE`], the
/// same shape the GPU buffers have.
pub fn sort_key_value(keys: &mut [f32], values: &mut [u32], count: usize, config: &SortConfig) {
    assert_eq!(keys.len(), values.len());
    assert_eq!(keys.len() % BLOCK_SIZE as usize, 0);
    assert!(count <= keys.len());

    let capacity = keys.len() as u32;
    let count = count as u32;
    let sign = config.direction.sign();

    for i in count as usize..keys.len() {
        keys[i] = config.null_key;
        values[i] = config.null_value;
    }

    for base in (0..keys.len()).step_by(BLOCK_SIZE as usize) {
        let end = base + BLOCK_SIZE as usize;
        pre_sort_block(&mut keys[base..end], &mut values[base..end], sign);
    }

    for pass in pass_schedule(capacity) {
        match pass {
            MergePass::Outer { k, j } => outer_pass(keys, values, count, k, j, sign),
            MergePass::Inner { k } => inner_pass(keys, values, count, k, config),
        }
    }
}

fn compare_and_swap(keys: &mut [f32], values: &mut [u32], lower: usize, higher: usize, sign: f32) {
    if should_swap(keys[higher], keys[lower], sign) {
        keys.swap(lower, higher);
        values.swap(lower, higher);
    }
}

/// The full network over one block: widths 2 to [`BLOCK_SIZE`], each width
/// flipping on its first sub-stage.
fn pre_sort_block(keys: &mut [f32], values: &mut [u32], sign: f32) {
    let mut k = 2u32;
    while k <= BLOCK_SIZE {
        let mut j = k / 2;
        while j > 0 {
            for tid in 0..GROUP_SIZE {
                let index2 = insert_one_bit(tid, j);
                let index1 = index2 ^ if k == 2 * j { k - 1 } else { j };
                compare_and_swap(keys, values, index1 as usize, index2 as usize, sign);
            }
            j /= 2;
        }
        k *= 2;
    }
}

/// One global sub-stage. Pairs whose higher index falls past the live count
/// are skipped; their partner would compare against a sentinel and never
/// swap.
fn outer_pass(keys: &mut [f32], values: &mut [u32], count: u32, k: u32, j: u32, sign: f32) {
    let threads = outer_group_count(effective_count(count, k), j) * GROUP_SIZE;
    for tid in 0..threads {
        let index2 = insert_one_bit(tid, j);
        if index2 >= count {
            continue;
        }
        let index1 = index2 ^ if k == 2 * j { k - 1 } else { j };
        compare_and_swap(keys, values, index1 as usize, index2 as usize, sign);
    }
}

/// All remaining sub-stages of one merge, block local. Loads substitute the
/// sentinel pair for slots past the live count, exactly as the GPU kernel
/// does when staging into shared memory.
fn inner_pass(keys: &mut [f32], values: &mut [u32], count: u32, k: u32, config: &SortConfig) {
    let sign = config.direction.sign();
    for group in 0..inner_group_count(effective_count(count, k)) {
        let base = (group * BLOCK_SIZE) as usize;
        let mut local_keys = [0f32; BLOCK_SIZE as usize];
        let mut local_values = [0u32; BLOCK_SIZE as usize];
        for i in 0..BLOCK_SIZE as usize {
            if ((base + i) as u32) < count {
                local_keys[i] = keys[base + i];
                local_values[i] = values[base + i];
            } else {
                local_keys[i] = config.null_key;
                local_values[i] = config.null_value;
            }
        }

        // k > BLOCK_SIZE here, so every sub-stage is a straight one
        let mut j = GROUP_SIZE;
        while j > 0 {
            for tid in 0..GROUP_SIZE {
                let index2 = insert_one_bit(tid, j) as usize;
                let index1 = index2 ^ j as usize;
                compare_and_swap(&mut local_keys, &mut local_values, index1, index2, sign);
            }
            j /= 2;
        }

        keys[base..base + BLOCK_SIZE as usize].copy_from_slice(&local_keys);
        values[base..base + BLOCK_SIZE as usize].copy_from_slice(&local_values);
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};

    use super::*;
    use crate::SortDirection;

    fn buffers(capacity: usize, count: usize, seed: u64) -> (Vec<f32>, Vec<u32>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut keys = vec![0f32; capacity];
        let mut values = vec![0u32; capacity];
        for i in 0..count {
            keys[i] = rng.random_range(-1000.0..1000.0);
            values[i] = i as u32;
        }
        (keys, values)
    }

    #[test]
    fn five_elements_carry_their_values() {
        let config = SortConfig::new(SortDirection::Ascending);
        let mut keys = vec![0f32; 2048];
        let mut values = vec![0u32; 2048];
        keys[..5].copy_from_slice(&[5.0, 1.0, 4.0, 2.0, 3.0]);
        values[..5].copy_from_slice(&[100, 101, 102, 103, 104]);

        sort_key_value(&mut keys, &mut values, 5, &config);

        assert_eq!(&keys[..5], &[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(&values[..5], &[101, 103, 104, 102, 100]);
        assert!(keys[5..].iter().all(|k| *k == f32::INFINITY));
        assert!(values[5..].iter().all(|v| *v == u32::MAX));
    }

    #[test]
    fn empty_and_single_counts() {
        let config = SortConfig::new(SortDirection::Ascending);

        let (mut keys, mut values) = buffers(4096, 0, 1);
        sort_key_value(&mut keys, &mut values, 0, &config);
        assert!(keys.iter().all(|k| *k == f32::INFINITY));

        let mut keys = vec![0f32; 4096];
        let mut values = vec![0u32; 4096];
        keys[0] = -7.5;
        values[0] = 42;
        sort_key_value(&mut keys, &mut values, 1, &config);
        assert_eq!(keys[0], -7.5);
        assert_eq!(values[0], 42);
        assert!(keys[1..].iter().all(|k| *k == f32::INFINITY));
    }

    #[test]
    fn matches_std_sort_on_unique_keys() {
        let mut rng = StdRng::seed_from_u64(7);
        for &(capacity, count) in
            &[(2048usize, 2048usize), (4096, 3000), (6144, 5000), (8192, 8192), (16384, 9001)]
        {
            let mut ids: Vec<u32> = (0..count as u32).collect();
            ids.shuffle(&mut rng);
            let mut keys = vec![0f32; capacity];
            let mut values = vec![0u32; capacity];
            for i in 0..count {
                keys[i] = ids[i] as f32;
                values[i] = ids[i];
            }

            let config = SortConfig::new(SortDirection::Ascending);
            sort_key_value(&mut keys, &mut values, count, &config);

            for i in 0..count {
                assert_eq!(keys[i], i as f32, "capacity {capacity} count {count} slot {i}");
                assert_eq!(values[i], i as u32);
            }
        }
    }

    #[test]
    fn descending_reverses_the_order() {
        let config = SortConfig::new(SortDirection::Descending);
        let (mut keys, mut values) = buffers(8192, 5000, 3);
        sort_key_value(&mut keys, &mut values, 5000, &config);

        for pair in keys[..5000].windows(2) {
            assert!(pair[0] >= pair[1]);
        }
        assert!(keys[5000..].iter().all(|k| *k == f32::NEG_INFINITY));
        assert!(values[5000..].iter().all(|v| *v == u32::MAX));
    }

    #[test]
    fn values_stay_paired_with_their_keys() {
        let config = SortConfig::new(SortDirection::Ascending);
        let mut rng = StdRng::seed_from_u64(11);
        let count = 4000usize;
        let mut keys = vec![0f32; 4096];
        let mut values = vec![0u32; 4096];
        // few distinct keys so duplicates are common
        for i in 0..count {
            keys[i] = rng.random_range(0..16) as f32;
            values[i] = i as u32;
        }
        let original: Vec<(u32, u32)> = (0..count).map(|i| (keys[i] as u32, values[i])).collect();

        sort_key_value(&mut keys, &mut values, count, &config);

        for pair in keys[..count].windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        // every output pair was an input pair
        let mut sorted_in: Vec<(u32, u32)> = original;
        let mut sorted_out: Vec<(u32, u32)> =
            (0..count).map(|i| (keys[i] as u32, values[i])).collect();
        sorted_in.sort_unstable();
        sorted_out.sort_unstable();
        assert_eq!(sorted_in, sorted_out);
    }

    #[test]
    fn sorting_twice_is_a_fixed_point() {
        let config = SortConfig::new(SortDirection::Ascending);
        let (mut keys, mut values) = buffers(8192, 6000, 5);
        sort_key_value(&mut keys, &mut values, 6000, &config);
        let (snapshot_keys, snapshot_values) = (keys.clone(), values.clone());

        sort_key_value(&mut keys, &mut values, 6000, &config);
        assert_eq!(keys, snapshot_keys);
        assert_eq!(values, snapshot_values);
    }
}
