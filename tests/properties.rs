//! Property tests for the segmented primitives.

use proptest::prelude::*;

use boosters_ctr::ctr::index::{index_of, is_segment_start};
use boosters_ctr::ctr::{
    border_mapping, count_segment_borders, extract_mask, segment_ids, segment_sums,
    segmented_scan, segmented_totals, sequence, update_borders_mask, update_borders_mask_merged,
    update_ctr_bins,
};
use boosters_ctr::device::{DistributedBuffer, Stream};
use boosters_ctr::Parallelism;

fn partitions(max_len: usize) -> impl Strategy<Value = Vec<Vec<u32>>> {
    prop::collection::vec(prop::collection::vec(0u32..6, 0..max_len), 1..4)
}

fn sorted(mut parts: Vec<Vec<u32>>) -> Vec<Vec<u32>> {
    parts.iter_mut().for_each(|p| p.sort_unstable());
    parts
}

fn flagged(bins: &DistributedBuffer<u32>) -> DistributedBuffer<u32> {
    let mut indices = sequence(bins.mapping());
    update_borders_mask(bins, &mut indices, &Stream::sequential(0));
    indices
}

/// Integer-valued floats keep every partial sum exact.
fn values_for(parts: &[Vec<u32>]) -> DistributedBuffer<f32> {
    DistributedBuffer::from_partitions(
        parts
            .iter()
            .map(|p| p.iter().enumerate().map(|(i, &b)| (i as u32 % 7 + b) as f32).collect())
            .collect(),
    )
}

proptest! {
    #[test]
    fn flags_mark_bin_changes(parts in partitions(64)) {
        let bins = DistributedBuffer::from_partitions(parts.clone());
        let indices = flagged(&bins);
        for (device, part) in parts.iter().enumerate() {
            let words = indices.partition(device);
            for i in 0..part.len() {
                let expected = i == 0 || part[i] != part[i - 1];
                prop_assert_eq!(is_segment_start(words[i]), expected);
                prop_assert_eq!(index_of(words[i]), i as u32);
            }
        }
    }

    #[test]
    fn merged_flags_are_union_of_single_flags(a in prop::collection::vec(0u32..3, 1..64), seed in 0u32..1000) {
        let b: Vec<u32> = a.iter().enumerate().map(|(i, _)| (i as u32 * 7 + seed) % 4 / 2).collect();
        let bins_a = DistributedBuffer::from_partitions(vec![a]);
        let bins_b = DistributedBuffer::from_partitions(vec![b]);
        let stream = Stream::sequential(0);

        let mut merged = sequence(bins_a.mapping());
        update_borders_mask_merged(&bins_a, &bins_b, &mut merged, &stream);
        let only_a = flagged(&bins_a);
        let only_b = flagged(&bins_b);

        for i in 0..merged.len() {
            let word = merged.partition(0)[i];
            let expected = is_segment_start(only_a.partition(0)[i]) || is_segment_start(only_b.partition(0)[i]);
            prop_assert_eq!(is_segment_start(word), expected);
        }
    }

    #[test]
    fn flagging_is_idempotent(parts in partitions(64)) {
        let bins = DistributedBuffer::from_partitions(parts);
        let mut once = flagged(&bins);
        let twice = once.clone();
        update_borders_mask(&bins, &mut once, &Stream::sequential(0));
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn merge_matches_shift_or(
        bins in prop::collection::vec(0u32..256, 1..64),
        prev in prop::collection::vec(0u32..256, 64),
        shift in 0u32..24,
    ) {
        let prev = prev[..bins.len()].to_vec();
        let mut merged = DistributedBuffer::from_partitions(vec![bins.clone()]);
        let prev_buffer = DistributedBuffer::from_partitions(vec![prev.clone()]);
        update_ctr_bins(&mut merged, &prev_buffer, shift, &Stream::sequential(0));
        let expected: Vec<u32> = bins.iter().zip(&prev).map(|(&b, &p)| b | (p << shift)).collect();
        prop_assert_eq!(merged.to_vec(), expected);
    }

    #[test]
    fn count_and_extract_agree(parts in partitions(64).prop_map(sorted), start in any::<bool>()) {
        let bins = DistributedBuffer::from_partitions(parts.clone());
        let stream = Stream::sequential(0);
        let indices = flagged(&bins);

        let counts = count_segment_borders(&indices, start, &stream);
        let mut positions = DistributedBuffer::zeros(&border_mapping(&indices, start, &stream));
        extract_mask(&indices, &mut positions, start, &stream);

        for (device, part) in parts.iter().enumerate() {
            let mut distinct = part.clone();
            distinct.dedup();
            prop_assert_eq!(counts[device], distinct.len());

            let extracted = positions.partition(device);
            prop_assert!(extracted.windows(2).all(|w| w[0] < w[1]));
            for &p in extracted {
                let p = p as usize;
                if start {
                    prop_assert!(p == 0 || part[p] != part[p - 1]);
                } else {
                    prop_assert!(p + 1 == part.len() || part[p] != part[p + 1]);
                }
            }
        }
    }

    #[test]
    fn scan_identities(parts in partitions(64).prop_map(sorted)) {
        let bins = DistributedBuffer::from_partitions(parts.clone());
        let values = values_for(&parts);
        let stream = Stream::sequential(0);
        let indices = flagged(&bins);

        let mut inclusive = DistributedBuffer::zeros(values.mapping());
        let mut exclusive = DistributedBuffer::zeros(values.mapping());
        let mut totals = DistributedBuffer::zeros(values.mapping());
        let mut ids = DistributedBuffer::zeros(values.mapping());
        segmented_scan(&values, &indices, &mut inclusive, true, &stream);
        segmented_scan(&values, &indices, &mut exclusive, false, &stream);
        segmented_totals(&values, &indices, &mut totals, &stream);
        segment_ids(&indices, &mut ids, &stream);

        let mut sums = DistributedBuffer::zeros(&border_mapping(&indices, true, &stream));
        segment_sums(&values, &indices, &mut sums, &stream);

        for device in 0..parts.len() {
            let (v, inc, exc) = (values.partition(device), inclusive.partition(device), exclusive.partition(device));
            let (tot, id) = (totals.partition(device), ids.partition(device));
            let n = v.len();
            for i in 0..n {
                prop_assert_eq!(inc[i], exc[i] + v[i]);
                let last_of_segment = i + 1 == n || id[i + 1] != id[i];
                if last_of_segment {
                    prop_assert_eq!(tot[i], inc[i]);
                    prop_assert_eq!(sums.partition(device)[id[i] as usize], tot[i]);
                }
                if i > 0 {
                    prop_assert!(id[i] == id[i - 1] || id[i] == id[i - 1] + 1);
                }
            }
        }
    }

    #[test]
    fn parallel_streams_match_sequential(parts in partitions(256).prop_map(sorted)) {
        let bins = DistributedBuffer::from_partitions(parts.clone());
        let values = values_for(&parts);
        let sequential = Stream::sequential(0);
        let parallel = Stream::new(1).with_parallelism(Parallelism::Parallel(4));

        let indices = flagged(&bins);
        let mut parallel_indices = sequence(bins.mapping());
        update_borders_mask(&bins, &mut parallel_indices, &parallel);
        prop_assert_eq!(&indices, &parallel_indices);

        let mut a = DistributedBuffer::zeros(values.mapping());
        let mut b = DistributedBuffer::zeros(values.mapping());
        segmented_totals(&values, &indices, &mut a, &sequential);
        segmented_totals(&values, &indices, &mut b, &parallel);
        prop_assert_eq!(a, b);
    }
}
