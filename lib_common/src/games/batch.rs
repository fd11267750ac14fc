//! Splits the id list into multi-get sized batches.

use super::model::UniverseId;

/// Splits `ids` into consecutive batches of at most `batch_size` ids.
///
/// Order is preserved and nothing is dropped or duplicated, so concatenating
/// the batches gives back `ids`. A `batch_size` of 0 is treated as 1.
pub fn partition(ids: &[UniverseId], batch_size: usize) -> Vec<Vec<UniverseId>> {
    ids.chunks(batch_size.max(1)).map(<[UniverseId]>::to_vec).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_count_is_ceiling_and_order_is_kept() {
        for n in [0usize, 1, 2, 74, 75, 76, 150, 151, 300] {
            for b in [1usize, 2, 7, 75, 500] {
                let ids: Vec<UniverseId> = (1..=n as u64).collect();
                let batches = partition(&ids, b);

                assert_eq!(batches.len(), n.div_ceil(b), "n={n} b={b}");
                assert!(batches.iter().all(|batch| !batch.is_empty() && batch.len() <= b));
                assert_eq!(batches.concat(), ids);
            }
        }
    }

    #[test]
    fn duplicates_are_kept() {
        let batches = partition(&[5, 5, 9], 2);
        assert_eq!(batches, vec![vec![5, 5], vec![9]]);
    }

    #[test]
    fn zero_batch_size_falls_back_to_one() {
        assert_eq!(partition(&[1, 2], 0), vec![vec![1], vec![2]]);
    }
}
