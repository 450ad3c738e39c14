use super::SequenceSet;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Stratified train/test split.
///
/// Each class contributes `round(count * test_fraction)` records to the test
/// side, so both partitions keep the label balance of `set`. Record order in
/// each partition is shuffled with `seed`.
pub fn train_test_split(set: &SequenceSet, test_fraction: f64, seed: u64) -> (SequenceSet, SequenceSet) {
    assert!(
        (0.0..1.0).contains(&test_fraction),
        "test_fraction must be in [0, 1), got {test_fraction}"
    );
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let classes = set.classes();

    let mut train_idx = Vec::with_capacity(set.len());
    let mut test_idx = Vec::new();
    for class in [0u8, 1] {
        let mut members: Vec<usize> = (0..set.len()).filter(|&i| classes[i] == class).collect();
        members.shuffle(&mut rng);
        let n_test = (members.len() as f64 * test_fraction).round() as usize;
        test_idx.extend_from_slice(&members[..n_test]);
        train_idx.extend_from_slice(&members[n_test..]);
    }
    train_idx.shuffle(&mut rng);
    test_idx.shuffle(&mut rng);

    (set.select(&train_idx), set.select(&test_idx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::test_support::toy_set;

    #[test]
    fn split_is_stratified_and_exhaustive() {
        let set = toy_set(100, |i| (i % 4 == 0) as u8);
        let (train, test) = train_test_split(&set, 0.2, 0);
        assert_eq!(train.len() + test.len(), 100);
        assert_eq!(test.len(), 20);
        let positives = |s: &SequenceSet| s.classes().iter().filter(|&&c| c == 1).count();
        assert_eq!(positives(&test), 5);
        assert_eq!(positives(&train), 20);
    }

    #[test]
    fn split_is_repeatable_for_a_seed() {
        let set = toy_set(40, |i| (i % 2) as u8);
        let (a, _) = train_test_split(&set, 0.2, 7);
        let (b, _) = train_test_split(&set, 0.2, 7);
        assert_eq!(a.images(), b.images());
    }
}
