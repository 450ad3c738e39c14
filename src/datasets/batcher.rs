use super::encoding::{Label, OneHot};
use super::SequenceSet;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchError {
    #[error("batch size {batch_size} out of range for a partition of {num_examples} examples")]
    OutOfRange { batch_size: usize, num_examples: usize },
}

/// Epoch-aware cursor over a training partition.
///
/// Batches are dense, contiguous slices. When a batch would run past the
/// end of the partition the epoch counter is bumped, images and labels are
/// reshuffled with one shared permutation and the batch is served from the
/// start of the new order.
pub struct BatchCursor {
    images: Vec<OneHot>,
    labels: Vec<Label>,
    index_in_epoch: usize,
    epochs_completed: usize,
    rng: ChaCha8Rng,
}

impl BatchCursor {
    pub fn new(set: SequenceSet, seed: u64) -> Self {
        let (images, labels) = set.into_parts();
        Self {
            images,
            labels,
            index_in_epoch: 0,
            epochs_completed: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn images(&self) -> &[OneHot] {
        &self.images
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn num_examples(&self) -> usize {
        self.images.len()
    }

    pub fn epochs_completed(&self) -> usize {
        self.epochs_completed
    }

    pub fn next_batch(&mut self, batch_size: usize) -> Result<(&[OneHot], &[Label]), BatchError> {
        let num_examples = self.num_examples();
        if batch_size == 0 || batch_size > num_examples {
            return Err(BatchError::OutOfRange {
                batch_size,
                num_examples,
            });
        }

        let mut start = self.index_in_epoch;
        if start + batch_size > num_examples {
            self.epochs_completed += 1;
            self.reshuffle();
            start = 0;
        }
        let end = start + batch_size;
        self.index_in_epoch = end;
        Ok((&self.images[start..end], &self.labels[start..end]))
    }

    fn reshuffle(&mut self) {
        let mut perm: Vec<usize> = (0..self.num_examples()).collect();
        perm.shuffle(&mut self.rng);
        self.images = perm.iter().map(|&i| self.images[i]).collect();
        self.labels = perm.iter().map(|&i| self.labels[i]).collect();
    }
}
