//! # Epoch Batching
//!
//! Each epoch draws one random permutation of the sample indices and serves
//! `floor(n / b)` batches from it. The batch offset is
//! `(batch_index * b) % (n - b)` with `batch_index` starting at 1, so the
//! windows wrap around and the tail of the permutation is sampled more often
//! than the head when `b` does not divide `n`.

use rand::{seq::SliceRandom, Rng};

use crate::error::{PatchError, PatchResult};

/// Batching plan for a dataset of `len` samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSchedule {
    len: usize,
    batch_size: usize,
}

impl BatchSchedule {
    pub fn new(len: usize, batch_size: usize) -> PatchResult<Self> {
        if batch_size == 0 {
            return Err(PatchError::InvalidBatchSize { batch_size, len });
        }
        Ok(Self { len, batch_size })
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of optimisation steps in one epoch, `floor(n / b)`.
    pub const fn steps_per_epoch(&self) -> usize {
        self.len / self.batch_size
    }

    /// Draws a fresh uniform permutation of `0..n`.
    pub fn permutation<R: Rng>(&self, rng: &mut R) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.len).collect();
        indices.shuffle(rng);
        indices
    }

    /// Start of the window for the epoch-local `batch_index` (1-based).
    ///
    /// When `n == b` the modulus is zero and the single window starts at 0.
    pub const fn offset(&self, batch_index: usize) -> usize {
        if self.len > self.batch_size {
            (batch_index * self.batch_size) % (self.len - self.batch_size)
        } else {
            0
        }
    }

    /// Iterates over the batches of one epoch drawn from `permutation`.
    pub fn batches<'a>(&self, permutation: &'a [usize]) -> Batches<'a> {
        Batches {
            schedule: *self,
            permutation,
            batch_index: 1,
            remaining: self.steps_per_epoch(),
        }
    }
}

/// Iterator over the index windows of one epoch.
#[derive(Debug, Clone)]
pub struct Batches<'a> {
    schedule: BatchSchedule,
    permutation: &'a [usize],
    batch_index: usize,
    remaining: usize,
}

impl<'a> Iterator for Batches<'a> {
    type Item = &'a [usize];

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let offset = self.schedule.offset(self.batch_index);
        let window = self
            .permutation
            .get(offset..offset + self.schedule.batch_size)?;
        self.batch_index += 1;
        self.remaining -= 1;
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

/// Monotonic step counter shared by every epoch of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalStep(u64);

impl GlobalStep {
    pub const fn new() -> Self {
        Self(1)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Returns the current step and moves to the next one.
    pub fn advance(&mut self) -> u64 {
        let current = self.0;
        self.0 += 1;
        current
    }
}

impl Default for GlobalStep {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use std::collections::HashSet;

    #[test]
    fn test_zero_batch_size_rejected() {
        assert_eq!(
            BatchSchedule::new(10, 0).unwrap_err(),
            PatchError::InvalidBatchSize {
                batch_size: 0,
                len: 10
            }
        );
    }

    #[test]
    fn test_steps_per_epoch() {
        assert_eq!(BatchSchedule::new(10, 3).unwrap().steps_per_epoch(), 3);
        assert_eq!(BatchSchedule::new(9, 3).unwrap().steps_per_epoch(), 3);
        assert_eq!(BatchSchedule::new(2, 3).unwrap().steps_per_epoch(), 0);
    }

    #[test]
    fn test_permutation_is_complete() {
        let schedule = BatchSchedule::new(50, 4).unwrap();
        let mut rng = StdRng::seed_from_u64(123);
        let mut perm = schedule.permutation(&mut rng);
        perm.sort_unstable();
        assert_eq!(perm, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_offsets_wrap() {
        let schedule = BatchSchedule::new(10, 3).unwrap();
        // (i * 3) % 7 for i = 1, 2, 3
        assert_eq!(schedule.offset(1), 3);
        assert_eq!(schedule.offset(2), 6);
        assert_eq!(schedule.offset(3), 2);
    }

    #[test]
    fn test_batches_have_exact_size_and_come_from_permutation() {
        let schedule = BatchSchedule::new(103, 8).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let perm = schedule.permutation(&mut rng);
        let members: HashSet<usize> = perm.iter().copied().collect();

        let batches: Vec<&[usize]> = schedule.batches(&perm).collect();
        assert_eq!(batches.len(), 12);
        for batch in batches {
            assert_eq!(batch.len(), 8);
            assert!(batch.iter().all(|idx| members.contains(idx)));
        }
    }

    #[test]
    fn test_dataset_equal_to_batch_size() {
        let schedule = BatchSchedule::new(4, 4).unwrap();
        let perm = vec![3, 1, 0, 2];
        let batches: Vec<&[usize]> = schedule.batches(&perm).collect();
        assert_eq!(batches, vec![&[3, 1, 0, 2][..]]);
    }

    #[test]
    fn test_global_step_increments_by_one() {
        let mut step = GlobalStep::new();
        let seen: Vec<u64> = (0..5).map(|_| step.advance()).collect();
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert_eq!(step.value(), 6);
    }
}
