// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Static assignment of element indices to worker threads.

use crate::error::{Error, Result};
use std::num::NonZeroUsize;

/// Policy to split a number of elements that isn't a multiple of the number
/// of threads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PartitionPolicy {
    /// Every worker gets exactly `len / num_threads` elements. Lengths that
    /// don't divide evenly are rejected with [`Error::InvalidPartition`].
    #[default]
    Exact,
    /// Worker `w` gets `w * len / num_threads..(w + 1) * len / num_threads`,
    /// so chunk sizes differ by at most one.
    Balanced,
}

/// A split of `0..len` into one contiguous range per worker.
///
/// Ranges are ordered by worker index: the range of worker `w + 1` starts
/// where the range of worker `w` ends, the first range starts at 0 and the last
/// one ends at `len`. Each index therefore belongs to exactly one worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    len: usize,
    num_workers: usize,
    policy: PartitionPolicy,
}

impl Partition {
    /// Splits `len` elements across the given number of workers.
    ///
    /// ```
    /// # use std::num::NonZeroUsize;
    /// # use vecbench::{Partition, PartitionPolicy};
    /// let partition =
    ///     Partition::new(4, NonZeroUsize::try_from(2).unwrap(), PartitionPolicy::Exact).unwrap();
    /// assert_eq!(partition.range(0), 0..2);
    /// assert_eq!(partition.range(1), 2..4);
    /// ```
    pub fn new(len: usize, num_workers: NonZeroUsize, policy: PartitionPolicy) -> Result<Self> {
        let num_workers = num_workers.get();
        if policy == PartitionPolicy::Exact && len % num_workers != 0 {
            return Err(Error::InvalidPartition {
                len,
                num_threads: num_workers,
            });
        }
        Ok(Self {
            len,
            num_workers,
            policy,
        })
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether there are no elements to split.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of workers the elements are split across.
    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Policy this partition was built with.
    pub fn policy(&self) -> PartitionPolicy {
        self.policy
    }

    /// Returns the range of indices owned by the given worker.
    ///
    /// Panics if `worker_id` is out of bounds.
    pub fn range(&self, worker_id: usize) -> std::ops::Range<usize> {
        assert!(
            worker_id < self.num_workers,
            "worker #{worker_id} is out of bounds for {} workers",
            self.num_workers
        );
        match self.policy {
            PartitionPolicy::Exact => {
                let chunk = self.len / self.num_workers;
                worker_id * chunk..(worker_id + 1) * chunk
            }
            PartitionPolicy::Balanced => {
                self.balanced_bound(worker_id)..self.balanced_bound(worker_id + 1)
            }
        }
    }

    /// Computes `worker_id * len / num_workers` without overflowing.
    fn balanced_bound(&self, worker_id: usize) -> usize {
        let bound = worker_id as u128 * self.len as u128 / self.num_workers as u128;
        // The bound never exceeds `len`, so it fits back in a usize.
        bound as usize
    }

    /// Returns the ranges of all workers, in worker order.
    pub fn ranges(&self) -> impl ExactSizeIterator<Item = std::ops::Range<usize>> + '_ {
        (0..self.num_workers).map(|id| self.range(id))
    }
}
