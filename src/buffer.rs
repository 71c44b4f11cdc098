// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Integer arrays with a configurable memory layout.
//!
//! A [`Buffer`] holds `len` logical elements. Element `i` lives in physical
//! slot `i * step`, and the slots in between are zero padding that workers
//! never touch. Depending on the [`AllocationStrategy`], the first slot is
//! either wherever the allocator put it, or at the start of a page.

use crate::error::{Error, Result};
use crate::partition::Partition;
use std::mem::size_of;
use std::num::NonZeroUsize;
use std::ops::Index;

/// Page size used by [`AllocationStrategy::page_aligned()`], in bytes.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Where the storage of a [`Buffer`] starts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AllocationStrategy {
    /// A plain heap allocation, with the alignment of `i32`.
    #[default]
    Heap,
    /// A heap allocation whose first element is aligned to the given page
    /// size, in bytes.
    PageAligned {
        /// Alignment of the first element, in bytes.
        page_size: NonZeroUsize,
    },
}

impl AllocationStrategy {
    /// Page-aligned allocation with [`DEFAULT_PAGE_SIZE`].
    pub fn page_aligned() -> Self {
        AllocationStrategy::PageAligned {
            page_size: NonZeroUsize::MIN.saturating_add(DEFAULT_PAGE_SIZE - 1),
        }
    }

    /// Number of padding elements to over-allocate, so that an aligned start
    /// can always be found inside the allocation.
    fn slack(self) -> Result<usize> {
        match self {
            AllocationStrategy::Heap => Ok(0),
            AllocationStrategy::PageAligned { page_size } => {
                let page_size = page_size.get();
                if !page_size.is_power_of_two() || page_size < size_of::<i32>() {
                    return Err(Error::InvalidPageSize { page_size });
                }
                Ok(page_size / size_of::<i32>() - 1)
            }
        }
    }
}

/// An array of `i32` with a configurable stride and alignment.
#[derive(Debug)]
pub struct Buffer {
    /// Backing allocation. Never grown after construction, so the address of
    /// the first slot is stable.
    storage: Vec<i32>,
    /// Index in `storage` of the first slot.
    offset: usize,
    /// Number of logical elements.
    len: usize,
    /// Distance between consecutive logical elements, in slots.
    step: usize,
}

impl Buffer {
    /// Allocates a buffer of `len` zeroed elements.
    pub fn zeroed(len: usize, step: NonZeroUsize, strategy: AllocationStrategy) -> Result<Self> {
        let step = step.get();
        let slack = strategy.slack()?;
        let num_slots = len
            .checked_mul(step)
            .and_then(|slots| slots.checked_add(slack))
            .ok_or(Error::AllocationFailure { len })?;

        let mut storage = Vec::new();
        storage
            .try_reserve_exact(num_slots)
            .map_err(|_| Error::AllocationFailure { len })?;
        storage.resize(num_slots, 0);

        let offset = match strategy {
            AllocationStrategy::Heap => 0,
            AllocationStrategy::PageAligned { page_size } => {
                storage.as_ptr().align_offset(page_size.get())
            }
        };
        if offset > slack {
            return Err(Error::AllocationFailure { len });
        }

        Ok(Self {
            storage,
            offset,
            len,
            step,
        })
    }

    /// Allocates a buffer whose element `i` is `f(i)`.
    pub fn from_fn(
        len: usize,
        step: NonZeroUsize,
        strategy: AllocationStrategy,
        f: impl Fn(usize) -> i32,
    ) -> Result<Self> {
        let mut buffer = Self::zeroed(len, step, strategy)?;
        let step = buffer.step;
        for (i, slot) in buffer.slots_mut().iter_mut().step_by(step).enumerate() {
            *slot = f(i);
        }
        Ok(buffer)
    }

    /// Number of logical elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer has no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Distance between consecutive elements, in slots.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Address of the first element.
    pub fn as_ptr(&self) -> *const i32 {
        self.slots().as_ptr()
    }

    /// Returns the element at the given index, or [`None`] if out of bounds.
    pub fn get(&self, index: usize) -> Option<i32> {
        if index < self.len {
            Some(self.slots()[index * self.step])
        } else {
            None
        }
    }

    /// Iterates over the logical elements.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = i32> + '_ {
        self.slots().iter().step_by(self.step).copied()
    }

    /// Collects the logical elements.
    pub fn to_vec(&self) -> Vec<i32> {
        self.iter().collect()
    }

    /// All physical slots, padding included.
    pub fn slots(&self) -> &[i32] {
        &self.storage[self.offset..self.offset + self.len * self.step]
    }

    fn slots_mut(&mut self) -> &mut [i32] {
        &mut self.storage[self.offset..self.offset + self.len * self.step]
    }

    /// Splits the buffer into one disjoint mutable view per worker of the
    /// partition, in worker order.
    ///
    /// Panics if the partition doesn't have the same length as this buffer.
    pub fn split_mut(&mut self, partition: &Partition) -> Vec<BufferViewMut<'_>> {
        assert_eq!(
            partition.len(),
            self.len,
            "partition length doesn't match the buffer length"
        );
        let step = self.step;
        let mut rest = self.slots_mut();
        partition
            .ranges()
            .map(|range| {
                let (head, tail) = std::mem::take(&mut rest).split_at_mut(range.len() * step);
                rest = tail;
                BufferViewMut {
                    start: range.start,
                    step,
                    slots: head,
                }
            })
            .collect()
    }
}

impl Index<usize> for Buffer {
    type Output = i32;

    fn index(&self, index: usize) -> &i32 {
        assert!(
            index < self.len,
            "index {index} is out of bounds for a buffer of {} elements",
            self.len
        );
        &self.slots()[index * self.step]
    }
}

/// A mutable view over a contiguous range of elements of a [`Buffer`].
#[derive(Debug)]
pub struct BufferViewMut<'a> {
    /// Logical index of the first element in the view.
    start: usize,
    /// Distance between consecutive elements, in slots.
    step: usize,
    slots: &'a mut [i32],
}

impl BufferViewMut<'_> {
    /// Range of logical indices covered by this view.
    pub fn range(&self) -> std::ops::Range<usize> {
        let len = self.slots.len() / self.step;
        self.start..self.start + len
    }

    /// Iterates over the elements of this view, together with their logical
    /// index in the whole buffer.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut i32)> + '_ {
        let start = self.start;
        self.slots
            .iter_mut()
            .step_by(self.step)
            .enumerate()
            .map(move |(i, slot)| (start + i, slot))
    }
}
