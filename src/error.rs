// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Error type returned when a benchmark can't be set up or doesn't verify.

use std::fmt;

/// Errors that can occur while configuring or checking a benchmark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Reserving memory for an array failed.
    AllocationFailure {
        /// Number of elements that were requested.
        len: usize,
    },
    /// The number of elements isn't a multiple of the number of threads, and
    /// the partition policy requires equal chunks.
    InvalidPartition {
        /// Number of elements to split.
        len: usize,
        /// Number of worker threads.
        num_threads: usize,
    },
    /// A thread count of zero was requested.
    InvalidThreadCount,
    /// An element stride of zero was requested.
    InvalidStep,
    /// The output values wouldn't fit in an `i32`.
    LengthTooLarge {
        /// Number of elements that was requested.
        len: usize,
    },
    /// The page size isn't a power of two at least as large as an element.
    InvalidPageSize {
        /// Page size that was requested, in bytes.
        page_size: usize,
    },
    /// An output element doesn't match the expected sum.
    Mismatch {
        /// Index of the first mismatching element.
        index: usize,
        /// Expected value at this index.
        expected: i32,
        /// Value actually found at this index.
        actual: i32,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AllocationFailure { len } => {
                write!(f, "failed to allocate an array of {len} elements")
            }
            Error::InvalidPartition { len, num_threads } => write!(
                f,
                "cannot split {len} elements evenly across {num_threads} threads"
            ),
            Error::InvalidThreadCount => write!(f, "the thread count must be positive"),
            Error::InvalidStep => write!(f, "the element step must be positive"),
            Error::LengthTooLarge { len } => {
                write!(f, "{len} elements would overflow the output values")
            }
            Error::InvalidPageSize { page_size } => write!(
                f,
                "invalid page size {page_size}: expected a power of two of at least {} bytes",
                std::mem::size_of::<i32>()
            ),
            Error::Mismatch {
                index,
                expected,
                actual,
            } => write!(
                f,
                "mismatch at index {index}: expected {expected}, found {actual}"
            ),
        }
    }
}

impl std::error::Error for Error {}

/// Result type alias for benchmark operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_display_partition() {
        let error = Error::InvalidPartition {
            len: 5,
            num_threads: 2,
        };
        assert_eq!(
            error.to_string(),
            "cannot split 5 elements evenly across 2 threads"
        );
    }

    #[test]
    fn test_display_mismatch() {
        let error = Error::Mismatch {
            index: 3,
            expected: 18,
            actual: 0,
        };
        assert_eq!(
            error.to_string(),
            "mismatch at index 3: expected 18, found 0"
        );
    }

    #[test]
    fn test_display_page_size() {
        let error = Error::InvalidPageSize { page_size: 3 };
        assert_eq!(
            error.to_string(),
            "invalid page size 3: expected a power of two of at least 4 bytes"
        );
    }

    #[test]
    fn test_is_std_error() {
        let error: Box<dyn std::error::Error> = Box::new(Error::InvalidThreadCount);
        assert!(error.source().is_none());
        assert_eq!(error.to_string(), "the thread count must be positive");
    }
}
