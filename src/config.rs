// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Benchmark parameters.

use crate::buffer::AllocationStrategy;
use crate::error::{Error, Result};
use crate::partition::PartitionPolicy;
use crate::thread_pool::{CpuPinningPolicy, ThreadCount};
use std::num::NonZeroUsize;

/// Parameters of a [`VectorAddBenchmark`](crate::VectorAddBenchmark).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BenchmarkConfig {
    /// Number of elements in each array.
    pub len: usize,
    /// Number of worker threads.
    pub num_threads: ThreadCount,
    /// Distance between consecutive elements in memory, in elements.
    pub step: usize,
    /// Whether workers call the [`SimulatorHooks`](crate::SimulatorHooks)
    /// around their compute region.
    pub notify_simulator: bool,
    /// How the arrays are allocated.
    pub allocation: AllocationStrategy,
    /// How elements are split when `len` isn't a multiple of the number of
    /// threads.
    pub partition: PartitionPolicy,
    /// Policy to pin worker threads to CPUs.
    ///
    /// [`CpuPinningPolicy::Always`] makes
    /// [`VectorAddBenchmark::new()`](crate::VectorAddBenchmark::new) panic on
    /// platforms that don't support CPU pinning, rather than return an error.
    pub cpu_pinning: CpuPinningPolicy,
    /// Whether workers print a line to stdout for each element they compute.
    pub trace_items: bool,
}

impl BenchmarkConfig {
    /// Returns the element step, or an error if it is zero.
    pub fn step(&self) -> Result<NonZeroUsize> {
        NonZeroUsize::try_from(self.step).map_err(|_| Error::InvalidStep)
    }
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Preset::Single.config()
    }
}

/// The reference variants of the benchmark.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preset {
    /// One element, one thread.
    Single,
    /// Two elements, two threads, with simulator notifications.
    Pair,
    /// Four elements, one thread, with simulator notifications.
    Quad,
}

impl Preset {
    /// All the presets.
    pub const ALL: [Preset; 3] = [Preset::Single, Preset::Pair, Preset::Quad];

    /// Returns the configuration of this preset.
    pub fn config(self) -> BenchmarkConfig {
        let (len, num_threads, notify_simulator) = match self {
            Preset::Single => (1, NonZeroUsize::MIN, false),
            Preset::Pair => (2, NonZeroUsize::MIN.saturating_add(1), true),
            Preset::Quad => (4, NonZeroUsize::MIN, true),
        };
        BenchmarkConfig {
            len,
            num_threads: ThreadCount::Count(num_threads),
            step: 1,
            notify_simulator,
            allocation: AllocationStrategy::Heap,
            partition: PartitionPolicy::Exact,
            cpu_pinning: CpuPinningPolicy::No,
            trace_items: false,
        }
    }

    /// Short lowercase name of this preset.
    pub fn name(self) -> &'static str {
        match self {
            Preset::Single => "single",
            Preset::Pair => "pair",
            Preset::Quad => "quad",
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_presets() {
        let sizes = Preset::ALL.map(|preset| {
            let config = preset.config();
            (config.len, config.num_threads)
        });
        assert_eq!(
            sizes,
            [
                (1, ThreadCount::try_from(1).unwrap()),
                (2, ThreadCount::try_from(2).unwrap()),
                (4, ThreadCount::try_from(1).unwrap()),
            ]
        );
    }

    #[test]
    fn test_default_is_single() {
        assert_eq!(BenchmarkConfig::default(), Preset::Single.config());
        assert!(!BenchmarkConfig::default().notify_simulator);
    }

    #[test]
    fn test_step() {
        let mut config = BenchmarkConfig::default();
        assert_eq!(config.step(), Ok(NonZeroUsize::MIN));
        config.step = 0;
        assert_eq!(config.step(), Err(Error::InvalidStep));
    }

    #[test]
    fn test_preset_names() {
        assert_eq!(Preset::ALL.map(Preset::name), ["single", "pair", "quad"]);
    }
}
