// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#![doc = include_str!("../README.md")]
#![forbid(missing_docs, unsafe_code)]

mod benchmark;
mod buffer;
mod config;
mod error;
mod hooks;
mod macros;
mod partition;
mod thread_pool;

pub use benchmark::{
    expected_sum, initial_a, initial_b, ArrayReport, BenchmarkReport, RunSummary,
    VectorAddBenchmark, WorkerReport, MAX_LEN,
};
pub use buffer::{AllocationStrategy, Buffer, BufferViewMut, DEFAULT_PAGE_SIZE};
pub use config::{BenchmarkConfig, Preset};
pub use error::{Error, Result};
pub use hooks::{
    LoggingHooks, NoopHooks, RecordingHooks, RegionEvent, RegionKind, SimulatorHooks,
};
pub use partition::{Partition, PartitionPolicy};
pub use thread_pool::{
    CpuPinningPolicy, ThreadCount, ThreadPool, ThreadPoolBuilder, WorkerContext,
};

#[cfg(test)]
mod test {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha12Rng;

    /// Hooks that panic when the given worker enters its region.
    struct PanickingHooks(usize);

    impl SimulatorHooks for PanickingHooks {
        fn enter_region(&self, worker_id: usize) {
            if worker_id == self.0 {
                panic!("simulator panic");
            }
        }

        fn exit_region(&self, _worker_id: usize) {}
    }

    macro_rules! expand_tests {
        ( $allocation:expr, ) => {};
        ( $allocation:expr, $case:ident, $( $others:tt )* ) => {
            #[test]
            fn $case() {
                $crate::test::$case($allocation);
            }

            expand_tests!($allocation, $($others)*);
        };
        ( $allocation:expr, $case:ident => fail($msg:expr), $( $others:tt )* ) => {
            #[test]
            #[should_panic(expected = $msg)]
            fn $case() {
                $crate::test::$case($allocation);
            }

            expand_tests!($allocation, $($others)*);
        };
    }

    macro_rules! allocation_tests {
        ( $mod:ident, $allocation:expr, $( $tests:tt )* ) => {
            mod $mod {
                use super::*;

                expand_tests!($allocation, $($tests)*);
            }
        };
    }

    macro_rules! all_allocation_tests {
        ( $mod:ident, $allocation:expr ) => {
            allocation_tests!(
                $mod,
                $allocation,
                test_presets,
                test_sum_many_threads,
                test_strided,
                test_run_twice,
                test_hooks_bracket_each_worker,
                test_hooks_disabled,
                test_random_configs,
                test_hooks_panic => fail("A worker thread panicked!"),
            );
        };
    }

    all_allocation_tests!(heap, AllocationStrategy::Heap);
    all_allocation_tests!(page_aligned, AllocationStrategy::page_aligned());

    fn config(len: usize, num_threads: usize, allocation: AllocationStrategy) -> BenchmarkConfig {
        BenchmarkConfig {
            len,
            num_threads: ThreadCount::try_from(num_threads).unwrap(),
            allocation,
            ..Default::default()
        }
    }

    fn test_presets(allocation: AllocationStrategy) {
        let expected: [(&[i32], &[i32], &[i32]); 3] = [
            (&[1], &[2], &[3]),
            (&[2, 3], &[4, 5], &[6, 8]),
            (&[4, 5, 6, 7], &[8, 9, 10, 11], &[12, 14, 16, 18]),
        ];
        for (preset, (a, b, ab)) in Preset::ALL.into_iter().zip(expected) {
            let mut benchmark = VectorAddBenchmark::new(BenchmarkConfig {
                allocation,
                ..preset.config()
            })
            .unwrap();
            benchmark.run(&NoopHooks);
            benchmark.verify().unwrap();
            assert_eq!(benchmark.a().to_vec(), a);
            assert_eq!(benchmark.b().to_vec(), b);
            assert_eq!(benchmark.ab().to_vec(), ab);
        }
    }

    fn test_sum_many_threads(allocation: AllocationStrategy) {
        let mut benchmark = VectorAddBenchmark::new(config(10_000, 8, allocation)).unwrap();
        benchmark.run(&NoopHooks);
        benchmark.verify().unwrap();
        let sum = benchmark.ab().iter().map(i64::from).sum::<i64>();
        // Sum of 2i + 3N for i in 0..N.
        assert_eq!(sum, 9_999 * 10_000 + 3 * 10_000 * 10_000);
    }

    fn test_strided(allocation: AllocationStrategy) {
        let mut benchmark = VectorAddBenchmark::new(BenchmarkConfig {
            step: 16,
            ..config(64, 4, allocation)
        })
        .unwrap();
        benchmark.run(&NoopHooks);
        benchmark.verify().unwrap();
        for buffer in [benchmark.a(), benchmark.b(), benchmark.ab()] {
            assert_eq!(buffer.slots().len(), 64 * 16);
            assert!(buffer
                .slots()
                .iter()
                .enumerate()
                .filter(|(slot, _)| slot % 16 != 0)
                .all(|(_, &x)| x == 0));
        }
    }

    fn test_run_twice(allocation: AllocationStrategy) {
        let mut benchmark = VectorAddBenchmark::new(config(1_000, 4, allocation)).unwrap();
        let summary1 = benchmark.run(&NoopHooks);
        let ab1 = benchmark.ab().to_vec();
        let summary2 = benchmark.run(&NoopHooks);
        let ab2 = benchmark.ab().to_vec();
        assert_eq!(summary1, summary2);
        assert_eq!(ab1, ab2);
        benchmark.verify().unwrap();
    }

    /// Checks that each worker sends exactly one enter and one exit
    /// notification. Their order relative to the computed elements is checked
    /// by the benchmark module's `test_hooks_bracket_computed_elements`.
    fn test_hooks_bracket_each_worker(allocation: AllocationStrategy) {
        let mut benchmark = VectorAddBenchmark::new(BenchmarkConfig {
            notify_simulator: true,
            ..config(64, 4, allocation)
        })
        .unwrap();
        let hooks = RecordingHooks::new(4);
        benchmark.run(&hooks);
        benchmark.verify().unwrap();

        assert_eq!(hooks.events().len(), 8);
        for id in 0..4 {
            assert_eq!(hooks.events_for(id), [RegionKind::Enter, RegionKind::Exit]);
            assert_eq!(hooks.enter_count(id), 1);
            assert_eq!(hooks.exit_count(id), 1);
        }
    }

    fn test_hooks_disabled(allocation: AllocationStrategy) {
        let mut benchmark = VectorAddBenchmark::new(config(64, 4, allocation)).unwrap();
        let hooks = RecordingHooks::new(4);
        benchmark.run(&hooks);
        benchmark.verify().unwrap();
        assert!(hooks.events().is_empty());
    }

    fn test_random_configs(allocation: AllocationStrategy) {
        let mut rng = ChaCha12Rng::seed_from_u64(42);
        for _ in 0..20 {
            let num_threads = rng.random_range(1..=8);
            let chunk = rng.random_range(0..=100);
            let step = rng.random_range(1..=4);
            let mut benchmark = VectorAddBenchmark::new(BenchmarkConfig {
                step,
                notify_simulator: true,
                ..config(num_threads * chunk, num_threads, allocation)
            })
            .unwrap();
            let hooks = RecordingHooks::new(num_threads);
            let summary = benchmark.run(&hooks);
            benchmark.verify().unwrap();

            let mut next = 0;
            for worker in &summary.workers {
                assert_eq!(worker.range, next..next + chunk);
                next = worker.range.end;
                assert_eq!(hooks.enter_count(worker.id), 1);
                assert_eq!(hooks.exit_count(worker.id), 1);
            }
            assert_eq!(next, num_threads * chunk);
        }
    }

    fn test_hooks_panic(allocation: AllocationStrategy) {
        let mut benchmark = VectorAddBenchmark::new(BenchmarkConfig {
            notify_simulator: true,
            ..config(16, 4, allocation)
        })
        .unwrap();
        benchmark.run(&PanickingHooks(2));
    }
}
