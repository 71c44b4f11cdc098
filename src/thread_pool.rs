// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A fork-join thread pool: each call spawns one scoped thread per task and
//! joins all of them before returning.

use crate::error::Error;
use crate::macros::{log_debug, log_error, log_warn};
// Platforms that support `libc::sched_setaffinity()`.
#[cfg(all(
    not(miri),
    any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "linux"
    )
))]
use nix::{
    sched::{sched_setaffinity, CpuSet},
    unistd::Pid,
};
use std::num::NonZeroUsize;

/// Number of threads to spawn in a thread pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadCount {
    /// Spawn the number of threads returned by
    /// [`std::thread::available_parallelism()`].
    AvailableParallelism,
    /// Spawn the given number of threads.
    Count(NonZeroUsize),
}

impl ThreadCount {
    /// Resolves the number of threads to spawn.
    ///
    /// Falls back to a single thread if the available parallelism can't be
    /// determined.
    pub fn count(self) -> NonZeroUsize {
        match self {
            ThreadCount::AvailableParallelism => {
                std::thread::available_parallelism().unwrap_or_else(|_e| {
                    log_warn!("Getting the available parallelism failed: {_e}");
                    NonZeroUsize::MIN
                })
            }
            ThreadCount::Count(count) => count,
        }
    }
}

impl TryFrom<usize> for ThreadCount {
    type Error = Error;

    fn try_from(thread_count: usize) -> Result<Self, Error> {
        let count = NonZeroUsize::try_from(thread_count).map_err(|_| Error::InvalidThreadCount)?;
        Ok(ThreadCount::Count(count))
    }
}

/// Policy to pin worker threads to CPUs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CpuPinningPolicy {
    /// Don't pin worker threads to CPUs.
    #[default]
    No,
    /// Pin each worker thread to a CPU, if CPU pinning is supported and
    /// implemented on this platform.
    IfSupported,
    /// Pin each worker thread to a CPU. If CPU pinning isn't supported on this
    /// platform (or not implemented), building a thread pool will panic.
    Always,
}

/// A builder for [`ThreadPool`].
#[derive(Clone, Copy, Debug)]
pub struct ThreadPoolBuilder {
    /// Number of worker threads to spawn in each parallel region.
    pub num_threads: ThreadCount,
    /// Policy to pin worker threads to CPUs.
    pub cpu_pinning: CpuPinningPolicy,
}

impl ThreadPoolBuilder {
    /// Creates a thread pool.
    ///
    /// ```
    /// # use vecbench::{CpuPinningPolicy, ThreadCount, ThreadPoolBuilder};
    /// let thread_pool = ThreadPoolBuilder {
    ///     num_threads: ThreadCount::try_from(2).unwrap(),
    ///     cpu_pinning: CpuPinningPolicy::No,
    /// }
    /// .build();
    ///
    /// let ids = thread_pool.fork_join(vec!["a", "b"], |context, name| {
    ///     format!("{name}{}", context.id)
    /// });
    /// assert_eq!(ids, ["a0", "b1"]);
    /// ```
    pub fn build(&self) -> ThreadPool {
        ThreadPool::new(self)
    }
}

/// Information available to a worker thread inside a parallel region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerContext {
    /// Index of this worker, in `0..num_threads`.
    pub id: usize,
    /// Number of workers in the region.
    pub num_threads: usize,
    /// CPU this worker is pinned to, if any.
    pub cpu: Option<usize>,
}

/// A thread pool running parallel regions with a fixed number of workers.
///
/// Threads only live for the duration of a
/// [`fork_join()`](Self::fork_join) call: the region forks one thread per
/// worker and returns once all of them have been joined.
#[derive(Debug)]
pub struct ThreadPool {
    num_threads: NonZeroUsize,
    cpu_pinning: CpuPinningPolicy,
}

impl ThreadPool {
    /// Creates a new thread pool using the given parameters.
    fn new(builder: &ThreadPoolBuilder) -> Self {
        #[cfg(any(
            miri,
            not(any(
                target_os = "android",
                target_os = "dragonfly",
                target_os = "freebsd",
                target_os = "linux"
            ))
        ))]
        match builder.cpu_pinning {
            CpuPinningPolicy::No => (),
            CpuPinningPolicy::IfSupported => {
                log_warn!("Pinning threads to CPUs is not implemented on this platform.")
            }
            CpuPinningPolicy::Always => {
                panic!("Pinning threads to CPUs is not implemented on this platform.")
            }
        }

        Self {
            num_threads: builder.num_threads.count(),
            cpu_pinning: builder.cpu_pinning,
        }
    }

    /// Returns the number of worker threads spawned in each parallel region.
    pub fn num_threads(&self) -> NonZeroUsize {
        self.num_threads
    }

    /// Runs a parallel region: worker `i` receives `tasks[i]` and computes
    /// `f(context, tasks[i])`. Returns the outputs in worker order, once all the
    /// workers have finished.
    ///
    /// Panics if the number of tasks differs from the number of threads, or if
    /// any worker panicked.
    pub fn fork_join<Task: Send, Output: Send>(
        &self,
        tasks: Vec<Task>,
        f: impl Fn(WorkerContext, Task) -> Output + Sync,
    ) -> Vec<Output> {
        let num_threads = self.num_threads.get();
        assert_eq!(
            tasks.len(),
            num_threads,
            "expected one task per worker thread"
        );
        let cpu_pinning = self.cpu_pinning;
        let f = &f;

        std::thread::scope(|scope| {
            let handles = tasks
                .into_iter()
                .enumerate()
                .map(|(id, task)| {
                    scope.spawn(move || {
                        let cpu = pin_current_thread(id, cpu_pinning);
                        log_debug!("[thread {id}] Started");
                        let context = WorkerContext {
                            id,
                            num_threads,
                            cpu,
                        };
                        let output = f(context, task);
                        log_debug!("[thread {id}] Finished");
                        output
                    })
                })
                .collect::<Vec<_>>();
            log_debug!("[main thread] Forked {num_threads} threads");

            let mut outputs = Vec::with_capacity(num_threads);
            let mut panicked = false;
            for (_i, handle) in handles.into_iter().enumerate() {
                match handle.join() {
                    Ok(output) => outputs.push(output),
                    Err(_) => {
                        log_error!("[main thread] Thread {_i} panicked");
                        panicked = true;
                    }
                }
            }
            if panicked {
                log_error!("[main thread] A worker thread panicked!");
                panic!("A worker thread panicked!");
            }
            log_debug!("[main thread] Joined threads.");
            outputs
        })
    }
}

/// Pins the current thread to the CPU of the same index, according to the
/// policy. Returns the CPU if pinning succeeded.
#[cfg(all(
    not(miri),
    any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "linux"
    )
))]
fn pin_current_thread(id: usize, cpu_pinning: CpuPinningPolicy) -> Option<usize> {
    match cpu_pinning {
        CpuPinningPolicy::No => None,
        CpuPinningPolicy::IfSupported => {
            let mut cpu_set = CpuSet::new();
            if let Err(_e) = cpu_set.set(id) {
                log_warn!("Failed to set CPU affinity for thread #{id}: {_e}");
                None
            } else if let Err(_e) = sched_setaffinity(Pid::from_raw(0), &cpu_set) {
                log_warn!("Failed to set CPU affinity for thread #{id}: {_e}");
                None
            } else {
                log_debug!("Pinned thread #{id} to CPU #{id}");
                Some(id)
            }
        }
        CpuPinningPolicy::Always => {
            let mut cpu_set = CpuSet::new();
            if let Err(e) = cpu_set.set(id) {
                panic!("Failed to set CPU affinity for thread #{id}: {e}");
            } else if let Err(e) = sched_setaffinity(Pid::from_raw(0), &cpu_set) {
                panic!("Failed to set CPU affinity for thread #{id}: {e}");
            } else {
                log_debug!("Pinned thread #{id} to CPU #{id}");
                Some(id)
            }
        }
    }
}

#[cfg(any(
    miri,
    not(any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "linux"
    ))
))]
fn pin_current_thread(_id: usize, _cpu_pinning: CpuPinningPolicy) -> Option<usize> {
    None
}
