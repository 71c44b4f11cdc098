// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The vector-addition benchmark.

use crate::buffer::{Buffer, BufferViewMut};
use crate::config::BenchmarkConfig;
use crate::error::{Error, Result};
use crate::hooks::SimulatorHooks;
use crate::macros::log_debug;
use crate::partition::Partition;
use crate::thread_pool::{ThreadPool, ThreadPoolBuilder};
use std::fmt;
use std::num::NonZeroUsize;

/// Largest number of elements whose sums fit in an `i32`. The largest output
/// is `5 * len - 2`.
pub const MAX_LEN: usize = (i32::MAX as usize + 2) / 5;

/// Initial value of element `index` of the first input array.
pub fn initial_a(index: usize, len: usize) -> i32 {
    (index + len) as i32
}

/// Initial value of element `index` of the second input array.
pub fn initial_b(index: usize, len: usize) -> i32 {
    (index + 2 * len) as i32
}

/// Value that element `index` of the output array holds after a run.
pub fn expected_sum(index: usize, len: usize) -> i32 {
    (2 * index + 3 * len) as i32
}

/// Element-wise addition of two integer arrays, split across a fixed number of
/// worker threads.
///
/// ```
/// # use vecbench::{NoopHooks, Preset, VectorAddBenchmark};
/// let mut benchmark = VectorAddBenchmark::new(Preset::Pair.config()).unwrap();
/// benchmark.run(&NoopHooks);
/// benchmark.verify().unwrap();
/// assert_eq!(benchmark.a().to_vec(), [2, 3]);
/// assert_eq!(benchmark.b().to_vec(), [4, 5]);
/// assert_eq!(benchmark.ab().to_vec(), [6, 8]);
/// ```
#[derive(Debug)]
pub struct VectorAddBenchmark {
    config: BenchmarkConfig,
    thread_pool: ThreadPool,
    partition: Partition,
    a: Buffer,
    b: Buffer,
    ab: Buffer,
}

impl VectorAddBenchmark {
    /// Validates the configuration and allocates the arrays. The inputs are
    /// initialized and the output is zeroed.
    ///
    /// Panics if the configuration requires [`CpuPinningPolicy::Always`] on a
    /// platform that doesn't support CPU pinning.
    ///
    /// [`CpuPinningPolicy::Always`]: crate::CpuPinningPolicy::Always
    pub fn new(config: BenchmarkConfig) -> Result<Self> {
        let step = config.step()?;
        let len = config.len;
        if len > MAX_LEN {
            return Err(Error::LengthTooLarge { len });
        }

        let thread_pool = ThreadPoolBuilder {
            num_threads: config.num_threads,
            cpu_pinning: config.cpu_pinning,
        }
        .build();
        let partition = Partition::new(len, thread_pool.num_threads(), config.partition)?;

        let a = Buffer::from_fn(len, step, config.allocation, |i| initial_a(i, len))?;
        let b = Buffer::from_fn(len, step, config.allocation, |i| initial_b(i, len))?;
        let ab = Buffer::zeroed(len, step, config.allocation)?;
        log_debug!(
            "[main thread] Allocated 3 arrays of {len} elements with step {step} ({:?})",
            config.allocation
        );

        Ok(Self {
            config,
            thread_pool,
            partition,
            a,
            b,
            ab,
        })
    }

    /// Configuration of this benchmark.
    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Number of worker threads.
    pub fn num_threads(&self) -> NonZeroUsize {
        self.thread_pool.num_threads()
    }

    /// Assignment of elements to worker threads.
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// First input array.
    pub fn a(&self) -> &Buffer {
        &self.a
    }

    /// Second input array.
    pub fn b(&self) -> &Buffer {
        &self.b
    }

    /// Output array.
    pub fn ab(&self) -> &Buffer {
        &self.ab
    }

    /// Computes the output array in parallel.
    ///
    /// Each worker writes only the elements of its own range. If notifications
    /// are enabled, each worker calls `hooks.enter_region()` before its first
    /// element and `hooks.exit_region()` after its last one. Returns once all
    /// workers are done.
    pub fn run(&mut self, hooks: &impl SimulatorHooks) -> RunSummary {
        let notify_simulator = self.config.notify_simulator;
        let trace_items = self.config.trace_items;
        let a = &self.a;
        let b = &self.b;
        let views = self.ab.split_mut(&self.partition);

        log_debug!(
            "[main thread] Forking off {} threads over {} elements",
            views.len(),
            a.len()
        );
        let workers = self.thread_pool.fork_join(views, |context, mut view| {
            let range = view.range();
            add_view(
                context.id,
                &mut view,
                a,
                b,
                notify_simulator.then_some(hooks),
                |i| {
                    if trace_items {
                        println!("{}", item_trace(i, context.id));
                    }
                },
            );
            WorkerReport {
                id: context.id,
                range,
                cpu: context.cpu,
            }
        });
        log_debug!("[main thread] Completed vector add");

        RunSummary { workers }
    }

    /// Checks every output element against its closed form, returning the
    /// first mismatch.
    pub fn verify(&self) -> Result<()> {
        let len = self.config.len;
        match self
            .ab
            .iter()
            .enumerate()
            .find(|&(index, actual)| actual != expected_sum(index, len))
        {
            Some((index, actual)) => Err(Error::Mismatch {
                index,
                expected: expected_sum(index, len),
                actual,
            }),
            None => Ok(()),
        }
    }

    /// Snapshots the arrays together with the outcome of a run.
    pub fn report(&self, summary: RunSummary) -> BenchmarkReport {
        BenchmarkReport {
            num_threads: self.num_threads().get(),
            notify_simulator: self.config.notify_simulator,
            a: ArrayReport::new(&self.a),
            b: ArrayReport::new(&self.b),
            ab: ArrayReport::new(&self.ab),
            workers: summary.workers,
        }
    }
}

/// Computes the elements of one worker's view. The hooks, if any, are notified
/// before the first element and after the last one. `trace` is called with the
/// index of each element before it is computed.
fn add_view(
    worker_id: usize,
    view: &mut BufferViewMut<'_>,
    a: &Buffer,
    b: &Buffer,
    hooks: Option<&impl SimulatorHooks>,
    mut trace: impl FnMut(usize),
) {
    if let Some(hooks) = hooks {
        hooks.enter_region(worker_id);
    }
    for (i, out) in view.iter_mut() {
        trace(i);
        *out = a[i] + b[i];
    }
    if let Some(hooks) = hooks {
        hooks.exit_region(worker_id);
    }
}

/// Line printed for each computed element when item tracing is enabled.
fn item_trace(index: usize, worker_id: usize) -> String {
    format!("i={index}, I am thread: {worker_id}")
}

/// What each worker did during a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    /// One report per worker, in worker order.
    pub workers: Vec<WorkerReport>,
}

/// What a single worker did during a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerReport {
    /// Index of the worker.
    pub id: usize,
    /// Elements computed by the worker.
    pub range: std::ops::Range<usize>,
    /// CPU the worker was pinned to, if any.
    pub cpu: Option<usize>,
}

/// Address and contents of an array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArrayReport {
    /// Address of the first element.
    pub address: usize,
    /// Logical elements.
    pub values: Vec<i32>,
}

impl ArrayReport {
    fn new(buffer: &Buffer) -> Self {
        Self {
            address: buffer.as_ptr() as usize,
            values: buffer.to_vec(),
        }
    }
}

/// Human-readable outcome of a benchmark run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BenchmarkReport {
    /// Number of worker threads.
    pub num_threads: usize,
    /// Whether simulator notifications were enabled.
    pub notify_simulator: bool,
    /// First input array.
    pub a: ArrayReport,
    /// Second input array.
    pub b: ArrayReport,
    /// Output array.
    pub ab: ArrayReport,
    /// Per-worker reports.
    pub workers: Vec<WorkerReport>,
}

impl fmt::Display for BenchmarkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "threads: {} (simulator notifications {})",
            self.num_threads,
            if self.notify_simulator { "on" } else { "off" }
        )?;
        for (name, array) in [("a", &self.a), ("b", &self.b), ("ab", &self.ab)] {
            writeln!(f, "{name} @ {:#x}: {:?}", array.address, array.values)?;
        }
        for worker in &self.workers {
            write!(f, "thread {}: elements {:?}", worker.id, worker.range)?;
            if let Some(cpu) = worker.cpu {
                write!(f, " on cpu {cpu}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
