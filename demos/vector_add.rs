// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! CLI tool to run the vector-addition benchmark and print diagnostics.

use clap::{Parser, ValueEnum};
use std::num::NonZeroUsize;
use std::process;
use vecbench::{
    AllocationStrategy, BenchmarkConfig, CpuPinningPolicy, LoggingHooks, PartitionPolicy, Preset,
    ThreadCount, VectorAddBenchmark,
};

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let config = cli.config();

    let mut benchmark = match VectorAddBenchmark::new(config) {
        Ok(benchmark) => benchmark,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            process::exit(1);
        }
    };

    println!("forking off {} threads", benchmark.num_threads());
    let summary = benchmark.run(&LoggingHooks);
    let report = benchmark.report(summary);
    print!("{report}");

    if let Err(e) = benchmark.verify() {
        eprintln!("Verification failed: {e}");
        process::exit(1);
    }
    println!("complete vector add");
}

/// CLI tool to run the vector-addition benchmark.
#[derive(Parser, Debug, PartialEq, Eq)]
#[command(version)]
struct Cli {
    /// Reference variant to start from.
    #[arg(long, value_enum, default_value_t = PresetCli::Single)]
    preset: PresetCli,

    /// Number of elements in each array. Overrides the preset.
    #[arg(long)]
    len: Option<usize>,

    /// Number of worker threads. Overrides the preset.
    #[arg(long)]
    num_threads: Option<NonZeroUsize>,

    /// Use the available parallelism as the number of worker threads.
    #[arg(long, conflicts_with = "num_threads")]
    all_cpus: bool,

    /// Distance between consecutive elements in memory.
    #[arg(long, default_value_t = NonZeroUsize::MIN)]
    step: NonZeroUsize,

    /// Notify the simulator around each worker's compute region. Overrides
    /// the preset.
    #[arg(long)]
    notify_simulator: bool,

    /// Align arrays to pages of the given size, in bytes.
    #[arg(long)]
    page_size: Option<NonZeroUsize>,

    /// Spread remainder elements instead of rejecting lengths that aren't a
    /// multiple of the number of threads.
    #[arg(long)]
    balanced: bool,

    /// Policy to pin worker threads to CPUs.
    #[arg(long, value_enum, default_value_t = CpuPinningCli::No)]
    cpu_pinning: CpuPinningCli,

    /// Don't print a line for each computed element.
    #[arg(long)]
    quiet: bool,
}

impl Cli {
    /// Builds the benchmark configuration from the preset and overrides.
    fn config(&self) -> BenchmarkConfig {
        let preset = match self.preset {
            PresetCli::Single => Preset::Single,
            PresetCli::Pair => Preset::Pair,
            PresetCli::Quad => Preset::Quad,
        }
        .config();

        BenchmarkConfig {
            len: self.len.unwrap_or(preset.len),
            num_threads: match (self.all_cpus, self.num_threads) {
                (true, _) => ThreadCount::AvailableParallelism,
                (false, Some(num_threads)) => ThreadCount::Count(num_threads),
                (false, None) => preset.num_threads,
            },
            step: self.step.get(),
            notify_simulator: self.notify_simulator || preset.notify_simulator,
            allocation: match self.page_size {
                Some(page_size) => AllocationStrategy::PageAligned { page_size },
                None => AllocationStrategy::Heap,
            },
            partition: if self.balanced {
                PartitionPolicy::Balanced
            } else {
                PartitionPolicy::Exact
            },
            cpu_pinning: match self.cpu_pinning {
                CpuPinningCli::No => CpuPinningPolicy::No,
                CpuPinningCli::IfSupported => CpuPinningPolicy::IfSupported,
                CpuPinningCli::Always => CpuPinningPolicy::Always,
            },
            trace_items: !self.quiet,
        }
    }
}

/// Reference variant of the benchmark.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum PresetCli {
    /// One element, one thread.
    Single,
    /// Two elements, two threads.
    Pair,
    /// Four elements, one thread.
    Quad,
}

/// Policy to pin worker threads to CPUs.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum CpuPinningCli {
    /// Don't pin worker threads.
    No,
    /// Pin each worker thread if the platform supports it.
    IfSupported,
    /// Pin each worker thread, or fail.
    Always,
}
