// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Notifications sent to an external simulator around each worker's compute
//! region.

use crate::macros::log_info;
use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Callbacks bracketing the compute region of each worker thread.
///
/// When notifications are enabled, every worker calls
/// [`enter_region()`](Self::enter_region) once before computing its first
/// element and [`exit_region()`](Self::exit_region) once after its last one.
/// Both are fire-and-forget: they can't influence the computed values.
pub trait SimulatorHooks: Sync {
    /// Signals that the given worker starts its compute region.
    fn enter_region(&self, worker_id: usize);

    /// Signals that the given worker finished its compute region.
    fn exit_region(&self, worker_id: usize);
}

impl<H: SimulatorHooks + ?Sized> SimulatorHooks for &H {
    fn enter_region(&self, worker_id: usize) {
        (**self).enter_region(worker_id)
    }

    fn exit_region(&self, worker_id: usize) {
        (**self).exit_region(worker_id)
    }
}

/// Hooks that do nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHooks;

impl SimulatorHooks for NoopHooks {
    fn enter_region(&self, _worker_id: usize) {}

    fn exit_region(&self, _worker_id: usize) {}
}

/// Hooks that emit a log record for each notification. Silent unless the `log`
/// feature is enabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingHooks;

impl SimulatorHooks for LoggingHooks {
    fn enter_region(&self, _worker_id: usize) {
        log_info!("[thread {_worker_id}] Entering simulator region");
    }

    fn exit_region(&self, _worker_id: usize) {
        log_info!("[thread {_worker_id}] Exiting simulator region");
    }
}

/// Kind of a simulator notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionKind {
    /// [`SimulatorHooks::enter_region()`] was called.
    Enter,
    /// [`SimulatorHooks::exit_region()`] was called.
    Exit,
}

/// A notification received by [`RecordingHooks`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionEvent {
    /// Worker that sent the notification.
    pub worker_id: usize,
    /// Kind of notification.
    pub kind: RegionKind,
}

/// Hooks that record every notification, for inspection after a run.
#[derive(Debug)]
pub struct RecordingHooks {
    /// All notifications, in the order they were received.
    events: Mutex<Vec<RegionEvent>>,
    /// Number of enter notifications, per worker.
    enters: Vec<CachePadded<AtomicUsize>>,
    /// Number of exit notifications, per worker.
    exits: Vec<CachePadded<AtomicUsize>>,
}

impl RecordingHooks {
    /// Creates hooks able to record notifications from the given number of
    /// workers.
    pub fn new(num_workers: usize) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            enters: (0..num_workers).map(|_| Default::default()).collect(),
            exits: (0..num_workers).map(|_| Default::default()).collect(),
        }
    }

    /// Returns all the notifications received so far, in order.
    pub fn events(&self) -> Vec<RegionEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Returns the kinds of notifications received from the given worker, in
    /// order.
    pub fn events_for(&self, worker_id: usize) -> Vec<RegionKind> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.worker_id == worker_id)
            .map(|event| event.kind)
            .collect()
    }

    /// Number of times the given worker entered its region.
    pub fn enter_count(&self, worker_id: usize) -> usize {
        self.enters[worker_id].load(Ordering::SeqCst)
    }

    /// Number of times the given worker exited its region.
    pub fn exit_count(&self, worker_id: usize) -> usize {
        self.exits[worker_id].load(Ordering::SeqCst)
    }

    /// Forgets all the notifications received so far.
    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
        for counter in self.enters.iter().chain(self.exits.iter()) {
            counter.store(0, Ordering::SeqCst);
        }
    }

    fn record(&self, worker_id: usize, kind: RegionKind) {
        let counters = match kind {
            RegionKind::Enter => &self.enters,
            RegionKind::Exit => &self.exits,
        };
        counters[worker_id].fetch_add(1, Ordering::SeqCst);
        self.events
            .lock()
            .unwrap()
            .push(RegionEvent { worker_id, kind });
    }
}

impl SimulatorHooks for RecordingHooks {
    fn enter_region(&self, worker_id: usize) {
        self.record(worker_id, RegionKind::Enter);
    }

    fn exit_region(&self, worker_id: usize) {
        self.record(worker_id, RegionKind::Exit);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_recording_hooks() {
        let hooks = RecordingHooks::new(2);
        hooks.enter_region(1);
        hooks.enter_region(0);
        hooks.exit_region(1);

        assert_eq!(
            hooks.events(),
            [
                RegionEvent {
                    worker_id: 1,
                    kind: RegionKind::Enter
                },
                RegionEvent {
                    worker_id: 0,
                    kind: RegionKind::Enter
                },
                RegionEvent {
                    worker_id: 1,
                    kind: RegionKind::Exit
                },
            ]
        );
        assert_eq!(hooks.events_for(0), [RegionKind::Enter]);
        assert_eq!(hooks.events_for(1), [RegionKind::Enter, RegionKind::Exit]);
        assert_eq!(hooks.enter_count(0), 1);
        assert_eq!(hooks.exit_count(0), 0);
        assert_eq!(hooks.exit_count(1), 1);

        hooks.clear();
        assert!(hooks.events().is_empty());
        assert_eq!(hooks.enter_count(1), 0);
    }

    #[test]
    fn test_recording_hooks_by_reference() {
        fn notify(hooks: impl SimulatorHooks) {
            hooks.enter_region(0);
            hooks.exit_region(0);
        }

        let hooks = RecordingHooks::new(1);
        notify(&hooks);
        notify(&&hooks);
        assert_eq!(hooks.enter_count(0), 2);
        assert_eq!(hooks.exit_count(0), 2);
    }

    #[test]
    fn test_recording_hooks_multi_threaded() {
        let hooks = RecordingHooks::new(4);
        std::thread::scope(|s| {
            for id in 0..4 {
                let hooks = &hooks;
                s.spawn(move || {
                    for _ in 0..100 {
                        hooks.enter_region(id);
                        hooks.exit_region(id);
                    }
                });
            }
        });
        for id in 0..4 {
            assert_eq!(hooks.enter_count(id), 100);
            assert_eq!(hooks.exit_count(id), 100);
            assert_eq!(hooks.events_for(id).len(), 200);
        }
    }

    #[test]
    #[should_panic]
    fn test_recording_hooks_unknown_worker() {
        RecordingHooks::new(1).enter_region(1);
    }
}
