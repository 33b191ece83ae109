// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the dispatcher loop. Read them with [`Dispatcher::stats()`].
///
/// [`Dispatcher::stats()`]: crate::Dispatcher::stats
#[derive(Debug, Default)]
pub struct DispatcherStats {
    passes: AtomicU64,
    wait_set_rebuilds: AtomicU64,
    expiries: AtomicU64,
    disconnects: AtomicU64,
    wakes: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatcherStatsSnapshot {
    /// Completed dispatch passes.
    pub passes: u64,
    /// Times the wait set had to be rebuilt instead of refreshed in place.
    pub wait_set_rebuilds: u64,
    /// `on_expired` invocations.
    pub expiries: u64,
    /// Disconnected transitions.
    pub disconnects: u64,
    /// Non-zero wake reasons drained.
    pub wakes: u64,
}

impl DispatcherStats {
    pub(crate) fn record_pass(&self) { self.passes.fetch_add(1, Ordering::Relaxed); }

    pub(crate) fn record_wait_set_rebuild(&self) {
        self.wait_set_rebuilds.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expiry(&self) { self.expiries.fetch_add(1, Ordering::Relaxed); }

    pub(crate) fn record_disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_wake(&self) { self.wakes.fetch_add(1, Ordering::Relaxed); }

    #[must_use]
    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            passes: self.passes.load(Ordering::Relaxed),
            wait_set_rebuilds: self.wait_set_rebuilds.load(Ordering::Relaxed),
            expiries: self.expiries.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
            wakes: self.wakes.load(Ordering::Relaxed),
        }
    }
}
