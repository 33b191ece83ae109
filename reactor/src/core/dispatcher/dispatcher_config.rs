// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

/// Tunables for a [`Dispatcher`].
///
/// [`Dispatcher`]: crate::Dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// The loop thread is named `"{thread_name_prefix}-gen-{generation}"`.
    pub thread_name_prefix: String,

    /// How many times one endpoint's expiry callback may fire back-to-back in a single
    /// pass (an `on_expired` that keeps re-arming an already due deadline). Once the cap
    /// is hit the endpoint is picked up again on the next pass, which starts without
    /// blocking.
    pub max_expiries_per_visit: usize,

    /// Pre-allocated slots in the endpoint arena and the wait set.
    pub initial_wait_set_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            thread_name_prefix: "r3bl-reactor".into(),
            max_expiries_per_visit: 64,
            initial_wait_set_capacity: 16,
        }
    }
}
