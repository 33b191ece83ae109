// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words taskthreads

//! Error types for the dispatcher. See [`DispatcherError`] and [`DispatcherFault`].

use crate::EndpointId;

/// Errors returned synchronously by [`Dispatcher`] and [`EndpointHandle`] operations.
///
/// | Variant                  | Cause                                                        | Recoverable? |
/// | :----------------------- | :----------------------------------------------------------- | :----------- |
/// | [`InvalidHandle`]        | The endpoint's handle is not an open descriptor              | No           |
/// | [`CapacityExceeded`]     | The multiplexer's fixed wait capacity is used up             | After detach |
/// | [`LoopFaulted`]          | The loop stopped on a fault that has not been taken yet      | After take   |
/// | [`ReentrantCall`]        | Called from a callback running on this same dispatcher       | Use Context  |
/// | [`ReservedWakeReason`]   | `wake_with_reason(0)`                                        | Yes          |
/// | [`WakeChannel`]          | Writing the wake byte failed                                 | Maybe        |
/// | [`ThreadSpawn`]          | [`std::thread::Builder::spawn()`] failed                     | Maybe        |
/// | [`Poisoned`]             | A thread panicked while holding a dispatcher lock            | No           |
/// | [`DispatcherGone`]       | The handle outlived its dispatcher                           | No           |
/// | [`NotAttached`]          | The handle's endpoint has been detached                      | No           |
///
/// [`CapacityExceeded`]: Self::CapacityExceeded
/// [`Dispatcher`]: crate::Dispatcher
/// [`DispatcherGone`]: Self::DispatcherGone
/// [`EndpointHandle`]: crate::EndpointHandle
/// [`InvalidHandle`]: Self::InvalidHandle
/// [`LoopFaulted`]: Self::LoopFaulted
/// [`NotAttached`]: Self::NotAttached
/// [`Poisoned`]: Self::Poisoned
/// [`ReentrantCall`]: Self::ReentrantCall
/// [`ReservedWakeReason`]: Self::ReservedWakeReason
/// [`ThreadSpawn`]: Self::ThreadSpawn
/// [`WakeChannel`]: Self::WakeChannel
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum DispatcherError {
    #[error("Endpoint handle is not an open file descriptor")]
    #[diagnostic(
        code(r3bl_reactor::dispatcher::invalid_handle),
        help("The handler's source() must return a descriptor it still owns")
    )]
    InvalidHandle(#[source] std::io::Error),

    #[error("Dispatcher is at capacity ({capacity} endpoints)")]
    #[diagnostic(
        code(r3bl_reactor::dispatcher::capacity_exceeded),
        help("Detach an endpoint first, or spread endpoints over several dispatchers")
    )]
    CapacityExceeded { capacity: usize },

    #[error("Dispatcher loop stopped on a fault")]
    #[diagnostic(
        code(r3bl_reactor::dispatcher::loop_faulted),
        help("Call Dispatcher::take_fault() to inspect the fault; the next attach restarts the loop")
    )]
    LoopFaulted,

    #[error("Dispatcher API called from one of its own callbacks")]
    #[diagnostic(
        code(r3bl_reactor::dispatcher::reentrant_call),
        help("Use the Context passed to the callback instead")
    )]
    ReentrantCall,

    #[error("Wake reason 0 is reserved for shutdown")]
    #[diagnostic(
        code(r3bl_reactor::dispatcher::reserved_wake_reason),
        help("Use Dispatcher::shutdown() to stop the loop")
    )]
    ReservedWakeReason,

    #[error("Failed to write to the dispatcher wake channel")]
    #[diagnostic(code(r3bl_reactor::dispatcher::wake_channel))]
    WakeChannel(#[source] std::io::Error),

    #[error("Failed to spawn dispatcher thread")]
    #[diagnostic(code(r3bl_reactor::dispatcher::thread_spawn))]
    #[cfg_attr(
        target_os = "linux",
        diagnostic(help(
            "The system may have reached its thread limit - \
             check `ulimit -u` for per-user limit, \
             `cat /proc/sys/kernel/threads-max` for system-wide limit"
        ))
    )]
    #[cfg_attr(
        target_os = "macos",
        diagnostic(help(
            "The system may have reached its thread limit - \
             check `ulimit -u` for per-user limit, \
             `sysctl kern.num_taskthreads` for per-process limit"
        ))
    )]
    ThreadSpawn(#[source] std::io::Error),

    #[error("Dispatcher internal mutex poisoned ({which})")]
    #[diagnostic(
        code(r3bl_reactor::dispatcher::mutex_poisoned),
        help(
            "A prior thread panicked while holding a dispatcher lock. \
             Create a new dispatcher."
        )
    )]
    Poisoned {
        /// Which mutex was poisoned (`"registry"`, `"worker"` or `"fault"`).
        which: &'static str,
    },

    #[error("Dispatcher has been dropped")]
    #[diagnostic(code(r3bl_reactor::dispatcher::gone))]
    DispatcherGone,

    #[error("{0} is not attached")]
    #[diagnostic(code(r3bl_reactor::dispatcher::not_attached))]
    NotAttached(EndpointId),
}

/// Why the dispatcher loop stopped on its own. Retrieved with
/// [`Dispatcher::take_fault()`] and reported to [`DispatcherHooks::on_fault()`].
///
/// [`Dispatcher::take_fault()`]: crate::Dispatcher::take_fault
/// [`DispatcherHooks::on_fault()`]: crate::DispatcherHooks::on_fault
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum DispatcherFault {
    /// The multiplexer wait failed with something other than `EINTR`.
    #[error("Multiplexer wait failed")]
    #[diagnostic(code(r3bl_reactor::fault::wait))]
    Wait(#[source] std::io::Error),

    /// Reading the wake channel failed.
    #[error("Failed to read the dispatcher wake channel")]
    #[diagnostic(code(r3bl_reactor::fault::wake_channel))]
    WakeChannel(#[source] std::io::Error),

    /// A callback or hook panicked. Its endpoint has been dropped.
    #[error("Dispatcher callback panicked: {message}")]
    #[diagnostic(
        code(r3bl_reactor::fault::panicked),
        help("Callbacks must not panic; the endpoint whose callback panicked was dropped")
    )]
    Panicked { message: String },

    /// The loop thread could not be started; its resources are lost and the dispatcher
    /// cannot run again.
    #[error("Failed to spawn dispatcher thread")]
    #[diagnostic(code(r3bl_reactor::fault::thread_spawn))]
    ThreadSpawn(#[source] std::io::Error),
}

impl DispatcherFault {
    /// Extracts a readable message from a [`std::panic::catch_unwind()`] payload.
    #[must_use]
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(it) = payload.downcast_ref::<&str>() {
            (*it).to_string()
        } else if let Some(it) = payload.downcast_ref::<String>() {
            it.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked { message }
    }
}
