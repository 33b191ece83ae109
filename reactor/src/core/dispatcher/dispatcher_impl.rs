// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words EBADF GETFD

//! The public face of the reactor. See [`Dispatcher`].

use super::{DispatcherConfig, DispatcherError, DispatcherFault, DispatcherHooks,
            DispatcherStats, DispatcherStatsSnapshot, EndpointHandle, LoopLiveness,
            LoopResources, NoopHooks, WaitSet, run_dispatch_loop};
use crate::{DEFAULT_WAKE_REASON, Endpoint, EndpointId, LivenessState, Multiplexer,
            PollMultiplexer, SHUTDOWN_REASON, WakeOutcome, WakeSender,
            core::endpoint::EndpointList, create_wake_channel};
use std::{cell::Cell,
          os::fd::BorrowedFd,
          sync::{Arc, Mutex, MutexGuard,
                 atomic::{AtomicU8, AtomicUsize, Ordering}},
          thread::JoinHandle,
          time::Duration};

/// State shared by the [`Dispatcher`], its loop thread, and every [`EndpointHandle`]
/// (which holds it weakly).
#[allow(missing_debug_implementations)]
pub(crate) struct Shared {
    pub registry: Mutex<Registry>,
    pub wake: WakeSender,
    pub worker: Mutex<WorkerSlot>,
    /// The current incarnation. Written only with `worker` held, but read without it:
    /// `shutdown()` holds `worker` while joining, and a callback asking about the loop
    /// must not wait on that.
    pub current: Mutex<Option<Arc<LoopLiveness>>>,
    pub generation: AtomicU8,
    pub fault: Mutex<Option<DispatcherFault>>,
    pub stats: DispatcherStats,
    pub config: DispatcherConfig,
    pub max_endpoints: Option<usize>,
    /// Mirrors `registry.list.len()`.
    pub len: Arc<AtomicUsize>,
}

/// Everything the registry lock protects.
#[allow(missing_debug_implementations)]
pub(crate) struct Registry {
    pub list: EndpointList,
    pub hooks: Box<dyn DispatcherHooks>,
}

/// Loop thread bookkeeping, behind its own lock so spawning and joining never hold the
/// registry lock.
#[allow(missing_debug_implementations)]
pub(crate) struct WorkerSlot {
    handle: Option<JoinHandle<LoopResources>>,
    /// Loop resources while no thread is running.
    parked: Option<LoopResources>,
}

thread_local! {
    /// The dispatcher whose pass is running on this thread, if any.
    static DISPATCHING: Cell<*const Shared> = const { Cell::new(std::ptr::null()) };
}

/// Marks the current thread as running a pass of `shared` until dropped.
pub(crate) struct DispatchScope {
    previous: *const Shared,
}

impl DispatchScope {
    pub fn enter(shared: &Shared) -> Self {
        Self {
            previous: DISPATCHING.replace(std::ptr::from_ref(shared)),
        }
    }
}

impl Drop for DispatchScope {
    fn drop(&mut self) { DISPATCHING.set(self.previous); }
}

impl Shared {
    pub fn is_dispatching_here(&self) -> bool {
        DISPATCHING.with(|it| std::ptr::eq(it.get(), self))
    }

    pub fn check_not_reentrant(&self) -> Result<(), DispatcherError> {
        if self.is_dispatching_here() {
            Err(DispatcherError::ReentrantCall)
        } else {
            Ok(())
        }
    }

    /// Locks the registry for an API call made from outside the loop.
    pub fn lock_registry(&self) -> Result<MutexGuard<'_, Registry>, DispatcherError> {
        self.check_not_reentrant()?;
        self.registry
            .lock()
            .map_err(|_| DispatcherError::Poisoned { which: "registry" })
    }

    fn current_liveness(&self) -> Option<Arc<LoopLiveness>> {
        self.current.lock().ok().and_then(|it| it.clone())
    }

    fn lock_worker(&self) -> Result<MutexGuard<'_, WorkerSlot>, DispatcherError> {
        self.worker
            .lock()
            .map_err(|_| DispatcherError::Poisoned { which: "worker" })
    }

    /// Checks that `endpoint` may join `list`: its handle is open and there is room.
    pub fn admit(&self, list: &EndpointList, endpoint: &Endpoint) -> Result<(), DispatcherError> {
        validate_handle(endpoint.handler.source())?;
        if let Some(capacity) = self.max_endpoints
            && list.len() >= capacity
        {
            return Err(DispatcherError::CapacityExceeded { capacity });
        }
        Ok(())
    }

    pub fn has_fault(&self) -> bool {
        self.fault.lock().map(|it| it.is_some()).unwrap_or(true)
    }

    pub fn record_fault(&self, fault: DispatcherFault) {
        tracing::error!(message = "dispatcher loop faulted", fault = ?fault);
        if let Ok(mut slot) = self.fault.lock() {
            *slot = Some(fault);
        }
    }

    /// Wakes the loop so a change made under the registry lock takes effect.
    pub fn wake(&self, reason: u8) -> Result<(), DispatcherError> {
        self.wake
            .send(reason)
            .map(|_| ())
            .map_err(DispatcherError::WakeChannel)
    }

    pub fn detach(&self, id: EndpointId) -> Result<Option<Endpoint>, DispatcherError> {
        let removed = self.lock_registry()?.list.remove(id);
        let Some(removed) = removed else {
            return Ok(None);
        };
        tracing::debug!(message = "endpoint detached", id = %id);
        self.wake(DEFAULT_WAKE_REASON)?;
        Ok(removed.into_endpoint())
    }

    /// Spawns the loop thread unless one is already running.
    fn ensure_loop_running(self: &Arc<Self>) -> Result<(), DispatcherError> {
        let mut worker = self.lock_worker()?;

        // The loop may have faulted after the caller's own check (it can still look
        // alive while unwinding). Its fault must be taken before a new incarnation starts.
        if self.has_fault() {
            return Err(DispatcherError::LoopFaulted);
        }

        if let Some(liveness) = self.current_liveness()
            && liveness.is_running() == LivenessState::Running
        {
            return Ok(());
        }

        // A previous incarnation exited on its own (fault). Reclaim its resources.
        if let Some(handle) = worker.handle.take() {
            match handle.join() {
                Ok(resources) => worker.parked = Some(resources),
                Err(payload) => {
                    self.record_fault(DispatcherFault::from_panic(payload.as_ref()));
                }
            }
        }

        let Some(resources) = worker.parked.take() else {
            return Err(DispatcherError::LoopFaulted);
        };
        if let Err(error) = resources.receiver.discard_pending() {
            worker.parked = Some(resources);
            return Err(DispatcherError::WakeChannel(error));
        }

        let generation = self.generation.load(Ordering::SeqCst).wrapping_add(1);
        let liveness = Arc::new(LoopLiveness::new(generation));
        let thread_name = format!("{}-gen-{generation}", self.config.thread_name_prefix);

        let shared = Arc::clone(self);
        let thread_liveness = Arc::clone(&liveness);
        let spawned = std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || run_dispatch_loop(shared, resources, thread_liveness));

        match spawned {
            Ok(handle) => {
                worker.handle = Some(handle);
                if let Ok(mut current) = self.current.lock() {
                    *current = Some(liveness);
                }
                self.generation.store(generation, Ordering::SeqCst);
                tracing::debug!(message = "dispatcher loop spawned", thread = %thread_name);
                Ok(())
            }
            Err(error) => {
                self.record_fault(DispatcherFault::ThreadSpawn(std::io::Error::new(
                    error.kind(),
                    error.to_string(),
                )));
                Err(DispatcherError::ThreadSpawn(error))
            }
        }
    }

    fn shutdown(&self) -> Result<(), DispatcherError> {
        self.check_not_reentrant()?;
        let mut worker = self.lock_worker()?;
        let Some(handle) = worker.handle.take() else {
            return Ok(());
        };

        // Keep trying until the sentinel is queued: a full pipe means the loop is behind
        // on reading, and the sentinel must not be coalesced away.
        while !handle.is_finished() {
            match self.wake.send(SHUTDOWN_REASON) {
                Ok(WakeOutcome::Queued) => break,
                Ok(WakeOutcome::Coalesced) => std::thread::sleep(Duration::from_millis(1)),
                Err(error) => {
                    worker.handle = Some(handle);
                    return Err(DispatcherError::WakeChannel(error));
                }
            }
        }

        match handle.join() {
            Ok(resources) => worker.parked = Some(resources),
            Err(payload) => {
                self.record_fault(DispatcherFault::from_panic(payload.as_ref()));
            }
        }
        tracing::debug!(
            message = "dispatcher loop joined",
            generation = self.generation.load(Ordering::SeqCst)
        );
        Ok(())
    }
}

/// Rejects descriptors that are not open (`fcntl(F_GETFD)` fails with `EBADF`).
fn validate_handle(fd: BorrowedFd<'_>) -> Result<(), DispatcherError> {
    rustix::io::fcntl_getfd(fd)
        .map(|_| ())
        .map_err(|errno| DispatcherError::InvalidHandle(errno.into()))
}

/// A level-triggered readiness dispatcher: one background thread multiplexing every
/// attached [`Endpoint`] and servicing their deadlines.
///
/// # Lifecycle
///
/// ```text
///  new() ──► [no thread] ──attach()──► [loop running, gen N] ──shutdown()──► [no thread]
///                 ▲                          │                                    │
///                 │                          └── fault (take_fault()) ────────────┤
///                 └────────────────────────── next attach(): gen N+1 ◄────────────┘
/// ```
///
/// - The loop thread starts on the first [`attach()`], not in [`new()`].
/// - [`shutdown()`] stops it and keeps the endpoints attached; the next [`attach()`]
///   starts a new incarnation ([`loop_generation()`] goes up by one).
/// - If the loop stops on a fault, [`attach()`] returns
///   [`DispatcherError::LoopFaulted`] until [`take_fault()`] is called.
/// - Dropping the dispatcher shuts the loop down and drops every endpoint still
///   attached (closing their handles).
///
/// # Calling from callbacks
///
/// Methods that lock the registry return [`DispatcherError::ReentrantCall`] when called
/// from a callback or hook running on this dispatcher. Use the [`Context`] instead.
///
/// [`Context`]: crate::Context
/// [`attach()`]: Self::attach
/// [`loop_generation()`]: Self::loop_generation
/// [`new()`]: Self::new
/// [`shutdown()`]: Self::shutdown
/// [`take_fault()`]: Self::take_fault
#[allow(missing_debug_implementations)]
pub struct Dispatcher {
    shared: Arc<Shared>,
}

impl Dispatcher {
    /// A dispatcher with the [`PollMultiplexer`], no hooks, and the default config.
    ///
    /// # Errors
    ///
    /// Fails if the wake channel cannot be created (out of file descriptors).
    pub fn new() -> Result<Self, DispatcherError> {
        Self::with_parts(DispatcherConfig::default(), PollMultiplexer::new(), NoopHooks)
    }

    /// # Errors
    ///
    /// See [`new()`](Self::new).
    pub fn with_hooks(hooks: impl DispatcherHooks) -> Result<Self, DispatcherError> {
        Self::with_parts(DispatcherConfig::default(), PollMultiplexer::new(), hooks)
    }

    /// # Errors
    ///
    /// See [`new()`](Self::new).
    pub fn with_parts(
        config: DispatcherConfig,
        multiplexer: impl Multiplexer,
        hooks: impl DispatcherHooks,
    ) -> Result<Self, DispatcherError> {
        let (sender, receiver) =
            create_wake_channel().map_err(DispatcherError::WakeChannel)?;
        let list = EndpointList::with_capacity(config.initial_wait_set_capacity);
        let len = list.len_mirror();
        let max_endpoints = multiplexer.max_endpoints();

        let resources = LoopResources {
            receiver,
            multiplexer: Box::new(multiplexer),
            wait_set: WaitSet::with_capacity(config.initial_wait_set_capacity),
        };

        Ok(Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(Registry {
                    list,
                    hooks: Box::new(hooks),
                }),
                wake: sender,
                worker: Mutex::new(WorkerSlot {
                    handle: None,
                    parked: Some(resources),
                }),
                current: Mutex::new(None),
                generation: AtomicU8::new(0),
                fault: Mutex::new(None),
                stats: DispatcherStats::default(),
                config,
                max_endpoints,
                len,
            }),
        })
    }

    /// Moves `endpoint` in, starts the loop thread if needed, and wakes it.
    ///
    /// On error the endpoint is dropped.
    ///
    /// # Errors
    ///
    /// [`InvalidHandle`], [`CapacityExceeded`], [`LoopFaulted`], [`ReentrantCall`],
    /// [`ThreadSpawn`], [`WakeChannel`], [`Poisoned`].
    ///
    /// [`CapacityExceeded`]: DispatcherError::CapacityExceeded
    /// [`InvalidHandle`]: DispatcherError::InvalidHandle
    /// [`LoopFaulted`]: DispatcherError::LoopFaulted
    /// [`Poisoned`]: DispatcherError::Poisoned
    /// [`ReentrantCall`]: DispatcherError::ReentrantCall
    /// [`ThreadSpawn`]: DispatcherError::ThreadSpawn
    /// [`WakeChannel`]: DispatcherError::WakeChannel
    pub fn attach(&self, endpoint: Endpoint) -> Result<EndpointHandle, DispatcherError> {
        self.shared.check_not_reentrant()?;
        if self.shared.has_fault() {
            return Err(DispatcherError::LoopFaulted);
        }

        let id = {
            let mut registry = self.shared.lock_registry()?;
            self.shared.admit(&registry.list, &endpoint)?;
            registry.list.push_back(endpoint)
        };

        if let Err(error) = self.shared.ensure_loop_running() {
            if let Ok(mut registry) = self.shared.registry.lock() {
                drop(registry.list.remove(id));
            }
            return Err(error);
        }

        self.shared.wake(DEFAULT_WAKE_REASON)?;
        tracing::debug!(message = "endpoint attached", id = %id);
        Ok(EndpointHandle::new(Arc::downgrade(&self.shared), id))
    }

    /// Unlinks the endpoint and wakes the loop. A stale or unknown id is a no-op that
    /// returns `Ok(None)`.
    ///
    /// # Errors
    ///
    /// [`ReentrantCall`], [`Poisoned`], [`WakeChannel`].
    ///
    /// [`Poisoned`]: DispatcherError::Poisoned
    /// [`ReentrantCall`]: DispatcherError::ReentrantCall
    /// [`WakeChannel`]: DispatcherError::WakeChannel
    pub fn detach(&self, id: EndpointId) -> Result<Option<Endpoint>, DispatcherError> {
        self.shared.detach(id)
    }

    /// Unlinks every endpoint, in attach order.
    ///
    /// # Errors
    ///
    /// See [`detach()`](Self::detach).
    pub fn detach_all(&self) -> Result<Vec<Endpoint>, DispatcherError> {
        let drained = self.shared.lock_registry()?.list.drain();
        self.shared.wake(DEFAULT_WAKE_REASON)?;
        Ok(drained
            .into_iter()
            .filter_map(|it| it.into_endpoint())
            .collect())
    }

    /// Interrupts the loop's wait. The hooks see [`DEFAULT_WAKE_REASON`].
    ///
    /// # Errors
    ///
    /// [`WakeChannel`](DispatcherError::WakeChannel).
    pub fn wake(&self) -> Result<(), DispatcherError> { self.shared.wake(DEFAULT_WAKE_REASON) }

    /// Interrupts the loop's wait; [`DispatcherHooks::on_wake()`] receives `reason`.
    /// Wakes that arrive while the pipe is full are coalesced.
    ///
    /// # Errors
    ///
    /// [`ReservedWakeReason`] for `0`, [`WakeChannel`] if the write fails.
    ///
    /// [`ReservedWakeReason`]: DispatcherError::ReservedWakeReason
    /// [`WakeChannel`]: DispatcherError::WakeChannel
    pub fn wake_with_reason(&self, reason: u8) -> Result<(), DispatcherError> {
        if reason == SHUTDOWN_REASON {
            return Err(DispatcherError::ReservedWakeReason);
        }
        self.shared.wake(reason)
    }

    /// Stops the loop thread and waits for it. Endpoints stay attached. A no-op when no
    /// thread is running.
    ///
    /// # Errors
    ///
    /// [`ReentrantCall`], [`Poisoned`], [`WakeChannel`].
    ///
    /// [`Poisoned`]: DispatcherError::Poisoned
    /// [`ReentrantCall`]: DispatcherError::ReentrantCall
    /// [`WakeChannel`]: DispatcherError::WakeChannel
    pub fn shutdown(&self) -> Result<(), DispatcherError> { self.shared.shutdown() }

    /// Number of attached endpoints. Safe to call from callbacks.
    #[must_use]
    pub fn len(&self) -> usize { self.shared.len.load(Ordering::SeqCst) }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Safe to call from callbacks, including while another thread is in
    /// [`shutdown()`](Self::shutdown).
    #[must_use]
    pub fn is_loop_running(&self) -> LivenessState {
        self.shared
            .current_liveness()
            .map_or(LivenessState::Terminated, |it| it.is_running())
    }

    /// Incarnation of the loop thread: `0` before the first start, then incremented on
    /// every start. Wraps from `255` to `0`.
    #[must_use]
    pub fn loop_generation(&self) -> u8 { self.shared.generation.load(Ordering::SeqCst) }

    #[must_use]
    pub fn stats(&self) -> DispatcherStatsSnapshot { self.shared.stats.snapshot() }

    /// Returns and clears the fault the loop stopped on, which lets the next
    /// [`attach()`](Self::attach) restart it.
    #[must_use]
    pub fn take_fault(&self) -> Option<DispatcherFault> {
        self.shared.fault.lock().ok().and_then(|mut it| it.take())
    }

    /// Runs `f` against the installed hooks, under the registry lock.
    ///
    /// # Errors
    ///
    /// [`ReentrantCall`], [`Poisoned`].
    ///
    /// [`Poisoned`]: DispatcherError::Poisoned
    /// [`ReentrantCall`]: DispatcherError::ReentrantCall
    pub fn inspect_hooks<R>(
        &self,
        f: impl FnOnce(&mut dyn DispatcherHooks) -> R,
    ) -> Result<R, DispatcherError> {
        let mut registry = self.shared.lock_registry()?;
        Ok(f(registry.hooks.as_mut()))
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        match self.shared.shutdown() {
            Ok(()) => {}
            // Dropped from one of its own callbacks: the thread cannot join itself, so
            // just ask it to stop.
            Err(DispatcherError::ReentrantCall) => {
                let _unused = self.shared.wake.send(SHUTDOWN_REASON);
            }
            Err(error) => {
                tracing::warn!(message = "dispatcher shutdown on drop failed", error = ?error);
            }
        }
    }
}
