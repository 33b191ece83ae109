// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words EINTR

//! The body of the dispatcher thread. See [`run_dispatch_loop()`].

use super::{Context, DispatchScope, DispatcherFault, LoopLiveness, Registry, Shared,
            TerminationGuard, WaitSet, nearest_deadline};
use crate::{Continuation, DrainOutcome, EndpointHandler, EndpointId, Multiplexer,
            SHUTDOWN_REASON, WakeReasons, WakeReceiver, core::endpoint::EndpointList};
use smallvec::SmallVec;
use std::{io::ErrorKind,
          panic::{AssertUnwindSafe, catch_unwind},
          sync::Arc,
          time::Duration};

/// Everything the loop thread owns. Handed back through the [`JoinHandle`] when the
/// thread exits, so the next incarnation can reuse it.
///
/// [`JoinHandle`]: std::thread::JoinHandle
#[allow(missing_debug_implementations)]
pub(crate) struct LoopResources {
    pub receiver: WakeReceiver,
    pub multiplexer: Box<dyn Multiplexer>,
    pub wait_set: WaitSet,
}

/// Result of the locked part of an iteration.
struct Pass {
    continuation: Continuation,
    timeout: Option<Duration>,
}

/// Runs passes until the shutdown sentinel arrives or a fault stops the loop.
///
/// One iteration:
///
/// 1. Drain the wake channel without blocking.
/// 2. Under the registry lock: report wake reasons, stop on [`SHUTDOWN_REASON`], run
///    [`on_iteration()`], visit every endpoint, then bring the wait set in line with the
///    list and compute the time to the nearest deadline.
/// 3. Without the lock: block in [`Multiplexer::wait()`].
///
/// [`on_iteration()`]: crate::DispatcherHooks::on_iteration
pub(crate) fn run_dispatch_loop(
    shared: Arc<Shared>,
    mut resources: LoopResources,
    liveness: Arc<LoopLiveness>,
) -> LoopResources {
    let generation = liveness.generation;
    let _guard = TerminationGuard(liveness);
    tracing::debug!(message = "dispatcher loop started", generation = generation);

    let mut reasons = WakeReasons::new();
    loop {
        match run_iteration(&shared, &mut resources, &mut reasons) {
            Ok(Continuation::Continue) => {}
            Ok(Continuation::Stop) => break,
            Err(fault) => {
                report_fault(&shared, &fault);
                shared.record_fault(fault);
                break;
            }
        }
    }

    tracing::debug!(message = "dispatcher loop exiting", generation = generation);
    resources
}

fn run_iteration(
    shared: &Arc<Shared>,
    resources: &mut LoopResources,
    reasons: &mut WakeReasons,
) -> Result<Continuation, DispatcherFault> {
    reasons.clear();
    match resources.receiver.drain_into(reasons) {
        Ok(DrainOutcome::Drained) => {}
        // The sender lives as long as `shared`; treat its loss like a shutdown.
        Ok(DrainOutcome::SenderClosed) => reasons.push(SHUTDOWN_REASON),
        Err(error) => return Err(DispatcherFault::WakeChannel(error)),
    }

    let pass = {
        let Ok(mut registry) = shared.registry.lock() else {
            return Err(DispatcherFault::Panicked {
                message: "registry lock poisoned".into(),
            });
        };
        let _scope = DispatchScope::enter(shared);
        let max_expiries = shared.config.max_expiries_per_visit;
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            run_pass(shared, &mut registry, &mut resources.wait_set, reasons, max_expiries)
        }));
        match outcome {
            Ok(pass) => pass,
            Err(payload) => {
                let orphans = registry.list.discard_orphans();
                tracing::warn!(message = "dropped endpoints after panic", count = orphans);
                return Err(DispatcherFault::from_panic(payload.as_ref()));
            }
        }
    };

    if pass.continuation == Continuation::Stop {
        return Ok(Continuation::Stop);
    }

    let wake_fd = resources.receiver.raw_fd();
    match resources
        .multiplexer
        .wait(wake_fd, resources.wait_set.entries_mut(), pass.timeout)
    {
        Ok(_) => Ok(Continuation::Continue),
        Err(error) if error.kind() == ErrorKind::Interrupted => {
            // EINTR: run a pass with no readiness.
            resources.wait_set.clear_readiness();
            Ok(Continuation::Continue)
        }
        Err(error) => Err(DispatcherFault::Wait(error)),
    }
}

fn run_pass(
    shared: &Arc<Shared>,
    registry: &mut Registry,
    wait_set: &mut WaitSet,
    reasons: &[u8],
    max_expiries: usize,
) -> Pass {
    let Registry { list, hooks } = registry;

    for &reason in reasons {
        if reason != SHUTDOWN_REASON {
            shared.stats.record_wake();
            hooks.on_wake(reason);
        }
    }
    if reasons.contains(&SHUTDOWN_REASON) {
        tracing::debug!(message = "shutdown sentinel received");
        return Pass {
            continuation: Continuation::Stop,
            timeout: None,
        };
    }

    hooks.on_iteration();

    // Endpoints attached during the pass are not in the snapshot.
    let snapshot: SmallVec<[EndpointId; 32]> = list.ids().collect();
    for id in snapshot {
        if !list.contains(id) {
            continue;
        }
        hooks.on_endpoint_visited(&mut Context::new(id, list, shared));
        visit_endpoint(shared, list, wait_set, id, max_expiries);
    }

    wait_set.sync(list, &shared.stats);
    shared.stats.record_pass();

    let timeout = nearest_deadline(list);
    tracing::trace!(message = "pass complete", endpoints = list.len(), timeout = ?timeout);
    Pass {
        continuation: Continuation::Continue,
        timeout,
    }
}

/// At most one readiness callback, then every due expiry.
fn visit_endpoint(
    shared: &Arc<Shared>,
    list: &mut EndpointList,
    wait_set: &WaitSet,
    id: EndpointId,
    max_expiries: usize,
) {
    let Some(node) = list.get(id) else {
        return;
    };
    let (interest, parked) = (node.interest, node.parked);
    let readiness = wait_set.readiness_for(id, node.wait_slot);

    if readiness.is_disconnect(interest) {
        if interest.disconnecting {
            disconnect(shared, list, id);
            return;
        }
        if interest.readable && !readiness.invalid {
            // The read will observe EOF or the error.
            invoke(shared, list, id, |handler, cx| handler.on_readable(cx));
        } else if !parked && let Some(node) = list.get_mut(id) {
            node.parked = true;
            tracing::warn!(
                message = "endpoint parked: disconnect reported without a handler for it",
                id = %id,
                readiness = ?readiness
            );
        }
    } else if interest.readable && readiness.readable {
        invoke(shared, list, id, |handler, cx| handler.on_readable(cx));
    } else if interest.writable && (readiness.writable || readiness.error) {
        invoke(shared, list, id, |handler, cx| handler.on_writable(cx));
    }

    fire_expiries(shared, list, id, max_expiries);
}

/// Clears `disconnecting`, unlinks, and only then calls `on_disconnected`.
fn disconnect(shared: &Arc<Shared>, list: &mut EndpointList, id: EndpointId) {
    let Some(mut node) = list.remove(id) else {
        return;
    };
    node.interest.disconnecting = false;
    shared.stats.record_disconnect();
    tracing::debug!(message = "endpoint disconnected", id = %id);

    if let Some(handler) = node.handler.take() {
        handler.on_disconnected(&mut Context::new(id, list, shared));
    }
}

/// Repeats while the deadline stays due, so an `on_expired` that re-arms with zero fires
/// again within the same pass (up to `max_expiries`).
fn fire_expiries(
    shared: &Arc<Shared>,
    list: &mut EndpointList,
    id: EndpointId,
    max_expiries: usize,
) {
    let mut fired = 0;
    while let Some(node) = list.get_mut(id)
        && node.deadline.is_due()
    {
        if fired == max_expiries {
            tracing::warn!(
                message = "expiry cap reached, continuing next pass",
                id = %id,
                fired = fired
            );
            return;
        }
        node.deadline.disarm();
        fired += 1;
        shared.stats.record_expiry();
        invoke(shared, list, id, |handler, cx| handler.on_expired(cx));
    }
}

/// Moves the handler out of its node for the duration of `f`, and puts it back if the
/// endpoint is still attached afterwards. Otherwise the handler is dropped here.
fn invoke(
    shared: &Arc<Shared>,
    list: &mut EndpointList,
    id: EndpointId,
    f: impl FnOnce(&mut dyn EndpointHandler, &mut Context<'_>),
) {
    let Some(mut handler) = list.get_mut(id).and_then(|it| it.handler.take()) else {
        return;
    };

    f(handler.as_mut(), &mut Context::new(id, list, shared));

    if let Some(node) = list.get_mut(id) {
        node.handler = Some(handler);
    }
}

/// Gives the hooks a look at the fault. A panicking `on_fault` is swallowed; the fault
/// is recorded either way.
fn report_fault(shared: &Arc<Shared>, fault: &DispatcherFault) {
    let Ok(mut registry) = shared.registry.lock() else {
        return;
    };
    let _scope = DispatchScope::enter(shared);
    let hooks = &mut registry.hooks;
    if catch_unwind(AssertUnwindSafe(|| hooks.on_fault(fault))).is_err() {
        tracing::error!(message = "on_fault hook panicked");
    }
}
