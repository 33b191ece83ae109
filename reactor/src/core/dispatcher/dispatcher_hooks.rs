// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use super::{Context, DispatcherFault};

/// Extension points run by the dispatcher loop. Every method defaults to a no-op.
///
/// Hooks run on the dispatcher thread with the registry lock held, exactly like endpoint
/// callbacks, so they must not block and must not call back into the dispatcher's public
/// API (use the [`Context`] instead).
///
/// | Hook                      | When                                                    |
/// | :------------------------ | :------------------------------------------------------ |
/// | [`on_wake()`]             | Once per drained wake reason (reason `0` is never seen) |
/// | [`on_iteration()`]        | Once per pass, before any endpoint is visited           |
/// | [`on_endpoint_visited()`] | For each endpoint, before its readiness is examined     |
/// | [`on_fault()`]            | Once, when the loop stops on a fault                    |
///
/// [`on_endpoint_visited()`]: Self::on_endpoint_visited
/// [`on_fault()`]: Self::on_fault
/// [`on_iteration()`]: Self::on_iteration
/// [`on_wake()`]: Self::on_wake
pub trait DispatcherHooks: Send + 'static {
    fn on_iteration(&mut self) {}

    fn on_endpoint_visited(&mut self, _cx: &mut Context<'_>) {}

    fn on_wake(&mut self, _reason: u8) {}

    fn on_fault(&mut self, _fault: &DispatcherFault) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl DispatcherHooks for NoopHooks {}
