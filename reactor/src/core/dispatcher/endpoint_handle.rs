// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use super::{Dispatcher, DispatcherError, Shared};
use crate::{DEFAULT_WAKE_REASON, Endpoint, EndpointId, Interest,
            core::endpoint::AttachedEndpoint};
use std::{fmt::{Debug, Formatter},
          sync::{Arc, Weak},
          time::Duration};

/// The external owner's reference to an attached endpoint. Cheap to clone and safe to
/// use from any thread.
///
/// The handle does not keep the dispatcher alive. Every operation resolves the
/// dispatcher and then the endpoint's generation-checked [`EndpointId`], so a handle
/// that outlives either one gets [`DispatcherError::DispatcherGone`] or
/// [`DispatcherError::NotAttached`] rather than touching something else.
///
/// Mutators wake the loop so the change takes effect before its next wait. From inside a
/// callback on the same dispatcher these methods return
/// [`DispatcherError::ReentrantCall`]; use the [`Context`] there.
///
/// [`Context`]: crate::Context
#[derive(Clone)]
pub struct EndpointHandle {
    shared: Weak<Shared>,
    id: EndpointId,
}

impl Debug for EndpointHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointHandle")
            .field("id", &self.id)
            .field("dispatcher_alive", &(self.shared.strong_count() > 0))
            .finish()
    }
}

impl EndpointHandle {
    pub(crate) fn new(shared: Weak<Shared>, id: EndpointId) -> Self { Self { shared, id } }

    #[must_use]
    pub fn id(&self) -> EndpointId { self.id }

    fn upgrade(&self) -> Result<Arc<Shared>, DispatcherError> {
        self.shared.upgrade().ok_or(DispatcherError::DispatcherGone)
    }

    /// Runs `f` on the attached endpoint under the registry lock.
    fn with_node<R>(
        &self,
        f: impl FnOnce(&mut AttachedEndpoint) -> R,
    ) -> Result<R, DispatcherError> {
        let shared = self.upgrade()?;
        let mut registry = shared.lock_registry()?;
        let node = registry
            .list
            .get_mut(self.id)
            .ok_or(DispatcherError::NotAttached(self.id))?;
        Ok(f(node))
    }

    /// Like [`with_node()`](Self::with_node), then wakes the loop.
    fn mutate(&self, f: impl FnOnce(&mut AttachedEndpoint)) -> Result<(), DispatcherError> {
        self.with_node(f)?;
        self.upgrade()?.wake(DEFAULT_WAKE_REASON)
    }

    /// `false` once detached, or once the dispatcher is gone.
    #[must_use]
    pub fn is_attached(&self) -> bool { self.with_node(|_| ()).is_ok() }

    /// # Errors
    ///
    /// [`DispatcherGone`](DispatcherError::DispatcherGone),
    /// [`NotAttached`](DispatcherError::NotAttached),
    /// [`ReentrantCall`](DispatcherError::ReentrantCall).
    pub fn interest(&self) -> Result<Interest, DispatcherError> {
        self.with_node(|it| it.interest)
    }

    /// # Errors
    ///
    /// See [`interest()`](Self::interest).
    pub fn set_interest(
        &self,
        readable: bool,
        writable: bool,
        disconnecting: bool,
    ) -> Result<(), DispatcherError> {
        self.mutate(|it| it.set_interest(Interest::new(readable, writable, disconnecting)))
    }

    /// Arms the deadline to fire `duration` from now. [`Duration::ZERO`] makes it due
    /// immediately.
    ///
    /// # Errors
    ///
    /// See [`interest()`](Self::interest).
    pub fn set_deadline(&self, duration: Duration) -> Result<(), DispatcherError> {
        self.mutate(|it| it.deadline.arm(duration))
    }

    /// Pushes the current target out by `duration`; does not arm an unarmed deadline.
    ///
    /// # Errors
    ///
    /// See [`interest()`](Self::interest).
    pub fn extend_deadline(&self, duration: Duration) -> Result<(), DispatcherError> {
        self.mutate(|it| it.deadline.extend(duration))
    }

    /// # Errors
    ///
    /// See [`interest()`](Self::interest).
    pub fn clear_deadline(&self) -> Result<(), DispatcherError> {
        self.mutate(|it| it.deadline.disarm())
    }

    /// # Errors
    ///
    /// See [`interest()`](Self::interest).
    pub fn deadline_remaining(&self) -> Result<Option<Duration>, DispatcherError> {
        self.with_node(|it| it.deadline.remaining())
    }

    /// Unlinks the endpoint and hands it back. `Ok(None)` if it was already detached.
    ///
    /// # Errors
    ///
    /// [`DispatcherGone`](DispatcherError::DispatcherGone),
    /// [`ReentrantCall`](DispatcherError::ReentrantCall).
    pub fn detach(&self) -> Result<Option<Endpoint>, DispatcherError> {
        self.upgrade()?.detach(self.id)
    }

    /// Detaches the endpoint from its current dispatcher and attaches it to `target`,
    /// returning the new handle. This handle is stale afterwards.
    ///
    /// # Errors
    ///
    /// [`NotAttached`](DispatcherError::NotAttached) if there is nothing to move, plus
    /// anything [`detach()`](Self::detach) or [`Dispatcher::attach()`] returns.
    pub fn migrate_to(&self, target: &Dispatcher) -> Result<EndpointHandle, DispatcherError> {
        let endpoint = self.detach()?.ok_or(DispatcherError::NotAttached(self.id))?;
        target.attach(endpoint)
    }
}
