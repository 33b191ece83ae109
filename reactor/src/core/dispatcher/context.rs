// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use super::{DispatcherError, EndpointHandle, Shared};
use crate::{Endpoint, EndpointId, Interest, core::endpoint::EndpointList};
use std::{sync::Arc, time::Duration};

/// What a callback (or the [`on_endpoint_visited()`] hook) may do while the dispatcher
/// is in the middle of a pass.
///
/// Callbacks run with the registry lock held, so the [`Dispatcher`] and
/// [`EndpointHandle`] methods would refuse with [`DispatcherError::ReentrantCall`]. The
/// context works on the already locked list directly, and needs no wake: the loop
/// rebuilds its wait set and recomputes its timeout before it blocks again.
///
/// Operations on "this endpoint" become no-ops once it has been detached (including
/// inside [`on_disconnected()`], where it is already unlinked).
///
/// [`Dispatcher`]: crate::Dispatcher
/// [`on_disconnected()`]: crate::EndpointHandler::on_disconnected
/// [`on_endpoint_visited()`]: crate::DispatcherHooks::on_endpoint_visited
#[allow(missing_debug_implementations)]
pub struct Context<'a> {
    id: EndpointId,
    list: &'a mut EndpointList,
    shared: &'a Arc<Shared>,
}

impl<'a> Context<'a> {
    pub(crate) fn new(id: EndpointId, list: &'a mut EndpointList, shared: &'a Arc<Shared>) -> Self {
        Self { id, list, shared }
    }

    /// The endpoint this callback is for.
    #[must_use]
    pub fn id(&self) -> EndpointId { self.id }

    #[must_use]
    pub fn is_attached(&self) -> bool { self.list.contains(self.id) }

    /// [`Interest::NONE`] once detached.
    #[must_use]
    pub fn interest(&self) -> Interest {
        self.list
            .get(self.id)
            .map_or(Interest::NONE, |it| it.interest)
    }

    pub fn set_interest(&mut self, readable: bool, writable: bool, disconnecting: bool) {
        if let Some(it) = self.list.get_mut(self.id) {
            it.set_interest(Interest::new(readable, writable, disconnecting));
        }
    }

    pub fn set_deadline(&mut self, duration: Duration) {
        if let Some(it) = self.list.get_mut(self.id) {
            it.deadline.arm(duration);
        }
    }

    pub fn extend_deadline(&mut self, duration: Duration) {
        if let Some(it) = self.list.get_mut(self.id) {
            it.deadline.extend(duration);
        }
    }

    pub fn clear_deadline(&mut self) {
        if let Some(it) = self.list.get_mut(self.id) {
            it.deadline.disarm();
        }
    }

    #[must_use]
    pub fn deadline_remaining(&self) -> Option<Duration> {
        self.list
            .get(self.id)
            .and_then(|it| it.deadline.remaining())
    }

    #[must_use]
    pub fn deadline_elapsed(&self) -> Option<Duration> {
        self.list
            .get(self.id)
            .and_then(|it| it.deadline.elapsed())
    }

    /// Unlinks this endpoint. Its handler is dropped (closing the handle) once the
    /// running callback returns.
    pub fn detach(&mut self) {
        if self.list.remove(self.id).is_some() {
            tracing::debug!(message = "endpoint detached itself", id = %self.id);
        }
    }

    /// Unlinks another endpoint and hands it back. Passing this endpoint's own id is the
    /// same as [`detach()`](Self::detach) and returns [`None`].
    pub fn detach_endpoint(&mut self, id: EndpointId) -> Option<Endpoint> {
        if id == self.id {
            self.detach();
            return None;
        }
        self.list.remove(id).and_then(|it| it.into_endpoint())
    }

    /// Attaches a new endpoint to this dispatcher. It is not visited in the current
    /// pass, but its deadline counts toward the next wait.
    ///
    /// # Errors
    ///
    /// [`InvalidHandle`] or [`CapacityExceeded`].
    ///
    /// [`CapacityExceeded`]: DispatcherError::CapacityExceeded
    /// [`InvalidHandle`]: DispatcherError::InvalidHandle
    pub fn attach(&mut self, endpoint: Endpoint) -> Result<EndpointHandle, DispatcherError> {
        self.shared.admit(self.list, &endpoint)?;
        let id = self.list.push_back(endpoint);
        tracing::debug!(message = "endpoint attached from callback", id = %id);
        Ok(EndpointHandle::new(Arc::downgrade(self.shared), id))
    }

    /// A handle to this endpoint, for use after the callback returns.
    #[must_use]
    pub fn handle(&self) -> EndpointHandle {
        EndpointHandle::new(Arc::downgrade(self.shared), self.id)
    }

    /// Number of endpoints currently attached to this dispatcher.
    #[must_use]
    pub fn endpoint_count(&self) -> usize { self.list.len() }
}
