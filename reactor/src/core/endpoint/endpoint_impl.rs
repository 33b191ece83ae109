// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use super::{EndpointHandler, Interest};
use crate::Deadline;
use std::{fmt::{Debug, Formatter},
          time::Duration};

/// An [`EndpointHandler`] bundled with its [`Interest`] flags and its [`Deadline`].
///
/// This is the unattached form. [`Dispatcher::attach()`] moves it into the dispatcher and
/// hands back an [`EndpointHandle`]; [`Dispatcher::detach()`] moves it back out, with
/// whatever interest and deadline it had at that moment.
///
/// New endpoints watch for `readable + disconnecting` and have no deadline.
///
/// [`Dispatcher::attach()`]: crate::Dispatcher::attach
/// [`Dispatcher::detach()`]: crate::Dispatcher::detach
/// [`EndpointHandle`]: crate::EndpointHandle
pub struct Endpoint {
    pub(crate) handler: Box<dyn EndpointHandler>,
    pub(crate) interest: Interest,
    pub(crate) deadline: Deadline,
}

impl Endpoint {
    pub fn new(handler: impl EndpointHandler) -> Self { Self::from_boxed(Box::new(handler)) }

    #[must_use]
    pub fn from_boxed(handler: Box<dyn EndpointHandler>) -> Self {
        Self {
            handler,
            interest: Interest::READABLE | Interest::DISCONNECTING,
            deadline: Deadline::new(),
        }
    }

    #[must_use]
    pub fn with_interest(mut self, interest: Interest) -> Self {
        self.interest = interest;
        self
    }

    /// Arms the deadline to fire `duration` from now.
    #[must_use]
    pub fn with_deadline(mut self, duration: Duration) -> Self {
        self.deadline.arm(duration);
        self
    }

    #[must_use]
    pub fn interest(&self) -> Interest { self.interest }

    pub fn set_interest(&mut self, readable: bool, writable: bool, disconnecting: bool) {
        self.interest = Interest::new(readable, writable, disconnecting);
    }

    pub fn set_deadline(&mut self, duration: Duration) { self.deadline.arm(duration); }

    pub fn extend_deadline(&mut self, duration: Duration) { self.deadline.extend(duration); }

    pub fn clear_deadline(&mut self) { self.deadline.disarm(); }

    #[must_use]
    pub fn deadline_remaining(&self) -> Option<Duration> { self.deadline.remaining() }

    #[must_use]
    pub fn deadline_elapsed(&self) -> Option<Duration> { self.deadline.elapsed() }

    #[must_use]
    pub fn deadline(&self) -> &Deadline { &self.deadline }

    #[must_use]
    pub fn handler(&self) -> &dyn EndpointHandler { self.handler.as_ref() }

    pub fn handler_mut(&mut self) -> &mut dyn EndpointHandler { self.handler.as_mut() }

    /// Gives up the endpoint, returning the handler (and with it, the OS handle).
    #[must_use]
    pub fn into_handler(self) -> Box<dyn EndpointHandler> { self.handler }
}

impl Debug for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("fd", &self.handler.source())
            .field("interest", &self.interest)
            .field("deadline", &self.deadline)
            .finish()
    }
}
