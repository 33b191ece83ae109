// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use super::SerialPort;
use crate::{Context, Endpoint, EndpointHandler, EndpointState, Interest};
use std::{fmt::{Debug, Formatter},
          os::fd::{AsFd, BorrowedFd}};

/// Protocol side of a [`SerialEndpoint`].
pub trait SerialHandler: Send + 'static {
    fn on_readable(&mut self, port: &mut SerialPort, cx: &mut Context<'_>);

    fn on_writable(&mut self, _port: &mut SerialPort, _cx: &mut Context<'_>) {}

    fn on_expired(&mut self, _port: &mut SerialPort, _cx: &mut Context<'_>) {}

    /// The device hung up (unplugged, or the other end of a pty closed). The endpoint is
    /// already detached and the port is closed after this returns.
    fn on_disconnected(&mut self, _port: &mut SerialPort) {}
}

/// A [`SerialPort`] driven by the dispatcher. It is [`EndpointState::Bound`] from the
/// moment it is opened; serial lines have no connect phase.
pub struct SerialEndpoint<H: SerialHandler> {
    port: SerialPort,
    state: EndpointState,
    handler: H,
}

impl<H: SerialHandler> Debug for SerialEndpoint<H> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialEndpoint")
            .field("port", &self.port)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<H: SerialHandler> SerialEndpoint<H> {
    pub fn new(port: SerialPort, handler: H) -> Self {
        Self {
            port,
            state: EndpointState::Bound,
            handler,
        }
    }

    #[must_use]
    pub fn port(&self) -> &SerialPort { &self.port }

    #[must_use]
    pub fn state(&self) -> EndpointState { self.state }

    #[must_use]
    pub fn into_endpoint(self) -> Endpoint {
        Endpoint::new(self).with_interest(Interest::READABLE | Interest::DISCONNECTING)
    }
}

impl<H: SerialHandler> EndpointHandler for SerialEndpoint<H> {
    fn source(&self) -> BorrowedFd<'_> { self.port.as_fd() }

    fn on_readable(&mut self, cx: &mut Context<'_>) { self.handler.on_readable(&mut self.port, cx); }

    fn on_writable(&mut self, cx: &mut Context<'_>) { self.handler.on_writable(&mut self.port, cx); }

    fn on_expired(&mut self, cx: &mut Context<'_>) { self.handler.on_expired(&mut self.port, cx); }

    fn on_disconnected(mut self: Box<Self>, _cx: &mut Context<'_>) {
        if let Err(error) = self.state.advance(EndpointState::Disconnected) {
            tracing::warn!(message = "serial endpoint state not changed", error = %error);
        }
        tracing::debug!(message = "serial device hung up", path = %self.port.path().display());
        let Self { port, handler, .. } = &mut *self;
        handler.on_disconnected(port);
    }
}
