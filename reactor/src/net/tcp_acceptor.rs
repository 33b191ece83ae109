// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use crate::{Context, Continuation, Endpoint, EndpointHandler, EndpointState, Interest};
use mio::net::{TcpListener, TcpStream};
use std::{fmt::{Debug, Formatter},
          io::{self, ErrorKind},
          net::SocketAddr,
          os::fd::{AsFd, BorrowedFd}};

/// Decides what happens to each connection a [`TcpAcceptor`] takes off its backlog.
pub trait AcceptHandler: Send + 'static {
    /// Typically wraps `stream` in a [`TcpConnection`] and attaches it with
    /// [`Context::attach()`]. Return [`Continuation::Stop`] to leave the rest of the
    /// backlog for the next pass.
    ///
    /// [`TcpConnection`]: crate::TcpConnection
    fn on_accept(
        &mut self,
        stream: TcpStream,
        peer: SocketAddr,
        cx: &mut Context<'_>,
    ) -> Continuation;

    /// `accept()` failed with something other than [`ErrorKind::WouldBlock`]. The
    /// default logs it and stops draining for this pass; the listener stays attached.
    fn on_accept_error(&mut self, error: io::Error, _cx: &mut Context<'_>) -> Continuation {
        tracing::warn!(message = "accept failed", error = %error);
        Continuation::Stop
    }
}

/// A listening TCP socket. On each readable pass it accepts until the backlog is empty
/// (or the [`AcceptHandler`] says stop).
pub struct TcpAcceptor<A: AcceptHandler> {
    listener: TcpListener,
    local_addr: SocketAddr,
    state: EndpointState,
    handler: A,
}

impl<A: AcceptHandler> Debug for TcpAcceptor<A> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpAcceptor")
            .field("local_addr", &self.local_addr)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<A: AcceptHandler> TcpAcceptor<A> {
    /// Binds and listens on `addr`. Port `0` picks a free port; see
    /// [`local_addr()`](Self::local_addr).
    ///
    /// # Errors
    ///
    /// Any error from `socket()`, `bind()` or `listen()`.
    pub fn bind(addr: SocketAddr, handler: A) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        let local_addr = listener.local_addr()?;
        let mut state = EndpointState::Unbound;
        state
            .advance(EndpointState::Bound)
            .map_err(io::Error::other)?;
        tracing::debug!(message = "tcp listener bound", addr = %local_addr);
        Ok(Self {
            listener,
            local_addr,
            state,
            handler,
        })
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr { self.local_addr }

    #[must_use]
    pub fn state(&self) -> EndpointState { self.state }

    #[must_use]
    pub fn into_endpoint(self) -> Endpoint {
        Endpoint::new(self).with_interest(Interest::READABLE | Interest::DISCONNECTING)
    }
}

impl<A: AcceptHandler> EndpointHandler for TcpAcceptor<A> {
    fn source(&self) -> BorrowedFd<'_> { self.listener.as_fd() }

    fn on_readable(&mut self, cx: &mut Context<'_>) {
        loop {
            let continuation = match self.listener.accept() {
                Ok((stream, peer)) => {
                    tracing::debug!(message = "tcp connection accepted", peer = %peer);
                    self.handler.on_accept(stream, peer, cx)
                }
                Err(error) if error.kind() == ErrorKind::WouldBlock => Continuation::Stop,
                Err(error) if error.kind() == ErrorKind::Interrupted => Continuation::Continue,
                Err(error) => self.handler.on_accept_error(error, cx),
            };
            if continuation == Continuation::Stop {
                break;
            }
        }
    }

    fn on_disconnected(mut self: Box<Self>, _cx: &mut Context<'_>) {
        if let Err(error) = self.state.advance(EndpointState::Disconnected) {
            tracing::warn!(message = "tcp listener state not changed", error = %error);
        }
        tracing::warn!(message = "tcp listener closed", addr = %self.local_addr);
    }
}
