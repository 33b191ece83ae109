// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words EINPROGRESS

use crate::{Context, Endpoint, EndpointHandler, EndpointState, Interest};
use mio::net::TcpStream;
use std::{fmt::{Debug, Formatter},
          io::{self, ErrorKind},
          net::SocketAddr,
          os::fd::{AsFd, BorrowedFd}};

/// Protocol side of a [`TcpConnection`]. Every method gets the stream itself, which is
/// non-blocking: reads and writes return [`ErrorKind::WouldBlock`] once drained.
///
/// To close the connection from any callback, call [`Context::detach()`]; the stream is
/// closed after the callback returns.
pub trait StreamHandler: Send + 'static {
    /// The connection is established. Interest is `readable + disconnecting` at this
    /// point; ask for `writable` through the context when there is something to send.
    fn on_connected(&mut self, _stream: &mut TcpStream, _cx: &mut Context<'_>) {}

    fn on_readable(&mut self, stream: &mut TcpStream, cx: &mut Context<'_>);

    fn on_writable(&mut self, _stream: &mut TcpStream, _cx: &mut Context<'_>) {}

    /// The endpoint's deadline fired while connected.
    fn on_expired(&mut self, _stream: &mut TcpStream, _cx: &mut Context<'_>) {}

    /// The connect did not complete (refused, unreachable, or the deadline armed while
    /// connecting ran out). The endpoint is already detached.
    fn on_connect_failed(&mut self, _error: io::Error) {}

    /// The peer hung up or the socket failed. `error` is the pending socket error, if
    /// any. The endpoint is already detached.
    fn on_disconnected(&mut self, _error: Option<io::Error>) {}
}

/// A TCP stream endpoint, either dialed with [`connect()`] or wrapping a stream that a
/// [`TcpAcceptor`] handed out ([`accepted()`]).
///
/// While connecting, the endpoint watches for writability (the completion signal of a
/// non-blocking connect). Once the socket reports writable, the pending socket error is
/// checked, then the peer address confirms the connection:
///
/// ```text
///  connect() ─► Connecting ──writable, no error──► Connected ──hang-up──► Disconnected
///                   │                                                       ▲
///                   └───── error / hang-up / deadline ──► on_connect_failed ┘
/// ```
///
/// A deadline armed on the endpoint while it is connecting acts as a connect timeout.
///
/// [`TcpAcceptor`]: crate::TcpAcceptor
/// [`accepted()`]: Self::accepted
/// [`connect()`]: Self::connect
pub struct TcpConnection<H: StreamHandler> {
    stream: TcpStream,
    state: EndpointState,
    handler: H,
}

impl<H: StreamHandler> Debug for TcpConnection<H> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpConnection")
            .field("stream", &self.stream)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<H: StreamHandler> TcpConnection<H> {
    /// Issues a non-blocking connect to `addr`.
    ///
    /// # Errors
    ///
    /// Fails if the socket cannot be created, or if the OS rejects the connect outright
    /// (rather than reporting `EINPROGRESS`).
    pub fn connect(addr: SocketAddr, handler: H) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        tracing::debug!(message = "tcp connect issued", addr = %addr);
        let mut this = Self {
            stream,
            state: EndpointState::Unbound,
            handler,
        };
        this.enter(EndpointState::Connecting);
        Ok(this)
    }

    /// Wraps a stream that is already connected (for example one returned by
    /// [`TcpAcceptor`]).
    ///
    /// [`TcpAcceptor`]: crate::TcpAcceptor
    pub fn accepted(stream: TcpStream, handler: H) -> Self {
        Self {
            stream,
            state: EndpointState::Connected,
            handler,
        }
    }

    #[must_use]
    pub fn state(&self) -> EndpointState { self.state }

    #[must_use]
    pub fn handler(&self) -> &H { &self.handler }

    #[must_use]
    pub fn stream(&self) -> &TcpStream { &self.stream }

    /// Wraps the connection in an [`Endpoint`] with the interest its state needs:
    /// `writable + disconnecting` while connecting, `readable + disconnecting` after.
    #[must_use]
    pub fn into_endpoint(self) -> Endpoint {
        let interest = if self.state == EndpointState::Connecting {
            Interest::WRITABLE | Interest::DISCONNECTING
        } else {
            Interest::READABLE | Interest::DISCONNECTING
        };
        Endpoint::new(self).with_interest(interest)
    }

    fn enter(&mut self, to: EndpointState) {
        if let Err(error) = self.state.advance(to) {
            tracing::warn!(message = "tcp connection state not changed", error = %error);
        }
    }

    /// Writability while connecting: check the socket error, then the peer address.
    fn complete_connect(&mut self, cx: &mut Context<'_>) {
        let error = match self.stream.take_error() {
            Ok(None) => match self.stream.peer_addr() {
                Ok(peer) => {
                    self.enter(EndpointState::Connected);
                    cx.set_interest(true, false, true);
                    tracing::debug!(message = "tcp connected", id = %cx.id(), peer = %peer);
                    self.handler.on_connected(&mut self.stream, cx);
                    return;
                }
                // Still in progress.
                Err(error) if error.kind() == ErrorKind::NotConnected => return,
                Err(error) => error,
            },
            Ok(Some(error)) | Err(error) => error,
        };
        self.fail_connect(error, cx);
    }

    fn fail_connect(&mut self, error: io::Error, cx: &mut Context<'_>) {
        tracing::debug!(message = "tcp connect failed", id = %cx.id(), error = %error);
        self.enter(EndpointState::Disconnected);
        cx.detach();
        self.handler.on_connect_failed(error);
    }
}

impl<H: StreamHandler> EndpointHandler for TcpConnection<H> {
    fn source(&self) -> BorrowedFd<'_> { self.stream.as_fd() }

    fn on_readable(&mut self, cx: &mut Context<'_>) {
        if self.state == EndpointState::Connected {
            self.handler.on_readable(&mut self.stream, cx);
        }
    }

    fn on_writable(&mut self, cx: &mut Context<'_>) {
        match self.state {
            EndpointState::Connecting => self.complete_connect(cx),
            EndpointState::Connected => self.handler.on_writable(&mut self.stream, cx),
            _ => {}
        }
    }

    fn on_expired(&mut self, cx: &mut Context<'_>) {
        match self.state {
            EndpointState::Connecting => {
                self.fail_connect(io::Error::from(ErrorKind::TimedOut), cx);
            }
            EndpointState::Connected => self.handler.on_expired(&mut self.stream, cx),
            _ => {}
        }
    }

    fn on_disconnected(mut self: Box<Self>, _cx: &mut Context<'_>) {
        let error = self.stream.take_error().ok().flatten();
        let was = self.state;
        self.enter(EndpointState::Disconnected);
        if was == EndpointState::Connecting {
            // A refused connect can surface as a hang-up rather than as writability.
            let error = error.unwrap_or_else(|| io::Error::from(ErrorKind::ConnectionRefused));
            self.handler.on_connect_failed(error);
        } else {
            tracing::debug!(message = "tcp peer hung up", error = ?error);
            self.handler.on_disconnected(error);
        }
    }
}
