// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use crate::{Context, Endpoint, EndpointHandler, EndpointState, Interest};
use mio::net::UdpSocket;
use std::{fmt::{Debug, Formatter},
          io::{self, ErrorKind},
          net::SocketAddr,
          os::fd::{AsFd, BorrowedFd}};

/// Largest payload a UDP datagram can carry over IPv4, rounded up.
pub const MAX_DATAGRAM_SIZE: usize = 65_536;

/// Protocol side of a [`UdpEndpoint`].
pub trait DatagramHandler: Send + 'static {
    /// One received datagram. Reply with [`UdpSocket::send_to()`] on `socket`.
    fn on_datagram(
        &mut self,
        socket: &UdpSocket,
        payload: &[u8],
        from: SocketAddr,
        cx: &mut Context<'_>,
    );

    fn on_writable(&mut self, _socket: &UdpSocket, _cx: &mut Context<'_>) {}

    fn on_expired(&mut self, _socket: &UdpSocket, _cx: &mut Context<'_>) {}

    /// `recv_from()` failed with something other than [`ErrorKind::WouldBlock`] (for
    /// example an ICMP port unreachable reported as `ConnectionRefused`). The socket
    /// stays attached.
    fn on_error(&mut self, error: io::Error, _cx: &mut Context<'_>) {
        tracing::debug!(message = "udp receive failed", error = %error);
    }
}

/// A bound UDP socket. Each readable pass receives datagrams until the socket would block.
pub struct UdpEndpoint<H: DatagramHandler> {
    socket: UdpSocket,
    local_addr: SocketAddr,
    state: EndpointState,
    buffer: Box<[u8]>,
    handler: H,
}

impl<H: DatagramHandler> Debug for UdpEndpoint<H> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpEndpoint")
            .field("local_addr", &self.local_addr)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<H: DatagramHandler> UdpEndpoint<H> {
    /// # Errors
    ///
    /// Any error from `socket()` or `bind()`.
    pub fn bind(addr: SocketAddr, handler: H) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        let local_addr = socket.local_addr()?;
        let mut state = EndpointState::Unbound;
        state
            .advance(EndpointState::Bound)
            .map_err(io::Error::other)?;
        tracing::debug!(message = "udp socket bound", addr = %local_addr);
        Ok(Self {
            socket,
            local_addr,
            state,
            buffer: vec![0; MAX_DATAGRAM_SIZE].into_boxed_slice(),
            handler,
        })
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr { self.local_addr }

    #[must_use]
    pub fn state(&self) -> EndpointState { self.state }

    #[must_use]
    pub fn socket(&self) -> &UdpSocket { &self.socket }

    #[must_use]
    pub fn into_endpoint(self) -> Endpoint {
        Endpoint::new(self).with_interest(Interest::READABLE | Interest::DISCONNECTING)
    }
}

impl<H: DatagramHandler> EndpointHandler for UdpEndpoint<H> {
    fn source(&self) -> BorrowedFd<'_> { self.socket.as_fd() }

    fn on_readable(&mut self, cx: &mut Context<'_>) {
        loop {
            match self.socket.recv_from(&mut self.buffer) {
                Ok((len, from)) => {
                    tracing::trace!(message = "udp datagram", len = len, from = %from);
                    self.handler
                        .on_datagram(&self.socket, &self.buffer[..len], from, cx);
                    if !cx.is_attached() {
                        break;
                    }
                }
                Err(error) if error.kind() == ErrorKind::WouldBlock => break,
                Err(error) if error.kind() == ErrorKind::Interrupted => {}
                Err(error) => {
                    self.handler.on_error(error, cx);
                    break;
                }
            }
        }
    }

    fn on_writable(&mut self, cx: &mut Context<'_>) {
        self.handler.on_writable(&self.socket, cx);
    }

    fn on_expired(&mut self, cx: &mut Context<'_>) { self.handler.on_expired(&self.socket, cx); }

    fn on_disconnected(mut self: Box<Self>, _cx: &mut Context<'_>) {
        if let Err(error) = self.state.advance(EndpointState::Disconnected) {
            tracing::warn!(message = "udp socket state not changed", error = %error);
        }
        tracing::debug!(message = "udp socket closed", addr = %self.local_addr);
    }
}
