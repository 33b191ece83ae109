// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Socket endpoint kinds. Each one is an [`EndpointHandler`] that owns a non-blocking
//! [`mio`] socket, drives the [`EndpointState`] lifecycle, and forwards the protocol
//! decisions to a small user trait:
//!
//! | Endpoint kind       | User trait            | Lifecycle                                  |
//! | :------------------ | :-------------------- | :----------------------------------------- |
//! | [`TcpConnection`]   | [`StreamHandler`]     | `Connecting → Connected → Disconnected`    |
//! | [`TcpAcceptor`]     | [`AcceptHandler`]     | `Bound → Disconnected`                     |
//! | [`UdpEndpoint`]     | [`DatagramHandler`]   | `Bound → Disconnected`                     |
//!
//! [`EndpointHandler`]: crate::EndpointHandler
//! [`EndpointState`]: crate::EndpointState

// Attach sources.
mod tcp_acceptor;
mod tcp_connection;
mod udp_endpoint;

// Re-export.
pub use tcp_acceptor::*;
pub use tcp_connection::*;
pub use udp_endpoint::*;

#[cfg(test)]
mod tests;
