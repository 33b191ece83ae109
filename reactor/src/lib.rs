// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words epoll kqueue ppoll

// Skip rustfmt for rest of file.
// https://stackoverflow.com/a/75910283/2085356
#![cfg_attr(rustfmt, rustfmt_skip)]
#![cfg_attr(not(test), deny(clippy::unwrap_in_result))]

//! # `r3bl_reactor`
//!
//! A level-triggered I/O readiness dispatcher (a classic reactor). One dedicated thread
//! multiplexes an open-ended, dynamically changing set of registered endpoints (stream
//! sockets, datagram sockets, listening sockets, serial handles) using [`poll(2)`],
//! while also servicing a per-endpoint software timer (a [`Deadline`]).
//!
//! # Table of contents
//!
//! <!-- TOC -->
//! - [Architecture](#architecture)
//! - [Loop algorithm](#loop-algorithm)
//! - [Threading contract](#threading-contract)
//! - [Example](#example)
//! <!-- /TOC -->
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────── caller threads ─────────────────────────┐
//! │ Dispatcher::attach()   EndpointHandle::set_deadline()   wake()  │
//! └──────────┬──────────────────────────┬─────────────────────┬─────┘
//!            │ lock + link              │ lock + mutate       │ 1 byte
//!            ▼                          ▼                     ▼
//!   ┌─────────────────────────────────────────┐      ┌──────────────┐
//!   │ Mutex<Registry>                         │      │ WakeChannel  │
//!   │   EndpointList (slab arena, linked)     │      │ (self-pipe)  │
//!   │   Box<dyn DispatcherHooks>              │      └──────┬───────┘
//!   └───────────────┬─────────────────────────┘             │
//!                   │ walked once per pass                  │ read side
//!                   ▼                                       ▼
//!   ┌─────────────────────────────────────────────────────────────────┐
//!   │ dispatcher thread: drain wake → pass (callbacks, deadlines)     │
//!   │                    → Multiplexer::wait() outside the lock       │
//!   └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! | Type                | Role                                                                  |
//! | :------------------ | :-------------------------------------------------------------------- |
//! | [`Dispatcher`]      | Owns the endpoint list, the loop thread, and the wake channel sender  |
//! | [`Endpoint`]        | An [`EndpointHandler`] plus its [`Interest`] flags and [`Deadline`]   |
//! | [`EndpointHandle`]  | Generation-checked reference held by the endpoint's external owner    |
//! | [`Context`]         | What a callback may do to its own endpoint (and to the dispatcher)    |
//! | [`Multiplexer`]     | The OS wait primitive; [`PollMultiplexer`] is the POSIX backend       |
//! | [`DispatcherHooks`] | Per-iteration, per-endpoint, wake-reason and fault extension points   |
//!
//! Endpoint kinds built on top: [`TcpConnection`], [`TcpAcceptor`], [`UdpEndpoint`],
//! [`SerialEndpoint`].
//!
//! # Loop algorithm
//!
//! Each pass of the dispatcher thread:
//!
//! 1. Drains pending wake reasons without blocking. Reason `0` ([`SHUTDOWN_REASON`])
//!    exits the loop.
//! 2. Under the registry lock: runs the hooks, then walks the endpoints in attach order,
//!    delivering at most one readiness callback per endpoint (disconnect, readable,
//!    writable, in that priority), then every due deadline expiry. An expiry callback
//!    that re-arms an already due deadline fires again in the same pass.
//! 3. Releases the lock and blocks in [`Multiplexer::wait()`] until a handle is ready, the
//!    nearest deadline is due, or another thread writes to the wake channel.
//!
//! # Threading contract
//!
//! - Callbacks and hooks run on the dispatcher thread while the registry lock is held.
//!   Use the [`Context`] they receive to touch endpoints; calling back into the same
//!   dispatcher's public API returns [`DispatcherError::ReentrantCall`].
//! - Any other thread may call [`Dispatcher::attach()`], [`Dispatcher::detach()`],
//!   [`Dispatcher::wake()`] and the [`EndpointHandle`] mutators at any time.
//! - A callback may call into a *different* dispatcher (its [`EndpointHandle`]s,
//!   [`Dispatcher::attach()`], [`EndpointHandle::migrate_to()`]). That blocks on the
//!   other dispatcher's registry lock while holding this one's, so keep such calls one
//!   way: if callbacks on `A` call into `B` while callbacks on `B` call into `A`, the two
//!   loop threads deadlock. Only calls back into the *same* dispatcher are detected
//!   ([`DispatcherError::ReentrantCall`]).
//! - [`Dispatcher::len()`], [`Dispatcher::is_loop_running()`] and
//!   [`Dispatcher::loop_generation()`] never take the registry or worker locks, so they
//!   are safe anywhere, including from callbacks while another thread is in
//!   [`Dispatcher::shutdown()`].
//!
//! # Example
//!
//! ```no_run
//! use r3bl_reactor::{Context, Dispatcher, Endpoint, EndpointHandler};
//! use std::{io::Read, os::fd::{AsFd, BorrowedFd}, os::unix::net::UnixStream,
//!           time::Duration};
//!
//! struct Printer(UnixStream);
//!
//! impl EndpointHandler for Printer {
//!     fn source(&self) -> BorrowedFd<'_> { self.0.as_fd() }
//!
//!     fn on_readable(&mut self, _cx: &mut Context<'_>) {
//!         let mut buf = [0u8; 64];
//!         if let Ok(n) = self.0.read(&mut buf) {
//!             println!("read {n} bytes");
//!         }
//!     }
//!
//!     fn on_expired(&mut self, cx: &mut Context<'_>) {
//!         println!("idle for a second");
//!         cx.set_deadline(Duration::from_secs(1));
//!     }
//! }
//!
//! # fn main() -> miette::Result<()> {
//! let (ours, _theirs) = UnixStream::pair().map_err(|e| miette::miette!("{e}"))?;
//! let dispatcher = Dispatcher::new()?;
//! let handle = dispatcher
//!     .attach(Endpoint::new(Printer(ours)).with_deadline(Duration::from_secs(1)))?;
//! handle.extend_deadline(Duration::from_millis(500))?;
//! # Ok(())
//! # }
//! ```
//!
//! [`poll(2)`]: https://man7.org/linux/man-pages/man2/poll.2.html

#[cfg(not(unix))]
compile_error!("r3bl_reactor ships only the POSIX poll(2) backend; see the Multiplexer trait");

// Attach sources.
pub mod core;
pub mod log;
pub mod net;
pub mod serial;

// Re-export.
pub use self::core::*;
pub use log::*;
pub use net::*;
pub use serial::*;
