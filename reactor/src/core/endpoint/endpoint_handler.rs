// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words EINTR

//! The owner-supplied half of an endpoint. See [`EndpointHandler`].

use crate::Context;
use std::os::fd::BorrowedFd;

/// Callbacks the dispatcher delivers for one endpoint, plus the handle it watches.
///
/// The handler owns the OS handle (a socket, a serial port, a pipe). The dispatcher only
/// borrows it through [`source()`] to build its wait set; it never reads, writes, or
/// closes it. Dropping the handler closes the handle.
///
/// # Delivery rules
///
/// Within one dispatcher pass, an endpoint receives **at most one** readiness callback,
/// chosen in this priority:
///
/// | Condition reported by the OS            | Interest needed   | Callback                 |
/// | :-------------------------------------- | :---------------- | :----------------------- |
/// | hang-up / invalid handle / error        | `disconnecting`   | [`on_disconnected()`]    |
/// | readable (or hang-up, read sees EOF)    | `readable`        | [`on_readable()`]        |
/// | writable (or error, for connect status) | `writable`        | [`on_writable()`]        |
///
/// After that, if the endpoint's deadline is due, [`on_expired()`] runs. It keeps
/// running in the same pass for as long as the callback leaves the deadline due (for
/// example by re-arming it with [`Duration::ZERO`]).
///
/// Readiness is **level-triggered**: an unserviced condition is reported again on the
/// next pass.
///
/// # Threading
///
/// All callbacks run on the dispatcher thread, with the dispatcher's registry lock held.
/// Use the [`Context`] to change interest, deadlines, or membership. Do not block.
///
/// [`Duration::ZERO`]: std::time::Duration::ZERO
/// [`on_disconnected()`]: Self::on_disconnected
/// [`on_expired()`]: Self::on_expired
/// [`on_readable()`]: Self::on_readable
/// [`on_writable()`]: Self::on_writable
/// [`source()`]: Self::source
pub trait EndpointHandler: Send + 'static {
    /// The handle to watch. Queried each pass, so a handler may swap its handle (for
    /// example after reconnecting) and the next wait picks up the new one.
    fn source(&self) -> BorrowedFd<'_>;

    fn on_readable(&mut self, _cx: &mut Context<'_>) {}

    fn on_writable(&mut self, _cx: &mut Context<'_>) {}

    fn on_expired(&mut self, _cx: &mut Context<'_>) {}

    /// Called after the endpoint has been unlinked from the dispatcher, with its
    /// `disconnecting` interest already cleared. The handler is handed back by value:
    /// dropping it (the default) closes the handle.
    fn on_disconnected(self: Box<Self>, _cx: &mut Context<'_>) {}
}
