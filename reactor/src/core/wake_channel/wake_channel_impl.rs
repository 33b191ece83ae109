// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words EAGAIN

use mio::unix::pipe::{Receiver, Sender};
use smallvec::SmallVec;
use std::{io::{ErrorKind, Read, Write},
          os::fd::{AsRawFd, RawFd}};

/// Reserved wake reason that tells the dispatcher loop to exit. Only
/// [`Dispatcher::shutdown()`] sends it.
///
/// [`Dispatcher::shutdown()`]: crate::Dispatcher::shutdown
pub const SHUTDOWN_REASON: u8 = 0;

/// Reason sent by [`Dispatcher::wake()`].
///
/// [`Dispatcher::wake()`]: crate::Dispatcher::wake
pub const DEFAULT_WAKE_REASON: u8 = 1;

/// Buffer for the reasons drained in one pass. Inline for the common case of a handful
/// of pending wakes.
pub type WakeReasons = SmallVec<[u8; 32]>;

/// Creates the non-blocking pipe pair. Both ends are close-on-exec.
///
/// # Errors
///
/// Fails if the process is out of file descriptors.
pub fn create_wake_channel() -> std::io::Result<(WakeSender, WakeReceiver)> {
    let (sender, receiver) = mio::unix::pipe::new()?;
    Ok((WakeSender(sender), WakeReceiver(receiver)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeOutcome {
    /// The byte was written.
    Queued,
    /// The pipe is full. Unread bytes remain, so the reader is guaranteed to wake anyway.
    Coalesced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Everything pending was read; the pipe is empty.
    Drained,
    /// The write end is gone. Nothing will ever wake the reader again.
    SenderClosed,
}

/// Write end. Shareable across threads: a one-byte pipe write is atomic.
#[derive(Debug)]
pub struct WakeSender(Sender);

impl WakeSender {
    /// Writes one byte.
    ///
    /// # Errors
    ///
    /// Fails if the read end has been closed (the dispatcher loop is gone) or on any
    /// other write error besides [`ErrorKind::WouldBlock`] and
    /// [`ErrorKind::Interrupted`].
    pub fn send(&self, reason: u8) -> std::io::Result<WakeOutcome> {
        loop {
            match (&self.0).write(&[reason]) {
                Ok(_) => return Ok(WakeOutcome::Queued),
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    return Ok(WakeOutcome::Coalesced);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }
}

/// Read end. Owned by the dispatcher loop.
#[derive(Debug)]
pub struct WakeReceiver(Receiver);

impl WakeReceiver {
    /// Reads every pending byte into `reasons` without blocking.
    ///
    /// # Errors
    ///
    /// Any read error besides [`ErrorKind::WouldBlock`] and [`ErrorKind::Interrupted`].
    pub fn drain_into(&self, reasons: &mut WakeReasons) -> std::io::Result<DrainOutcome> {
        let mut buf = [0u8; 64];
        loop {
            match (&self.0).read(&mut buf) {
                Ok(0) => return Ok(DrainOutcome::SenderClosed),
                Ok(n) => reasons.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    return Ok(DrainOutcome::Drained);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Drops anything pending, e.g. a stale shutdown sentinel left over from a loop that
    /// exited for another reason.
    ///
    /// # Errors
    ///
    /// See [`drain_into()`](Self::drain_into).
    pub fn discard_pending(&self) -> std::io::Result<()> {
        let mut reasons = WakeReasons::new();
        self.drain_into(&mut reasons).map(|_| ())
    }

    #[must_use]
    pub fn raw_fd(&self) -> RawFd { self.0.as_raw_fd() }
}
