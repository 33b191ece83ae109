// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use super::{WaitEntry, WaitOutcome};
use std::{os::fd::RawFd, time::Duration};

/// Blocks until a handle in the wait set is ready, the wake channel is readable, or the
/// timeout passes.
///
/// The dispatcher loop is written against this trait only, so the loop algorithm does
/// not change per platform. [`PollMultiplexer`] is the POSIX backend.
///
/// # Contract
///
/// - Level-triggered: a condition that was not serviced is reported again on the next
///   call.
/// - Every active entry's [`readiness`] is overwritten (cleared when nothing was
///   reported). Inactive entries are reset and skipped.
/// - A signal interrupting the wait surfaces as [`ErrorKind::Interrupted`]; the loop
///   retries.
/// - A backend with a fixed number of wait objects reports it through
///   [`max_endpoints()`]. The dispatcher then refuses attachments past that count.
///
/// [`ErrorKind::Interrupted`]: std::io::ErrorKind::Interrupted
/// [`PollMultiplexer`]: super::PollMultiplexer
/// [`max_endpoints()`]: Self::max_endpoints
/// [`readiness`]: WaitEntry::readiness
pub trait Multiplexer: Send + 'static {
    /// [`None`] means unbounded (aside from the process descriptor limit).
    fn max_endpoints(&self) -> Option<usize> { None }

    /// `timeout` of [`None`] blocks indefinitely.
    ///
    /// # Errors
    ///
    /// Any OS failure of the wait call itself.
    fn wait(
        &mut self,
        wake_fd: RawFd,
        entries: &mut [WaitEntry],
        timeout: Option<Duration>,
    ) -> std::io::Result<WaitOutcome>;
}
