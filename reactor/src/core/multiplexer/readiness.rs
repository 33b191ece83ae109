// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use crate::{EndpointId, Interest};
use std::os::fd::RawFd;

/// What the OS reported for one handle in the last wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Readiness {
    pub readable: bool,
    pub writable: bool,
    pub error: bool,
    pub hang_up: bool,
    /// The handle is not open (`POLLNVAL`).
    pub invalid: bool,
}

impl Readiness {
    /// Hang-up and invalid handles always count. An error condition only counts when
    /// the endpoint is not waiting for writability, because a failed non-blocking
    /// connect reports its error that way and the writable callback owns it.
    #[must_use]
    pub fn is_disconnect(&self, interest: Interest) -> bool {
        self.hang_up || self.invalid || (self.error && !interest.writable)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool { *self == Self::default() }
}

/// One slot in the wait set the dispatcher hands to [`Multiplexer::wait()`].
///
/// [`Multiplexer::wait()`]: crate::Multiplexer::wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitEntry {
    pub id: EndpointId,
    pub fd: RawFd,
    pub interest: Interest,
    /// Inactive entries keep their slot but are not passed to the OS.
    pub active: bool,
    /// Written by the multiplexer.
    pub readiness: Readiness,
}

impl WaitEntry {
    #[must_use]
    pub fn new(id: EndpointId, fd: RawFd, interest: Interest) -> Self {
        Self {
            id,
            fd,
            interest,
            active: true,
            readiness: Readiness::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WaitOutcome {
    /// Number of entries with non-empty readiness.
    pub ready: usize,
    /// The wake channel's read side became readable.
    pub woken: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const R: Readiness = Readiness {
        readable: false,
        writable: false,
        error: false,
        hang_up: false,
        invalid: false,
    };

    #[test_case(Readiness { hang_up: true, ..R }, Interest::READABLE, true)]
    #[test_case(Readiness { invalid: true, ..R }, Interest::WRITABLE, true)]
    #[test_case(Readiness { error: true, ..R }, Interest::READABLE, true)]
    #[test_case(Readiness { error: true, ..R }, Interest::WRITABLE, false)]
    #[test_case(Readiness { readable: true, writable: true, ..R }, Interest::READABLE, false)]
    fn test_is_disconnect(readiness: Readiness, interest: Interest, expected: bool) {
        assert_eq!(readiness.is_disconnect(interest), expected);
    }
}
