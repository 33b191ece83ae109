// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use super::{Multiplexer, PollMultiplexer, WaitEntry, WaitOutcome};
use std::{io::{Error, ErrorKind},
          os::fd::RawFd,
          time::Duration};

/// Maximum number of handles a single Windows wait call accepts
/// (`MAXIMUM_WAIT_OBJECTS`).
pub const WINDOWS_MAXIMUM_WAIT_OBJECTS: usize = 64;

/// Wraps a [`Multiplexer`] with a fixed endpoint capacity.
///
/// Used to run the dispatcher with the same limits as a backend whose wait primitive
/// accepts a fixed number of objects, so that code which must also work there finds out
/// at attach time (through [`DispatcherError::CapacityExceeded`]) instead of silently
/// losing endpoints.
///
/// [`DispatcherError::CapacityExceeded`]: crate::DispatcherError::CapacityExceeded
#[derive(Debug)]
pub struct CappedMultiplexer<M> {
    inner: M,
    capacity: usize,
}

impl<M: Multiplexer> CappedMultiplexer<M> {
    pub fn new(inner: M, capacity: usize) -> Self { Self { inner, capacity } }
}

impl CappedMultiplexer<PollMultiplexer> {
    /// One wait object goes to the wake channel, leaving 63 for endpoints.
    #[must_use]
    pub fn windows_compatible() -> Self {
        Self::new(PollMultiplexer::new(), WINDOWS_MAXIMUM_WAIT_OBJECTS - 1)
    }
}

impl<M: Multiplexer> Multiplexer for CappedMultiplexer<M> {
    fn max_endpoints(&self) -> Option<usize> {
        let inner = self.inner.max_endpoints().unwrap_or(usize::MAX);
        Some(inner.min(self.capacity))
    }

    fn wait(
        &mut self,
        wake_fd: RawFd,
        entries: &mut [WaitEntry],
        timeout: Option<Duration>,
    ) -> std::io::Result<WaitOutcome> {
        if entries.len() > self.capacity {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("{} wait entries exceed capacity {}", entries.len(), self.capacity),
            ));
        }
        self.inner.wait(wake_fd, entries, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EndpointId, Interest, create_wake_channel};
    use pretty_assertions::assert_eq;
    use std::os::{fd::AsRawFd, unix::net::UnixStream};

    #[test]
    fn test_windows_compatible_capacity() {
        assert_eq!(CappedMultiplexer::windows_compatible().max_endpoints(), Some(63));
        assert_eq!(PollMultiplexer::new().max_endpoints(), None);
    }

    #[test]
    fn test_rejects_oversized_wait_set() {
        let (_tx, rx) = create_wake_channel().unwrap();
        let (_ours, theirs) = UnixStream::pair().unwrap();
        let entry = WaitEntry::new(
            EndpointId { key: 0, generation: 1 },
            theirs.as_raw_fd(),
            Interest::READABLE,
        );
        let mut entries = [entry, entry];

        let mut mux = CappedMultiplexer::new(PollMultiplexer::new(), 1);
        let err = mux
            .wait(rx.raw_fd(), &mut entries, Some(Duration::ZERO))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let outcome = mux
            .wait(rx.raw_fd(), &mut entries[..1], Some(Duration::ZERO))
            .unwrap();
        assert_eq!(outcome.ready, 0);
    }
}
