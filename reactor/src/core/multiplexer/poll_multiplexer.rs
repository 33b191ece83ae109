// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words revents POLLNVAL POLLHUP POLLERR ppoll nsec

use super::{Multiplexer, Readiness, WaitEntry, WaitOutcome};
use crate::Interest;
use rustix::event::{PollFd, PollFlags, Timespec, poll};
use std::{os::fd::{BorrowedFd, RawFd},
          time::Duration};

/// [`Multiplexer`] backed by [`poll(2)`].
///
/// Slot 0 of the descriptor array is always the wake channel; active entries follow in
/// wait-set order. The descriptor array is kept between calls so a steady-state wait
/// does not allocate.
///
/// Timeouts are rounded up to whole milliseconds so a deadline is never reported early.
///
/// [`poll(2)`]: https://man7.org/linux/man-pages/man2/poll.2.html
#[derive(Debug, Default)]
pub struct PollMultiplexer {
    poll_fds: Vec<PollFd<'static>>,
    /// `active[i]` is the index in `entries` of `poll_fds[i + 1]`.
    active: Vec<usize>,
}

impl PollMultiplexer {
    #[must_use]
    pub fn new() -> Self { Self::default() }
}

impl Multiplexer for PollMultiplexer {
    fn wait(
        &mut self,
        wake_fd: RawFd,
        entries: &mut [WaitEntry],
        timeout: Option<Duration>,
    ) -> std::io::Result<WaitOutcome> {
        self.poll_fds.clear();
        self.active.clear();

        self.poll_fds.push(poll_fd(wake_fd, PollFlags::IN));
        for (index, entry) in entries.iter_mut().enumerate() {
            entry.readiness = Readiness::default();
            if entry.active {
                self.poll_fds.push(poll_fd(entry.fd, flags_for(entry.interest)));
                self.active.push(index);
            }
        }

        let timespec = timeout.map(to_timespec);
        let result = poll(&mut self.poll_fds, timespec.as_ref());

        let outcome = result.map(|_| {
            let mut outcome = WaitOutcome {
                ready: 0,
                woken: self.poll_fds[0].revents().contains(PollFlags::IN),
            };
            for (poll_fd, &index) in self.poll_fds[1..].iter().zip(&self.active) {
                let readiness = readiness_from(poll_fd.revents());
                if !readiness.is_empty() {
                    outcome.ready += 1;
                }
                entries[index].readiness = readiness;
            }
            outcome
        });
        // Borrowed descriptors must not outlive the call.
        self.poll_fds.clear();

        outcome.map_err(std::io::Error::from)
    }
}

fn poll_fd(fd: RawFd, flags: PollFlags) -> PollFd<'static> {
    // SAFETY: The descriptor is only used by the `poll()` call in `wait()`, and the
    // array is cleared before `wait()` returns. If the owner closes the descriptor while
    // the wait is in progress, the kernel reports `POLLNVAL` (or readiness for whatever
    // reused the number), which the dispatcher tolerates.
    let fd = unsafe { BorrowedFd::borrow_raw(fd) };
    PollFd::from_borrowed_fd(fd, flags)
}

fn flags_for(interest: Interest) -> PollFlags {
    let mut flags = PollFlags::empty();
    if interest.readable {
        flags |= PollFlags::IN;
    }
    if interest.writable {
        flags |= PollFlags::OUT;
    }
    // POLLERR, POLLHUP and POLLNVAL are always reported.
    flags
}

fn readiness_from(revents: PollFlags) -> Readiness {
    Readiness {
        readable: revents.contains(PollFlags::IN),
        writable: revents.contains(PollFlags::OUT),
        error: revents.contains(PollFlags::ERR),
        hang_up: revents.contains(PollFlags::HUP),
        invalid: revents.contains(PollFlags::NVAL),
    }
}

fn to_timespec(timeout: Duration) -> Timespec {
    let millis = timeout.as_nanos().div_ceil(1_000_000);
    let secs = i64::try_from(millis / 1000).unwrap_or(i64::MAX);
    #[allow(clippy::cast_possible_truncation)]
    let nanos = ((millis % 1000) * 1_000_000) as i64;
    Timespec {
        tv_sec: secs,
        tv_nsec: nanos,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EndpointId, create_wake_channel};
    use pretty_assertions::assert_eq;
    use std::{io::Write,
              os::{fd::AsRawFd, unix::net::UnixStream},
              time::Instant};

    fn id(key: usize) -> EndpointId { EndpointId { key, generation: 1 } }

    #[test]
    fn test_timeout_rounds_up_to_millis() {
        let ts = to_timespec(Duration::from_micros(1));
        assert_eq!((ts.tv_sec, ts.tv_nsec), (0, 1_000_000));

        let ts = to_timespec(Duration::from_millis(1500));
        assert_eq!((ts.tv_sec, ts.tv_nsec), (1, 500_000_000));

        let ts = to_timespec(Duration::ZERO);
        assert_eq!((ts.tv_sec, ts.tv_nsec), (0, 0));
    }

    #[test]
    fn test_reports_readable_and_writable() {
        let (_tx, rx) = create_wake_channel().unwrap();
        let (mut ours, theirs) = UnixStream::pair().unwrap();
        ours.write_all(b"x").unwrap();

        let mut entries = [
            WaitEntry::new(id(0), theirs.as_raw_fd(), Interest::READABLE),
            WaitEntry::new(id(1), ours.as_raw_fd(), Interest::WRITABLE),
        ];
        let mut mux = PollMultiplexer::new();
        let outcome = mux
            .wait(rx.raw_fd(), &mut entries, Some(Duration::from_secs(1)))
            .unwrap();

        assert_eq!(outcome, WaitOutcome { ready: 2, woken: false });
        assert!(entries[0].readiness.readable);
        assert!(!entries[0].readiness.writable);
        assert!(entries[1].readiness.writable);
    }

    #[test]
    fn test_times_out_with_nothing_ready() {
        let (_tx, rx) = create_wake_channel().unwrap();
        let (_ours, theirs) = UnixStream::pair().unwrap();
        let mut entries = [WaitEntry::new(id(0), theirs.as_raw_fd(), Interest::READABLE)];

        let start = Instant::now();
        let outcome = PollMultiplexer::new()
            .wait(rx.raw_fd(), &mut entries, Some(Duration::from_millis(20)))
            .unwrap();

        assert!(start.elapsed() >= Duration::from_millis(20));
        assert_eq!(outcome, WaitOutcome::default());
        assert!(entries[0].readiness.is_empty());
    }

    #[test]
    fn test_wake_channel_interrupts() {
        let (tx, rx) = create_wake_channel().unwrap();
        tx.send(1).unwrap();
        let outcome = PollMultiplexer::new().wait(rx.raw_fd(), &mut [], None).unwrap();
        assert!(outcome.woken);
    }

    #[test]
    fn test_hang_up_and_inactive_entries() {
        let (_tx, rx) = create_wake_channel().unwrap();
        let (ours, theirs) = UnixStream::pair().unwrap();
        drop(ours);

        let mut entries = [
            WaitEntry::new(id(0), theirs.as_raw_fd(), Interest::DISCONNECTING),
            WaitEntry::new(id(1), theirs.as_raw_fd(), Interest::READABLE),
        ];
        entries[1].active = false;
        entries[1].readiness.readable = true;

        PollMultiplexer::new()
            .wait(rx.raw_fd(), &mut entries, Some(Duration::from_secs(1)))
            .unwrap();

        assert!(entries[0].readiness.hang_up);
        assert!(entries[0].readiness.is_disconnect(Interest::DISCONNECTING));
        assert!(entries[1].readiness.is_empty());
    }
}
