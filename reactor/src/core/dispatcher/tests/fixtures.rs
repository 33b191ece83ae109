// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use crate::{Context, DispatcherFault, DispatcherHooks, Endpoint, EndpointHandler, EndpointId};
use std::{io::{ErrorKind, Read},
          os::{fd::{AsFd, BorrowedFd},
               unix::net::UnixStream},
          sync::{Arc, Mutex,
                 atomic::{AtomicUsize, Ordering},
                 mpsc::Sender},
          time::{Duration, Instant}};

/// A callback observed by a [`Witness`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Readable(u8),
    Writable(u8),
    Expired { label: u8, pass: usize },
    /// `remaining` is [`Context::endpoint_count()`] inside the callback.
    Disconnected { label: u8, remaining: usize },
}

#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn push(&self, event: Event) { self.0.lock().unwrap().push(event); }

    pub fn snapshot(&self) -> Vec<Event> { self.0.lock().unwrap().clone() }

    pub fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.0.lock().unwrap().iter().filter(|it| predicate(it)).count()
    }

    pub fn position(&self, predicate: impl Fn(&Event) -> bool) -> Option<usize> {
        self.0.lock().unwrap().iter().position(predicate)
    }
}

/// Pass number as seen by [`PassCounter`] hooks.
pub type PassNumber = Arc<AtomicUsize>;

/// Test handler that logs every callback it receives.
pub struct Witness {
    pub label: u8,
    pub stream: UnixStream,
    pub log: EventLog,
    /// How many more times `on_expired` re-arms the deadline with zero.
    pub rearm_zero: usize,
    /// Drop writable interest after the first `on_writable`.
    pub one_shot_writable: bool,
    /// Read from this to stamp expiry events.
    pub pass: Option<PassNumber>,
    /// Panic inside `on_readable`.
    pub panic_on_readable: bool,
}

impl Witness {
    /// Returns the witness plus the peer end of its socket.
    pub fn new(label: u8, log: &EventLog) -> (Self, UnixStream) {
        let (ours, theirs) = UnixStream::pair().unwrap();
        ours.set_nonblocking(true).unwrap();
        let witness = Self {
            label,
            stream: ours,
            log: log.clone(),
            rearm_zero: 0,
            one_shot_writable: false,
            pass: None,
            panic_on_readable: false,
        };
        (witness, theirs)
    }

    pub fn endpoint(label: u8, log: &EventLog) -> (Endpoint, UnixStream) {
        let (witness, peer) = Self::new(label, log);
        (Endpoint::new(witness), peer)
    }
}

impl EndpointHandler for Witness {
    fn source(&self) -> BorrowedFd<'_> { self.stream.as_fd() }

    fn on_readable(&mut self, cx: &mut Context<'_>) {
        assert!(!self.panic_on_readable, "boom");
        self.log.push(Event::Readable(self.label));
        let mut buf = [0u8; 256];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => {
                    cx.detach();
                    break;
                }
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(_) => {
                    cx.detach();
                    break;
                }
            }
        }
    }

    fn on_writable(&mut self, cx: &mut Context<'_>) {
        self.log.push(Event::Writable(self.label));
        if self.one_shot_writable {
            let interest = cx.interest();
            cx.set_interest(interest.readable, false, interest.disconnecting);
        }
    }

    fn on_expired(&mut self, cx: &mut Context<'_>) {
        let pass = self.pass.as_ref().map_or(0, |it| it.load(Ordering::SeqCst));
        self.log.push(Event::Expired {
            label: self.label,
            pass,
        });
        if self.rearm_zero > 0 {
            self.rearm_zero -= 1;
            cx.set_deadline(Duration::ZERO);
        }
    }

    fn on_disconnected(self: Box<Self>, cx: &mut Context<'_>) {
        // Already unlinked: detaching again must be harmless.
        assert!(!cx.is_attached());
        cx.detach();
        self.log.push(Event::Disconnected {
            label: self.label,
            remaining: cx.endpoint_count(),
        });
    }
}

/// Counts passes, and which endpoints each pass visited.
#[derive(Debug, Default)]
pub struct PassCounter {
    pub pass: PassNumber,
    /// `(pass, id)` for every `on_endpoint_visited`.
    pub visits: Arc<Mutex<Vec<(usize, EndpointId)>>>,
    /// `(pass the reason was drained in, reason)`.
    pub wakes: Arc<Mutex<Vec<(usize, u8)>>>,
}

impl PassCounter {
    /// A counter plus clones of its shared state, for the test to read.
    pub fn shared() -> (Self, PassCounterView) {
        let it = Self::default();
        let view = PassCounterView {
            pass: it.pass.clone(),
            visits: it.visits.clone(),
            wakes: it.wakes.clone(),
        };
        (it, view)
    }
}

impl DispatcherHooks for PassCounter {
    fn on_iteration(&mut self) { self.pass.fetch_add(1, Ordering::SeqCst); }

    fn on_endpoint_visited(&mut self, cx: &mut Context<'_>) {
        let pass = self.pass.load(Ordering::SeqCst);
        self.visits.lock().unwrap().push((pass, cx.id()));
    }

    fn on_wake(&mut self, reason: u8) {
        // `on_wake` runs just before `on_iteration` of the same pass.
        let pass = self.pass.load(Ordering::SeqCst) + 1;
        self.wakes.lock().unwrap().push((pass, reason));
    }
}

#[derive(Debug, Clone)]
pub struct PassCounterView {
    pub pass: PassNumber,
    pub visits: Arc<Mutex<Vec<(usize, EndpointId)>>>,
    pub wakes: Arc<Mutex<Vec<(usize, u8)>>>,
}

impl PassCounterView {
    pub fn pass_of_wake(&self, reason: u8) -> Option<usize> {
        self.wakes
            .lock()
            .unwrap()
            .iter()
            .find(|(_, it)| *it == reason)
            .map(|(pass, _)| *pass)
    }

    pub fn visits_in_pass(&self, pass: usize) -> usize {
        self.visits
            .lock()
            .unwrap()
            .iter()
            .filter(|(it, _)| *it == pass)
            .count()
    }
}

/// Forwards wake reasons and faults over channels.
#[derive(Debug)]
pub struct ChannelHooks {
    pub wakes: Sender<(u8, Instant)>,
    pub faults: Sender<String>,
}

impl DispatcherHooks for ChannelHooks {
    fn on_wake(&mut self, reason: u8) { drop(self.wakes.send((reason, Instant::now()))); }

    fn on_fault(&mut self, fault: &DispatcherFault) { drop(self.faults.send(fault.to_string())); }
}

/// Polls `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

pub const PATIENCE: Duration = Duration::from_secs(5);
