// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Absolute-time arithmetic for one software timer. See [`Deadline`].

use std::time::{Duration, Instant};

/// Used in place of an unrepresentable target (an [`Instant`] cannot hold arbitrarily
/// large offsets). Thirty years is effectively "never" for an endpoint timer.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// A single software timer embedded in every [`Endpoint`].
///
/// | Field      | Meaning                                                   |
/// | :--------- | :-------------------------------------------------------- |
/// | `armed`    | Whether the timer participates in expiry at all           |
/// | `armed_at` | When [`arm()`] was last called (basis for [`elapsed()`])  |
/// | `target`   | The absolute point in time at which the timer is due      |
///
/// An unarmed deadline has an infinite remaining time: [`remaining()`] returns [`None`].
/// [`remaining()`] never goes negative; a deadline in the past reports
/// [`Duration::ZERO`], which is what the dispatcher treats as "due".
///
/// # Clock
///
/// The clock is the monotonic [`Instant`]. Adjusting the system wall clock does not move
/// a deadline, and there is no tick counter that can roll over. Callers that expected a
/// timer to fire early or late across a wall-clock jump will not see that behavior here.
///
/// # Deterministic variants
///
/// Every time-reading method has an `_at(now)` twin that takes the current instant as a
/// parameter, so the arithmetic can be exercised without sleeping.
///
/// [`Endpoint`]: crate::Endpoint
/// [`arm()`]: Self::arm
/// [`elapsed()`]: Self::elapsed
/// [`remaining()`]: Self::remaining
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    armed: bool,
    armed_at: Instant,
    target: Instant,
}

impl Default for Deadline {
    fn default() -> Self { Self::new() }
}

impl Deadline {
    /// Creates an unarmed deadline.
    #[must_use]
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            armed: false,
            armed_at: now,
            target: now,
        }
    }

    /// Creates a deadline armed to fire `duration` from now.
    #[must_use]
    pub fn armed_in(duration: Duration) -> Self {
        let mut it = Self::new();
        it.arm(duration);
        it
    }

    /// Arms the timer to fire `duration` from now. A zero duration arms a deadline
    /// that is already due.
    pub fn arm(&mut self, duration: Duration) { self.arm_at(Instant::now(), duration); }

    /// Arms the timer to fire `duration` after `now`.
    pub fn arm_at(&mut self, now: Instant, duration: Duration) {
        self.armed_at = now;
        self.target = offset(now, duration);
        self.armed = true;
    }

    /// Pushes the target out by `duration` without re-reading the clock, so repeated
    /// extensions accumulate. Does not change whether the deadline is armed.
    pub fn extend(&mut self, duration: Duration) {
        self.target = offset(self.target, duration);
    }

    /// Disarms the timer. [`remaining()`] reports [`None`] afterwards.
    ///
    /// [`remaining()`]: Self::remaining
    pub fn disarm(&mut self) { self.armed = false; }

    #[must_use]
    pub fn is_armed(&self) -> bool { self.armed }

    /// Time left until the deadline is due: [`None`] when unarmed, otherwise clamped to
    /// zero once the target has passed.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> { self.remaining_at(Instant::now()) }

    #[must_use]
    pub fn remaining_at(&self, now: Instant) -> Option<Duration> {
        self.armed
            .then(|| self.target.saturating_duration_since(now))
    }

    /// Time since the deadline was last armed: [`None`] when unarmed.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> { self.elapsed_at(Instant::now()) }

    #[must_use]
    pub fn elapsed_at(&self, now: Instant) -> Option<Duration> {
        self.armed
            .then(|| now.saturating_duration_since(self.armed_at))
    }

    /// `true` when armed and the target is now or in the past.
    #[must_use]
    pub fn is_due(&self) -> bool { self.is_due_at(Instant::now()) }

    #[must_use]
    pub fn is_due_at(&self, now: Instant) -> bool {
        self.remaining_at(now) == Some(Duration::ZERO)
    }

    /// The absolute target, if armed.
    #[must_use]
    pub fn target(&self) -> Option<Instant> { self.armed.then_some(self.target) }
}

fn offset(base: Instant, duration: Duration) -> Instant {
    base.checked_add(duration)
        .or_else(|| base.checked_add(FAR_FUTURE))
        .unwrap_or(base)
}
