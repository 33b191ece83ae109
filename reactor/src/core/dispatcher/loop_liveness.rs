// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Liveness of one incarnation of the dispatcher loop thread. See [`LoopLiveness`].

use crate::LivenessState;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared between the loop thread (which marks itself terminated on exit, through
/// [`TerminationGuard`]) and the [`Dispatcher`] (which checks it before deciding whether
/// to spawn a new thread).
///
/// [`AtomicBool`] instead of a [`Mutex<bool>`] because the check happens while the
/// worker lock is held; the loop thread can mark itself terminated without touching any
/// lock.
///
/// `generation` identifies the incarnation: it is bumped by the dispatcher every time it
/// spawns a thread, so comparing generations tells a restart apart from a reused thread.
/// Wraps from `255` to `0`.
///
/// [`Dispatcher`]: crate::Dispatcher
/// [`Mutex<bool>`]: std::sync::Mutex
#[derive(Debug)]
pub(crate) struct LoopLiveness {
    is_running: AtomicBool,
    pub generation: u8,
}

impl LoopLiveness {
    pub fn new(generation: u8) -> Self {
        Self {
            is_running: AtomicBool::new(true),
            generation,
        }
    }

    pub fn mark_terminated(&self) { self.is_running.store(false, Ordering::SeqCst); }

    pub fn is_running(&self) -> LivenessState {
        if self.is_running.load(Ordering::SeqCst) {
            LivenessState::Running
        } else {
            LivenessState::Terminated
        }
    }
}

/// [RAII] guard owned by the loop thread. Marks the [`LoopLiveness`] terminated however
/// the loop function exits.
///
/// [RAII]: https://en.wikipedia.org/wiki/Resource_acquisition_is_initialization
#[derive(Debug)]
pub(crate) struct TerminationGuard(pub std::sync::Arc<LoopLiveness>);

impl Drop for TerminationGuard {
    fn drop(&mut self) { self.0.mark_terminated(); }
}
