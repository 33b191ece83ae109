// Copyright (c) 2023-2025 R3BL LLC. Licensed under Apache License, Version 2.0.

/// Control flow signal for loops and threads.
///
/// A unified type for indicating whether a loop should continue processing or stop.
/// Used across:
/// - The dispatcher loop (wake channel draining and pass execution).
/// - The [`TcpAcceptor`] accept loop.
///
/// [`TcpAcceptor`]: crate::net::TcpAcceptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Continuation {
    /// Continue to the next iteration.
    #[default]
    Continue,

    /// Stop processing and exit the loop/thread.
    Stop,
}

/// An indication of whether the dispatcher thread is running or terminated.
///
/// # Why Not Just `bool`?
///
/// `bool` requires remembering what `true` means. With this enum:
/// - [`LivenessState::Running`] is unambiguous
/// - Pattern matching catches all cases
/// - Code reads like documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessState {
    /// The dispatcher thread is running and processing events.
    Running,
    /// The dispatcher thread has exited or was never started.
    Terminated,
}
