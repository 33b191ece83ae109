// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Self-pipe used to interrupt the dispatcher's blocking wait from any thread. See
//! [`create_wake_channel()`].

// Attach sources.
mod wake_channel_impl;

// Re-export.
pub use wake_channel_impl::*;
