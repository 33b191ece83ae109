// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The OS wait primitive behind the dispatcher. See [`Multiplexer`].

// Attach sources.
mod capped_multiplexer;
mod multiplexer_trait;
mod poll_multiplexer;
mod readiness;

// Re-export.
pub use capped_multiplexer::*;
pub use multiplexer_trait::*;
pub use poll_multiplexer::*;
pub use readiness::*;
