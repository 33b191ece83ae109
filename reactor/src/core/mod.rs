// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// Attach sources.
pub mod common;
pub mod deadline;
pub mod dispatcher;
pub mod endpoint;
pub mod multiplexer;
pub mod wake_channel;

// Re-export.
pub use common::*;
pub use deadline::*;
pub use dispatcher::*;
pub use endpoint::*;
pub use multiplexer::*;
pub use wake_channel::*;
