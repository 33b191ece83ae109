// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The dispatcher: endpoint registry, loop thread lifecycle, and the loop itself. See
//! [`Dispatcher`] for the public API and [`Context`] for what callbacks may do.

// Attach sources.
mod context;
mod dispatch_loop;
mod dispatcher_config;
mod dispatcher_error;
mod dispatcher_hooks;
mod dispatcher_impl;
mod dispatcher_stats;
mod endpoint_handle;
mod loop_liveness;
mod wait_set;

// Re-export.
pub use context::*;
pub(crate) use dispatch_loop::*;
pub use dispatcher_config::*;
pub use dispatcher_error::*;
pub use dispatcher_hooks::*;
pub use dispatcher_impl::*;
pub use dispatcher_stats::*;
pub use endpoint_handle::*;
pub(crate) use loop_liveness::*;
pub(crate) use wait_set::*;

#[cfg(test)]
mod tests;
