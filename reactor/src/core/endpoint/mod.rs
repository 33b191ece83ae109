// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The registered unit of interest: one OS handle, its [`Interest`] flags, and its
//! [`Deadline`]. See [`Endpoint`] and [`EndpointHandler`].
//!
//! [`Deadline`]: crate::Deadline

// Attach sources.
mod endpoint_handler;
mod endpoint_id;
mod endpoint_impl;
mod endpoint_list;
mod endpoint_state;
mod interest;

// Re-export.
pub use endpoint_handler::*;
pub use endpoint_id::*;
pub use endpoint_impl::*;
pub(crate) use endpoint_list::*;
pub use endpoint_state::*;
pub use interest::*;
