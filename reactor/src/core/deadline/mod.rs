// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// Attach sources.
mod deadline_impl;

// Re-export.
pub use deadline_impl::*;
