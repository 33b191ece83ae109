// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use std::fmt::{Display, Formatter, Result};

/// Generation-checked reference to an attached endpoint.
///
/// `key` is the endpoint's slot in the dispatcher's arena; `generation` is unique per
/// attachment. Slots are reused after a detach, but generations never are, so an id that
/// outlives its attachment resolves to nothing instead of to whichever endpoint reused
/// the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointId {
    pub(crate) key: usize,
    pub(crate) generation: u64,
}

impl EndpointId {
    #[must_use]
    pub fn key(&self) -> usize { self.key }

    #[must_use]
    pub fn generation(&self) -> u64 { self.generation }
}

impl Display for EndpointId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "endpoint#{}.{}", self.key, self.generation)
    }
}
