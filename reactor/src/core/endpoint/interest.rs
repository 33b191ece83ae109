// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use std::ops::BitOr;

/// Which conditions the dispatcher should report for an endpoint.
///
/// | Flag            | Callback delivered                                         |
/// | :-------------- | :--------------------------------------------------------- |
/// | `readable`      | [`on_readable()`] when the handle can be read (or hung up) |
/// | `writable`      | [`on_writable()`] when the handle can be written           |
/// | `disconnecting` | [`on_disconnected()`] on hang-up or an invalid handle      |
///
/// The dispatcher itself clears `disconnecting` on the Disconnected transition so the
/// same hang-up is never reported twice.
///
/// [`on_disconnected()`]: crate::EndpointHandler::on_disconnected
/// [`on_readable()`]: crate::EndpointHandler::on_readable
/// [`on_writable()`]: crate::EndpointHandler::on_writable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Interest {
    pub readable: bool,
    pub writable: bool,
    pub disconnecting: bool,
}

impl Interest {
    pub const NONE: Self = Self::new(false, false, false);
    pub const READABLE: Self = Self::new(true, false, false);
    pub const WRITABLE: Self = Self::new(false, true, false);
    pub const DISCONNECTING: Self = Self::new(false, false, true);

    #[must_use]
    pub const fn new(readable: bool, writable: bool, disconnecting: bool) -> Self {
        Self {
            readable,
            writable,
            disconnecting,
        }
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self {
            readable: self.readable || other.readable,
            writable: self.writable || other.writable,
            disconnecting: self.disconnecting || other.disconnecting,
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !self.readable && !self.writable && !self.disconnecting
    }
}

impl BitOr for Interest {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self { self.union(rhs) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union() {
        let it = Interest::READABLE | Interest::DISCONNECTING;
        assert_eq!(it, Interest::new(true, false, true));
        assert!(!it.is_empty());
        assert!(Interest::NONE.is_empty());
        assert_eq!(Interest::default(), Interest::NONE);
    }
}
