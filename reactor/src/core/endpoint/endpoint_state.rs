// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Connection lifecycle shared by every endpoint kind. See [`EndpointState`].

use miette::Diagnostic;
use strum_macros::{Display, EnumIter};

/// Lifecycle of the OS handle behind an endpoint.
///
/// ```text
/// Unbound ──► Bound ──► Connecting ──► Connected
///    │          │           │              │
///    └──────────┴───────────┴──────────────┴──► Disconnected
/// ```
///
/// - Datagram and listening endpoints stop at [`Bound`] (they never connect).
/// - A non-blocking connect may skip the explicit bind: `Unbound → Connecting`.
/// - Streams produced by `accept()` start life at [`Connected`].
/// - [`Disconnected`] is terminal.
///
/// [`Bound`]: Self::Bound
/// [`Connected`]: Self::Connected
/// [`Disconnected`]: Self::Disconnected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumIter)]
pub enum EndpointState {
    #[default]
    Unbound,
    Bound,
    Connecting,
    Connected,
    Disconnected,
}

/// Returned by [`EndpointState::transition()`] for an edge that is not in the lifecycle
/// diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error, Diagnostic)]
#[error("Invalid endpoint state transition: {from} -> {to}")]
#[diagnostic(
    code(r3bl_reactor::endpoint::invalid_transition),
    help("Endpoints move Unbound -> Bound -> Connecting -> Connected -> Disconnected")
)]
pub struct InvalidTransition {
    pub from: EndpointState,
    pub to: EndpointState,
}

impl EndpointState {
    /// Returns `to` if the edge `self → to` is legal.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] for any edge not in the lifecycle diagram,
    /// including self-loops and anything leaving [`Disconnected`].
    ///
    /// [`Disconnected`]: Self::Disconnected
    pub fn transition(self, to: Self) -> Result<Self, InvalidTransition> {
        use EndpointState::{Bound, Connected, Connecting, Disconnected, Unbound};
        let legal = matches!(
            (self, to),
            (Unbound, Bound | Connecting | Disconnected)
                | (Bound, Connecting | Disconnected)
                | (Connecting, Connected | Disconnected)
                | (Connected, Disconnected)
        );
        if legal {
            Ok(to)
        } else {
            Err(InvalidTransition { from: self, to })
        }
    }

    /// Moves `self` to `to` in place, leaving it untouched on error.
    ///
    /// # Errors
    ///
    /// See [`transition()`](Self::transition).
    pub fn advance(&mut self, to: Self) -> Result<(), InvalidTransition> {
        *self = self.transition(to)?;
        Ok(())
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool { *self == EndpointState::Disconnected }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator;
    use test_case::test_case;
    use super::EndpointState::{Bound, Connected, Connecting, Disconnected, Unbound};

    #[test_case(Unbound, Bound)]
    #[test_case(Unbound, Connecting)]
    #[test_case(Bound, Connecting)]
    #[test_case(Connecting, Connected)]
    #[test_case(Connected, Disconnected)]
    #[test_case(Bound, Disconnected)]
    #[test_case(Connecting, Disconnected)]
    fn test_legal_transition(from: EndpointState, to: EndpointState) {
        assert_eq!(from.transition(to), Ok(to));
    }

    #[test_case(Connected, Connecting)]
    #[test_case(Bound, Connected)]
    #[test_case(Unbound, Connected)]
    #[test_case(Connected, Bound)]
    fn test_illegal_transition(from: EndpointState, to: EndpointState) {
        assert_eq!(from.transition(to), Err(InvalidTransition { from, to }));
    }

    #[test]
    fn test_disconnected_is_terminal() {
        for to in EndpointState::iter() {
            assert!(Disconnected.transition(to).is_err(), "Disconnected -> {to}");
        }
        assert!(Disconnected.is_terminal());
    }

    #[test]
    fn test_no_self_loops() {
        for state in EndpointState::iter() {
            assert!(state.transition(state).is_err(), "{state} -> {state}");
        }
    }

    #[test]
    fn test_advance_leaves_state_on_error() {
        let mut state = Connected;
        assert!(state.advance(Bound).is_err());
        assert_eq!(state, Connected);
        state.advance(Disconnected).unwrap();
        assert_eq!(state, Disconnected);
    }

    #[test]
    fn test_error_message() {
        let err = Connected.transition(Bound).unwrap_err();
        assert_eq!(err.to_string(), "Invalid endpoint state transition: Connected -> Bound");
    }
}
