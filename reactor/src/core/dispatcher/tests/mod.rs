// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Dispatcher tests against real loop threads and [`UnixStream`] pairs.
//!
//! - [`fixtures`]: the [`Witness`] handler and its [`EventLog`], plus recording hooks.
//! - [`membership_tests`]: attach, detach, capacity, stale ids, migration.
//! - [`delivery_tests`]: readiness priority, disconnect ordering, parking, deadlines.
//! - [`lifecycle_tests`]: wake latency, shutdown and restart, faults, reentrancy.
//!
//! [`EventLog`]: fixtures::EventLog
//! [`Witness`]: fixtures::Witness
//! [`UnixStream`]: std::os::unix::net::UnixStream

mod delivery_tests;
mod fixtures;
