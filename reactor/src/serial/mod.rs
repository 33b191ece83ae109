// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Serial devices as endpoints. A [`SerialPort`] is a tty opened non-blocking and put
//! in raw mode at a fixed baud rate; a [`SerialEndpoint`] attaches it to a dispatcher
//! exactly like a socket.

// Attach sources.
mod serial_config;
mod serial_endpoint;
mod serial_error;
mod serial_port;

// Re-export.
pub use serial_config::*;
pub use serial_endpoint::*;
pub use serial_error::*;
pub use serial_port::*;
