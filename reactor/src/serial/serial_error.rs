// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum SerialError {
    #[error("Failed to open serial device {path}")]
    #[diagnostic(
        code(r3bl_reactor::serial::open),
        help("Check that the device exists and that you are in its group (often `dialout`)")
    )]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to configure serial device {path}")]
    #[diagnostic(
        code(r3bl_reactor::serial::configure),
        help("The device must be a tty")
    )]
    Configure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported baud rate {baud_rate}")]
    #[diagnostic(
        code(r3bl_reactor::serial::unsupported_baud_rate),
        help("Use one of SUPPORTED_BAUD_RATES")
    )]
    UnsupportedBaudRate { baud_rate: u32 },
}
