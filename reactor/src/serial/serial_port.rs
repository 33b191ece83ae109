// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words NOCTTY CLOEXEC cfmakeraw

use super::{SUPPORTED_BAUD_RATES, SerialConfig, SerialError};
use rustix::{fs::{Mode, OFlags},
             termios::{self, OptionalActions}};
use std::{io::{self, Read, Write},
          os::fd::{AsFd, BorrowedFd, OwnedFd},
          path::{Path, PathBuf}};

/// An open, non-blocking, raw-mode tty.
///
/// Reads and writes go straight to the descriptor and return
/// [`io::ErrorKind::WouldBlock`] instead of waiting.
#[derive(Debug)]
pub struct SerialPort {
    fd: OwnedFd,
    path: PathBuf,
}

impl SerialPort {
    /// Opens `config.path` read-write without making it the controlling terminal, then
    /// applies raw mode (`cfmakeraw()`) and the baud rate.
    ///
    /// # Errors
    ///
    /// - [`SerialError::UnsupportedBaudRate`] before touching the device.
    /// - [`SerialError::Open`] if the device cannot be opened.
    /// - [`SerialError::Configure`] if it is not a tty or rejects the settings.
    pub fn open(config: &SerialConfig) -> Result<Self, SerialError> {
        if !SUPPORTED_BAUD_RATES.contains(&config.baud_rate) {
            return Err(SerialError::UnsupportedBaudRate {
                baud_rate: config.baud_rate,
            });
        }

        let fd = rustix::fs::open(
            config.path.as_path(),
            OFlags::RDWR | OFlags::NOCTTY | OFlags::NONBLOCK | OFlags::CLOEXEC,
            Mode::empty(),
        )
        .map_err(|errno| SerialError::Open {
            path: config.path.clone(),
            source: errno.into(),
        })?;

        let configure_error = |errno: rustix::io::Errno| SerialError::Configure {
            path: config.path.clone(),
            source: errno.into(),
        };
        let mut termios = termios::tcgetattr(&fd).map_err(configure_error)?;
        termios.make_raw();
        termios
            .set_speed(config.baud_rate)
            .map_err(|_| SerialError::UnsupportedBaudRate {
                baud_rate: config.baud_rate,
            })?;
        termios::tcsetattr(&fd, OptionalActions::Now, &termios).map_err(configure_error)?;

        tracing::debug!(
            message = "serial port opened",
            path = %config.path.display(),
            baud_rate = config.baud_rate
        );
        Ok(Self {
            fd,
            path: config.path.clone(),
        })
    }

    /// Wraps a descriptor the caller has already opened and configured. It must be in
    /// non-blocking mode.
    pub fn from_fd(fd: OwnedFd, path: impl Into<PathBuf>) -> Self {
        Self {
            fd,
            path: path.into(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path { &self.path }

    /// Discards anything received but not read, and anything written but not sent.
    ///
    /// # Errors
    ///
    /// Fails if the descriptor is not a tty.
    pub fn flush_buffers(&self) -> io::Result<()> {
        termios::tcflush(&self.fd, termios::QueueSelector::IOFlush).map_err(io::Error::from)
    }
}

impl AsFd for SerialPort {
    fn as_fd(&self) -> BorrowedFd<'_> { self.fd.as_fd() }
}

impl Read for &SerialPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        rustix::io::read(&self.fd, buf).map_err(io::Error::from)
    }
}

impl Write for &SerialPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        rustix::io::write(&self.fd, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

impl Read for SerialPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> { (&*self).read(buf) }
}

impl Write for SerialPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> { (&*self).write(buf) }

    fn flush(&mut self) -> io::Result<()> { Ok(()) }
}
