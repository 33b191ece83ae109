// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Echo server on top of one dispatcher thread. TCP connections that stay quiet for
//! `--idle-secs` are closed by their deadline. Optionally echoes UDP datagrams and a
//! serial line too. Type `stats` for counters, `quit` (or close stdin) to stop.
//!
//! ```text
//! cargo run --bin reactor_echo -- --tcp 127.0.0.1:7878 --udp 127.0.0.1:7879 --log
//! ```

use clap::Parser;
use miette::IntoDiagnostic as _;
use mio::net::{TcpStream, UdpSocket};
use r3bl_reactor::{AcceptHandler, Context, Continuation, DatagramHandler, Dispatcher,
                   DisplayPreference, SerialConfig, SerialEndpoint, SerialHandler,
                   SerialPort, StreamHandler, TcpAcceptor, TcpConnection, TracingConfig,
                   UdpEndpoint, try_initialize_logging};
use std::{io::{BufRead, ErrorKind, Read, Write},
          net::SocketAddr,
          path::PathBuf,
          time::Duration};
use tracing_core::LevelFilter;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct CLIArg {
    /// Address to accept TCP connections on.
    #[arg(long, default_value = "127.0.0.1:7878")]
    tcp: SocketAddr,

    /// Also echo UDP datagrams on this address.
    #[arg(long)]
    udp: Option<SocketAddr>,

    /// Also echo a serial device (for example `/dev/ttyUSB0`).
    #[arg(long)]
    serial: Option<PathBuf>,

    #[arg(long, default_value_t = r3bl_reactor::DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Close TCP connections idle for this many seconds.
    #[arg(long, default_value_t = 30)]
    idle_secs: u64,

    /// Log to stderr (`RUST_LOG` overrides the level).
    #[arg(long, short = 'l')]
    log: bool,

    /// Also log to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

/// Writes back whatever arrives, then pushes the idle deadline out again.
struct EchoStream {
    idle: Duration,
}

impl StreamHandler for EchoStream {
    fn on_connected(&mut self, _stream: &mut TcpStream, cx: &mut Context<'_>) {
        cx.set_deadline(self.idle);
    }

    fn on_readable(&mut self, stream: &mut TcpStream, cx: &mut Context<'_>) {
        let mut buf = [0u8; 4096];
        loop {
            match stream.read(&mut buf) {
                Ok(0) => {
                    cx.detach();
                    return;
                }
                Ok(n) => {
                    if let Err(error) = stream.write_all(&buf[..n]) {
                        tracing::debug!(message = "echo write failed", error = %error);
                        cx.detach();
                        return;
                    }
                }
                Err(error) if error.kind() == ErrorKind::WouldBlock => break,
                Err(error) => {
                    tracing::debug!(message = "echo read failed", error = %error);
                    cx.detach();
                    return;
                }
            }
        }
        cx.set_deadline(self.idle);
    }

    fn on_expired(&mut self, _stream: &mut TcpStream, cx: &mut Context<'_>) {
        tracing::info!(message = "closing idle connection", id = %cx.id());
        cx.detach();
    }
}

struct EchoAcceptor {
    idle: Duration,
}

impl AcceptHandler for EchoAcceptor {
    fn on_accept(
        &mut self,
        stream: TcpStream,
        peer: SocketAddr,
        cx: &mut Context<'_>,
    ) -> Continuation {
        let connection = TcpConnection::accepted(stream, EchoStream { idle: self.idle });
        match cx.attach(connection.into_endpoint().with_deadline(self.idle)) {
            Ok(handle) => {
                tracing::info!(message = "client connected", peer = %peer, id = %handle.id());
                Continuation::Continue
            }
            Err(error) => {
                tracing::warn!(message = "client rejected", peer = %peer, error = %error);
                Continuation::Stop
            }
        }
    }
}

struct EchoDatagram;

impl DatagramHandler for EchoDatagram {
    fn on_datagram(
        &mut self,
        socket: &UdpSocket,
        payload: &[u8],
        from: SocketAddr,
        _cx: &mut Context<'_>,
    ) {
        if let Err(error) = socket.send_to(payload, from) {
            tracing::debug!(message = "udp echo failed", from = %from, error = %error);
        }
    }
}

struct EchoSerial;

impl SerialHandler for EchoSerial {
    fn on_readable(&mut self, port: &mut SerialPort, _cx: &mut Context<'_>) {
        let mut buf = [0u8; 256];
        while let Ok(n) = port.read(&mut buf)
            && n > 0
        {
            if port.write_all(&buf[..n]).is_err() {
                break;
            }
        }
    }

    fn on_disconnected(&mut self, port: &mut SerialPort) {
        tracing::warn!(message = "serial device hung up", path = %port.path().display());
    }
}

fn main() -> miette::Result<()> {
    let cli_arg = CLIArg::parse();

    if cli_arg.log || cli_arg.log_file.is_some() {
        let config = match &cli_arg.log_file {
            Some(path) => {
                TracingConfig::new_file_and_display(Some(path.clone()), DisplayPreference::Stderr)
            }
            None => TracingConfig::new_display(DisplayPreference::Stderr),
        };
        try_initialize_logging(config.with_level_filter(LevelFilter::INFO))?;
        // % is Display, ? is Debug.
        tracing::debug!(message = "Start logging...", cli_arg = ?cli_arg);
    }

    let idle = Duration::from_secs(cli_arg.idle_secs);
    let dispatcher = Dispatcher::new()?;

    let acceptor = TcpAcceptor::bind(cli_arg.tcp, EchoAcceptor { idle }).into_diagnostic()?;
    println!("tcp echo on {}", acceptor.local_addr());
    dispatcher.attach(acceptor.into_endpoint())?;

    if let Some(addr) = cli_arg.udp {
        let endpoint = UdpEndpoint::bind(addr, EchoDatagram).into_diagnostic()?;
        println!("udp echo on {}", endpoint.local_addr());
        dispatcher.attach(endpoint.into_endpoint())?;
    }

    if let Some(path) = &cli_arg.serial {
        let port = SerialPort::open(&SerialConfig::new(path).with_baud_rate(cli_arg.baud))?;
        println!("serial echo on {}", path.display());
        dispatcher.attach(SerialEndpoint::new(port, EchoSerial).into_endpoint())?;
    }

    for line in std::io::stdin().lock().lines() {
        match line.into_diagnostic()?.trim() {
            "quit" => break,
            "stats" => println!("{} endpoints, {:?}", dispatcher.len(), dispatcher.stats()),
            _ => {}
        }
        if let Some(fault) = dispatcher.take_fault() {
            return Err(fault.into());
        }
    }

    dispatcher.shutdown()?;
    println!("{:?}", dispatcher.stats());
    Ok(())
}
