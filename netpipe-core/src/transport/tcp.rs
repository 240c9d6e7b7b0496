// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! TCP transport.
//!
//! The responder listens and accepts; the initiator connects, retrying while
//! the responder is still starting up. Resetting the connection rebuilds it
//! the same way, keeping the listener alive on the responder side.

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::Duration;

use nix::sys::socket::{setsockopt, sockopt};

use crate::error::TransportError;
use crate::transport::Transport;

/// Socket tuning and connection retry policy.
#[derive(Debug, Clone)]
pub struct TcpOptions {
    /// `SO_SNDBUF`/`SO_RCVBUF` size; `None` keeps system defaults.
    pub socket_buffer: Option<usize>,
    pub connect_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for TcpOptions {
    fn default() -> Self {
        Self {
            socket_buffer: None,
            connect_attempts: 100,
            retry_delay: Duration::from_millis(50),
        }
    }
}

enum Endpoint {
    Initiator { host: String, port: u16 },
    Responder { listener: TcpListener },
}

/// Blocking TCP connection to the peer role.
pub struct TcpTransport {
    stream: TcpStream,
    endpoint: Endpoint,
    options: TcpOptions,
}

impl TcpTransport {
    /// Bind the responder's listening socket on all interfaces.
    pub fn bind(port: u16) -> Result<TcpListener, TransportError> {
        let addr = format!("0.0.0.0:{}", port);
        TcpListener::bind(&addr).map_err(|source| TransportError::Bind { addr, source })
    }

    /// Wait for the initiator on `listener`.
    pub fn accept(listener: TcpListener, options: TcpOptions) -> Result<Self, TransportError> {
        let stream = Self::accept_stream(&listener, &options)?;
        Ok(Self {
            stream,
            endpoint: Endpoint::Responder { listener },
            options,
        })
    }

    /// Connect to a responder at `host:port`.
    pub fn connect(host: &str, port: u16, options: TcpOptions) -> Result<Self, TransportError> {
        let stream = Self::connect_stream(host, port, &options)?;
        Ok(Self {
            stream,
            endpoint: Endpoint::Initiator {
                host: host.to_string(),
                port,
            },
            options,
        })
    }

    fn accept_stream(
        listener: &TcpListener,
        options: &TcpOptions,
    ) -> Result<TcpStream, TransportError> {
        let (stream, peer) = listener
            .accept()
            .map_err(|source| TransportError::Accept { source })?;
        Self::configure(&stream, options)?;
        tracing::debug!(peer = %peer, "Accepted benchmark connection");
        Ok(stream)
    }

    fn connect_stream(
        host: &str,
        port: u16,
        options: &TcpOptions,
    ) -> Result<TcpStream, TransportError> {
        let attempts = options.connect_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match TcpStream::connect((host, port)) {
                Ok(stream) => {
                    Self::configure(&stream, options)?;
                    tracing::debug!(host = %host, port = port, attempt = attempt, "Connected");
                    return Ok(stream);
                }
                Err(source) if attempt >= attempts => {
                    return Err(TransportError::Connect {
                        addr: format!("{}:{}", host, port),
                        attempts,
                        source,
                    });
                }
                Err(e) => {
                    tracing::trace!(error = %e, attempt = attempt, "Connect failed, retrying");
                    std::thread::sleep(options.retry_delay);
                }
            }
        }
    }

    fn configure(stream: &TcpStream, options: &TcpOptions) -> Result<(), TransportError> {
        stream
            .set_nodelay(true)
            .map_err(|e| TransportError::SocketOption {
                option: "TCP_NODELAY",
                reason: e.to_string(),
            })?;

        if let Some(size) = options.socket_buffer {
            setsockopt(stream, sockopt::SndBuf, &size).map_err(|e| {
                TransportError::SocketOption {
                    option: "SO_SNDBUF",
                    reason: e.to_string(),
                }
            })?;
            setsockopt(stream, sockopt::RcvBuf, &size).map_err(|e| {
                TransportError::SocketOption {
                    option: "SO_RCVBUF",
                    reason: e.to_string(),
                }
            })?;
        }

        Ok(())
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        self.stream
            .write_all(buf)
            .map_err(|source| TransportError::Send {
                len: buf.len(),
                source,
            })
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let len = buf.len();
        match self.stream.read_exact(buf) {
            Ok(()) => Ok(len),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                Err(TransportError::PeerClosed { expected: len })
            }
            Err(source) => Err(TransportError::Recv { len, source }),
        }
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        // The old stream is closed when it is replaced.
        self.stream = match &self.endpoint {
            Endpoint::Initiator { host, port } => {
                Self::connect_stream(host, *port, &self.options)?
            }
            Endpoint::Responder { listener } => Self::accept_stream(listener, &self.options)?,
        };
        tracing::debug!("Connection reset between trials");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback_pair() -> (TcpTransport, TcpTransport) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = std::thread::spawn(move || {
            TcpTransport::accept(listener, TcpOptions::default()).unwrap()
        });
        let client = TcpTransport::connect("127.0.0.1", port, TcpOptions::default()).unwrap();
        (client, server.join().unwrap())
    }

    #[test]
    fn test_send_recv_roundtrip() {
        let (mut client, mut server) = loopback_pair();
        client.send(b"hello netpipe").unwrap();
        let mut buf = [0u8; 13];
        assert_eq!(server.recv(&mut buf).unwrap(), 13);
        assert_eq!(&buf, b"hello netpipe");
    }

    #[test]
    fn test_peer_closed_detected() {
        let (client, mut server) = loopback_pair();
        drop(client);
        let mut buf = [0u8; 8];
        assert!(matches!(
            server.recv(&mut buf),
            Err(TransportError::PeerClosed { expected: 8 })
        ));
    }

    #[test]
    fn test_reset_rebuilds_connection() {
        let (mut client, mut server) = loopback_pair();
        let handle = std::thread::spawn(move || {
            server.reset().unwrap();
            let mut buf = [0u8; 4];
            server.recv(&mut buf).unwrap();
            buf
        });
        client.reset().unwrap();
        client.send(b"next").unwrap();
        assert_eq!(&handle.join().unwrap(), b"next");
    }

    #[test]
    fn test_socket_buffer_option_applied() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let options = TcpOptions {
            socket_buffer: Some(256 * 1024),
            ..Default::default()
        };
        let server_options = options.clone();
        let server =
            std::thread::spawn(move || TcpTransport::accept(listener, server_options).unwrap());
        assert!(TcpTransport::connect("127.0.0.1", port, options).is_ok());
        server.join().unwrap();
    }

    #[test]
    fn test_connect_gives_up() {
        // Bind then drop to get a port with nothing listening.
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let options = TcpOptions {
            connect_attempts: 2,
            retry_delay: Duration::from_millis(1),
            ..Default::default()
        };
        assert!(matches!(
            TcpTransport::connect("127.0.0.1", port, options),
            Err(TransportError::Connect { attempts: 2, .. })
        ));
    }
}
