// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! In-process transport over a pair of channels.
//!
//! Lets both roles run inside one process without a network stack. Every
//! message is copied into a fresh allocation, so numbers measured over it
//! describe the allocator as much as the loop; it exists for tests and for
//! exercising the protocol, not for publishing bandwidth figures.

use std::io;
use std::sync::mpsc::{channel, Receiver, Sender};

use crate::error::TransportError;
use crate::transport::Transport;

/// One end of an in-process message channel.
pub struct ChannelTransport {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

impl ChannelTransport {
    /// Create two connected ends.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = channel();
        let (b_tx, a_rx) = channel();
        (
            Self { tx: a_tx, rx: a_rx },
            Self { tx: b_tx, rx: b_rx },
        )
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        self.tx
            .send(buf.to_vec())
            .map_err(|_| TransportError::Send {
                len: buf.len(),
                source: io::Error::new(io::ErrorKind::BrokenPipe, "peer channel closed"),
            })
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let message = self
            .rx
            .recv()
            .map_err(|_| TransportError::PeerClosed {
                expected: buf.len(),
            })?;

        if message.len() != buf.len() {
            return Err(TransportError::LengthMismatch {
                expected: buf.len(),
                actual: message.len(),
            });
        }

        buf.copy_from_slice(&message);
        Ok(message.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_is_bidirectional() {
        let (mut a, mut b) = ChannelTransport::pair();
        a.send(b"ping").unwrap();
        let mut buf = [0u8; 4];
        b.recv(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");

        b.send(b"pong").unwrap();
        a.recv(&mut buf).unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[test]
    fn test_length_mismatch() {
        let (mut a, mut b) = ChannelTransport::pair();
        a.send(b"too long").unwrap();
        let mut buf = [0u8; 4];
        assert!(matches!(
            b.recv(&mut buf),
            Err(TransportError::LengthMismatch {
                expected: 4,
                actual: 8
            })
        ));
    }

    #[test]
    fn test_dropped_peer() {
        let (mut a, b) = ChannelTransport::pair();
        drop(b);
        assert!(a.send(b"x").is_err());
        let mut buf = [0u8; 1];
        assert!(matches!(
            a.recv(&mut buf),
            Err(TransportError::PeerClosed { expected: 1 })
        ));
    }
}
