// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Blocking message transports.
//!
//! The trial loop only needs "send these bytes" and "receive exactly this
//! many bytes". Every call blocks without timeout and every failure is fatal
//! to the run.

mod channel;
mod tcp;

pub use channel::ChannelTransport;
pub use tcp::{TcpOptions, TcpTransport};

use crate::error::TransportError;

/// A blocking, reliable, ordered byte-message channel to the peer role.
pub trait Transport: Send {
    /// Send all of `buf`.
    fn send(&mut self, buf: &[u8]) -> Result<(), TransportError>;

    /// Receive exactly `buf.len()` bytes into `buf`.
    ///
    /// Returns the number of bytes received.
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Tear down and re-establish the connection between trials.
    fn reset(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        (**self).send(buf)
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        (**self).recv(buf)
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        (**self).reset()
    }
}
