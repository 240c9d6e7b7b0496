// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Rendezvous and repeat-count handshake between the two roles.
//!
//! Control messages travel in-band as fixed 12-byte frames:
//!
//! ```text
//! +---------+-----------+-------------+
//! | tag (4) | value (4) | crc32 (4)   |
//! +---------+-----------+-------------+
//! ```
//!
//! `value` is little-endian; the checksum covers tag and value. Sync frames
//! carry a generation counter so a role that skipped or repeated a barrier
//! is caught instead of silently timing the wrong window.

use crate::error::TransportError;
use crate::transport::Transport;
use crate::types::Role;

/// Size of a control frame on the wire.
pub const FRAME_LEN: usize = 12;

const SYNC_TAG: [u8; 4] = *b"SYNC";
const REPEAT_TAG: [u8; 4] = *b"NREP";

fn encode(tag: [u8; 4], value: u32) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[..4].copy_from_slice(&tag);
    frame[4..8].copy_from_slice(&value.to_le_bytes());
    let checksum = crc32fast::hash(&frame[..8]);
    frame[8..].copy_from_slice(&checksum.to_le_bytes());
    frame
}

fn decode(
    frame: &[u8; FRAME_LEN],
    tag: [u8; 4],
    expected: &'static str,
) -> Result<u32, TransportError> {
    let actual = crc32fast::hash(&frame[..8]);
    let claimed = u32::from_le_bytes([frame[8], frame[9], frame[10], frame[11]]);
    if actual != claimed {
        return Err(TransportError::ChecksumMismatch {
            expected: claimed,
            actual,
        });
    }

    if frame[..4] != tag {
        return Err(TransportError::UnexpectedFrame {
            expected,
            actual: String::from_utf8_lossy(&frame[..4]).into_owned(),
        });
    }

    Ok(u32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]))
}

/// Barrier and handshake state of one role.
pub struct Coordinator {
    role: Role,
    generation: u32,
}

impl Coordinator {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            generation: 0,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Number of barriers passed so far.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Block until the peer reaches the same barrier.
    ///
    /// The transmitter announces first and the receiver answers, so the
    /// receiver can never leave a barrier the transmitter has not entered.
    pub fn sync<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<(), TransportError> {
        self.generation = self.generation.wrapping_add(1);
        let local = self.generation;

        let peer = match self.role {
            Role::Transmitter => {
                transport.send(&encode(SYNC_TAG, local))?;
                Self::read_frame(transport, SYNC_TAG, "SYNC")?
            }
            Role::Receiver => {
                let peer = Self::read_frame(transport, SYNC_TAG, "SYNC")?;
                transport.send(&encode(SYNC_TAG, local))?;
                peer
            }
        };

        if peer != local {
            return Err(TransportError::SyncSkew { local, peer });
        }

        tracing::trace!(role = %self.role, generation = local, "Passed sync barrier");
        Ok(())
    }

    /// Hand a calibrated repeat count to the receiver.
    pub fn exchange_repeat_count<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        value: u32,
    ) -> Result<(), TransportError> {
        transport.send(&encode(REPEAT_TAG, value))?;
        tracing::debug!(repeat = value, "Sent repeat count");
        Ok(())
    }

    /// Wait for the transmitter's calibrated repeat count.
    pub fn receive_repeat_count<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
    ) -> Result<u32, TransportError> {
        let value = Self::read_frame(transport, REPEAT_TAG, "NREP")?;
        tracing::debug!(repeat = value, "Received repeat count");
        Ok(value)
    }

    fn read_frame<T: Transport + ?Sized>(
        transport: &mut T,
        tag: [u8; 4],
        expected: &'static str,
    ) -> Result<u32, TransportError> {
        let mut frame = [0u8; FRAME_LEN];
        transport.recv(&mut frame)?;
        decode(&frame, tag, expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChannelTransport;

    #[test]
    fn test_frame_roundtrip() {
        let frame = encode(REPEAT_TAG, 1000);
        assert_eq!(decode(&frame, REPEAT_TAG, "NREP").unwrap(), 1000);
    }

    #[test]
    fn test_corrupted_frame_rejected() {
        let mut frame = encode(REPEAT_TAG, 1000);
        frame[5] ^= 0x01;
        assert!(matches!(
            decode(&frame, REPEAT_TAG, "NREP"),
            Err(TransportError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_wrong_tag_rejected() {
        let frame = encode(SYNC_TAG, 1);
        assert!(matches!(
            decode(&frame, REPEAT_TAG, "NREP"),
            Err(TransportError::UnexpectedFrame { .. })
        ));
    }

    #[test]
    fn test_sync_both_roles() {
        let (mut tx_end, mut rx_end) = ChannelTransport::pair();
        let receiver = std::thread::spawn(move || {
            let mut coordinator = Coordinator::new(Role::Receiver);
            for _ in 0..3 {
                coordinator.sync(&mut rx_end).unwrap();
            }
            coordinator.generation()
        });

        let mut coordinator = Coordinator::new(Role::Transmitter);
        for _ in 0..3 {
            coordinator.sync(&mut tx_end).unwrap();
        }
        assert_eq!(coordinator.generation(), 3);
        assert_eq!(receiver.join().unwrap(), 3);
    }

    #[test]
    fn test_sync_skew_detected() {
        let (mut tx_end, mut rx_end) = ChannelTransport::pair();
        // Peer claims to be one barrier ahead.
        rx_end.send(&encode(SYNC_TAG, 2)).unwrap();

        let mut coordinator = Coordinator::new(Role::Transmitter);
        assert!(matches!(
            coordinator.sync(&mut tx_end),
            Err(TransportError::SyncSkew { local: 1, peer: 2 })
        ));
    }

    #[test]
    fn test_repeat_count_handshake() {
        let (mut tx_end, mut rx_end) = ChannelTransport::pair();
        let mut transmitter = Coordinator::new(Role::Transmitter);
        let mut receiver = Coordinator::new(Role::Receiver);

        transmitter.exchange_repeat_count(&mut tx_end, 1000).unwrap();
        assert_eq!(receiver.receive_repeat_count(&mut rx_end).unwrap(), 1000);
    }
}
