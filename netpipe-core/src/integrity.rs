// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Deterministic payload pattern for integrity mode.
//!
//! Each integer-sized cell of a message holds its own index, little-endian,
//! so both ends agree on the pattern regardless of host byte order. Trailing
//! bytes that do not form a whole integer are left untouched.

use crate::error::IntegrityError;

const CELL: usize = std::mem::size_of::<i32>();

/// Smallest message size that carries at least one integer plus one byte.
pub const MIN_INTEGRITY_BYTES: usize = CELL + 1;

/// Write consecutive integers 0..N-1 into the integer cells of `buf`.
pub fn set_integrity_data(buf: &mut [u8]) {
    for (index, cell) in buf.chunks_exact_mut(CELL).enumerate() {
        cell.copy_from_slice(&(index as i32).to_le_bytes());
    }
}

/// Check that `buf` still holds the pattern written by [`set_integrity_data`].
///
/// Reports the first mismatched cell with its byte offset.
pub fn verify_integrity(buf: &[u8]) -> Result<(), IntegrityError> {
    for (index, cell) in buf.chunks_exact(CELL).enumerate() {
        let actual = i32::from_le_bytes([cell[0], cell[1], cell[2], cell[3]]);
        let expected = index as i32;
        if actual != expected {
            return Err(IntegrityError::Mismatch {
                offset: index * CELL,
                expected,
                actual,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_is_consecutive() {
        let mut buf = vec![0u8; 4 * 8];
        set_integrity_data(&mut buf);
        for i in 0..8 {
            let value = i32::from_le_bytes(buf[i * 4..i * 4 + 4].try_into().unwrap());
            assert_eq!(value, i as i32);
        }
    }

    #[test]
    fn test_unmodified_buffer_accepted() {
        let mut buf = vec![0xAAu8; 4 * 100 + 1];
        set_integrity_data(&mut buf);
        assert!(verify_integrity(&buf).is_ok());
        // Trailing partial cell is not part of the pattern.
        assert_eq!(buf[400], 0xAA);
    }

    #[test]
    fn test_single_interior_change_rejected() {
        let mut buf = vec![0u8; 4 * 100];
        set_integrity_data(&mut buf);
        buf[4 * 42..4 * 43].copy_from_slice(&7777i32.to_le_bytes());

        assert_eq!(
            verify_integrity(&buf),
            Err(IntegrityError::Mismatch {
                offset: 168,
                expected: 42,
                actual: 7777,
            })
        );
    }

    #[test]
    fn test_first_mismatch_reported() {
        let mut buf = vec![0u8; 4 * 10];
        set_integrity_data(&mut buf);
        buf[4 * 3] ^= 0xFF;
        buf[4 * 7] ^= 0xFF;

        match verify_integrity(&buf) {
            Err(IntegrityError::Mismatch { offset, .. }) => assert_eq!(offset, 12),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_short_buffer_trivially_valid() {
        assert!(verify_integrity(&[1, 2, 3]).is_ok());
    }
}
