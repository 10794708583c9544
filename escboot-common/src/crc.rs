// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Frame checksum: reflected CRC-16, polynomial 0xA001, seed 0.
//!
//! This is the CRC-16/ARC catalogue entry. The bitwise engine is used so the
//! bootloader carries no lookup table.

use crc::{Crc, NoTable, CRC_16_ARC};

const CRC16: Crc<u16, NoTable> = Crc::<u16, NoTable>::new(&CRC_16_ARC);

/// Compute the frame CRC over `bytes`.
pub fn compute_crc16(bytes: &[u8]) -> u16 {
    CRC16.checksum(bytes)
}

/// CRC of `bytes` in wire order (low byte first).
pub fn crc16_bytes(bytes: &[u8]) -> [u8; 2] {
    compute_crc16(bytes).to_le_bytes()
}

/// Check `bytes` against a CRC received as two separate bytes.
pub fn verify(bytes: &[u8], expected_low: u8, expected_high: u8) -> bool {
    crc16_bytes(bytes) == [expected_low, expected_high]
}
