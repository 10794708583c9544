// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Sanity checks run before control is handed to the application.

use crate::board::BoardConfig;
use embedded_storage::ReadStorage;

/// EEPROM byte 0 once the configurator has provisioned the device.
pub const PROVISIONED_MARKER: u8 = 0x01;
/// The reset vector must land within this many bytes above the application base.
pub const ENTRY_WINDOW: u32 = 256 * 1024;

/// First two words of the application vector table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AppHeader {
    pub initial_sp: u32,
    pub reset_vector: u32,
}

impl AppHeader {
    pub fn from_le_bytes(bytes: [u8; 8]) -> Self {
        Self {
            initial_sp: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            reset_vector: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LaunchRefusal {
    /// EEPROM has not been provisioned.
    NotProvisioned { found: u8 },
    StackPointerOutOfRange(u32),
    EntryOutOfRange(u32),
    /// Storage could not be read.
    Unreadable,
}

fn is_in_ram(board: &BoardConfig, addr: u32) -> bool {
    (board.ram_start..=board.ram_start + board.ram_size).contains(&addr)
}

fn is_in_application(board: &BoardConfig, addr: u32) -> bool {
    let base = board.application_address();
    (base..=base + ENTRY_WINDOW).contains(&addr)
}

/// Check that the flashed application looks bootable.
pub fn validate_application<S: ReadStorage>(
    storage: &mut S,
    board: &BoardConfig,
) -> Result<AppHeader, LaunchRefusal> {
    if board.check_eeprom_before_jump {
        let mut marker = [0u8; 1];
        read_at(storage, board, board.eeprom_address(), &mut marker)?;
        if marker[0] != PROVISIONED_MARKER {
            return Err(LaunchRefusal::NotProvisioned { found: marker[0] });
        }
    }

    let mut words = [0u8; 8];
    read_at(storage, board, board.application_address(), &mut words)?;
    let header = AppHeader::from_le_bytes(words);

    if !is_in_ram(board, header.initial_sp) {
        return Err(LaunchRefusal::StackPointerOutOfRange(header.initial_sp));
    }
    if !is_in_application(board, header.reset_vector) {
        return Err(LaunchRefusal::EntryOutOfRange(header.reset_vector));
    }
    Ok(header)
}

fn read_at<S: ReadStorage>(
    storage: &mut S,
    board: &BoardConfig,
    address: u32,
    buf: &mut [u8],
) -> Result<(), LaunchRefusal> {
    let offset = board.storage_offset(address).ok_or(LaunchRefusal::Unreadable)?;
    storage.read(offset, buf).map_err(|_| LaunchRefusal::Unreadable)
}
