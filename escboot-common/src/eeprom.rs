// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Bootloader version stamp in the application's EEPROM block.

use crate::board::BoardConfig;
use embedded_storage::{ReadStorage, Storage};

/// Bytes rewritten when the stamp changes.
pub const EEPROM_BLOCK_LEN: usize = 48;
pub const VERSION_OFFSET: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StampOutcome {
    /// Stamping is turned off for this board.
    Disabled,
    /// The block has never been written (0x00 or 0xFF); left alone.
    Unprogrammed,
    /// Already carries this version.
    Current,
    Updated { previous: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StampError<E> {
    /// EEPROM address lies below the flash base.
    OutOfRange,
    Storage(E),
}

/// Record the running bootloader version in the EEPROM block.
pub fn stamp_version<S>(storage: &mut S, board: &BoardConfig) -> Result<StampOutcome, StampError<S::Error>>
where
    S: ReadStorage + Storage,
{
    if !board.update_eeprom_version {
        return Ok(StampOutcome::Disabled);
    }

    let offset = board
        .storage_offset(board.eeprom_address())
        .ok_or(StampError::OutOfRange)?;
    let mut block = [0u8; EEPROM_BLOCK_LEN];
    storage.read(offset, &mut block).map_err(StampError::Storage)?;

    let previous = block[VERSION_OFFSET];
    if previous == board.bootloader_version {
        return Ok(StampOutcome::Current);
    }
    if previous == 0xFF || previous == 0x00 {
        return Ok(StampOutcome::Unprogrammed);
    }

    block[VERSION_OFFSET] = board.bootloader_version;
    storage.write(offset, &block).map_err(StampError::Storage)?;
    Ok(StampOutcome::Updated { previous })
}
