// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Compile-time board parameters.

use crate::protocol::DeviceInfo;

/// Default flash base for parts that map flash at 0x0800_0000.
pub const DEFAULT_FLASH_START: u32 = 0x0800_0000;
/// Default offset of the application image from the flash base.
pub const DEFAULT_APP_OFFSET: u32 = 0x1000;

/// Supported flash sizes. The protocol addresses flash with a 16-bit word, so
/// the largest profile counts in 4-byte units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashProfile {
    Kb32,
    Kb64,
    Kb128,
}

impl FlashProfile {
    pub const fn size_bytes(self) -> u32 {
        match self {
            Self::Kb32 => 32 * 1024,
            Self::Kb64 => 64 * 1024,
            Self::Kb128 => 128 * 1024,
        }
    }

    /// Offset of the reserved EEPROM block from the flash base.
    pub const fn eeprom_offset(self) -> u32 {
        match self {
            Self::Kb32 => 0x7c00,
            Self::Kb64 => 0xf800,
            Self::Kb128 => 0x1f800,
        }
    }

    /// Flash size code reported in the device identity record.
    pub const fn size_code(self) -> u8 {
        match self {
            Self::Kb32 => 0x1f,
            Self::Kb64 => 0x35,
            Self::Kb128 => 0x2B,
        }
    }

    /// Left shift applied to SET_ADDRESS words.
    pub const fn address_shift(self) -> u32 {
        match self {
            Self::Kb32 | Self::Kb64 => 0,
            Self::Kb128 => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BoardConfig {
    pub flash_start: u32,
    pub app_offset: u32,
    pub profile: FlashProfile,
    /// Port letter index of the signal pin (A = 0, B = 1, ...).
    pub port: u8,
    pub pin: u8,
    pub bootloader_version: u8,
    pub ram_start: u32,
    pub ram_size: u32,
    /// Refuse to launch unless EEPROM byte 0 holds the provisioned marker.
    pub check_eeprom_before_jump: bool,
    /// After a software reset, ignore a line that reads low under pull-down.
    pub check_software_reset: bool,
    pub update_eeprom_version: bool,
}

impl BoardConfig {
    pub const fn new(flash_start: u32, app_offset: u32, profile: FlashProfile) -> Self {
        Self {
            flash_start,
            app_offset,
            profile,
            port: 0,
            pin: 2,
            bootloader_version: 0,
            ram_start: 0x2000_0000,
            ram_size: 64 * 1024,
            check_eeprom_before_jump: true,
            check_software_reset: true,
            update_eeprom_version: true,
        }
    }

    pub const fn with_pin(mut self, port: u8, pin: u8) -> Self {
        self.port = port;
        self.pin = pin;
        self
    }

    pub const fn with_version(mut self, version: u8) -> Self {
        self.bootloader_version = version;
        self
    }

    pub const fn with_ram(mut self, start: u32, size: u32) -> Self {
        self.ram_start = start;
        self.ram_size = size;
        self
    }

    pub const fn with_checks(mut self, eeprom_before_jump: bool, software_reset: bool) -> Self {
        self.check_eeprom_before_jump = eeprom_before_jump;
        self.check_software_reset = software_reset;
        self
    }

    pub const fn with_eeprom_update(mut self, enabled: bool) -> Self {
        self.update_eeprom_version = enabled;
        self
    }

    /// First byte of the application image; everything below is ours.
    pub const fn application_address(&self) -> u32 {
        self.flash_start + self.app_offset
    }

    pub const fn eeprom_address(&self) -> u32 {
        self.flash_start + self.profile.eeprom_offset()
    }

    pub const fn pin_code(&self) -> u8 {
        self.port << 4 | self.pin
    }

    pub const fn device_info(&self) -> DeviceInfo {
        DeviceInfo::new(self.pin_code(), self.profile.size_code())
    }

    /// Absolute address named by a SET_ADDRESS word.
    pub const fn address_from_word(&self, word: u16) -> u32 {
        self.flash_start + ((word as u32) << self.profile.address_shift())
    }

    /// One past the last address a SET_ADDRESS word can name.
    pub const fn address_window_end(&self) -> u32 {
        self.flash_start
            .saturating_add((u16::MAX as u32 + 1) << self.profile.address_shift())
    }

    /// SET_ADDRESS word for an absolute address (host side).
    ///
    /// `None` when the address lies below the flash base, past the 16-bit
    /// word window, or between two addressable units.
    pub const fn address_word(&self, address: u32) -> Option<u16> {
        let Some(offset) = address.checked_sub(self.flash_start) else {
            return None;
        };
        let shift = self.profile.address_shift();
        if offset & ((1 << shift) - 1) != 0 {
            return None;
        }
        let word = offset >> shift;
        if word > u16::MAX as u32 {
            return None;
        }
        Some(word as u16)
    }

    /// Writes below the application would overwrite the bootloader.
    pub const fn is_writable(&self, address: u32) -> bool {
        address >= self.application_address()
    }

    /// Storage offset of an absolute flash address.
    pub const fn storage_offset(&self, address: u32) -> Option<u32> {
        address.checked_sub(self.flash_start)
    }
}

/// Parse a decimal version string at compile time, saturating at 255.
///
/// Non-digit characters end the number, so `"12\n"` and `"12"` both give 12.
pub const fn parse_version(text: &str) -> u8 {
    let bytes = text.as_bytes();
    let mut value: u32 = 0;
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c < b'0' || c > b'9' {
            break;
        }
        value = value * 10 + (c - b'0') as u32;
        if value > u8::MAX as u32 {
            return u8::MAX;
        }
        i += 1;
    }
    value as u8
}
