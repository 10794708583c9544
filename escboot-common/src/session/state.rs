// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

use crate::protocol::MAX_PAYLOAD_LEN;

/// Score above which the session gives up and tries the application.
pub const FAIL_THRESHOLD: u16 = 100;
/// Added for every unsupported or malformed command.
pub const INVALID_COMMAND_PENALTY: u16 = 1;
/// Added when a message fills the whole receive buffer.
pub const OVERRUN_PENALTY: u16 = 20;

/// Progress toward abandoning the session and launching the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FailScore {
    /// Minor failures so far; launch once this exceeds [`FAIL_THRESHOLD`].
    Accumulating(u16),
    /// Idle line or explicit RUN: launch on the next check. Sticky until a
    /// launch is refused or the host re-addresses.
    ForceJumpNow,
}

impl FailScore {
    pub const fn should_launch(self) -> bool {
        match self {
            Self::Accumulating(points) => points > FAIL_THRESHOLD,
            Self::ForceJumpNow => true,
        }
    }

    pub fn penalize(&mut self, points: u16) {
        if let Self::Accumulating(total) = self {
            *total = total.saturating_add(points);
        }
    }

    pub fn force(&mut self) {
        *self = Self::ForceJumpNow;
    }

    pub fn clear(&mut self) {
        *self = Self::Accumulating(0);
    }
}

impl Default for FailScore {
    fn default() -> Self {
        Self::Accumulating(0)
    }
}

/// Protocol registers for one bootloader session. Lives until reset.
#[derive(Clone)]
pub struct SessionState {
    /// Target of PROG_FLASH, ERASE_FLASH and READ_FLASH. Set by SET_ADDRESS.
    pub current_address: u32,
    /// Length of the next raw payload (0..=256). Set by SET_BUFFER.
    pub payload_buffer_size: u16,
    /// The next message is a raw payload without a command byte.
    pub payload_expected: bool,
    pub fail_score: FailScore,
    /// Set by READ_EEPROM; nothing in the bootloader consumes it.
    pub eeprom_read_requested: bool,
    payload_buffer: [u8; MAX_PAYLOAD_LEN],
}

impl SessionState {
    pub const fn new() -> Self {
        Self {
            current_address: 0,
            payload_buffer_size: 0,
            payload_expected: false,
            fail_score: FailScore::Accumulating(0),
            eeprom_read_requested: false,
            payload_buffer: [0; MAX_PAYLOAD_LEN],
        }
    }

    /// The payload PROG_FLASH will write: `payload_buffer_size` bytes of the
    /// last captured payload.
    pub fn payload(&self) -> &[u8] {
        let len = usize::from(self.payload_buffer_size).min(MAX_PAYLOAD_LEN);
        &self.payload_buffer[..len]
    }

    /// Replace the payload buffer, zeroing whatever the new data doesn't cover.
    pub(super) fn capture_payload(&mut self, data: &[u8]) {
        let len = data.len().min(MAX_PAYLOAD_LEN);
        self.payload_buffer = [0; MAX_PAYLOAD_LEN];
        self.payload_buffer[..len].copy_from_slice(&data[..len]);
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionState")
            .field("current_address", &self.current_address)
            .field("payload_buffer_size", &self.payload_buffer_size)
            .field("payload_expected", &self.payload_expected)
            .field("fail_score", &self.fail_score)
            .field("eeprom_read_requested", &self.eeprom_read_requested)
            .finish_non_exhaustive()
    }
}
