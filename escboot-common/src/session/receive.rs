// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

use super::state::{SessionState, OVERRUN_PENALTY};
use crate::hal::{MicrosClock, SignalLine};
use crate::protocol::Frame;
use crate::transport::{ReadError, SoftUart};

/// Command frames arrive back-to-back; a longer wait between two bytes means
/// the message was interrupted.
pub const INTER_BYTE_TIMEOUT_US: u32 = 250;

/// Assemble one message from the line.
///
/// Returns `None` when nothing usable arrived: an idle line (which also forces
/// a launch), a framing error, or a command frame with a gap in it.
pub fn receive_frame<L, C>(uart: &mut SoftUart<L, C>, state: &mut SessionState) -> Option<Frame>
where
    L: SignalLine,
    C: MicrosClock,
{
    let mut frame = Frame::new();
    uart.set_receive();

    loop {
        let byte = match uart.read_byte() {
            Ok(byte) => byte,
            Err(ReadError::NoStart) => break,
            Err(ReadError::IdleTimeout) => {
                #[cfg(feature = "defmt")]
                defmt::trace!("receive: line idle low, forcing launch");
                state.fail_score.force();
                return None;
            }
            Err(_e) => {
                #[cfg(feature = "defmt")]
                defmt::trace!("receive: framing error {:?} after {} bytes", _e, frame.len());
                return None;
            }
        };

        if state.payload_expected {
            frame.push(byte);
            if frame.len() == usize::from(state.payload_buffer_size) + 2 {
                break;
            }
            continue;
        }

        if !frame.is_empty() && uart.last_gap_us() > INTER_BYTE_TIMEOUT_US {
            #[cfg(feature = "defmt")]
            defmt::trace!("receive: {} us gap, dropping message", uart.last_gap_us());
            return None;
        }

        frame.push(byte);
        if frame.is_full() {
            state.fail_score.penalize(OVERRUN_PENALTY);
            break;
        }
    }

    (!frame.is_empty()).then_some(frame)
}
