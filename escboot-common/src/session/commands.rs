// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

use super::state::{SessionState, INVALID_COMMAND_PENALTY};
use crate::board::BoardConfig;
use crate::crc::crc16_bytes;
use crate::protocol::{
    Command, Frame, ReadResponse, Reply, ACK, MAX_PAYLOAD_LEN, PROBE_ALIGNMENTS, PROBE_MARKER,
    PROBE_TAG,
};
use embedded_storage::{ReadStorage, Storage};

/// Decode one assembled message and apply it to `state`.
pub fn dispatch<S>(
    state: &mut SessionState,
    frame: &Frame,
    storage: &mut S,
    board: &BoardConfig,
) -> Reply
where
    S: ReadStorage + Storage,
{
    if state.payload_expected {
        return accept_payload(state, frame);
    }

    if let Some(reply) = answer_probe(frame, board) {
        return reply;
    }

    let code = frame.byte(0);
    #[cfg(feature = "defmt")]
    defmt::trace!("dispatch: cmd 0x{:02x}, {} bytes", code, frame.len());

    match Command::from_code(code) {
        Some(Command::Run) => handle_run(state, frame),
        Some(Command::ProgFlash) => handle_prog_flash(state, frame, storage, board),
        Some(Command::EraseFlash) => handle_erase_flash(state, frame, board),
        Some(Command::ReadFlash) => handle_read_flash(state, frame, storage, board),
        Some(Command::ReadEeprom) => handle_read_eeprom(state),
        Some(Command::KeepAlive) => handle_keep_alive(frame),
        Some(Command::SetBuffer) => handle_set_buffer(state, frame),
        Some(Command::SetAddress) => handle_set_address(state, frame, board),
        None => reject_unsupported(state),
    }
}

fn reject_unsupported(state: &mut SessionState) -> Reply {
    state.fail_score.penalize(INVALID_COMMAND_PENALTY);
    Reply::BadCommand
}

fn crc_ok(frame: &Frame, command: Command) -> bool {
    command
        .crc_span()
        .is_some_and(|span| frame.crc_matches(span))
}

/// Raw payload announced by SET_BUFFER. A bad CRC keeps the session waiting
/// for a resend.
fn accept_payload(state: &mut SessionState, frame: &Frame) -> Reply {
    let len = usize::from(state.payload_buffer_size);
    if !frame.crc_matches(len) {
        #[cfg(feature = "defmt")]
        defmt::warn!("payload: CRC mismatch over {} bytes", len);
        return Reply::BadCrc;
    }

    state.capture_payload(frame.window(len));
    state.payload_expected = false;
    Reply::Ack
}

/// Legacy configurators probe with a marker at one of three alignments.
/// A marker at the first alignment always ends decoding, matched or not.
fn answer_probe(frame: &Frame, board: &BoardConfig) -> Option<Reply> {
    for (i, &(marker_at, tag_at)) in PROBE_ALIGNMENTS.iter().enumerate() {
        if frame.byte(marker_at) != PROBE_MARKER {
            continue;
        }
        if [frame.byte(tag_at), frame.byte(tag_at + 1)] == PROBE_TAG {
            return Some(Reply::DeviceInfo(board.device_info()));
        }
        if i == 0 {
            return Some(Reply::None);
        }
    }
    None
}

/// RUN with a zero address forces a launch. Either way the command is then
/// answered as unsupported, which is what deployed hosts expect.
fn handle_run(state: &mut SessionState, frame: &Frame) -> Reply {
    if frame.byte(1) == 0 && frame.byte(2) == 0 && frame.byte(3) == 0 {
        state.fail_score.force();
    }
    reject_unsupported(state)
}

fn handle_prog_flash<S>(
    state: &mut SessionState,
    frame: &Frame,
    storage: &mut S,
    board: &BoardConfig,
) -> Reply
where
    S: ReadStorage + Storage,
{
    if !crc_ok(frame, Command::ProgFlash) {
        return Reply::BadCrc;
    }

    let address = state.current_address;
    let Some(offset) = board.storage_offset(address).filter(|_| board.is_writable(address)) else {
        #[cfg(feature = "defmt")]
        defmt::warn!("prog: 0x{:08x} is protected", address);
        return Reply::BadCommand;
    };

    match storage.write(offset, state.payload()) {
        Ok(()) => Reply::Ack,
        Err(_) => {
            #[cfg(feature = "defmt")]
            defmt::warn!("prog: write of {} bytes at 0x{:08x} failed", state.payload().len(), address);
            Reply::BadCommand
        }
    }
}

/// Erasing is left to the write path; this only gates and acknowledges.
fn handle_erase_flash(state: &SessionState, frame: &Frame, board: &BoardConfig) -> Reply {
    if !crc_ok(frame, Command::EraseFlash) {
        return Reply::BadCrc;
    }
    if !board.is_writable(state.current_address) {
        return Reply::BadCommand;
    }
    Reply::Ack
}

fn handle_read_flash<S>(
    state: &SessionState,
    frame: &Frame,
    storage: &mut S,
    board: &BoardConfig,
) -> Reply
where
    S: ReadStorage,
{
    if !crc_ok(frame, Command::ReadFlash) {
        return Reply::BadCrc;
    }

    let len = match frame.byte(1) {
        0 => MAX_PAYLOAD_LEN,
        n => usize::from(n),
    };

    let mut response = ReadResponse::new();
    // Capacity is MAX_PAYLOAD_LEN + 3, so neither step can fail.
    response.resize(len, 0).ok();
    let read = board
        .storage_offset(state.current_address)
        .map(|offset| storage.read(offset, &mut response[..len]));
    if !matches!(read, Some(Ok(()))) {
        #[cfg(feature = "defmt")]
        defmt::warn!("read: {} bytes at 0x{:08x} failed", len, state.current_address);
        return Reply::BadCommand;
    }

    let crc = crc16_bytes(&response);
    response.extend_from_slice(&crc).ok();
    response.push(ACK).ok();
    Reply::Read(response)
}

/// The request is only recorded; the reply is the unsupported-command one.
fn handle_read_eeprom(state: &mut SessionState) -> Reply {
    state.eeprom_read_requested = true;
    reject_unsupported(state)
}

/// Keeps the host's link timer alive. Never acknowledged.
fn handle_keep_alive(frame: &Frame) -> Reply {
    if !crc_ok(frame, Command::KeepAlive) {
        return Reply::BadCrc;
    }
    Reply::BadCommand
}

/// Announce a raw payload. The payload itself is the next transmission, so
/// there is no acknowledgement.
fn handle_set_buffer(state: &mut SessionState, frame: &Frame) -> Reply {
    if !crc_ok(frame, Command::SetBuffer) {
        return Reply::BadCrc;
    }

    state.payload_buffer_size = if frame.byte(2) == 0x01 {
        MAX_PAYLOAD_LEN as u16
    } else {
        u16::from(frame.byte(3))
    };
    state.payload_expected = true;
    Reply::None
}

fn handle_set_address(state: &mut SessionState, frame: &Frame, board: &BoardConfig) -> Reply {
    if !crc_ok(frame, Command::SetAddress) {
        return Reply::BadCrc;
    }

    let word = u16::from_be_bytes([frame.byte(2), frame.byte(3)]);
    state.current_address = board.address_from_word(word);
    state.fail_score.clear();
    Reply::Ack
}
