// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Frame layout, host encoders, identification probe and board addressing.

mod common;

use common::{board, bootable_flash};
use escboot_common::board::parse_version;
use escboot_common::crc::{compute_crc16, verify};
use escboot_common::protocol::{
    encode_payload, identify_probe, Command, DevInfoBlock, DEVINFO_MAGIC1, DEVINFO_MAGIC2,
    PROBE_MARKER,
};
use escboot_common::session::dispatch;
use escboot_common::{
    BoardConfig, DeviceInfo, FailScore, FlashProfile, Frame, Reply, Request, SessionState,
    MAX_FRAME_LEN,
};

// --- CRC ---

#[test]
fn test_crc_check_value() {
    assert_eq!(compute_crc16(b"123456789"), 0xBB3D);
}

#[test]
fn test_crc_of_nothing_is_zero() {
    assert_eq!(compute_crc16(&[]), 0);
    assert!(verify(&[], 0, 0));
}

#[test]
fn test_crc_detects_single_bit_flips() {
    let data = *b"\xFF\x00\x12\x34single wire";
    let crc = compute_crc16(&data);
    for byte in 0..data.len() {
        for bit in 0..8 {
            let mut flipped = data;
            flipped[byte] ^= 1 << bit;
            assert_ne!(compute_crc16(&flipped), crc, "byte {byte} bit {bit}");
        }
    }

    let [lo, hi] = crc.to_le_bytes();
    assert!(verify(&data, lo, hi));
    for bit in 0..8 {
        assert!(!verify(&data, lo ^ (1 << bit), hi));
        assert!(!verify(&data, lo, hi ^ (1 << bit)));
    }
}

// --- Host encoders ---

#[test]
fn test_set_address_frame() {
    let frame = Request::SetAddress { word: 0x1234 }.encode();

    assert_eq!(&frame[..4], &[0xFF, 0x00, 0x12, 0x34]);
    assert!(verify(&frame[..4], frame[4], frame[5]));
}

#[test]
fn test_set_buffer_full_block_frame() {
    let frame = Request::SetBuffer { len: 256 }.encode();
    assert_eq!(&frame[..4], &[0xFE, 0x00, 0x01, 0x00]);

    let clamped = Request::SetBuffer { len: 1000 }.encode();
    assert_eq!(clamped, frame);
}

#[test]
fn test_short_command_frames() {
    assert_eq!(Request::Run.encode().as_slice(), &[0, 0, 0, 0, 0, 0]);
    assert_eq!(Request::ProgFlash.encode().len(), 4);
    assert_eq!(Request::ReadFlash { len: 256 }.encode()[1], 0);
    assert_eq!(Request::KeepAlive.encode()[0], 0xFD);
}

#[test]
fn test_payload_length_limit() {
    assert_eq!(encode_payload(&[0u8; 256]).map(|f| f.len()), Some(MAX_FRAME_LEN));
    assert!(encode_payload(&[0u8; 257]).is_none());
}

#[test]
fn test_command_codes() {
    assert_eq!(Command::from_code(0xFF), Some(Command::SetAddress));
    assert_eq!(Command::from_code(0x04), Some(Command::ReadEeprom));
    assert_eq!(Command::from_code(0x05), None);
    assert_eq!(Command::SetBuffer.crc_span(), Some(4));
    assert_eq!(Command::Run.crc_span(), None);
}

// --- Frame ---

#[test]
fn test_frame_reads_zero_past_end() {
    let frame = Frame::from_slice(&[1, 2, 3]);

    assert_eq!(frame.len(), 3);
    assert_eq!(frame.byte(2), 3);
    assert_eq!(frame.byte(3), 0);
    assert_eq!(frame.byte(1000), 0);
    assert_eq!(frame.window(5), &[1, 2, 3, 0, 0]);
}

#[test]
fn test_frame_stops_at_capacity() {
    let mut frame = Frame::new();
    for i in 0..MAX_FRAME_LEN {
        assert!(frame.push(i as u8));
    }
    assert!(frame.is_full());
    assert!(!frame.push(0));
    assert_eq!(Frame::from_slice(&[7; 300]).len(), MAX_FRAME_LEN);
}

// --- Identification probe ---

fn probe_reply(bytes: &[u8]) -> (Reply, SessionState) {
    let mut state = SessionState::new();
    let mut flash = bootable_flash(&board());
    let reply = dispatch(&mut state, &Frame::from_slice(bytes), &mut flash, &board());
    (reply, state)
}

#[test]
fn test_probe_layout() {
    let probe = identify_probe();

    assert_eq!(probe.len(), 17);
    assert_eq!(&probe[8..15], b"\rBLHeli");
    assert_eq!(probe[16], PROBE_MARKER);
}

#[test]
fn test_probe_at_each_alignment() {
    for (marker_at, tag_at) in [(16, 8), (20, 12), (40, 32)] {
        let mut bytes = vec![0x42; marker_at + 1];
        bytes[marker_at] = PROBE_MARKER;
        bytes[tag_at] = 13;
        bytes[tag_at + 1] = 66;

        let (reply, state) = probe_reply(&bytes);

        assert_eq!(reply, Reply::DeviceInfo(board().device_info()), "marker at {marker_at}");
        assert_eq!(state.fail_score, FailScore::Accumulating(0));
    }
}

#[test]
fn test_probe_wins_over_valid_command_code() {
    let mut bytes = identify_probe().to_vec();
    bytes[..4].copy_from_slice(&[0xFF, 0x00, 0x12, 0x34]);

    let (reply, state) = probe_reply(&bytes);

    assert_eq!(reply, Reply::DeviceInfo(board().device_info()));
    assert_eq!(state.current_address, 0);
}

#[test]
fn test_untagged_marker_at_first_alignment_is_ignored() {
    let mut bytes = vec![0x42; 17];
    bytes[16] = PROBE_MARKER;

    let (reply, state) = probe_reply(&bytes);

    assert_eq!(reply, Reply::None);
    assert_eq!(state.fail_score, FailScore::Accumulating(0));
}

#[test]
fn test_untagged_marker_at_later_alignment_is_a_command() {
    let mut bytes = vec![0x42; 21];
    bytes[20] = PROBE_MARKER;

    let (reply, state) = probe_reply(&bytes);

    assert_eq!(reply, Reply::BadCommand);
    assert_eq!(state.fail_score, FailScore::Accumulating(1));
}

// --- Device identity ---

#[test]
fn test_device_info_record() {
    let info = DeviceInfo::new(0x02, FlashProfile::Kb64.size_code());

    assert_eq!(
        info.as_bytes(),
        &[b'4', b'7', b'1', 0x02, 0x35, 0x06, 0x06, 0x01, 0x30]
    );
    assert_eq!(info.pin_code(), 0x02);
    assert_eq!(board().device_info(), info);
}

#[test]
fn test_devinfo_block_magics() {
    let mut block = DevInfoBlock::new(board().device_info());
    assert_eq!((block.magic1, block.magic2), (DEVINFO_MAGIC1, DEVINFO_MAGIC2));
    assert!(block.is_valid());

    block.magic2 = 0;
    assert!(!block.is_valid());
}

// --- Board addressing ---

#[test]
fn test_flash_profiles() {
    let sizes = [
        (FlashProfile::Kb32, 0x7c00, 0x1f),
        (FlashProfile::Kb64, 0xf800, 0x35),
        (FlashProfile::Kb128, 0x1f800, 0x2B),
    ];
    for (profile, eeprom, code) in sizes {
        assert_eq!(profile.eeprom_offset(), eeprom);
        assert_eq!(profile.size_code(), code);
        assert!(profile.eeprom_offset() < profile.size_bytes());
    }
}

#[test]
fn test_large_profile_addresses_in_words() {
    let board = BoardConfig::new(0x1000_0000, 0x8000, FlashProfile::Kb128);

    assert_eq!(board.address_from_word(0x2000), 0x1000_8000);
    assert_eq!(board.address_word(0x1001_F800), Some(0x7E00));
    assert_eq!(board.address_word(0x1001_F802), None);
    assert_eq!(board.address_word(0x0FFF_0000), None);
    assert_eq!(board.address_window_end(), 0x1004_0000);
    assert_eq!(board.address_word(0x1003_FFFC), Some(0xFFFF));
    assert_eq!(board.address_word(0x1004_0000), None);
}

#[test]
fn test_byte_addresses_past_the_word_window_do_not_wrap() {
    let board = board();

    assert_eq!(board.address_window_end(), 0x0801_0000);
    assert_eq!(board.address_word(0x0800_FFFF), Some(0xFFFF));
    assert_eq!(board.address_word(0x0801_1000), None);
    for address in [board.application_address(), 0x0800_8000, 0x0800_FF00] {
        let word = board.address_word(address).unwrap();
        assert_eq!(board.address_from_word(word), address);
    }
}

#[test]
fn test_writable_boundary() {
    let board = board();

    assert!(!board.is_writable(board.application_address() - 1));
    assert!(board.is_writable(board.application_address()));
    assert_eq!(board.storage_offset(board.flash_start - 1), None);
}

#[test]
fn test_parse_version() {
    assert_eq!(parse_version("12"), 12);
    assert_eq!(parse_version("12\n"), 12);
    assert_eq!(parse_version(""), 0);
    assert_eq!(parse_version("999"), 255);
}
