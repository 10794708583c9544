// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command implementations for bootloader operations.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use escboot_common::crc::verify;
use escboot_common::protocol::{
    encode_payload, identify_probe, ACK, BAD_COMMAND, DEVICE_FAMILY, DEVICE_INFO_LEN,
};
use escboot_common::{BoardConfig, DeviceInfo, Request, MAX_PAYLOAD_LEN};

use crate::transport::Transport;

const CHUNK_SIZE: usize = MAX_PAYLOAD_LEN;
/// The device turns the line around after SET_BUFFER without replying.
const PAYLOAD_TURNAROUND: Duration = Duration::from_millis(2);

/// Identify the device with the configurator probe.
pub fn info(transport: &mut Transport) -> Result<()> {
    transport.send(&identify_probe())?;
    let reply = transport.recv(DEVICE_INFO_LEN)?;
    let info = parse_device_info(&reply)?;

    println!("Device on {}:", transport.port_name());
    println!("  Family:     {}", String::from_utf8_lossy(&DEVICE_FAMILY));
    println!(
        "  Signal pin: port {} pin {}",
        (b'A' + (info.pin_code() >> 4)) as char,
        info.pin_code() & 0x0F
    );
    println!("  Flash code: 0x{:02x}", info.flash_size_code());

    Ok(())
}

/// Program `file` at `address`, one 256-byte block at a time.
pub fn upload(
    transport: &mut Transport,
    board: &BoardConfig,
    file: &Path,
    address: u32,
    verify_blocks: bool,
) -> Result<()> {
    let firmware = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    if firmware.is_empty() {
        bail!("{} is empty", file.display());
    }
    check_range(board, address, firmware.len())?;

    println!(
        "Firmware: {} ({} bytes)",
        file.display(),
        firmware.len()
    );
    println!("Target:   0x{:08x}", address);
    println!();

    let pb = ProgressBar::new(firmware.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    for (i, chunk) in firmware.chunks(CHUNK_SIZE).enumerate() {
        let block_address = address + (i * CHUNK_SIZE) as u32;
        if let Err(e) = write_block(transport, board, block_address, chunk, verify_blocks) {
            pb.abandon();
            return Err(e.context(format!("Block at 0x{:08x}", block_address)));
        }
        pb.inc(chunk.len() as u64);
    }

    pb.finish_with_message("Upload complete");
    println!();
    println!("Firmware uploaded successfully!");

    Ok(())
}

fn write_block(
    transport: &mut Transport,
    board: &BoardConfig,
    address: u32,
    data: &[u8],
    verify_blocks: bool,
) -> Result<()> {
    let word = set_address_word(board, address)?;
    transport.expect_ack(&Request::SetAddress { word }.encode(), "SET_ADDRESS")?;

    let len = data.len() as u16;
    transport.send_quiet(&Request::SetBuffer { len }.encode(), PAYLOAD_TURNAROUND)?;
    let payload = encode_payload(data).context("Block larger than the payload buffer")?;
    transport.expect_ack(&payload, "payload")?;
    transport.expect_ack(&Request::ProgFlash.encode(), "PROG_FLASH")?;

    if verify_blocks {
        let read_back = read_block(transport, data.len())?;
        if read_back != data {
            bail!("Read-back does not match what was written");
        }
    }
    Ok(())
}

/// READ_FLASH at the current address.
fn read_block(transport: &mut Transport, len: usize) -> Result<Vec<u8>> {
    transport.send(&Request::ReadFlash { len: len as u16 }.encode())?;
    let reply = transport.recv(len + 3)?;
    parse_read_response(&reply, len)
}

/// Dump `length` bytes starting at `address`.
pub fn read(
    transport: &mut Transport,
    board: &BoardConfig,
    address: u32,
    length: usize,
    output: Option<&Path>,
) -> Result<()> {
    check_range(board, address, length)?;

    let mut data = Vec::with_capacity(length);
    while data.len() < length {
        let at = address + data.len() as u32;
        let n = (length - data.len()).min(CHUNK_SIZE);
        transport.expect_ack(
            &Request::SetAddress {
                word: set_address_word(board, at)?,
            }
            .encode(),
            "SET_ADDRESS",
        )?;
        data.extend(read_block(transport, n).with_context(|| format!("Read at 0x{:08x}", at))?);
    }

    match output {
        Some(path) => {
            fs::write(path, &data).with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Read {} bytes to {}", data.len(), path.display());
        }
        None => {
            for (i, line) in data.chunks(16).enumerate() {
                let hex: Vec<String> = line.iter().map(|b| format!("{:02x}", b)).collect();
                println!("{:08x}  {}", address + (i * 16) as u32, hex.join(" "));
            }
        }
    }

    Ok(())
}

/// Request an application start. The bootloader answers RUN with its
/// unsupported-command byte before it jumps.
pub fn run(transport: &mut Transport) -> Result<()> {
    print!("Starting application... ");
    std::io::stdout().flush()?;

    match transport.status(&Request::Run.encode())? {
        BAD_COMMAND => println!("OK"),
        other => bail!("Unexpected reply 0x{:02x}", other),
    }

    Ok(())
}

fn set_address_word(board: &BoardConfig, address: u32) -> Result<u16> {
    board
        .address_word(address)
        .with_context(|| format!("Address 0x{:08x} has no SET_ADDRESS encoding", address))
}

/// `length` bytes from `address` must sit inside the window SET_ADDRESS can
/// name, starting on an addressable unit.
fn check_range(board: &BoardConfig, address: u32, length: usize) -> Result<()> {
    let unit = 1u32 << board.profile.address_shift();
    let window_end = board.address_window_end();
    if board.address_word(address).is_none() {
        bail!(
            "Address 0x{:08x} is not reachable (window 0x{:08x}..0x{:08x}, {}-byte units)",
            address,
            board.flash_start,
            window_end,
            unit
        );
    }
    let end = u64::from(address) + length as u64;
    if end > u64::from(window_end) {
        bail!(
            "0x{:08x}..0x{:08x} runs past the addressable window ending at 0x{:08x}",
            address,
            end,
            window_end
        );
    }
    Ok(())
}

fn parse_device_info(reply: &[u8]) -> Result<DeviceInfo> {
    let Ok(bytes) = <[u8; DEVICE_INFO_LEN]>::try_from(reply) else {
        bail!("Identity record has {} bytes", reply.len());
    };
    if bytes[..3] != DEVICE_FAMILY || bytes[DEVICE_INFO_LEN - 1] != ACK {
        bail!("Not an escboot identity record: {:02x?}", bytes);
    }
    Ok(DeviceInfo(bytes))
}

/// Check `[data][crc_lo][crc_hi][ACK]` and return the data.
fn parse_read_response(reply: &[u8], len: usize) -> Result<Vec<u8>> {
    if reply.len() != len + 3 {
        bail!("Read reply has {} bytes, expected {}", reply.len(), len + 3);
    }
    if reply[len + 2] != ACK {
        bail!("Read reply not acknowledged (0x{:02x})", reply[len + 2]);
    }
    if !verify(&reply[..len], reply[len], reply[len + 1]) {
        bail!("Read reply CRC mismatch");
    }
    Ok(reply[..len].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use escboot_common::crc::crc16_bytes;
    use escboot_common::FlashProfile;

    #[test]
    fn test_parse_read_response() {
        let data = [1u8, 2, 3, 4];
        let crc = crc16_bytes(&data);
        let reply = [1, 2, 3, 4, crc[0], crc[1], ACK];

        assert_eq!(parse_read_response(&reply, 4).unwrap(), data);
        assert!(parse_read_response(&reply[..6], 4).is_err());

        let mut corrupted = reply;
        corrupted[1] ^= 0x80;
        assert!(parse_read_response(&corrupted, 4).is_err());
    }

    #[test]
    fn test_parse_device_info() {
        let info = BoardConfig::new(0x0800_0000, 0x1000, FlashProfile::Kb64).device_info();

        assert_eq!(parse_device_info(info.as_bytes()).unwrap(), info);
        assert!(parse_device_info(&info.as_bytes()[..8]).is_err());
        assert!(parse_device_info(&[0u8; DEVICE_INFO_LEN]).is_err());
    }

    #[test]
    fn test_word_addressed_targets_must_be_aligned() {
        let board = BoardConfig::new(0x1000_0000, 0, FlashProfile::Kb128);

        assert!(check_range(&board, 0x1000_8000, 256).is_ok());
        assert!(check_range(&board, 0x1000_8002, 256).is_err());
        assert!(check_range(&board, 0x0800_0000, 256).is_err());
    }

    #[test]
    fn test_targets_past_the_word_window_are_rejected() {
        let board = BoardConfig::new(0x0800_0000, 0x1000, FlashProfile::Kb64);

        // 0x0801_1000 would encode as word 0x1000 and land on 0x0800_1000.
        assert!(check_range(&board, 0x0801_1000, 4).is_err());
        assert!(set_address_word(&board, 0x0801_1000).is_err());

        assert!(check_range(&board, 0x0800_F000, 0x1000).is_ok());
        assert!(check_range(&board, 0x0800_F000, 0x1001).is_err());
    }
}
