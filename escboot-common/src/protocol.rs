// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Wire protocol shared by the bootloader and host tools.
//!
//! Command frame: `[cmd][fields..][crc_lo][crc_hi]`.
//! Payload frame (only after SET_BUFFER): `[data..][crc_lo][crc_hi]`.
//! Replies are a single status byte, the device identity record, or a read
//! response `[data..][crc_lo][crc_hi][ACK]`.

use crate::crc::crc16_bytes;

// --- Reply bytes ---

pub const ACK: u8 = 0x30;
pub const BAD_COMMAND: u8 = 0xC1;
pub const BAD_CRC: u8 = 0xC2;

// --- Sizes ---

/// Largest message the receiver assembles.
pub const MAX_FRAME_LEN: usize = 258;
/// Largest payload accepted by SET_BUFFER.
pub const MAX_PAYLOAD_LEN: usize = 256;
/// Read response: data, CRC and trailing ACK.
pub const READ_RESPONSE_CAPACITY: usize = MAX_PAYLOAD_LEN + 3;

// --- Legacy identification probe ---

pub const PROBE_MARKER: u8 = 0x7d;
pub const PROBE_TAG: [u8; 2] = [13, 66];
/// `(marker offset, tag offset)` for each frame alignment configurators use.
pub const PROBE_ALIGNMENTS: [(usize, usize); 3] = [(16, 8), (20, 12), (40, 32)];

// --- Device identity ---

pub const DEVINFO_MAGIC1: u32 = 0x5925_e3da;
pub const DEVINFO_MAGIC2: u32 = 0x4eb8_63d9;
pub const DEVICE_FAMILY: [u8; 3] = *b"471";
pub const DEVICE_INFO_LEN: usize = 9;

/// Command codes understood by the bootloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    Run = 0x00,
    ProgFlash = 0x01,
    EraseFlash = 0x02,
    ReadFlash = 0x03,
    ReadEeprom = 0x04,
    KeepAlive = 0xFD,
    SetBuffer = 0xFE,
    SetAddress = 0xFF,
}

impl Command {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Self::Run),
            0x01 => Some(Self::ProgFlash),
            0x02 => Some(Self::EraseFlash),
            0x03 => Some(Self::ReadFlash),
            0x04 => Some(Self::ReadEeprom),
            0xFD => Some(Self::KeepAlive),
            0xFE => Some(Self::SetBuffer),
            0xFF => Some(Self::SetAddress),
            _ => None,
        }
    }

    /// Number of leading bytes covered by the frame CRC, if the command has one.
    pub const fn crc_span(self) -> Option<usize> {
        match self {
            Self::ProgFlash | Self::EraseFlash | Self::ReadFlash | Self::KeepAlive => Some(2),
            Self::SetBuffer | Self::SetAddress => Some(4),
            Self::Run | Self::ReadEeprom => None,
        }
    }
}

/// One received message. Bytes past `len` read as zero.
#[derive(Clone)]
pub struct Frame {
    bytes: [u8; MAX_FRAME_LEN],
    len: usize,
}

impl Frame {
    pub const fn new() -> Self {
        Self {
            bytes: [0; MAX_FRAME_LEN],
            len: 0,
        }
    }

    /// Build a frame from received bytes, truncating at [`MAX_FRAME_LEN`].
    pub fn from_slice(data: &[u8]) -> Self {
        let mut frame = Self::new();
        let len = data.len().min(MAX_FRAME_LEN);
        frame.bytes[..len].copy_from_slice(&data[..len]);
        frame.len = len;
        frame
    }

    /// Append a byte; returns false once the frame is full.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.len == MAX_FRAME_LEN {
            return false;
        }
        self.bytes[self.len] = byte;
        self.len += 1;
        true
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == MAX_FRAME_LEN
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn byte(&self, index: usize) -> u8 {
        self.bytes.get(index).copied().unwrap_or(0)
    }

    /// The first `span` bytes including zero fill, capped at the buffer size.
    pub fn window(&self, span: usize) -> &[u8] {
        &self.bytes[..span.min(MAX_FRAME_LEN)]
    }

    /// Check the CRC stored right after the first `span` bytes.
    pub fn crc_matches(&self, span: usize) -> bool {
        span + 2 <= MAX_FRAME_LEN
            && crate::crc::verify(self.window(span), self.byte(span), self.byte(span + 1))
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Frame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("Frame").field(&self.as_slice()).finish()
    }
}

/// Fixed descriptor answered to the identification probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct DeviceInfo(pub [u8; DEVICE_INFO_LEN]);

impl DeviceInfo {
    pub const fn new(pin_code: u8, flash_size_code: u8) -> Self {
        Self([
            DEVICE_FAMILY[0],
            DEVICE_FAMILY[1],
            DEVICE_FAMILY[2],
            pin_code,
            flash_size_code,
            0x06,
            0x06,
            0x01,
            ACK,
        ])
    }

    pub fn pin_code(&self) -> u8 {
        self.0[3]
    }

    pub fn flash_size_code(&self) -> u8 {
        self.0[4]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Identity record as laid out in the `.devinfo` section. The magics let
/// application firmware confirm the bootloader publishes this block.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct DevInfoBlock {
    pub magic1: u32,
    pub magic2: u32,
    pub info: DeviceInfo,
}

impl DevInfoBlock {
    pub const fn new(info: DeviceInfo) -> Self {
        Self {
            magic1: DEVINFO_MAGIC1,
            magic2: DEVINFO_MAGIC2,
            info,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic1 == DEVINFO_MAGIC1 && self.magic2 == DEVINFO_MAGIC2
    }
}

pub type ReadResponse = heapless::Vec<u8, READ_RESPONSE_CAPACITY>;

/// What the bootloader sends back for a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Nothing; the peer's next transmission follows immediately.
    None,
    Ack,
    BadCommand,
    BadCrc,
    DeviceInfo(DeviceInfo),
    Read(ReadResponse),
}

impl Reply {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::None => &[],
            Self::Ack => &[ACK],
            Self::BadCommand => &[BAD_COMMAND],
            Self::BadCrc => &[BAD_CRC],
            Self::DeviceInfo(info) => info.as_bytes(),
            Self::Read(data) => data.as_slice(),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Reply {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::None => defmt::write!(f, "None"),
            Self::Ack => defmt::write!(f, "Ack"),
            Self::BadCommand => defmt::write!(f, "BadCommand"),
            Self::BadCrc => defmt::write!(f, "BadCrc"),
            Self::DeviceInfo(_) => defmt::write!(f, "DeviceInfo"),
            Self::Read(data) => defmt::write!(f, "Read({=usize} bytes)", data.len()),
        }
    }
}

// --- Host side encoders ---

/// Command frames as sent by a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Boot the application now.
    Run,
    /// Program the last payload at the current address.
    ProgFlash,
    EraseFlash,
    /// Read `len` bytes (1..=256) at the current address.
    ReadFlash { len: u16 },
    KeepAlive,
    /// Announce a raw payload of `len` bytes (0..=256).
    SetBuffer { len: u16 },
    /// Address in device units (see `BoardConfig::address_word`).
    SetAddress { word: u16 },
}

pub type FrameBytes = heapless::Vec<u8, MAX_FRAME_LEN>;

impl Request {
    pub fn encode(&self) -> FrameBytes {
        let body: heapless::Vec<u8, 4> = match *self {
            Self::Run => from_array([Command::Run as u8, 0, 0, 0]),
            Self::ProgFlash => from_array([Command::ProgFlash as u8, 0x01]),
            Self::EraseFlash => from_array([Command::EraseFlash as u8, 0x01]),
            Self::ReadFlash { len } => from_array([Command::ReadFlash as u8, len as u8]),
            Self::KeepAlive => from_array([Command::KeepAlive as u8, 0x00]),
            Self::SetBuffer { len } => {
                let [hi, lo] = len.min(MAX_PAYLOAD_LEN as u16).to_be_bytes();
                from_array([Command::SetBuffer as u8, 0x00, hi, lo])
            }
            Self::SetAddress { word } => {
                let [hi, lo] = word.to_be_bytes();
                from_array([Command::SetAddress as u8, 0x00, hi, lo])
            }
        };
        with_crc(&body)
    }
}

fn from_array<const N: usize>(bytes: [u8; N]) -> heapless::Vec<u8, 4> {
    heapless::Vec::from_slice(&bytes).unwrap_or_default()
}

fn with_crc(data: &[u8]) -> FrameBytes {
    let mut frame = FrameBytes::new();
    // Callers never pass more than MAX_PAYLOAD_LEN bytes.
    frame.extend_from_slice(data).ok();
    frame.extend_from_slice(&crc16_bytes(data)).ok();
    frame
}

/// Raw payload frame for a preceding `SetBuffer`. `None` if too long.
pub fn encode_payload(data: &[u8]) -> Option<FrameBytes> {
    (data.len() <= MAX_PAYLOAD_LEN).then(|| with_crc(data))
}

/// The 17-byte identification probe sent by legacy configurators.
pub fn identify_probe() -> [u8; 17] {
    let mut probe = [0u8; 17];
    probe[8..15].copy_from_slice(b"\rBLHeli");
    probe[15] = 0xF4;
    probe[16] = PROBE_MARKER;
    probe
}
