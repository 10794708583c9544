// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Simulated clock, signal line and flash shared by the integration tests.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use embedded_storage::{ReadStorage, Storage};
use escboot_common::hal::{LineMode, MicrosClock, Pull, SignalLine};
use escboot_common::transport::{BIT_TIME_US, HALF_BIT_TIME_US};
use escboot_common::{BoardConfig, FlashProfile};

/// Simulated time past which a test is considered hung.
const HORIZON_US: u32 = 60_000_000;
/// Delay between the device releasing the line and the host starting a frame.
pub const HOST_TURNAROUND_US: u32 = 100;

/// Clock that advances one microsecond every time it or the line is read, so
/// spin loops always make progress.
#[derive(Clone)]
pub struct SimClock {
    now: Rc<Cell<u32>>,
}

impl SimClock {
    pub fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(0)),
        }
    }

    pub fn peek(&self) -> u32 {
        self.now.get()
    }

    fn tick(&self) -> u32 {
        let t = self.now.get();
        assert!(t < HORIZON_US, "simulation ran past {HORIZON_US} us");
        self.now.set(t + 1);
        t
    }
}

impl MicrosClock for SimClock {
    fn now_us(&self) -> u32 {
        self.tick()
    }
}

/// Level transitions `(time, level)`; the line is high before the first one.
pub type Waveform = Vec<(u32, bool)>;

/// UART waveform for `bytes` starting at `t0`, with a full stop bit between
/// bytes and `extra_gap[i]` more microseconds after byte `i`.
pub fn encode_uart(bytes: &[u8], t0: u32, extra_gap: &[(usize, u32)]) -> (Waveform, u32) {
    let mut wave = Waveform::new();
    let mut t = t0;
    for (i, &byte) in bytes.iter().enumerate() {
        wave.push((t, false));
        for bit in 0..8 {
            wave.push((t + BIT_TIME_US * (bit + 1), byte & (1 << bit) != 0));
        }
        wave.push((t + BIT_TIME_US * 9, true));
        t += BIT_TIME_US * 10;
        if let Some(&(_, gap)) = extra_gap.iter().find(|(at, _)| *at == i) {
            t += gap;
        }
    }
    (wave, t)
}

/// Level of `wave` at time `t`, or `None` before its first transition.
pub fn level_at(wave: &[(u32, bool)], t: u32) -> Option<bool> {
    match wave.partition_point(|&(at, _)| at <= t) {
        0 => None,
        n => Some(wave[n - 1].1),
    }
}

/// Decode every byte in a transmit session, sampling mid-bit.
pub fn decode_uart(wave: &[(u32, bool)]) -> Vec<u8> {
    let level = |t: u32| level_at(wave, t).unwrap_or(true);
    let mut bytes = Vec::new();
    let mut i = 0;
    while i < wave.len() {
        let (edge, lvl) = wave[i];
        if lvl || (i > 0 && !wave[i - 1].1) {
            i += 1;
            continue;
        }
        let mut byte = 0u8;
        for bit in 0..8 {
            if level(edge + HALF_BIT_TIME_US + BIT_TIME_US * (bit + 1)) {
                byte |= 1 << bit;
            }
        }
        assert!(level(edge + HALF_BIT_TIME_US + BIT_TIME_US * 9), "missing stop bit");
        bytes.push(byte);
        let stop = edge + BIT_TIME_US * 9;
        while i < wave.len() && wave[i].0 < stop {
            i += 1;
        }
    }
    bytes
}

/// What the host does when it isn't sending a scripted frame.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum HostIdle {
    /// Line released; level follows the device's pull network.
    Released,
    DriveHigh,
    DriveLow,
}

struct Scheduled {
    wave: Waveform,
    end: u32,
}

/// Host side of the wire plus the device's GPIO.
pub struct SimLine {
    clock: SimClock,
    mode: LineMode,
    driven: bool,
    /// Level of a released line with no pull.
    pub floating_level: bool,
    pub idle: HostIdle,
    queue: VecDeque<(Vec<u8>, Vec<(usize, u32)>)>,
    current: Option<Scheduled>,
    sessions: Vec<Waveform>,
    pub modes: Vec<LineMode>,
}

impl SimLine {
    pub fn new(clock: &SimClock) -> Self {
        Self {
            clock: clock.clone(),
            mode: LineMode::Input(Pull::None),
            driven: true,
            floating_level: true,
            idle: HostIdle::Released,
            queue: VecDeque::new(),
            current: None,
            sessions: Vec::new(),
            modes: Vec::new(),
        }
    }

    /// Queue a frame; the host sends it once the device is listening.
    pub fn host_sends(&mut self, bytes: &[u8]) {
        self.queue.push_back((bytes.to_vec(), Vec::new()));
    }

    /// Queue a frame with extra idle time after byte `after`.
    pub fn host_sends_with_gap(&mut self, bytes: &[u8], after: usize, gap_us: u32) {
        self.queue.push_back((bytes.to_vec(), vec![(after, gap_us)]));
    }

    /// Replay a raw waveform starting `HOST_TURNAROUND_US` from now.
    pub fn host_plays(&mut self, wave: &[(u32, bool)], duration: u32) {
        let t0 = self.clock.peek() + HOST_TURNAROUND_US;
        let wave: Waveform = wave.iter().map(|&(t, l)| (t + t0, l)).collect();
        self.current = Some(Scheduled {
            wave,
            end: t0 + duration,
        });
    }

    pub fn pending_frames(&self) -> usize {
        self.queue.len()
    }

    /// Bytes of each transmit session, in order.
    pub fn replies(&self) -> Vec<Vec<u8>> {
        self.sessions.iter().map(|wave| decode_uart(wave)).collect()
    }

    /// Raw transitions of each transmit session.
    pub fn transmissions(&self) -> &[Waveform] {
        &self.sessions
    }

    fn host_busy(&self, now: u32) -> bool {
        self.current.as_ref().is_some_and(|s| now <= s.end)
    }

    fn schedule_next(&mut self) {
        let now = self.clock.peek();
        if self.host_busy(now) {
            return;
        }
        if let Some((bytes, gaps)) = self.queue.pop_front() {
            let (wave, end) = encode_uart(&bytes, now + HOST_TURNAROUND_US, &gaps);
            self.current = Some(Scheduled { wave, end });
        }
    }

    fn level(&self) -> bool {
        let now = self.clock.tick();
        if self.mode == LineMode::Output {
            return self.driven;
        }
        if let Some(scheduled) = self.current.as_ref().filter(|s| now <= s.end) {
            return level_at(&scheduled.wave, now).unwrap_or(true);
        }
        match (self.idle, self.mode) {
            (HostIdle::DriveHigh, _) => true,
            (HostIdle::DriveLow, _) => false,
            (HostIdle::Released, LineMode::Input(Pull::Up)) => true,
            (HostIdle::Released, LineMode::Input(Pull::Down)) => false,
            (HostIdle::Released, _) => self.floating_level,
        }
    }

    fn drive(&mut self, level: bool) {
        if self.mode == LineMode::Output && level != self.driven {
            let now = self.clock.peek();
            if let Some(session) = self.sessions.last_mut() {
                session.push((now, level));
            }
        }
        self.driven = level;
    }
}

impl ErrorType for SimLine {
    type Error = Infallible;
}

impl InputPin for SimLine {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.level())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.level())
    }
}

impl OutputPin for SimLine {
    fn set_high(&mut self) -> Result<(), Infallible> {
        self.drive(true);
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Infallible> {
        self.drive(false);
        Ok(())
    }
}

impl SignalLine for SimLine {
    fn configure(&mut self, mode: LineMode) {
        if mode == LineMode::Output && self.mode != LineMode::Output {
            self.sessions.push(Waveform::new());
        }
        self.mode = mode;
        self.modes.push(mode);
        if mode == LineMode::Input(Pull::Up) {
            self.schedule_next();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemFlashError;

/// Flash image in RAM. Erased bytes read 0xFF.
pub struct MemFlash {
    pub data: Vec<u8>,
    pub writes: Vec<(u32, Vec<u8>)>,
    pub fail_writes: bool,
}

impl MemFlash {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0xFF; size],
            writes: Vec::new(),
            fail_writes: false,
        }
    }

    pub fn poke(&mut self, offset: u32, bytes: &[u8]) {
        let start = offset as usize;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
    }
}

impl ReadStorage for MemFlash {
    type Error = MemFlashError;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), MemFlashError> {
        let start = offset as usize;
        let src = self.data.get(start..start + bytes.len()).ok_or(MemFlashError)?;
        bytes.copy_from_slice(src);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}

impl Storage for MemFlash {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), MemFlashError> {
        if self.fail_writes {
            return Err(MemFlashError);
        }
        let start = offset as usize;
        let dst = self
            .data
            .get_mut(start..start + bytes.len())
            .ok_or(MemFlashError)?;
        dst.copy_from_slice(bytes);
        self.writes.push((offset, bytes.to_vec()));
        Ok(())
    }
}

/// 64 KiB part at 0x0800_0000 with the application at +0x1000.
pub fn board() -> BoardConfig {
    BoardConfig::new(0x0800_0000, 0x1000, FlashProfile::Kb64)
        .with_pin(0, 2)
        .with_version(12)
}

/// Flash holding a plausible application and a provisioned EEPROM.
pub fn bootable_flash(board: &BoardConfig) -> MemFlash {
    let mut flash = MemFlash::new(board.profile.size_bytes() as usize);
    let mut header = Vec::new();
    header.extend_from_slice(&(board.ram_start + 0x2000).to_le_bytes());
    header.extend_from_slice(&(board.application_address() + 0xC1).to_le_bytes());
    flash.poke(board.app_offset, &header);
    flash.poke(board.profile.eeprom_offset(), &[0x01, 0x00, 0x0B]);
    flash
}
