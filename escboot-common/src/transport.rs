// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Half-duplex software UART on a single GPIO.
//!
//! 19200 baud, 8N1, idle high. The line is either receiving (input with
//! pull-up) or transmitting (push-pull output); the session switches between
//! the two around every reply. Sample and edge times are scheduled from the
//! detected falling edge so polling overhead does not accumulate across a byte.

use crate::hal::{delay_us, elapsed_since, sample, wait_until, LineMode, MicrosClock, Pull, SignalLine};

pub const BAUD_RATE: u32 = 19_200;
/// 1_000_000 / BAUD_RATE, rounded down.
pub const BIT_TIME_US: u32 = 52;
pub const HALF_BIT_TIME_US: u32 = 26;
/// Line held low this long means nobody is driving it: give up and boot.
pub const IDLE_TIMEOUT_US: u32 = 20_000;
/// Once a message has started, a start bit missing for this long ends it.
pub const START_BIT_TIMEOUT_US: u32 = 5 * BIT_TIME_US;

/// Why `read_byte` returned without a byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadError {
    /// Line stayed low for longer than [`IDLE_TIMEOUT_US`].
    IdleTimeout,
    /// No start bit within [`START_BIT_TIMEOUT_US`] after a received byte.
    NoStart,
    /// Line was high in the middle of the start bit.
    BadStart,
    /// Line was low in the middle of the stop bit.
    BadStop,
}

/// Per-outcome counters for the receive path.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkStats {
    pub idle_timeouts: u32,
    pub missing_start: u32,
    pub bad_start: u32,
    pub bad_stop: u32,
    pub good: u32,
}

impl LinkStats {
    fn record(&mut self, outcome: Result<u8, ReadError>) {
        let counter = match outcome {
            Ok(_) => &mut self.good,
            Err(ReadError::IdleTimeout) => &mut self.idle_timeouts,
            Err(ReadError::NoStart) => &mut self.missing_start,
            Err(ReadError::BadStart) => &mut self.bad_start,
            Err(ReadError::BadStop) => &mut self.bad_stop,
        };
        *counter = counter.saturating_add(1);
    }
}

pub struct SoftUart<L, C> {
    line: L,
    clock: C,
    /// A byte has been received since the last `set_receive`.
    mid_message: bool,
    last_gap_us: u32,
    stats: LinkStats,
}

impl<L: SignalLine, C: MicrosClock> SoftUart<L, C> {
    pub fn new(line: L, clock: C) -> Self {
        Self {
            line,
            clock,
            mid_message: false,
            last_gap_us: 0,
            stats: LinkStats::default(),
        }
    }

    /// Release the line to the peer and start a new message.
    pub fn set_receive(&mut self) {
        self.line.configure(LineMode::Input(Pull::Up));
        self.mid_message = false;
    }

    /// Take the line, idle high, and give the peer one bit time to turn around.
    pub fn set_transmit(&mut self) {
        self.line.set_high().ok();
        self.line.configure(LineMode::Output);
        delay_us(&self.clock, BIT_TIME_US);
    }

    /// Receive one framed byte.
    pub fn read_byte(&mut self) -> Result<u8, ReadError> {
        let outcome = self.sample_byte();
        self.stats.record(outcome);
        if outcome.is_ok() {
            self.mid_message = true;
        }
        outcome
    }

    fn sample_byte(&mut self) -> Result<u8, ReadError> {
        let idle_start = self.clock.now_us();
        while !sample(&mut self.line) {
            if elapsed_since(&self.clock, idle_start) > IDLE_TIMEOUT_US {
                return Err(ReadError::IdleTimeout);
            }
        }

        let wait_start = self.clock.now_us();
        let edge = loop {
            if !sample(&mut self.line) {
                break self.clock.now_us();
            }
            if self.mid_message && elapsed_since(&self.clock, wait_start) > START_BIT_TIMEOUT_US {
                return Err(ReadError::NoStart);
            }
        };
        self.last_gap_us = edge.wrapping_sub(wait_start);

        wait_until(&self.clock, edge, HALF_BIT_TIME_US);
        if sample(&mut self.line) {
            return Err(ReadError::BadStart);
        }

        let mut byte = 0u8;
        for bit in 0..8 {
            wait_until(&self.clock, edge, HALF_BIT_TIME_US + BIT_TIME_US * (bit + 1));
            if sample(&mut self.line) {
                byte |= 1 << bit;
            }
        }

        wait_until(&self.clock, edge, HALF_BIT_TIME_US + BIT_TIME_US * 9);
        if !sample(&mut self.line) {
            return Err(ReadError::BadStop);
        }

        Ok(byte)
    }

    /// Send one byte. The stop level is driven but not held; callers that
    /// follow with another byte hold it themselves (see [`Self::write_string`]).
    pub fn write_byte(&mut self, byte: u8) {
        let start = self.clock.now_us();
        self.line.set_low().ok();
        for bit in 0..8 {
            wait_until(&self.clock, start, BIT_TIME_US * (bit + 1));
            if byte & (1 << bit) != 0 {
                self.line.set_high().ok();
            } else {
                self.line.set_low().ok();
            }
        }
        wait_until(&self.clock, start, BIT_TIME_US * 9);
        self.line.set_high().ok();
    }

    /// Send `bytes` with a full stop bit between consecutive bytes.
    pub fn write_string(&mut self, bytes: &[u8]) {
        for (i, &byte) in bytes.iter().enumerate() {
            if i > 0 {
                delay_us(&self.clock, BIT_TIME_US);
            }
            self.write_byte(byte);
        }
    }

    /// How long the last successful read waited for its start bit.
    pub fn last_gap_us(&self) -> u32 {
        self.last_gap_us
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn line(&self) -> &L {
        &self.line
    }

    pub fn line_mut(&mut self) -> &mut L {
        &mut self.line
    }

    pub fn release(self) -> (L, C) {
        (self.line, self.clock)
    }
}
