// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Hardware seams: the signal line, the microsecond clock and spin-wait helpers.

use embedded_hal::digital::{InputPin, OutputPin};

/// Passive pull network applied while the line is an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pull {
    Up,
    Down,
    None,
}

/// Direction of the signal line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineMode {
    Input(Pull),
    Output,
}

/// The single GPIO the bootloader talks over.
///
/// Reads and writes come from embedded-hal; `configure` switches direction and
/// pull network, which embedded-hal leaves to the HAL's type state.
pub trait SignalLine: InputPin + OutputPin {
    fn configure(&mut self, mode: LineMode);
}

/// Free-running microsecond counter. Wraps at `u32::MAX`.
pub trait MicrosClock {
    fn now_us(&self) -> u32;
}

impl<C: MicrosClock> MicrosClock for &C {
    fn now_us(&self) -> u32 {
        (**self).now_us()
    }
}

/// Microseconds since `start`, tolerant of counter wrap.
#[inline]
pub fn elapsed_since<C: MicrosClock>(clock: &C, start: u32) -> u32 {
    clock.now_us().wrapping_sub(start)
}

/// Spin until `offset_us` have passed since `start`.
#[inline]
pub fn wait_until<C: MicrosClock>(clock: &C, start: u32, offset_us: u32) {
    while elapsed_since(clock, start) < offset_us {}
}

/// Spin for `us` microseconds.
#[inline]
pub fn delay_us<C: MicrosClock>(clock: &C, us: u32) {
    let start = clock.now_us();
    wait_until(clock, start, us);
}

/// Line level, reading a failed sample as idle (high).
#[inline]
pub(crate) fn sample<L: SignalLine>(line: &mut L) -> bool {
    line.is_high().unwrap_or(true)
}
