// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Bring-up patterns on the signal line, checked with a scope or a serial
//! adapter. Neither returns.

#[cfg(feature = "test-clock")]
use embedded_hal::digital::OutputPin;
use escboot_common::hal::{delay_us, MicrosClock, SignalLine};
use escboot_common::SoftUart;

/// 2 ms low, 1 ms high. Wrong widths mean the timer is not at 1 MHz.
#[cfg(feature = "test-clock")]
pub fn clock_pattern<L: SignalLine, C: MicrosClock>(mut uart: SoftUart<L, C>) -> ! {
    defmt::println!("diag: clock pattern");
    uart.set_transmit();
    loop {
        uart.line_mut().set_low().ok();
        delay_us(uart.clock(), 2_000);
        uart.line_mut().set_high().ok();
        delay_us(uart.clock(), 1_000);
    }
}

#[cfg(feature = "test-string")]
pub fn hello_world<L: SignalLine, C: MicrosClock>(mut uart: SoftUart<L, C>) -> ! {
    defmt::println!("diag: HELLO_WORLD every 10 ms");
    uart.set_transmit();
    loop {
        delay_us(uart.clock(), 10_000);
        uart.write_string(b"HELLO_WORLD");
    }
}
