// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! RP2040 implementations of the signal line and microsecond clock.
//!
//! The line flips between input and output on every reply, so it drives the
//! SIO and pad registers directly instead of going through the HAL's
//! type-state pins.

use crate::hal::{LineMode, MicrosClock, Pull, SignalLine};
use core::convert::Infallible;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use rp2040_hal as hal;

/// GPIO used for the signal wire.
pub const LINE_PIN: u8 = 2;

pub type LinePin =
    hal::gpio::Pin<hal::gpio::bank0::Gpio2, hal::gpio::FunctionSioInput, hal::gpio::PullUp>;

/// Initialize RP2040 clocks, timer and the signal pin.
///
/// # Safety
/// Steals the PAC peripherals. Call once, before anything else touches
/// them.
///
/// # Panics
/// If the crystal or the PLLs fail to start.
pub unsafe fn init_board() -> (hal::Timer, SioLine) {
    let mut pac = unsafe { hal::pac::Peripherals::steal() };

    let mut watchdog = hal::Watchdog::new(pac.WATCHDOG);
    let Ok(clocks) = hal::clocks::init_clocks_and_plls(
        12_000_000u32,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    ) else {
        panic!("clock initialization failed");
    };

    let timer = hal::Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);
    let sio = hal::Sio::new(pac.SIO);
    let pins = hal::gpio::Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );

    (timer, SioLine::new(pins.gpio2.into_pull_up_input()))
}

/// Signal line on a SIO-function GPIO.
pub struct SioLine {
    _pin: LinePin,
    mask: u32,
}

impl SioLine {
    /// Takes the pin already muxed to SIO; direction and pulls are switched
    /// through `configure`.
    pub fn new(pin: LinePin) -> Self {
        Self {
            _pin: pin,
            mask: 1 << LINE_PIN,
        }
    }

    fn sio() -> &'static hal::pac::sio::RegisterBlock {
        unsafe { &*hal::pac::SIO::ptr() }
    }

    fn pads() -> &'static hal::pac::pads_bank0::RegisterBlock {
        unsafe { &*hal::pac::PADS_BANK0::ptr() }
    }
}

impl ErrorType for SioLine {
    type Error = Infallible;
}

impl InputPin for SioLine {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(Self::sio().gpio_in().read().bits() & self.mask != 0)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

impl OutputPin for SioLine {
    fn set_high(&mut self) -> Result<(), Self::Error> {
        Self::sio().gpio_out_set().write(|w| unsafe { w.bits(self.mask) });
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        Self::sio().gpio_out_clr().write(|w| unsafe { w.bits(self.mask) });
        Ok(())
    }
}

impl SignalLine for SioLine {
    fn configure(&mut self, mode: LineMode) {
        match mode {
            LineMode::Input(pull) => {
                Self::sio().gpio_oe_clr().write(|w| unsafe { w.bits(self.mask) });
                let (up, down) = match pull {
                    Pull::Up => (true, false),
                    Pull::Down => (false, true),
                    Pull::None => (false, false),
                };
                Self::pads()
                    .gpio(usize::from(LINE_PIN))
                    .modify(|_, w| w.pue().bit(up).pde().bit(down));
            }
            LineMode::Output => {
                Self::sio().gpio_oe_set().write(|w| unsafe { w.bits(self.mask) });
            }
        }
    }
}

/// Free-running 1 MHz timer, truncated to 32 bits.
pub struct TimerClock(hal::Timer);

impl TimerClock {
    pub fn new(timer: hal::Timer) -> Self {
        Self(timer)
    }
}

impl MicrosClock for TimerClock {
    fn now_us(&self) -> u32 {
        self.0.get_counter().ticks() as u32
    }
}
