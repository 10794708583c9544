// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Core of the escboot single-wire bootloader.
//!
//! This crate supports both `no_std` (embedded) and `std` (host) environments:
//! - Default: `no_std` mode for embedded targets
//! - `std` feature: Enables `std` support for host tools
//! - `embedded` feature: Enables RP2040 line/clock adapters (rp2040-hal)
//! - `defmt` feature: Logs decisions through defmt
//!
//! Everything that touches hardware goes through the seams in [`hal`] and the
//! `embedded-storage` traits, so the whole protocol can run against a
//! simulated line and clock on the host.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod board;
pub mod crc;
pub mod eeprom;
pub mod entry;
pub mod hal;
pub mod launch;
pub mod protocol;
pub mod session;
pub mod transport;

// RP2040 adapters for the firmware (requires embedded feature)
#[cfg(feature = "embedded")]
pub mod embedded;

// Re-export commonly used types
pub use board::{BoardConfig, FlashProfile};
pub use entry::{detect_entry, EntryDecision, EntryReport};
pub use hal::{LineMode, MicrosClock, Pull, SignalLine};
pub use launch::{validate_application, AppHeader, LaunchRefusal};
pub use protocol::{DeviceInfo, Frame, Reply, Request, MAX_FRAME_LEN, MAX_PAYLOAD_LEN};
pub use session::{Bootloader, FailScore, SessionState};
pub use transport::{LinkStats, ReadError, SoftUart};
