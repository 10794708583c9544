// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

#![no_std]
#![no_main]

mod boot;
#[cfg(any(feature = "test-clock", feature = "test-string"))]
mod diag;
mod flash;

use defmt_rtt as _;
use panic_probe as _;

defmt::timestamp!("{=u64:us}", { 0 });

use cortex_m_rt::entry;
use escboot_common::board::parse_version;
use escboot_common::eeprom::stamp_version;
use escboot_common::embedded::{init_board, TimerClock, LINE_PIN};
use escboot_common::protocol::DevInfoBlock;
use escboot_common::{
    detect_entry, validate_application, AppHeader, BoardConfig, Bootloader, EntryDecision,
    FlashProfile, LineMode, Pull, SignalLine, SoftUart,
};
use flash::RomFlash;

#[cfg(all(feature = "flash-64k", feature = "flash-128k"))]
compile_error!("select one of the flash-64k and flash-128k features");

#[cfg(feature = "flash-64k")]
const PROFILE: FlashProfile = FlashProfile::Kb64;
#[cfg(not(feature = "flash-64k"))]
const PROFILE: FlashProfile = FlashProfile::Kb128;

const FLASH_START: u32 = 0x1000_0000;
/// First sector after the DEVINFO region of the linker script.
const APP_OFFSET: u32 = 0x8000;

const BOARD: BoardConfig = BoardConfig::new(FLASH_START, APP_OFFSET, PROFILE)
    .with_pin(0, LINE_PIN)
    .with_version(parse_version(env!("ESCBOOT_VERSION")))
    .with_ram(0x2000_0000, 0x4_2000)
    .with_checks(
        cfg!(feature = "check-eeprom"),
        cfg!(feature = "check-software-reset"),
    )
    .with_eeprom_update(cfg!(feature = "update-eeprom"));

// The EEPROM stamp rewrites whole sectors; keep it clear of our own code.
const _: () = assert!(PROFILE.eeprom_offset() >= APP_OFFSET);

#[unsafe(link_section = ".boot2")]
#[used]
pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_GENERIC_03H;

#[unsafe(link_section = ".devinfo")]
#[used]
pub static DEVINFO: DevInfoBlock = DevInfoBlock::new(BOARD.device_info());

/// Transfer control, unless jumping is compiled out.
fn launch(header: &AppHeader) -> bool {
    if cfg!(feature = "disable-jump") {
        defmt::warn!("jump disabled, staying resident");
        return false;
    }
    defmt::println!(
        "Jumping to application: SP 0x{:08x}, entry 0x{:08x}",
        header.initial_sp,
        header.reset_vector
    );
    unsafe { boot::jump_to_application(BOARD.application_address(), header) }
}

#[entry]
fn main() -> ! {
    defmt::println!("escboot v{} init", BOARD.bootloader_version);

    let software_reset = boot::was_software_reset();
    // Sole owner of the peripherals from here on.
    let (timer, mut line) = unsafe { init_board() };
    let clock = TimerClock::new(timer);
    let mut storage = RomFlash::new(FLASH_START, PROFILE.size_bytes());

    #[cfg(feature = "test-clock")]
    diag::clock_pattern(SoftUart::new(line, clock));
    #[cfg(feature = "test-string")]
    diag::hello_world(SoftUart::new(line, clock));

    let report = detect_entry(&mut line, &clock, software_reset, &BOARD, || {
        validate_application(&mut storage, &BOARD)
            .map_err(|refusal| defmt::warn!("launch refused: {}", refusal))
            .ok()
    });
    defmt::println!("entry probe: {}", report.trace);
    if let EntryDecision::Launch(header) = report.decision {
        launch(&header);
    }
    line.configure(LineMode::Input(Pull::None));

    match stamp_version(&mut storage, &BOARD) {
        Ok(outcome) => defmt::println!("EEPROM version stamp: {}", outcome),
        Err(e) => defmt::warn!("EEPROM version stamp failed: {}", e),
    }

    defmt::println!("Bootloader resident on GPIO{}", LINE_PIN);
    let mut bootloader = Bootloader::new(SoftUart::new(line, clock), storage, BOARD);
    loop {
        if let Some(header) = bootloader.service() {
            if !launch(&header) {
                bootloader.state_mut().fail_score.clear();
            }
        }
    }
}
