// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! `embedded-storage` flash backed by the RP2040 boot ROM routines.
//!
//! Erase and program need XIP torn down:
//!   1. connect_internal_flash()
//!   2. flash_exit_xip()
//!   3. flash_range_erase() / flash_range_program()
//!   4. flash_flush_cache()
//!   5. flash_enter_cmd_xip()
//!
//! Everything running during steps 1-5 lives in RAM (`.data`) and the ROM
//! function pointers are resolved up front while XIP still works.

use core::sync::atomic::{AtomicUsize, Ordering};
use embedded_storage::{ReadStorage, Storage};

pub const FLASH_SECTOR_SIZE: u32 = 4096;
const SECTOR_ERASE_CMD: u8 = 0x20;

// RP2040 datasheet 2.8.3: 16-bit pointers to the function table and lookup routine
const ROM_FUNC_TABLE_PTR: *const u16 = 0x0000_0014 as *const u16;
const ROM_TABLE_LOOKUP_PTR: *const u16 = 0x0000_0018 as *const u16;

type RomFnVoid = unsafe extern "C" fn();
type RomFnErase = unsafe extern "C" fn(u32, usize, u32, u8);
type RomFnProgram = unsafe extern "C" fn(u32, *const u8, usize);

static ROM_CONNECT_INTERNAL_FLASH: AtomicUsize = AtomicUsize::new(0);
static ROM_FLASH_EXIT_XIP: AtomicUsize = AtomicUsize::new(0);
static ROM_FLASH_RANGE_ERASE: AtomicUsize = AtomicUsize::new(0);
static ROM_FLASH_RANGE_PROGRAM: AtomicUsize = AtomicUsize::new(0);
static ROM_FLASH_FLUSH_CACHE: AtomicUsize = AtomicUsize::new(0);
static ROM_FLASH_ENTER_CMD_XIP: AtomicUsize = AtomicUsize::new(0);

unsafe fn rom_func_lookup(tag: &[u8; 2]) -> usize {
    let fn_table = *ROM_FUNC_TABLE_PTR as *const u16;
    let lookup: unsafe extern "C" fn(*const u16, u32) -> usize =
        core::mem::transmute::<usize, unsafe extern "C" fn(*const u16, u32) -> usize>(
            *ROM_TABLE_LOOKUP_PTR as usize,
        );

    let code = u16::from_le_bytes(*tag) as u32;
    lookup(fn_table, code)
}

/// Erase and program one sector. Runs from RAM.
///
/// # Safety
/// ROM pointers must be resolved and `data` must not point into flash.
#[link_section = ".data"]
#[inline(never)]
unsafe fn rewrite_sector(offset: u32, data: *const u8, len: usize) {
    let connect: RomFnVoid = core::mem::transmute(ROM_CONNECT_INTERNAL_FLASH.load(Ordering::Acquire));
    let exit_xip: RomFnVoid = core::mem::transmute(ROM_FLASH_EXIT_XIP.load(Ordering::Acquire));
    let erase: RomFnErase = core::mem::transmute(ROM_FLASH_RANGE_ERASE.load(Ordering::Acquire));
    let program: RomFnProgram = core::mem::transmute(ROM_FLASH_RANGE_PROGRAM.load(Ordering::Acquire));
    let flush: RomFnVoid = core::mem::transmute(ROM_FLASH_FLUSH_CACHE.load(Ordering::Acquire));
    let enter_xip: RomFnVoid = core::mem::transmute(ROM_FLASH_ENTER_CMD_XIP.load(Ordering::Acquire));

    cortex_m::interrupt::disable();
    connect();
    exit_xip();
    erase(offset, FLASH_SECTOR_SIZE as usize, FLASH_SECTOR_SIZE, SECTOR_ERASE_CMD);
    program(offset, data, len);
    flush();
    enter_xip();
    cortex_m::interrupt::enable();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum RomFlashError {
    /// Access past the end of the managed region.
    OutOfBounds,
}

/// Flash region starting at the XIP base, addressed by offset.
pub struct RomFlash {
    base: u32,
    capacity: u32,
    sector: [u8; FLASH_SECTOR_SIZE as usize],
}

impl RomFlash {
    /// Resolve the ROM routines. Must run while XIP is still active.
    pub fn new(base: u32, capacity: u32) -> Self {
        unsafe {
            ROM_CONNECT_INTERNAL_FLASH.store(rom_func_lookup(b"IF"), Ordering::Release);
            ROM_FLASH_EXIT_XIP.store(rom_func_lookup(b"EX"), Ordering::Release);
            ROM_FLASH_RANGE_ERASE.store(rom_func_lookup(b"RE"), Ordering::Release);
            ROM_FLASH_RANGE_PROGRAM.store(rom_func_lookup(b"RP"), Ordering::Release);
            ROM_FLASH_FLUSH_CACHE.store(rom_func_lookup(b"FC"), Ordering::Release);
            ROM_FLASH_ENTER_CMD_XIP.store(rom_func_lookup(b"CX"), Ordering::Release);
        }
        Self {
            base,
            capacity,
            sector: [0xFF; FLASH_SECTOR_SIZE as usize],
        }
    }

    fn check(&self, offset: u32, len: usize) -> Result<(), RomFlashError> {
        let end = offset as usize + len;
        if end > self.capacity as usize {
            return Err(RomFlashError::OutOfBounds);
        }
        Ok(())
    }

    fn read_xip(base: u32, offset: u32, buf: &mut [u8]) {
        let addr = base + offset;
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = unsafe { ((addr + i as u32) as *const u8).read_volatile() };
        }
    }
}

impl ReadStorage for RomFlash {
    type Error = RomFlashError;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), RomFlashError> {
        self.check(offset, bytes.len())?;
        Self::read_xip(self.base, offset, bytes);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.capacity as usize
    }
}

impl Storage for RomFlash {
    /// Read-modify-write of every sector the range touches.
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), RomFlashError> {
        self.check(offset, bytes.len())?;

        let mut written = 0;
        while written < bytes.len() {
            let at = offset + written as u32;
            let sector_start = at - at % FLASH_SECTOR_SIZE;
            let within = (at - sector_start) as usize;
            let chunk = (FLASH_SECTOR_SIZE as usize - within).min(bytes.len() - written);

            Self::read_xip(self.base, sector_start, &mut self.sector);
            self.sector[within..within + chunk].copy_from_slice(&bytes[written..written + chunk]);

            unsafe { rewrite_sector(sector_start, self.sector.as_ptr(), self.sector.len()) };
            written += chunk;
        }
        Ok(())
    }
}
