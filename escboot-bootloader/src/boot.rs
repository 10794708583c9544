// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

use escboot_common::AppHeader;
use rp2040_hal::pac;

/// The application asked for a reboot through the watchdog force trigger.
pub fn was_software_reset() -> bool {
    let watchdog = unsafe { &*pac::WATCHDOG::ptr() };
    watchdog.reason().read().force().bit_is_set()
}

/// Hand the core to the application executing in place from flash.
///
/// # Safety
/// `header` must come from a validated vector table at `app_base`.
pub unsafe fn jump_to_application(app_base: u32, header: &AppHeader) -> ! {
    relocate_vector_table(app_base);
    jump(header.initial_sp, header.reset_vector);
}

unsafe fn relocate_vector_table(base: u32) {
    cortex_m::interrupt::disable();

    const SCB_VTOR: *mut u32 = 0xE000_ED08 as *mut u32;
    SCB_VTOR.write_volatile(base);

    cortex_m::asm::dsb();
    cortex_m::asm::isb();
}

unsafe fn jump(initial_sp: u32, reset_vector: u32) -> ! {
    core::arch::asm!(
        "msr msp, {sp}",
        "bx {reset}",
        sp = in(reg) initial_sp,
        reset = in(reg) reset_vector,
        options(noreturn)
    );
}
