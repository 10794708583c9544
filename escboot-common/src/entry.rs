// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Power-up probe of the signal line: stay resident or launch right away.
//!
//! Each phase sets a pull network, lets the line settle, then counts low
//! samples:
//!   1. pull-down: nearly always low means launch (unless we came from a
//!      software reset)
//!   2. pull-up: the count carries over; still zero means a host is holding
//!      the line high, so stay
//!   3. floating: fresh count; zero means stay, anything else launches
//!
//! A launch refused by the validator falls through to the next phase.

use crate::board::BoardConfig;
use crate::hal::{delay_us, LineMode, MicrosClock, Pull, SignalLine};
use crate::launch::AppHeader;

pub const SETTLE_US: u32 = 500;
pub const SAMPLE_COUNT: u16 = 500;
pub const SAMPLE_INTERVAL_US: u32 = 10;
/// Low samples under pull-down above which the line counts as held low.
pub const PULL_DOWN_LOW_THRESHOLD: u16 = 450;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EntryDecision {
    Launch(AppHeader),
    StayResident,
}

/// Low-sample counts per phase. Phases after the decision are `None`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProbeTrace {
    pub pull_down: u16,
    /// Accumulated with the pull-down count.
    pub pull_up: Option<u16>,
    pub floating: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EntryReport {
    pub decision: EntryDecision,
    pub trace: ProbeTrace,
}

fn count_low<L: SignalLine, C: MicrosClock>(line: &mut L, clock: &C, pull: Pull) -> u16 {
    line.configure(LineMode::Input(pull));
    delay_us(clock, SETTLE_US);

    let mut low = 0;
    for _ in 0..SAMPLE_COUNT {
        if line.is_low().unwrap_or(false) {
            low += 1;
        }
        delay_us(clock, SAMPLE_INTERVAL_US);
    }
    low
}

/// Run the three-phase probe. `launch` validates the application and returns
/// its header when control may be transferred.
pub fn detect_entry<L, C, F>(
    line: &mut L,
    clock: &C,
    software_reset: bool,
    board: &BoardConfig,
    mut launch: F,
) -> EntryReport
where
    L: SignalLine,
    C: MicrosClock,
    F: FnMut() -> Option<AppHeader>,
{
    let mut trace = ProbeTrace::default();
    let report = |decision, trace| EntryReport { decision, trace };

    let mut low = count_low(line, clock, Pull::Down);
    trace.pull_down = low;
    let exempt = board.check_software_reset && software_reset;
    if low > PULL_DOWN_LOW_THRESHOLD && !exempt {
        if let Some(header) = launch() {
            return report(EntryDecision::Launch(header), trace);
        }
    }

    low = low.saturating_add(count_low(line, clock, Pull::Up));
    trace.pull_up = Some(low);
    if low == 0 {
        return report(EntryDecision::StayResident, trace);
    }

    low = count_low(line, clock, Pull::None);
    trace.floating = Some(low);
    if low == 0 {
        return report(EntryDecision::StayResident, trace);
    }

    match launch() {
        Some(header) => report(EntryDecision::Launch(header), trace),
        None => report(EntryDecision::StayResident, trace),
    }
}
