// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command protocol engine and the resident bootloader loop.
//!
//! One [`Bootloader::service`] call:
//! - assembles a message from the line (`receive`)
//! - decodes it against the session registers (`commands`)
//! - transmits the reply and turns the line around
//! - checks the fail score and, when it says so, validates the application
mod commands;
mod receive;
mod state;

pub use commands::dispatch;
pub use receive::{receive_frame, INTER_BYTE_TIMEOUT_US};
pub use state::{FailScore, SessionState, FAIL_THRESHOLD, INVALID_COMMAND_PENALTY, OVERRUN_PENALTY};

use crate::board::BoardConfig;
use crate::hal::{MicrosClock, SignalLine};
use crate::launch::{validate_application, AppHeader};
use crate::protocol::Reply;
use crate::transport::SoftUart;
use embedded_storage::{ReadStorage, Storage};

/// Transmit `reply` and hand the line back to the peer.
pub fn send_reply<L, C>(uart: &mut SoftUart<L, C>, reply: &Reply)
where
    L: SignalLine,
    C: MicrosClock,
{
    let bytes = reply.as_bytes();
    if bytes.is_empty() {
        return;
    }
    uart.set_transmit();
    uart.write_string(bytes);
    uart.set_receive();
}

pub struct Bootloader<L, C, S> {
    uart: SoftUart<L, C>,
    storage: S,
    board: BoardConfig,
    state: SessionState,
}

impl<L, C, S> Bootloader<L, C, S>
where
    L: SignalLine,
    C: MicrosClock,
    S: ReadStorage + Storage,
{
    pub fn new(uart: SoftUart<L, C>, storage: S, board: BoardConfig) -> Self {
        Self {
            uart,
            storage,
            board,
            state: SessionState::new(),
        }
    }

    /// Handle one message. Returns the application header once the session
    /// has decided to launch and the image passed validation.
    pub fn service(&mut self) -> Option<AppHeader> {
        if let Some(frame) = receive_frame(&mut self.uart, &mut self.state) {
            let reply = dispatch(&mut self.state, &frame, &mut self.storage, &self.board);
            #[cfg(feature = "defmt")]
            defmt::trace!("service: reply {}, score {}", reply, self.state.fail_score);
            send_reply(&mut self.uart, &reply);
        }

        if self.state.fail_score.should_launch() {
            self.try_launch()
        } else {
            None
        }
    }

    /// Validate the application. A refusal restarts the fail budget so the
    /// session keeps waiting for a usable image.
    pub fn try_launch(&mut self) -> Option<AppHeader> {
        match validate_application(&mut self.storage, &self.board) {
            Ok(header) => Some(header),
            Err(_refusal) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("launch refused: {:?}", _refusal);
                self.state.fail_score.clear();
                None
            }
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    pub fn board(&self) -> &BoardConfig {
        &self.board
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn uart(&self) -> &SoftUart<L, C> {
        &self.uart
    }

    pub fn uart_mut(&mut self) -> &mut SoftUart<L, C> {
        &mut self.uart
    }
}
