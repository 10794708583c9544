// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Serial link to the bootloader through a half-duplex adapter.

use std::io::{Read, Write};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serialport::SerialPort;

use escboot_common::protocol::{ACK, BAD_COMMAND, BAD_CRC};

/// Longest the device takes to answer, flash writes included.
const REPLY_TIMEOUT_MS: u64 = 1_000;

pub struct Transport {
    port: Box<dyn SerialPort>,
    port_name: String,
    /// Adapter loops our own bytes back on the shared wire.
    echo: bool,
}

impl Transport {
    pub fn new(port_name: &str, baud: u32, echo: bool) -> Result<Self> {
        let port = serialport::new(port_name, baud)
            .timeout(Duration::from_millis(REPLY_TIMEOUT_MS))
            .open()
            .with_context(|| format!("Failed to open {}", port_name))?;
        port.clear(serialport::ClearBuffer::All)?;

        Ok(Self {
            port,
            port_name: port_name.to_string(),
            echo,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Transmit a frame, swallowing the adapter echo if there is one.
    pub fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.port.write_all(frame)?;
        self.port.flush()?;

        if self.echo {
            let mut echoed = vec![0u8; frame.len()];
            self.port
                .read_exact(&mut echoed)
                .context("Adapter echo missing")?;
            if echoed != frame {
                bail!("Adapter echo mismatch: line collision?");
            }
        }
        Ok(())
    }

    pub fn recv(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut reply = vec![0u8; len];
        self.port
            .read_exact(&mut reply)
            .with_context(|| format!("No {}-byte reply from device", len))?;
        Ok(reply)
    }

    /// Send a frame and wait for a single status byte.
    pub fn status(&mut self, frame: &[u8]) -> Result<u8> {
        self.send(frame)?;
        Ok(self.recv(1)?[0])
    }

    /// Send a frame that must be acknowledged.
    pub fn expect_ack(&mut self, frame: &[u8], what: &str) -> Result<()> {
        match self.status(frame)? {
            ACK => Ok(()),
            BAD_CRC => bail!("{}: device reported a CRC error", what),
            BAD_COMMAND => bail!("{}: device rejected the command", what),
            other => bail!("{}: unexpected reply 0x{:02x}", what, other),
        }
    }

    /// Send a frame that has no reply.
    pub fn send_quiet(&mut self, frame: &[u8], settle: Duration) -> Result<()> {
        self.send(frame)?;
        thread::sleep(settle);
        Ok(())
    }
}
