// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command-line interface definitions.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use escboot_common::transport::BAUD_RATE;
use escboot_common::{BoardConfig, FlashProfile};

use crate::commands;
use crate::transport::Transport;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "escboot-upload")]
#[command(about = "Firmware upload tool for the escboot single-wire bootloader")]
pub struct Cli {
    /// Serial port (e.g., /dev/ttyUSB0)
    #[arg(short, long)]
    pub port: String,

    #[arg(short, long, default_value_t = BAUD_RATE)]
    pub baud: u32,

    /// The adapter echoes transmitted bytes (one-wire adapters usually do)
    #[arg(long)]
    pub echo: bool,

    /// Flash base address in hex
    #[arg(long, default_value = "0x08000000", value_parser = parse_hex_u32)]
    pub flash_start: u32,

    /// Flash size of the target
    #[arg(long, value_enum, default_value_t = Flash::Kb64)]
    pub flash: Flash,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Flash {
    #[value(name = "32k")]
    Kb32,
    #[value(name = "64k")]
    Kb64,
    /// Addresses are sent in 4-byte units
    #[value(name = "128k")]
    Kb128,
}

impl From<Flash> for FlashProfile {
    fn from(flash: Flash) -> Self {
        match flash {
            Flash::Kb32 => FlashProfile::Kb32,
            Flash::Kb64 => FlashProfile::Kb64,
            Flash::Kb128 => FlashProfile::Kb128,
        }
    }
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Identify the device
    Info,

    /// Program a raw binary image
    Upload {
        /// Firmware binary file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Target address in hex
        #[arg(short, long, value_parser = parse_hex_u32)]
        address: u32,

        /// Skip the read-back comparison
        #[arg(long)]
        no_verify: bool,
    },

    /// Dump flash contents
    Read {
        /// Start address in hex
        #[arg(short, long, value_parser = parse_hex_u32)]
        address: u32,

        /// Number of bytes
        #[arg(short, long, default_value = "256")]
        length: usize,

        /// Write to a file instead of printing a hex dump
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Ask the bootloader to start the application
    Run,
}

/// Parse a hex string (with or without 0x prefix) into a u32.
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u32::from_str_radix(s, 16).map_err(|e| format!("invalid hex value: {e}"))
}

/// Execute the parsed CLI command.
pub fn run(cli: Cli) -> Result<()> {
    let board = BoardConfig::new(cli.flash_start, 0, cli.flash.into());
    let mut transport = Transport::new(&cli.port, cli.baud, cli.echo)?;

    match cli.command {
        Commands::Info => commands::info(&mut transport),
        Commands::Upload {
            file,
            address,
            no_verify,
        } => commands::upload(&mut transport, &board, &file, address, !no_verify),
        Commands::Read {
            address,
            length,
            output,
        } => commands::read(&mut transport, &board, address, length, output.as_deref()),
        Commands::Run => commands::run(&mut transport),
    }
}
