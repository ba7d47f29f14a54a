use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run two nodes over a simulated radio and report delivery.
    Simulate(SimulateArgs),
    /// Decode one hex-encoded frame (u16 channel ids).
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Simulate(args) => simulate::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Number of channels opened from node 1 to node 2.
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u16).range(1..=8))]
    pub channels: u16,
    /// Messages sent on each channel.
    #[arg(long, default_value_t = 5)]
    pub messages: u32,
    /// Payload size in bytes (clamped to the radio frame).
    #[arg(long, default_value_t = 16)]
    pub payload_size: usize,
    /// Lose every N-th frame on the air.
    #[arg(long, value_name = "N")]
    pub drop_every: Option<u64>,
    /// One-hop latency in milliseconds.
    #[arg(long, default_value_t = 10)]
    pub latency_ms: u64,
    /// Transport configuration file (JSON).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Override the resend timeout in milliseconds.
    #[arg(long)]
    pub resend_timeout_ms: Option<u64>,
    /// Override the number of transmissions before abort.
    #[arg(long)]
    pub max_resends: Option<u32>,
    /// Stop after this much virtual time in milliseconds.
    #[arg(long, default_value_t = 600_000)]
    pub max_time_ms: u64,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Frame bytes as hex (whitespace and ':' separators allowed).
    pub hex: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
