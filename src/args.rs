//! Support for command line argument parsing.
//!
//! See the `dcf77sync` binary documentation (`src/main.rs`) for the option table and examples.
//! Every option overrides the matching [`Config`](crate::config::Config) field, so none are
//! required.

use std::num::NonZero;
use std::path::PathBuf;
use clap::Parser;

/// Transmit DCF77 through the default audio output to set radio-controlled clocks.
#[derive(Debug, Default, Parser)]
#[command(name = "dcf77sync", version)]
pub struct Arguments {
	/// The number of minutes to transmit [default: 6]
	#[arg(short = 'n', long)]
	pub minutes: Option<NonZero<usize>>,

	/// Time between startup and the first transmitted second, in milliseconds [default: 10000]
	#[arg(long, value_name = "MS")]
	pub lead_ms: Option<u64>,

	/// Minimum time left after assembly before transmission must start [default: 250]
	#[arg(long, value_name = "MS")]
	pub margin_ms: Option<u64>,

	/// Output sample rate in Hz, divisible by 10 [default: 44100]
	#[arg(long, value_name = "HZ")]
	pub rate: Option<u32>,

	/// Output device name [default: the host's default device]
	#[arg(long)]
	pub device: Option<String>,

	/// Timezone as a TZ string [default: CET-1CEST,M3.5.0,M10.5.0/3]
	#[arg(short = 'z', long)]
	pub timezone: Option<String>,

	/// Directory of raw waveform tables to use instead of synthesizing them
	#[arg(long, value_name = "DIR")]
	pub waveforms: Option<PathBuf>,

	/// Write synthesized waveform tables to this directory and exit without transmitting
	#[arg(long, value_name = "DIR")]
	pub export_waveforms: Option<PathBuf>,

	/// TOML configuration file
	#[arg(short, long, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Log debug output
	#[arg(short, long)]
	pub verbose: bool
}
